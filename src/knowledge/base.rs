//! The domain knowledge base.
//!
//! Wraps a validated [`Catalog`] with lookups by natural-language term,
//! the join graph, time resolution and the feedback log. Everything except
//! the feedback log is read-only after construction, so one instance is
//! shared behind an `Arc` by all requests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use strsim::jaro_winkler;

use super::catalog::{Catalog, DimensionDefinition, MetricDefinition};
use super::clock::{Clock, SystemClock};
use super::feedback::{FeedbackLog, FeedbackStore};
use super::joins::JoinGraph;
use crate::model::{Candidate, DimensionKind, ExplicitRange, MetricKind, TimeError, TimeRange};

#[derive(Debug)]
pub struct KnowledgeBase {
    catalog: Catalog,
    joins: JoinGraph,
    feedback: FeedbackLog,
    clock: Arc<dyn Clock>,
}

/// A known dimension value matched in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMatch<'a> {
    pub dimension: DimensionKind,
    pub value: &'a str,
}

impl KnowledgeBase {
    pub fn new(catalog: Catalog) -> Self {
        let joins = JoinGraph::from_catalog(&catalog);
        Self {
            catalog,
            joins,
            feedback: FeedbackLog::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_feedback_store(mut self, store: Arc<dyn FeedbackStore>) -> Self {
        self.feedback = FeedbackLog::with_store(store);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn join_graph(&self) -> &JoinGraph {
        &self.joins
    }

    pub fn feedback(&self) -> &FeedbackLog {
        &self.feedback
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn metric_mappings(&self) -> &[MetricDefinition] {
        &self.catalog.metrics
    }

    pub fn dimension_mappings(&self) -> &[DimensionDefinition] {
        &self.catalog.dimensions
    }

    /// Exact, case-insensitive lookup by name, identifier or alias.
    /// Returns `None` when nothing matches.
    pub fn map_metric_to_database_field(&self, term: &str) -> Option<&MetricDefinition> {
        let best = self.metric_candidates(term, 1.0).into_iter().next()?;
        self.catalog.metric(best.kind)
    }

    pub fn map_dimension_to_database_field(&self, term: &str) -> Option<&DimensionDefinition> {
        let best = self.dimension_candidates(term, 1.0).into_iter().next()?;
        self.catalog.dimension(best.kind)
    }

    /// Every metric scoring at least `threshold` for `term`, best first.
    ///
    /// Ties on confidence go to the higher historical feedback count, then
    /// to the earlier registration.
    pub fn metric_candidates(&self, term: &str, threshold: f64) -> Vec<Candidate<MetricKind>> {
        let scored = self.catalog.metrics.iter().enumerate().map(|(order, m)| {
            let score = score_term(term, m.kind.id(), &m.name, &m.aliases);
            (order, m.kind, score, m.positive_feedback)
        });
        rank(scored, threshold)
    }

    pub fn dimension_candidates(
        &self,
        term: &str,
        threshold: f64,
    ) -> Vec<Candidate<DimensionKind>> {
        let scored = self.catalog.dimensions.iter().enumerate().map(|(order, d)| {
            let score = score_term(term, d.kind.id(), &d.name, &d.aliases);
            (order, d.kind, score, d.positive_feedback)
        });
        rank(scored, threshold)
    }

    /// Find a known filter value by one of its aliases.
    pub fn match_dimension_value(&self, text: &str) -> Option<ValueMatch<'_>> {
        let needle = normalize(text);
        self.catalog.dimensions.iter().find_map(|d| {
            d.values
                .iter()
                .find(|v| {
                    normalize(&v.value) == needle || v.aliases.iter().any(|a| normalize(a) == needle)
                })
                .map(|v| ValueMatch {
                    dimension: d.kind,
                    value: v.value.as_str(),
                })
        })
    }

    /// Resolve against the knowledge base clock.
    pub fn resolve_time_range(&self, range: &TimeRange) -> Result<ExplicitRange, TimeError> {
        self.resolve_time_range_at(range, self.clock.now())
    }

    pub fn resolve_time_range_at(
        &self,
        range: &TimeRange,
        now: DateTime<Utc>,
    ) -> Result<ExplicitRange, TimeError> {
        range.resolve_at(now)
    }

    /// Append to the feedback log. Never alters lookups.
    pub fn record_mapping_feedback(
        &self,
        term: &str,
        mapped_entity: &str,
        is_correct: bool,
        correction: Option<&str>,
    ) {
        self.feedback
            .append(term, mapped_entity, is_correct, correction);
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 1.0 for an exact match on any name, otherwise the best Jaro-Winkler
/// similarity.
fn score_term(term: &str, id: &str, name: &str, aliases: &[String]) -> f64 {
    let needle = normalize(term);
    if needle.is_empty() {
        return 0.0;
    }

    let spelled_id = id.replace('_', " ");
    let names = [id.to_string(), spelled_id, normalize(name)]
        .into_iter()
        .chain(aliases.iter().map(|a| normalize(a)));

    let mut best = 0.0_f64;
    for candidate in names {
        if candidate == needle {
            return 1.0;
        }
        best = best.max(jaro_winkler(&needle, &candidate));
    }
    best
}

fn rank<K>(
    scored: impl Iterator<Item = (usize, K, f64, u32)>,
    threshold: f64,
) -> Vec<Candidate<K>> {
    let mut kept: Vec<_> = scored.filter(|(_, _, score, _)| *score >= threshold).collect();
    kept.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then_with(|| b.3.cmp(&a.3))
            .then_with(|| a.0.cmp(&b.0))
    });
    kept.into_iter()
        .map(|(_, kind, confidence, _)| Candidate { kind, confidence })
        .collect()
}
