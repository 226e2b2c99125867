//! Entity extraction: recognizer call, catalog binding and conflict checks.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::recognizer::{ExtractionError, RawEntity, RawEntityKind, RawEntityRecognizer};
use crate::config::TranslationSettings;
use crate::knowledge::KnowledgeBase;
use crate::model::{
    Candidate, EntityConflict, EntitySlot, ExplicitRange, Filter, FilterOperator, QueryEntities,
    RequiredEntity, Sort, SortDirection, SortTarget, TimeMention, TimeRange,
};

pub struct EntityExtractor {
    knowledge: Arc<KnowledgeBase>,
    recognizer: Arc<dyn RawEntityRecognizer>,
    settings: TranslationSettings,
}

impl EntityExtractor {
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        recognizer: Arc<dyn RawEntityRecognizer>,
        settings: TranslationSettings,
    ) -> Self {
        Self {
            knowledge,
            recognizer,
            settings,
        }
    }

    /// Run the recognizer and bind its spans to catalog kinds.
    ///
    /// The recognizer call is the only await point. It is bounded by the
    /// configured timeout, and dropping the returned future cancels it.
    #[instrument(skip(self), fields(timeout_ms = self.settings.extraction_timeout_ms))]
    pub async fn extract_entities(&self, query: &str) -> Result<QueryEntities, ExtractionError> {
        let timeout = self.settings.extraction_timeout();
        let raw = match tokio::time::timeout(timeout, self.recognizer.recognize(query)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "entity recognizer failed");
                return Err(e);
            }
            Err(_) => {
                warn!("entity recognizer timed out");
                return Err(ExtractionError::Timeout(self.settings.extraction_timeout_ms));
            }
        };
        debug!(spans = raw.len(), "recognizer returned spans");
        Ok(self.post_process_entities(&raw, query))
    }

    /// Bind raw spans to catalog kinds.
    ///
    /// A span whose best candidates score within `confidence_epsilon` of
    /// each other stays open as an ambiguous slot. Spans matching nothing
    /// are kept as unrecognized terms.
    pub fn post_process_entities(&self, raw: &[RawEntity], query: &str) -> QueryEntities {
        let mut entities = QueryEntities::new(query);
        let mut mentions: Vec<TimeMention> = Vec::new();
        let threshold = self.settings.similarity_threshold;

        for span in raw {
            match &span.kind {
                RawEntityKind::Metric => {
                    let candidates = self.knowledge.metric_candidates(&span.text, threshold);
                    match self.bind(&span.text, candidates, span.confidence) {
                        Some(slot) => push_slot(&mut entities.metrics, slot),
                        None => entities.unrecognized_terms.push(span.text.clone()),
                    }
                }
                RawEntityKind::Dimension => {
                    let candidates = self.knowledge.dimension_candidates(&span.text, threshold);
                    match self.bind(&span.text, candidates, span.confidence) {
                        Some(slot) => push_slot(&mut entities.dimensions, slot),
                        None => entities.unrecognized_terms.push(span.text.clone()),
                    }
                }
                RawEntityKind::TimeExpression => match TimeRange::parse(&span.text) {
                    Some(range) => mentions.push(TimeMention {
                        text: span.text.clone(),
                        range,
                    }),
                    None => entities.unrecognized_terms.push(span.text.clone()),
                },
                RawEntityKind::FilterValue {
                    dimension,
                    value,
                    negated,
                } => {
                    let existing = entities.filters.iter_mut().find(|f| {
                        f.dimension == *dimension
                            && f.operator == FilterOperator::Eq
                            && f.negated == *negated
                    });
                    match existing {
                        Some(filter) => {
                            if !filter.values.contains(value) {
                                filter.values.push(value.clone());
                            }
                        }
                        None => {
                            let filter = Filter::equals(*dimension, value);
                            entities.filters.push(if *negated { filter.negate() } else { filter });
                        }
                    }
                }
                RawEntityKind::Limit { count } => entities.limit = Some(*count),
                RawEntityKind::Sort { direction } => {
                    entities.sort = Some(Sort {
                        target: SortTarget::PrimaryMetric,
                        direction: *direction,
                    })
                }
                RawEntityKind::Comparison { comparison } => {
                    if !entities.comparisons.contains(comparison) {
                        entities.comparisons.push(*comparison);
                    }
                }
            }
        }

        let distinct = self.distinct_mentions(mentions);
        match distinct.len() {
            0 => {}
            1 => entities.time_range = distinct.into_iter().next().map(|m| m.range),
            _ => entities.time_mentions = distinct,
        }

        // A row limit without an order means "the biggest N".
        if entities.limit.is_some() && entities.sort.is_none() {
            entities.sort = Some(Sort {
                target: SortTarget::PrimaryMetric,
                direction: SortDirection::Desc,
            });
        }

        debug!(
            metrics = entities.metrics.len(),
            dimensions = entities.dimensions.len(),
            filters = entities.filters.len(),
            unrecognized = entities.unrecognized_terms.len(),
            "entities post-processed"
        );
        entities
    }

    /// Detect conflicts, in rule order: ambiguous slots, contradictory
    /// time expressions, then a missing metric.
    pub fn check_for_entity_conflicts(&self, entities: &QueryEntities) -> Vec<EntityConflict> {
        let mut conflicts = Vec::new();

        for slot in &entities.metrics {
            if let EntitySlot::Ambiguous { term, candidates } = slot {
                conflicts.push(EntityConflict::AmbiguousMetric {
                    term: term.clone(),
                    candidates: candidates.clone(),
                });
            }
        }
        for slot in &entities.dimensions {
            if let EntitySlot::Ambiguous { term, candidates } = slot {
                conflicts.push(EntityConflict::AmbiguousDimension {
                    term: term.clone(),
                    candidates: candidates.clone(),
                });
            }
        }

        let mentions = self.distinct_mentions(entities.time_mentions.clone());
        if mentions.len() > 1 {
            conflicts.push(EntityConflict::ContradictoryTimeRange { mentions });
        }

        if entities.metrics.is_empty() {
            conflicts.push(EntityConflict::MissingRequiredEntity {
                entity: RequiredEntity::Metric,
                unrecognized: entities.unrecognized_terms.clone(),
            });
        }

        conflicts
    }

    /// Candidates within `confidence_epsilon` of the best stay open
    /// together; the best one is always kept. Reported confidence is the
    /// catalog score scaled by the recognizer's confidence in the span.
    fn bind<K: Copy>(
        &self,
        term: &str,
        candidates: Vec<Candidate<K>>,
        span_confidence: f64,
    ) -> Option<EntitySlot<K>> {
        let top = candidates.first()?.confidence;
        let scale = span_confidence.clamp(0.0, 1.0);
        let mut close: Vec<_> = candidates
            .into_iter()
            .enumerate()
            .filter(|(i, c)| *i == 0 || top - c.confidence < self.settings.confidence_epsilon)
            .map(|(_, c)| Candidate {
                kind: c.kind,
                confidence: c.confidence * scale,
            })
            .collect();

        if close.len() >= 2 {
            return Some(EntitySlot::Ambiguous {
                term: term.to_string(),
                candidates: close,
            });
        }
        let best = close.pop()?;
        Some(EntitySlot::Resolved {
            term: term.to_string(),
            kind: best.kind,
            confidence: best.confidence,
        })
    }

    /// Keep the first mention of each distinct resolved range.
    fn distinct_mentions(&self, mentions: Vec<TimeMention>) -> Vec<TimeMention> {
        let now = self.knowledge.now();
        let mut seen: Vec<Option<ExplicitRange>> = Vec::new();
        let mut distinct = Vec::new();
        for mention in mentions {
            let resolved = mention.range.resolve_at(now).ok();
            if resolved.is_some() && seen.contains(&resolved) {
                continue;
            }
            seen.push(resolved);
            distinct.push(mention);
        }
        distinct
    }
}

/// Append a slot, skipping a repeat of an already selected kind or term.
fn push_slot<K: Copy + PartialEq>(slots: &mut Vec<EntitySlot<K>>, slot: EntitySlot<K>) {
    let duplicate = slots.iter().any(|existing| match (existing, &slot) {
        (EntitySlot::Resolved { kind: a, .. }, EntitySlot::Resolved { kind: b, .. }) => a == b,
        (existing, slot) => {
            existing.is_ambiguous()
                && slot.is_ambiguous()
                && existing.term().eq_ignore_ascii_case(slot.term())
        }
    });
    if !duplicate {
        slots.push(slot);
    }
}
