//! Extracted query entities.
//!
//! A [`QueryEntities`] value belongs to exactly one request. It crosses the
//! clarification round trip by value: the caller keeps it and sends it back
//! with the user's answers, so every type here is serde-serializable.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::kinds::{DimensionKind, MetricKind};
use super::time::TimeRange;

/// One scored interpretation of a term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate<K> {
    pub kind: K,
    pub confidence: f64,
}

/// A metric or dimension mention, either bound to one kind or still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntitySlot<K> {
    Resolved {
        term: String,
        kind: K,
        confidence: f64,
    },
    /// Two or more candidates scored too close to call.
    Ambiguous {
        term: String,
        candidates: Vec<Candidate<K>>,
    },
}

impl<K: Copy + PartialEq> EntitySlot<K> {
    pub fn term(&self) -> &str {
        match self {
            EntitySlot::Resolved { term, .. } | EntitySlot::Ambiguous { term, .. } => term,
        }
    }

    pub fn resolved_kind(&self) -> Option<K> {
        match self {
            EntitySlot::Resolved { kind, .. } => Some(*kind),
            EntitySlot::Ambiguous { .. } => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, EntitySlot::Ambiguous { .. })
    }
}

/// A time expression as it appeared in the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeMention {
    pub text: String,
    pub range: TimeRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "BETWEEN")]
    Between,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FilterOperator::Eq => "=",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::Like => "LIKE",
            FilterOperator::Between => "BETWEEN",
        })
    }
}

/// A restriction on a dimension. `Eq` with several values means "any of".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub dimension: DimensionKind,
    pub operator: FilterOperator,
    pub values: Vec<String>,
    #[serde(default)]
    pub negated: bool,
}

impl Filter {
    pub fn equals(dimension: DimensionKind, value: &str) -> Self {
        Self {
            dimension,
            operator: FilterOperator::Eq,
            values: vec![value.to_string()],
            negated: false,
        }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// What a sort refers to. `PrimaryMetric` binds to the first metric once
/// it is resolved, so "top 10 revenue" survives a clarification round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortTarget {
    PrimaryMetric,
    Metric(MetricKind),
    Dimension(DimensionKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub target: SortTarget,
    pub direction: SortDirection,
}

/// Period-over-period directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    PreviousPeriod,
    YearOverYear,
    MonthOverMonth,
}

impl Comparison {
    /// Key used in the comparison query map.
    pub fn label(&self) -> &'static str {
        match self {
            Comparison::PreviousPeriod => "previous_period",
            Comparison::YearOverYear => "year_over_year",
            Comparison::MonthOverMonth => "month_over_month",
        }
    }
}

/// The extracted, not yet validated query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryEntities {
    /// The original question text.
    pub query: String,
    pub metrics: Vec<EntitySlot<MetricKind>>,
    pub dimensions: Vec<EntitySlot<DimensionKind>>,
    pub time_range: Option<TimeRange>,
    /// Distinct time expressions when the question contained more than one.
    /// Two or more entries means the time range is contradictory.
    pub time_mentions: Vec<TimeMention>,
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
    pub comparisons: Vec<Comparison>,
    /// Terms the recognizer surfaced that matched nothing in the catalog.
    pub unrecognized_terms: Vec<String>,
    pub clarification_rounds: u32,
}

impl QueryEntities {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            ..Default::default()
        }
    }

    /// Metric kinds that are bound, in mention order.
    pub fn resolved_metrics(&self) -> impl Iterator<Item = MetricKind> + '_ {
        self.metrics.iter().filter_map(|slot| slot.resolved_kind())
    }

    pub fn resolved_dimensions(&self) -> impl Iterator<Item = DimensionKind> + '_ {
        self.dimensions.iter().filter_map(|slot| slot.resolved_kind())
    }

    /// True while any ambiguity marker remains: an open metric or
    /// dimension slot, or contradictory time expressions.
    pub fn has_unresolved_markers(&self) -> bool {
        self.metrics.iter().any(|s| s.is_ambiguous())
            || self.dimensions.iter().any(|s| s.is_ambiguous())
            || self.time_mentions.len() > 1
    }

    /// Add a resolved metric unless that kind is already selected.
    pub fn push_metric(&mut self, term: &str, kind: MetricKind, confidence: f64) {
        if self.resolved_metrics().any(|k| k == kind) {
            return;
        }
        self.metrics.push(EntitySlot::Resolved {
            term: term.to_string(),
            kind,
            confidence,
        });
    }

    pub fn push_dimension(&mut self, term: &str, kind: DimensionKind, confidence: f64) {
        if self.resolved_dimensions().any(|k| k == kind) {
            return;
        }
        self.dimensions.push(EntitySlot::Resolved {
            term: term.to_string(),
            kind,
            confidence,
        });
    }
}
