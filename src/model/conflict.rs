//! Detected conflicts that block SQL generation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entities::{Candidate, TimeMention};
use super::kinds::{DimensionKind, MetricKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    AmbiguousMetric,
    AmbiguousDimension,
    ContradictoryTimeRange,
    MissingRequiredEntity,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictKind::AmbiguousMetric => "AmbiguousMetric",
            ConflictKind::AmbiguousDimension => "AmbiguousDimension",
            ConflictKind::ContradictoryTimeRange => "ContradictoryTimeRange",
            ConflictKind::MissingRequiredEntity => "MissingRequiredEntity",
        })
    }
}

/// The slot every question must fill before SQL can be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredEntity {
    Metric,
}

impl RequiredEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredEntity::Metric => "metric",
        }
    }
}

/// One ambiguity or contradiction, carrying only what its kind needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EntityConflict {
    AmbiguousMetric {
        term: String,
        candidates: Vec<Candidate<MetricKind>>,
    },
    AmbiguousDimension {
        term: String,
        candidates: Vec<Candidate<DimensionKind>>,
    },
    ContradictoryTimeRange {
        mentions: Vec<TimeMention>,
    },
    MissingRequiredEntity {
        entity: RequiredEntity,
        /// Terms that were seen but matched nothing, for the explanation.
        unrecognized: Vec<String>,
    },
}

/// Term slot used in response keys for time conflicts.
pub const TIME_TERM: &str = "time";

impl EntityConflict {
    pub fn kind(&self) -> ConflictKind {
        match self {
            EntityConflict::AmbiguousMetric { .. } => ConflictKind::AmbiguousMetric,
            EntityConflict::AmbiguousDimension { .. } => ConflictKind::AmbiguousDimension,
            EntityConflict::ContradictoryTimeRange { .. } => ConflictKind::ContradictoryTimeRange,
            EntityConflict::MissingRequiredEntity { .. } => ConflictKind::MissingRequiredEntity,
        }
    }

    /// The originating term.
    pub fn term(&self) -> &str {
        match self {
            EntityConflict::AmbiguousMetric { term, .. }
            | EntityConflict::AmbiguousDimension { term, .. } => term,
            EntityConflict::ContradictoryTimeRange { .. } => TIME_TERM,
            EntityConflict::MissingRequiredEntity { entity, .. } => entity.as_str(),
        }
    }

    /// Stable `Kind|term` key that ties a prompt to its response.
    pub fn key(&self) -> String {
        conflict_key(self.kind(), self.term())
    }
}

pub fn conflict_key(kind: ConflictKind, term: &str) -> String {
    format!("{}|{}", kind, term.to_lowercase())
}
