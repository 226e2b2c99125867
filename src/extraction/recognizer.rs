//! Boundary to the raw entity recognizer.
//!
//! A recognizer only finds spans and says what sort of thing each one is.
//! Binding a span to a catalog kind happens afterwards, in
//! [`EntityExtractor::post_process_entities`](super::EntityExtractor::post_process_entities).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Comparison, DimensionKind, SortDirection};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Entity recognizer failed: {0}")]
    Recognizer(String),

    #[error("Entity recognizer timed out after {0}ms")]
    Timeout(u64),
}

/// What a recognized span stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEntityKind {
    Metric,
    Dimension,
    TimeExpression,
    FilterValue {
        dimension: DimensionKind,
        value: String,
        negated: bool,
    },
    Limit {
        count: u64,
    },
    Sort {
        direction: SortDirection,
    },
    Comparison {
        comparison: Comparison,
    },
}

/// A span of the question with its type and the recognizer's confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    pub kind: RawEntityKind,
    pub text: String,
    /// Byte offsets into the question.
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
}

impl RawEntity {
    pub fn new(kind: RawEntityKind, text: &str, start: usize, end: usize, confidence: f64) -> Self {
        Self {
            kind,
            text: text.to_string(),
            start,
            end,
            confidence,
        }
    }
}

/// Turns question text into typed spans. Implementations may call out to
/// a remote model; the extractor bounds each call with a timeout.
#[async_trait]
pub trait RawEntityRecognizer: Send + Sync {
    async fn recognize(&self, text: &str) -> Result<Vec<RawEntity>, ExtractionError>;
}
