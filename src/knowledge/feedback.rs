//! Append-only mapping feedback.
//!
//! Records are written by the clarification path and read by an external
//! retraining job. They never feed back into candidate scoring while the
//! process is running; the catalog's `positive_feedback` counts stay fixed.
//!
//! Without a store the log keeps every record in memory. Once a store is
//! attached, records go to the store and only the ones it rejects are held
//! back in memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::KnowledgeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Monotonic sequence number, unique per log.
    pub seq: u64,
    pub term: String,
    /// Identifier of the metric or dimension the term was mapped to.
    pub mapped_entity: String,
    pub is_correct: bool,
    pub correction: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Persistence sink for feedback records.
pub trait FeedbackStore: Send + Sync {
    fn append(&self, record: &FeedbackRecord) -> Result<(), KnowledgeError>;
}

/// Feedback log, safe for concurrent writers.
#[derive(Default)]
pub struct FeedbackLog {
    records: DashMap<u64, FeedbackRecord>,
    next_seq: AtomicU64,
    store: Option<Arc<dyn FeedbackStore>>,
}

impl std::fmt::Debug for FeedbackLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackLog")
            .field("records", &self.records.len())
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

impl FeedbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<dyn FeedbackStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    /// Append one record and return its sequence number.
    ///
    /// With a store attached the record is kept in memory only if the
    /// store rejects it.
    pub fn append(
        &self,
        term: &str,
        mapped_entity: &str,
        is_correct: bool,
        correction: Option<&str>,
    ) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let record = FeedbackRecord {
            seq,
            term: term.to_string(),
            mapped_entity: mapped_entity.to_string(),
            is_correct,
            correction: correction.map(str::to_string),
            recorded_at: Utc::now(),
        };

        info!(
            seq,
            term = %record.term,
            mapped_entity = %record.mapped_entity,
            is_correct,
            "mapping feedback recorded"
        );

        if let Some(store) = &self.store {
            match store.append(&record) {
                Ok(()) => return seq,
                Err(e) => warn!(seq, error = %e, "feedback store rejected record; keeping it in memory"),
            }
        }

        self.records.insert(seq, record);
        seq
    }

    /// Number of records held in memory.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records held in memory, in sequence order.
    pub fn snapshot(&self) -> Vec<FeedbackRecord> {
        let mut records: Vec<_> = self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.seq);
        records
    }
}
