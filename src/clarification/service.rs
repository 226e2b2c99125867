//! Building clarification requests and merging answers back in.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::prompt::{generate_clarification_prompts, ClarificationPrompt};
use super::ClarificationError;
use crate::knowledge::KnowledgeBase;
use crate::model::conflict::TIME_TERM;
use crate::model::{
    ConflictKind, DimensionKind, EntityConflict, EntitySlot, MetricKind, QueryEntities,
    TimeRange,
};

/// What the caller needs to ask the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub conflicts: Vec<EntityConflict>,
    pub prompts: Vec<ClarificationPrompt>,
    /// Rounds left before the query fails.
    pub rounds_remaining: u32,
}

pub struct ClarificationService {
    knowledge: Arc<KnowledgeBase>,
    max_rounds: u32,
}

impl ClarificationService {
    pub fn new(knowledge: Arc<KnowledgeBase>, max_rounds: u32) -> Self {
        Self {
            knowledge,
            max_rounds,
        }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn generate_clarification_prompts(
        &self,
        conflicts: &[EntityConflict],
    ) -> Vec<ClarificationPrompt> {
        generate_clarification_prompts(conflicts, self.knowledge.catalog())
    }

    pub fn request_clarification(
        &self,
        entities: &QueryEntities,
        conflicts: Vec<EntityConflict>,
    ) -> ClarificationRequest {
        let prompts = self.generate_clarification_prompts(&conflicts);
        ClarificationRequest {
            conflicts,
            prompts,
            rounds_remaining: self.max_rounds.saturating_sub(entities.clarification_rounds),
        }
    }

    /// Merge answers into a copy of `original`.
    ///
    /// Every response is validated before any is applied, so a bad answer
    /// leaves no trace. Each response overwrites only the slot its key
    /// names, so answers can be applied in any order. Slots without an
    /// answer stay open. Accepted choices are logged as positive mapping
    /// feedback once all of them have been applied.
    pub fn apply_clarification_responses(
        &self,
        original: &QueryEntities,
        responses: &HashMap<String, String>,
    ) -> Result<QueryEntities, ClarificationError> {
        let mut keys: Vec<&String> = responses.keys().collect();
        keys.sort();

        let mut choices = Vec::with_capacity(keys.len());
        for key in keys {
            let value = &responses[key];
            let (kind, term) = parse_key(key)?;
            let choice = match kind {
                ConflictKind::AmbiguousMetric => Choice::Metric {
                    term,
                    kind: self.metric_choice(key, value)?,
                },
                ConflictKind::AmbiguousDimension => Choice::Dimension {
                    term,
                    kind: self.dimension_choice(key, value)?,
                },
                ConflictKind::ContradictoryTimeRange if original.time_mentions.len() < 2 => {
                    Choice::NotOpen
                }
                ConflictKind::ContradictoryTimeRange => Choice::Time {
                    text: value.clone(),
                    range: time_choice(original, key, value)?,
                },
                ConflictKind::MissingRequiredEntity if !original.metrics.is_empty() => {
                    Choice::NotOpen
                }
                ConflictKind::MissingRequiredEntity => Choice::RequiredMetric {
                    value: value.clone(),
                    kind: self.metric_choice(key, value)?,
                },
            };
            choices.push((key, choice));
        }

        let mut entities = original.clone();
        let mut feedback: Vec<(String, String)> = Vec::new();
        for (key, choice) in choices {
            let applied = match choice {
                Choice::Metric { term, kind } => {
                    let applied = resolve_slot(&mut entities.metrics, &term, kind);
                    if applied {
                        feedback.push((term, kind.id().to_string()));
                    }
                    applied
                }
                Choice::Dimension { term, kind } => {
                    let applied = resolve_slot(&mut entities.dimensions, &term, kind);
                    if applied {
                        feedback.push((term, kind.id().to_string()));
                    }
                    applied
                }
                Choice::Time { text, range } => {
                    entities.time_range = Some(range);
                    entities.time_mentions.clear();
                    feedback.push((TIME_TERM.to_string(), text));
                    true
                }
                Choice::RequiredMetric { value, kind } => {
                    entities.push_metric(&value, kind, 1.0);
                    // the terms that failed to match are what the answer corrects
                    for term in &original.unrecognized_terms {
                        feedback.push((term.clone(), kind.id().to_string()));
                    }
                    true
                }
                Choice::NotOpen => false,
            };
            if applied {
                debug!(key = %key, "clarification applied");
            } else {
                warn!(key = %key, "response does not address an open conflict");
            }
        }

        for (term, entity) in feedback {
            self.knowledge
                .record_mapping_feedback(&term, &entity, true, None);
        }
        Ok(entities)
    }

    fn metric_choice(&self, key: &str, value: &str) -> Result<MetricKind, ClarificationError> {
        value
            .parse::<MetricKind>()
            .ok()
            .or_else(|| {
                self.knowledge
                    .map_metric_to_database_field(value)
                    .map(|m| m.kind)
            })
            .ok_or_else(|| invalid_choice(key, value))
    }

    fn dimension_choice(&self, key: &str, value: &str) -> Result<DimensionKind, ClarificationError> {
        value
            .parse::<DimensionKind>()
            .ok()
            .or_else(|| {
                self.knowledge
                    .map_dimension_to_database_field(value)
                    .map(|d| d.kind)
            })
            .ok_or_else(|| invalid_choice(key, value))
    }
}

/// A validated answer, not yet applied.
enum Choice {
    Metric { term: String, kind: MetricKind },
    Dimension { term: String, kind: DimensionKind },
    Time { text: String, range: TimeRange },
    RequiredMetric { value: String, kind: MetricKind },
    NotOpen,
}

fn parse_key(key: &str) -> Result<(ConflictKind, String), ClarificationError> {
    let (kind, term) = key
        .split_once('|')
        .ok_or_else(|| ClarificationError::InvalidKey(key.to_string()))?;
    let kind = match kind {
        "AmbiguousMetric" => ConflictKind::AmbiguousMetric,
        "AmbiguousDimension" => ConflictKind::AmbiguousDimension,
        "ContradictoryTimeRange" => ConflictKind::ContradictoryTimeRange,
        "MissingRequiredEntity" => ConflictKind::MissingRequiredEntity,
        _ => return Err(ClarificationError::InvalidKey(key.to_string())),
    };
    Ok((kind, term.to_lowercase()))
}

/// Replace the open slot for `term` with the chosen kind.
fn resolve_slot<K: Copy + PartialEq>(slots: &mut [EntitySlot<K>], term: &str, kind: K) -> bool {
    let Some(slot) = slots
        .iter_mut()
        .find(|s| s.is_ambiguous() && s.term().to_lowercase() == term)
    else {
        return false;
    };
    let term = slot.term().to_string();
    *slot = EntitySlot::Resolved {
        term,
        kind,
        confidence: 1.0,
    };
    true
}

/// The chosen mention, or any time phrase the user typed instead.
fn time_choice(
    entities: &QueryEntities,
    key: &str,
    value: &str,
) -> Result<TimeRange, ClarificationError> {
    entities
        .time_mentions
        .iter()
        .find(|m| m.text.eq_ignore_ascii_case(value.trim()))
        .map(|m| m.range.clone())
        .or_else(|| TimeRange::parse(value))
        .ok_or_else(|| invalid_choice(key, value))
}

fn invalid_choice(key: &str, value: &str) -> ClarificationError {
    ClarificationError::InvalidChoice {
        key: key.to_string(),
        value: value.to_string(),
    }
}
