//! Rendering conflicts as questions.

use serde::{Deserialize, Serialize};

use crate::knowledge::Catalog;
use crate::model::{Candidate, ConflictKind, DimensionKind, EntityConflict, MetricKind};

/// One selectable answer. `value` is what the caller sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationPrompt {
    /// Response key, `Kind|term`.
    pub key: String,
    pub kind: ConflictKind,
    pub term: String,
    pub question: String,
    pub options: Vec<PromptOption>,
}

/// Exactly one prompt per conflict, in conflict order.
pub fn generate_clarification_prompts(
    conflicts: &[EntityConflict],
    catalog: &Catalog,
) -> Vec<ClarificationPrompt> {
    conflicts
        .iter()
        .map(|conflict| prompt_for(conflict, catalog))
        .collect()
}

fn prompt_for(conflict: &EntityConflict, catalog: &Catalog) -> ClarificationPrompt {
    let (question, options) = match conflict {
        EntityConflict::AmbiguousMetric { term, candidates } => (
            format!(
                "Did you mean one of these metrics when you said '{}'?",
                term
            ),
            metric_options(candidates, catalog),
        ),
        EntityConflict::AmbiguousDimension { term, candidates } => (
            format!(
                "Did you mean one of these dimensions when you said '{}'?",
                term
            ),
            dimension_options(candidates, catalog),
        ),
        EntityConflict::ContradictoryTimeRange { mentions } => (
            "Your question mentions more than one time period. Which one should be used?"
                .to_string(),
            mentions
                .iter()
                .map(|m| PromptOption {
                    value: m.text.clone(),
                    label: m.text.clone(),
                    confidence: None,
                })
                .collect(),
        ),
        EntityConflict::MissingRequiredEntity { unrecognized, .. } => {
            let question = match unrecognized.as_slice() {
                [] => "Which metric would you like to see?".to_string(),
                terms => format!(
                    "'{}' did not match a known metric. Which metric would you like to see?",
                    terms.join("', '")
                ),
            };
            let options = catalog
                .metrics
                .iter()
                .map(|m| PromptOption {
                    value: m.kind.id().to_string(),
                    label: m.name.clone(),
                    confidence: None,
                })
                .collect();
            (question, options)
        }
    };

    ClarificationPrompt {
        key: conflict.key(),
        kind: conflict.kind(),
        term: conflict.term().to_string(),
        question,
        options,
    }
}

fn metric_options(candidates: &[Candidate<MetricKind>], catalog: &Catalog) -> Vec<PromptOption> {
    candidates
        .iter()
        .map(|c| PromptOption {
            value: c.kind.id().to_string(),
            label: catalog
                .metric(c.kind)
                .map_or_else(|| c.kind.id().to_string(), |m| m.name.clone()),
            confidence: Some(c.confidence),
        })
        .collect()
}

fn dimension_options(
    candidates: &[Candidate<DimensionKind>],
    catalog: &Catalog,
) -> Vec<PromptOption> {
    candidates
        .iter()
        .map(|c| PromptOption {
            value: c.kind.id().to_string(),
            label: catalog
                .dimension(c.kind)
                .map_or_else(|| c.kind.id().to_string(), |d| d.name.clone()),
            confidence: Some(c.confidence),
        })
        .collect()
}
