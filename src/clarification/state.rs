//! Per-query clarification state machine.
//!
//! ```text
//! Extracted ──▶ ConflictsDetected ──▶ AwaitingClarification ──▶ Resolved
//!     │                                   │      ▲
//!     └──────────────▶ Resolved           │      └─ answered, conflicts remain,
//!                                         │         rounds left
//!                                         └──▶ Failed (round budget spent)
//! ```
//!
//! The state travels with the result; nothing is held server-side.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ClarificationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationState {
    #[default]
    Extracted,
    ConflictsDetected,
    AwaitingClarification,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClarificationEvent {
    /// Conflict check finished with this many conflicts.
    Checked { conflicts: usize },
    PromptsIssued,
    /// Responses were applied; `rounds` counts completed rounds.
    Answered {
        remaining_conflicts: usize,
        rounds: u32,
        max_rounds: u32,
    },
}

impl fmt::Display for ClarificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClarificationState::Extracted => "extracted",
            ClarificationState::ConflictsDetected => "conflicts_detected",
            ClarificationState::AwaitingClarification => "awaiting_clarification",
            ClarificationState::Resolved => "resolved",
            ClarificationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl ClarificationState {
    pub fn transition(self, event: ClarificationEvent) -> Result<Self, ClarificationError> {
        use ClarificationEvent::*;
        use ClarificationState::*;

        let next = match (self, event) {
            (Extracted, Checked { conflicts: 0 }) => Resolved,
            (Extracted, Checked { .. }) => ConflictsDetected,
            (ConflictsDetected, PromptsIssued) => AwaitingClarification,
            (
                AwaitingClarification,
                Answered {
                    remaining_conflicts: 0,
                    ..
                },
            ) => Resolved,
            (
                AwaitingClarification,
                Answered {
                    rounds, max_rounds, ..
                },
            ) => {
                if rounds >= max_rounds {
                    Failed
                } else {
                    AwaitingClarification
                }
            }
            (from, event) => {
                return Err(ClarificationError::InvalidTransition {
                    from,
                    event: format!("{:?}", event),
                })
            }
        };
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClarificationState::Resolved | ClarificationState::Failed)
    }
}
