//! Clarification stage: conflicts become prompts, answers become entities.

mod prompt;
mod service;
mod state;

pub use prompt::{generate_clarification_prompts, ClarificationPrompt, PromptOption};
pub use service::{ClarificationRequest, ClarificationService};
pub use state::{ClarificationEvent, ClarificationState};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClarificationError {
    #[error("Malformed response key '{0}', expected 'Kind|term'")]
    InvalidKey(String),

    #[error("'{value}' is not a valid answer for '{key}'")]
    InvalidChoice { key: String, value: String },

    #[error("Invalid clarification transition from {from} on {event}")]
    InvalidTransition {
        from: ClarificationState,
        event: String,
    },
}
