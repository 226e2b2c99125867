//! Crate-level error.

use thiserror::Error;

use crate::clarification::ClarificationError;
use crate::config::SettingsError;
use crate::extraction::ExtractionError;
use crate::knowledge::KnowledgeError;
use crate::mapping::MappingError;

#[derive(Debug, Error)]
pub enum NlqError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error("Entity extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Clarification(#[from] ClarificationError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("SQL generation failed: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, NlqError>;
