//! Knowledge base errors.

use thiserror::Error;

/// Errors raised while loading a catalog or walking its join graph.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Catalog file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read catalog file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("No join path from '{from}' to '{to}'")]
    NoPath { from: String, to: String },

    #[error("Feedback store error: {0}")]
    FeedbackStore(String),
}
