//! SQL generation stage.

mod context;
mod generator;
mod params;
mod result;
mod security;

pub use context::TranslationContext;
pub use generator::SqlGenerator;
pub use params::ParamValue;
pub use result::{ComparisonQuery, SqlTranslationResult};
pub use security::{PartitionAccess, RowLevelSecurity, SecurityScope};

use thiserror::Error;

use crate::knowledge::KnowledgeError;

/// Structural failures. These are folded into a failed
/// [`SqlTranslationResult`] and never escape `generate`.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Table '{table}' is not reachable from '{anchor}' via known join keys")]
    UnreachableTable { table: String, anchor: String },

    #[error("Row-level security unavailable: {0}")]
    SecurityUnavailable(String),

    #[error("Invalid filter on {dimension}: {reason}")]
    InvalidFilter { dimension: String, reason: String },

    #[error("Parameter mismatch: unbound {unbound:?}, unused {unused:?}")]
    ParameterMismatch {
        unbound: Vec<String>,
        unused: Vec<String>,
    },

    #[error(transparent)]
    Knowledge(KnowledgeError),
}
