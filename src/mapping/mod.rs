//! Query mapping stage.

mod mapped;
mod mapper;

pub use mapped::{
    DimensionMapping, FilterMapping, MappedQueryEntities, MetricBinding, MetricMapping, SortKey,
    SortMapping, TimeBinding,
};
pub use mapper::QueryMapper;

use thiserror::Error;

use crate::model::TimeError;

#[derive(Debug, Error)]
pub enum MappingError {
    /// Mapping was called before clarification finished. This is a bug in
    /// the caller, not a user error.
    #[error("Entities still contain unresolved conflicts: {0}")]
    UnresolvedAmbiguity(String),

    #[error("At least one metric is required")]
    InsufficientEntities,

    #[error("'{0}' is not registered in the catalog")]
    Unregistered(String),

    #[error("No date column available to filter '{0}' by time")]
    NoDateColumn(String),

    #[error("Cannot resolve time range: {0}")]
    Time(#[from] TimeError),
}
