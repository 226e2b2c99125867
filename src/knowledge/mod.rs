//! Domain knowledge: the catalog of metrics, dimensions and tables, plus
//! term lookup, join paths, time resolution and mapping feedback.

pub mod base;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod feedback;
pub mod joins;

pub use base::{KnowledgeBase, ValueMatch};
pub use catalog::{
    Aggregation, Catalog, ColumnRef, DimensionDefinition, DimensionValue, Formula, FormulaOp,
    FormulaOperand, JoinKey, MetricDefinition, TableDefinition,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::KnowledgeError;
pub use feedback::{FeedbackLog, FeedbackRecord, FeedbackStore};
pub use joins::{JoinGraph, JoinStep};
