//! Data model shared by every stage of the translation pipeline.

pub mod conflict;
pub mod entities;
pub mod kinds;
pub mod time;

pub use conflict::{ConflictKind, EntityConflict, RequiredEntity};
pub use entities::{
    Candidate, Comparison, EntitySlot, Filter, FilterOperator, QueryEntities, Sort,
    SortDirection, SortTarget, TimeMention,
};
pub use kinds::{DimensionKind, MetricKind, UnknownKind};
pub use time::{ExplicitRange, Granularity, PeriodSpan, RelativePeriod, TimeError, TimeRange};
