//! # nlq
//!
//! Natural-language questions to parameterized SQL over a gaming
//! reporting schema.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  question: "total deposits by country ..."   │
//! └──────────────────────────────────────────────┘
//!                      │
//!                      ▼ [extraction]   recognizer spans -> QueryEntities
//!                      ▼ [clarification] conflicts -> prompts -> answers
//!                      ▼ [mapping]       entities -> tables, columns, joins
//!                      ▼ [generation]    SELECT + parameters + comparisons
//! ┌──────────────────────────────────────────────┐
//! │  SqlTranslationResult                        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! [`knowledge`] holds the catalog every stage reads from; [`service`]
//! sequences the stages for one request.

pub mod clarification;
pub mod config;
pub mod error;
pub mod extraction;
pub mod generation;
pub mod knowledge;
pub mod mapping;
pub mod model;
pub mod service;
pub mod sql;

pub use error::{NlqError, Result};
pub use service::{NlpQueryResult, NlqService};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::clarification::{ClarificationPrompt, ClarificationState};
    pub use crate::config::{Settings, TranslationSettings};
    pub use crate::error::{NlqError, Result};
    pub use crate::extraction::{KeywordRecognizer, RawEntityRecognizer};
    pub use crate::generation::{ParamValue, SqlTranslationResult};
    pub use crate::knowledge::{Catalog, KnowledgeBase};
    pub use crate::model::{
        DimensionKind, EntityConflict, MetricKind, QueryEntities, TimeRange,
    };
    pub use crate::service::{NlpQueryResult, NlqService};
    pub use crate::sql::Dialect;
}
