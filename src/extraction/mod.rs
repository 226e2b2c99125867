//! Entity extraction stage.

mod extractor;
mod keyword;
mod recognizer;

pub use extractor::EntityExtractor;
pub use keyword::KeywordRecognizer;
pub use recognizer::{ExtractionError, RawEntity, RawEntityKind, RawEntityRecognizer};
