use thiserror::Error;

use vigil_model::{FindingId, ModelError, TestId};
use vigil_parsers::ParserError;

/// Errors surfaced by the store and the import pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("product not found: {0}")]
    ProductNotFound(String),

    #[error("engagement not found: {0}")]
    EngagementNotFound(String),

    #[error("test not found: {0}")]
    TestNotFound(TestId),

    #[error("finding not found: {0}")]
    FindingNotFound(FindingId),

    #[error("product already exists: {0}")]
    DuplicateProduct(String),

    #[error("test {test} holds {expected:?} scans, got {got:?}")]
    ScanTypeMismatch {
        test: TestId,
        expected: String,
        got: String,
    },

    #[error("finding {0} cannot be a duplicate of itself")]
    DuplicateOfSelf(FindingId),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type EngineResult<T> = Result<T, EngineError>;
