use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown severity: {0}")]
    UnknownSeverity(String),

    #[error("unknown deduplication algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("unknown endpoint field: {0}")]
    UnknownEndpointField(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid tag: {0}")]
    InvalidTag(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
