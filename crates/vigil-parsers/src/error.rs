use thiserror::Error;

use vigil_model::ModelError;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("no parser registered for scan type: {0}")]
    UnknownScanType(String),

    #[error("parser already registered for scan type: {0}")]
    DuplicateScanType(String),

    #[error("unsupported report format for this scan type")]
    UnknownFileFormat,

    #[error("report is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid xml: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("invalid csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed report: {0}")]
    Malformed(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type ParserResult<T> = Result<T, ParserError>;
