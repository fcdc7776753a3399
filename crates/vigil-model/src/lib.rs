mod domain;
pub use domain::{NOTE_AUTO_CLOSED, NOTE_AUTO_REOPENED};
pub use domain::{
    DEFAULT_HASH_FIELDS, Endpoint, EndpointField, FindingHash, HashField, ScanType, Severity, Tags,
};

mod error;
pub use error::{ModelError, ModelResult};

mod finding;
pub use finding::{Finding, Note};

mod hierarchy;
pub use hierarchy::{Engagement, EngagementId, FindingId, Product, ProductId, Test, TestId};

mod strategy;
pub use strategy::DedupeAlgorithm;
