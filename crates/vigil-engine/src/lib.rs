//! Findings store and import pipeline.
//!
//! The engine sits between the scan-report parsers and whatever surface
//! exposes them: it owns the product / engagement / test / finding
//! hierarchy, runs imports and reimports, deduplicates findings, applies
//! false positive history and tracks remediation SLAs. It is synchronous
//! and transport-agnostic; serving it over HTTP is someone else's job.

mod error;
pub use error::{EngineError, EngineResult};

mod config;
pub use config::EngineConfig;

mod sla;
pub use sla::{SlaConfig, SlaStatus, sla_status};

mod metrics;
pub use metrics::{FindingOutcome, MetricsBackend, MetricsHandle, NoopMetrics, noop_metrics};

mod store;
pub use store::{
    FindingContext, FindingFilter, FindingStore, ImportHistory, ImportKind, ImportStatistics,
    StoredFinding,
};

mod dedupe;
pub use dedupe::{deduplicate, set_duplicate};

mod fp_history;
pub use fp_history::{apply_false_positive_history, retroactively_apply};

mod importer;
pub use importer::{EngagementSelector, ImportOptions, ImportSummary, Importer};
