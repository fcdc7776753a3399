use std::sync::Arc;

use crate::store::ImportKind;

/// What happened to a single finding during an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingOutcome {
    Created,
    Reactivated,
    Closed,
    Untouched,
    Duplicate,
}

impl FindingOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            FindingOutcome::Created => "created",
            FindingOutcome::Reactivated => "reactivated",
            FindingOutcome::Closed => "closed",
            FindingOutcome::Untouched => "untouched",
            FindingOutcome::Duplicate => "duplicate",
        }
    }
}

/// Sink for import pipeline measurements.
///
/// The engine records through this trait and never assumes a backend.
/// Deployments plug in an exporter, tests and embedders run with
/// [`NoopMetrics`].
pub trait MetricsBackend: Send + Sync + 'static {
    /// One finished import or reimport of the given scan type.
    fn record_import(&self, scan_type: &str, kind: ImportKind);

    /// Outcome of one finding inside an import.
    fn record_finding(&self, scan_type: &str, outcome: FindingOutcome);

    /// Wall-clock duration of one import, in seconds.
    fn record_import_duration(&self, scan_type: &str, seconds: f64);
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

/// Backend that discards every measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    #[inline(always)]
    fn record_import(&self, _scan_type: &str, _kind: ImportKind) {}

    #[inline(always)]
    fn record_finding(&self, _scan_type: &str, _outcome: FindingOutcome) {}

    #[inline(always)]
    fn record_import_duration(&self, _scan_type: &str, _seconds: f64) {}
}

pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoopMetrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels_are_stable() {
        assert_eq!(FindingOutcome::Created.as_label(), "created");
        assert_eq!(FindingOutcome::Reactivated.as_label(), "reactivated");
        assert_eq!(FindingOutcome::Closed.as_label(), "closed");
        assert_eq!(FindingOutcome::Untouched.as_label(), "untouched");
        assert_eq!(FindingOutcome::Duplicate.as_label(), "duplicate");
    }

    #[test]
    fn noop_backend_accepts_everything() {
        let metrics = noop_metrics();
        metrics.record_import("Aqua Scan", ImportKind::Import);
        metrics.record_finding("Aqua Scan", FindingOutcome::Created);
        metrics.record_import_duration("Aqua Scan", 0.25);
    }
}
