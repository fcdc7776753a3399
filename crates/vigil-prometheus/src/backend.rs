use std::sync::Arc;

use prometheus::{CounterVec, HistogramVec, Opts, Registry, proto::MetricFamily};

use vigil_engine::{FindingOutcome, ImportKind, MetricsBackend};

/// Prometheus metrics backend for the findings engine.
///
/// Implements [`MetricsBackend`] and exposes the import pipeline as
/// scrapeable metrics.
///
/// ## Metrics
/// - `vigil_imports_total{scan_type, kind}` - Counter of import runs
/// - `vigil_findings_total{scan_type, outcome}` - Counter of per-finding outcomes
/// - `vigil_import_duration_seconds{scan_type}` - Histogram of import wall time
///
/// ## Label cardinality
/// All labels are bounded (low cardinality):
/// - `scan_type`: the registered parser names
/// - `kind`: "import", "reimport"
/// - `outcome`: "created", "reactivated", "closed", "untouched", "duplicate"
#[derive(Clone)]
pub struct PrometheusMetrics {
    imports: CounterVec,
    findings: CounterVec,
    import_duration: HistogramVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create a new prometheus metrics backend with custom registry.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let imports = CounterVec::new(
            Opts::new("vigil_imports_total", "Total number of scan imports"),
            &["scan_type", "kind"],
        )?;
        registry.register(Box::new(imports.clone()))?;

        let findings = CounterVec::new(
            Opts::new(
                "vigil_findings_total",
                "Total number of findings by import outcome",
            ),
            &["scan_type", "outcome"],
        )?;
        registry.register(Box::new(findings.clone()))?;

        let import_duration = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "vigil_import_duration_seconds",
                "Import wall time in seconds, parsing included",
            )
            .buckets(vec![0.005, 0.025, 0.1, 0.5, 1.0, 2.5, 10.0, 30.0]),
            &["scan_type"],
        )?;
        registry.register(Box::new(import_duration.clone()))?;

        Ok(Self {
            imports,
            findings,
            import_duration,
            registry,
        })
    }

    /// Create a new prometheus metrics backend with default registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    /// Gather all metrics for exposition.
    ///
    /// Use this to implement the `/metrics` HTTP endpoint.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Get reference to underlying prometheus registry.
    ///
    /// Useful for registering custom metrics alongside the engine's.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_import(&self, scan_type: &str, kind: ImportKind) {
        self.imports
            .with_label_values(&[scan_type, kind.as_label()])
            .inc();
    }

    fn record_finding(&self, scan_type: &str, outcome: FindingOutcome) {
        self.findings
            .with_label_values(&[scan_type, outcome.as_label()])
            .inc();
    }

    fn record_import_duration(&self, scan_type: &str, seconds: f64) {
        self.import_duration
            .with_label_values(&[scan_type])
            .observe(seconds);
    }
}
