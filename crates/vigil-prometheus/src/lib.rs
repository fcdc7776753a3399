//! Prometheus metrics backend for the vigil findings engine.
//!
//! This crate provides a [`PrometheusMetrics`] implementation of
//! [`vigil_engine::MetricsBackend`] that exposes the import pipeline in
//! Prometheus format.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use vigil_engine::MetricsHandle;
//! use vigil_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//!
//! // hand `handle` to vigil_engine::Importer::new, keep `metrics`
//! // for the /metrics endpoint
//! let _families = metrics.gather();
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `vigil_imports_total{scan_type, kind}` - Counter
//! - `vigil_findings_total{scan_type, outcome}` - Counter
//! - `vigil_import_duration_seconds{scan_type}` - Histogram
//!
//! ## HTTP Server
//! This crate does NOT serve the `/metrics` endpoint. Encode the
//! gathered families with [`TextEncoder`] in whatever HTTP framework
//! the application already runs:
//!
//! ```rust,ignore
//! // Example with axum
//! async fn metrics_handler(
//!     State(metrics): State<Arc<PrometheusMetrics>>
//! ) -> Response {
//!     let families = metrics.gather();
//!     let encoder = prometheus::TextEncoder::new();
//!     let mut buffer = vec![];
//!     encoder.encode(&families, &mut buffer).unwrap();
//!     Response::builder()
//!         .header("Content-Type", encoder.format_type())
//!         .body(buffer.into())
//!         .unwrap()
//! }
//! ```

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
