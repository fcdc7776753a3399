use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use vigil_api::{EngineAdapter, HttpApi};
use vigil_engine::{FindingStore, Importer, MetricsHandle};
use vigil_observe::init_logger;
use vigil_parsers::ParserRegistry;
use vigil_prometheus::{Encoder, PrometheusMetrics, TextEncoder};

mod config;
use config::DaemonConfig;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) config + logger
    let cfg = DaemonConfig::from_env()?;
    init_logger(&cfg.logger)?;
    info!(version = env!("CARGO_PKG_VERSION"), "vigild starting");

    // 2) metrics
    let metrics = PrometheusMetrics::new().context("metrics registry")?;
    let handle: MetricsHandle = Arc::new(metrics.clone());

    // 3) store + parsers + importer
    let store = Arc::new(FindingStore::new());
    let registry = Arc::new(ParserRegistry::defaults());
    info!(scan_types = registry.scan_types().len(), "parsers registered");
    let importer = Importer::new(store, registry, cfg.engine, handle);

    // 4) HTTP surface: findings API + metrics exposition
    let api = HttpApi::new(Arc::new(EngineAdapter::new(importer))).router();
    let ops = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::new(metrics));
    let app = api.merge(ops);

    // 5) serve until ctrl-c / SIGTERM
    let listener = TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("bind {}", cfg.bind))?;
    info!(addr = %cfg.bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("vigild stopped");
    Ok(())
}

/// GET /metrics
async fn metrics_handler(State(metrics): State<Arc<PrometheusMetrics>>) -> Response {
    let families = metrics.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        error!(error = %err, "metrics encoding failed");
        return axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type())],
        buffer,
    )
        .into_response()
}

/// Resolves on SIGINT (ctrl-c) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "ctrl-c handler failed, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "sigterm handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
