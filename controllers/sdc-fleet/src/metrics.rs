//! Probe and metrics endpoints.
//!
//! `/healthz` answers as soon as the process runs, `/readyz` once the
//! controller has connected to both endpoints, `/metrics` renders the
//! Prometheus registry in text format.

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Controller metrics, registered in a private registry
pub struct Metrics {
    registry: Registry,
    /// Reconcile outcomes by `outcome` (`reconciled`, `failed`, `deleted`)
    pub reconciliations: IntCounterVec,
    pub installs_triggered: IntCounter,
    pub installs_skipped: IntCounter,
    pub cycle_duration: Histogram,
    ready: AtomicBool,
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new_custom(Some("flexfleet".to_string()), None).map_err(metrics_error)?;

        let reconciliations = IntCounterVec::new(
            Opts::new("reconciliations_total", "SdcFleet reconciliations by outcome"),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let installs_triggered =
            IntCounter::new("installs_triggered_total", "Installer runs started").map_err(metrics_error)?;
        let installs_skipped = IntCounter::new(
            "installs_skipped_total",
            "Installer runs skipped because every host was already known",
        )
        .map_err(metrics_error)?;
        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new("cycle_duration_seconds", "Duration of one fleet cycle")
                .buckets(vec![0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0]),
        )
        .map_err(metrics_error)?;

        registry.register(Box::new(reconciliations.clone())).map_err(metrics_error)?;
        registry.register(Box::new(installs_triggered.clone())).map_err(metrics_error)?;
        registry.register(Box::new(installs_skipped.clone())).map_err(metrics_error)?;
        registry.register(Box::new(cycle_duration.clone())).map_err(metrics_error)?;

        Ok(Self {
            registry,
            reconciliations,
            installs_triggered,
            installs_skipped,
            cycle_duration,
            ready: AtomicBool::new(false),
        })
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Registry contents in the Prometheus text format
    pub fn render(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| ControllerError::Metrics(e.to_string()))
    }
}

fn metrics_error(e: prometheus::Error) -> ControllerError {
    ControllerError::Metrics(e.to_string())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    if metrics.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve the probe endpoints until `shutdown` is cancelled.
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>, shutdown: CancellationToken) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Metrics(format!("failed to bind {}: {}", addr, e)))?;
    info!("Serving probes and metrics on {}", addr);

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ControllerError::Metrics(e.to_string()))
}
