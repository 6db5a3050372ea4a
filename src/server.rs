//! HTTP server for revote, health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::error::BridgeError;
use crate::voter::{RevoteOutcome, Voter};

/// Saver statistics shared between the pipeline and the HTTP server
#[derive(Debug, Default, Clone)]
pub struct SaverStats {
    /// Transfers handed to the broadcaster
    pub transfers_broadcast: u64,
    /// Deposit instructions that could not be built or broadcast
    pub instructions_failed: u64,
    /// Claims verified as valid
    pub verifications_accepted: u64,
    /// Claims rejected
    pub verifications_rejected: u64,
    /// Last transaction signature processed
    pub last_signature: Option<String>,
    /// Whether the live subscription is currently open
    pub listener_connected: bool,
    /// Whether catchup has finished (or is disabled)
    pub catchup_complete: bool,
    /// Saver instance ID
    pub saver_id: String,
}

/// Prometheus metrics
pub struct Metrics {
    pub transfers_broadcast_total: IntCounter,
    pub instructions_failed_total: IntCounter,
    pub verifications_accepted_total: IntCounter,
    pub verifications_rejected_total: IntCounter,
    pub catchup_signatures_total: IntCounter,
    pub listener_reconnects_total: IntCounter,
    pub listener_connected: IntGauge,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transfers_broadcast_total = IntCounter::new(
            "saver_transfers_broadcast_total",
            "Total number of transfers handed to the broadcaster",
        )
        .expect("constant metric name is valid");

        let instructions_failed_total = IntCounter::new(
            "saver_instructions_failed_total",
            "Total number of deposit instructions that failed to build or broadcast",
        )
        .expect("constant metric name is valid");

        let verifications_accepted_total = IntCounter::new(
            "saver_verifications_accepted_total",
            "Total number of claims verified as valid",
        )
        .expect("constant metric name is valid");

        let verifications_rejected_total = IntCounter::new(
            "saver_verifications_rejected_total",
            "Total number of claims rejected",
        )
        .expect("constant metric name is valid");

        let catchup_signatures_total = IntCounter::new(
            "saver_catchup_signatures_total",
            "Total number of signatures visited by catchup",
        )
        .expect("constant metric name is valid");

        let listener_reconnects_total = IntCounter::new(
            "saver_listener_reconnects_total",
            "Times the log subscription was re-established",
        )
        .expect("constant metric name is valid");

        let listener_connected = IntGauge::new(
            "saver_listener_connected",
            "1 while the log subscription is open",
        )
        .expect("constant metric name is valid");

        // Names are unique constants and registration runs once per Metrics
        registry
            .register(Box::new(transfers_broadcast_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(instructions_failed_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(verifications_accepted_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(verifications_rejected_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(catchup_signatures_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(listener_reconnects_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(listener_connected.clone()))
            .expect("metric registration must not be called twice");

        Self {
            transfers_broadcast_total,
            instructions_failed_total,
            verifications_accepted_total,
            verifications_rejected_total,
            catchup_signatures_total,
            listener_reconnects_total,
            listener_connected,
            registry,
        }
    }
}

/// Shared state for the HTTP server
pub type SharedStats = Arc<RwLock<SaverStats>>;
pub type SharedMetrics = Arc<Metrics>;

/// Combined app state
#[derive(Clone)]
pub struct AppState {
    pub stats: SharedStats,
    pub metrics: SharedMetrics,
    pub voter: Arc<Voter>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub saver_id: String,
    pub transfers_broadcast: u64,
    pub instructions_failed: u64,
    pub verifications_accepted: u64,
    pub verifications_rejected: u64,
    pub last_signature: Option<String>,
    pub listener_connected: bool,
    pub catchup_complete: bool,
}

#[derive(Debug, Deserialize)]
pub struct RevoteRequest {
    pub operation: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevoteResponse {
    pub accepted: bool,
}

/// Health check endpoint handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.stats.read().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        saver_id: stats.saver_id.clone(),
        transfers_broadcast: stats.transfers_broadcast,
        instructions_failed: stats.instructions_failed,
        verifications_accepted: stats.verifications_accepted,
        verifications_rejected: stats.verifications_rejected,
        last_signature: stats.last_signature.clone(),
        listener_connected: stats.listener_connected,
        catchup_complete: stats.catchup_complete,
    })
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Readiness probe: subscribed or caught up
async fn readiness(State(state): State<AppState>) -> &'static str {
    let stats = state.stats.read().await;
    if stats.listener_connected || stats.catchup_complete {
        "OK"
    } else {
        "NOT_READY"
    }
}

/// Re-verify an operation and vote on it
async fn revote(State(state): State<AppState>, Json(request): Json<RevoteRequest>) -> Response {
    info!(operation = %request.operation, "Revote requested");

    match state.voter.revote(&request.operation).await {
        Ok(RevoteOutcome::Voted { accepted }) => {
            {
                let mut stats = state.stats.write().await;
                if accepted {
                    stats.verifications_accepted += 1;
                } else {
                    stats.verifications_rejected += 1;
                }
            }
            if accepted {
                state.metrics.verifications_accepted_total.inc();
            } else {
                state.metrics.verifications_rejected_total.inc();
            }
            Json(RevoteResponse { accepted }).into_response()
        }
        Ok(RevoteOutcome::NotOurs) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "Unsupported network").into_response()
        }
        Err(BridgeError::InvalidRequest(reason)) => {
            info!(operation = %request.operation, reason = %reason, "Revote for unknown operation");
            (StatusCode::NOT_FOUND, "Operation not found").into_response()
        }
        Err(e) => {
            error!(operation = %request.operation, error = %e, "Revote failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let connected = state.stats.read().await.listener_connected;
    state.metrics.listener_connected.set(connected as i64);

    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .route("/revote", post(revote))
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(bind_address: &str, port: u16, state: AppState) -> eyre::Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("Saver server listening on {}", addr);
    info!("  /revote  - Re-verify an operation (POST)");
    info!("  /health  - Full health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
