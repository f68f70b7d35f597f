//! Keep-alive HTTP listener for hosts that expect an open port.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use shaperelay_agent::health::RelayStats;
use shaperelay_core::config::KeepAliveConfig;

/// Shared state for the keep-alive handlers.
pub struct KeepAliveState {
    pub stats: Arc<RelayStats>,
    pub provider: String,
}

pub fn router(state: Arc<KeepAliveState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /: plain liveness answer.
async fn root_handler() -> &'static str {
    "OK"
}

/// GET /health: relay metadata for uptime monitors.
async fn health_handler(State(state): State<Arc<KeepAliveState>>) -> Json<Value> {
    let snapshot = state.stats.snapshot();
    Json(json!({
        "status": snapshot.status,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": snapshot.uptime_secs,
        "provider": state.provider,
        "relays_ok": snapshot.relays_ok,
        "relays_err": snapshot.relays_err,
    }))
}

/// Bind and serve until the process exits.
pub async fn serve(config: &KeepAliveConfig, state: Arc<KeepAliveState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "keep-alive listener started");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
