//! Health and capability endpoint

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::config::Environment;
use crate::llm::OrchestratorStats;

use super::AppState;

/// Health response. Reports whether a live credential exists, never its value.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// `live` when a provider credential is configured, `dummy` otherwise
    pub mode: &'static str,
    /// Whether this server's own orchestrator uses a proxy tier
    pub proxy: bool,
    pub cache_entries: usize,
    pub version: &'static str,
    pub model: String,
    pub environment: Environment,
    pub stats: OrchestratorStats,
}

/// GET /api/health
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.orchestrator.stats().await;
    Json(HealthResponse {
        status: "ok",
        mode: if state.orchestrator.has_live_tier() {
            "live"
        } else {
            "dummy"
        },
        proxy: state.orchestrator.proxy_enabled(),
        cache_entries: state.orchestrator.cache_len(),
        version: env!("CARGO_PKG_VERSION"),
        model: state.capabilities.model.clone(),
        environment: state.capabilities.environment,
        stats,
    })
}
