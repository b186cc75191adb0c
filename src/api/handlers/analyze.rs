//! Analysis proxy endpoint

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::envelope::{AnalyzeEnvelope, ErrorEnvelope};
use crate::analysis::PayloadBuilder;
use crate::llm::ProxyMetadata;
use crate::types::AnalysisPayload;

use super::AppState;

/// Request body: `{ "payload": AnalysisPayload }`
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub payload: AnalysisPayload,
}

/// POST /api/gemini/analyze
///
/// Client payloads are re-bounded before analysis. Answers 200 whenever the
/// payload parses, even when every live tier failed; `metadata.fallback`
/// marks synthesized results.
pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected analysis request");
            return ErrorEnvelope::bad_request(rejection.body_text());
        }
    };

    let payload = PayloadBuilder::bound(request.payload);
    let outcome = state.orchestrator.analyze(&payload).await;
    let provenance = outcome.provenance;

    info!(
        mode = %payload.mode,
        tier = %provenance.tier,
        fallback = provenance.fallback,
        attempts = provenance.attempts.len(),
        duration_ms = provenance.total_duration_ms,
        "Analysis request served"
    );

    AnalyzeEnvelope::new(
        outcome.result,
        ProxyMetadata {
            duration: provenance.total_duration_ms,
            timestamp: Utc::now().to_rfc3339(),
            fallback: provenance.fallback,
            error: provenance.error,
        },
    )
    .into_response()
}
