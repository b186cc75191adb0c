//! API route definitions
//!
//! - /api/health - service status and capabilities
//! - /api/gemini/analyze - analysis proxy (always 200, fallback flagged)
//! - /api/datasets/csv - CSV upload → normalized dataset
//! - /api/datasets/sample.csv - sample upload file

use axum::{routing::{get, post}, Router};

use super::handlers::{self, AppState};

/// Create all API routes
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/gemini/analyze", post(handlers::analyze))
        .route("/datasets/csv", post(handlers::upload_csv))
        .route("/datasets/sample.csv", get(handlers::sample_csv))
        .with_state(state)
}
