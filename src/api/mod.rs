//! REST API module using Axum
//!
//! Provides the HTTP surface of the service:
//! - health and capability status
//! - the analysis proxy endpoint consumed by the proxy tier of other clients
//! - CSV dataset ingestion

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::AppState;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the CORS layer.
///
/// Set `AIRSENSE_CORS_ORIGINS` to a comma-separated list of allowed origins;
/// without it any origin may call the API.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var("AIRSENSE_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base.allow_origin(Any),
    }
}

/// Create the complete application router.
pub fn create_app(state: AppState) -> Router {
    let cors = build_cors_layer();
    let body_limit = state.max_upload_bytes;

    Router::new()
        .nest("/api", routes::api_routes(state))
        // Middleware
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::{AiOrchestrator, LruResponseCache};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_app(max_upload_bytes: usize) -> Router {
        let mut config = AppConfig::default();
        config.server.max_upload_bytes = max_upload_bytes;
        let orchestrator = AiOrchestrator::new(Arc::new(LruResponseCache::new(4)));
        create_app(AppState::new(orchestrator, &config))
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = create_test_app(1024)
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_body_limit_enforced() {
        let body = "timestamp,pm2.5\n".repeat(200);
        let response = create_test_app(64)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/datasets/csv?file_name=big.csv")
                    .header("content-length", body.len())
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = create_test_app(1024)
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
