//! Response envelopes.
//!
//! Every JSON reply shares the analysis proxy's shape so one client parser
//! covers all endpoints:
//!
//! - success: `{ "success": true, "data": T, "metadata": M }`
//! - failure: `{ "success": false, "error": { "code", "message" }, "metadata": { ... } }`
//!
//! The analysis endpoint carries [`ProxyMetadata`]; dataset endpoints carry
//! [`ReplyMetadata`].

use crate::llm::ProxyMetadata;
use crate::types::{AnalysisResult, NormalizedDataset};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

/// `metadata` block of dataset replies and failures.
#[derive(Debug, Serialize)]
pub struct ReplyMetadata {
    pub timestamp: String,
    pub version: &'static str,
}

impl ReplyMetadata {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Successful reply, always sent with status 200.
#[derive(Debug, Serialize)]
pub struct Envelope<T, M = ReplyMetadata> {
    pub success: bool,
    pub data: T,
    pub metadata: M,
}

/// Analysis proxy reply; degraded answers carry `metadata.fallback`.
pub type AnalyzeEnvelope = Envelope<AnalysisResult, ProxyMetadata>;

/// Normalized dataset reply.
pub type DatasetEnvelope = Envelope<NormalizedDataset>;

impl<T: Serialize, M: Serialize> Envelope<T, M> {
    pub fn new(data: T, metadata: M) -> Self {
        Self {
            success: true,
            data,
            metadata,
        }
    }
}

impl<T> Envelope<T> {
    pub fn with_data(data: T) -> Self {
        Self {
            success: true,
            data,
            metadata: ReplyMetadata::now(),
        }
    }
}

impl<T: Serialize, M: Serialize> IntoResponse for Envelope<T, M> {
    fn into_response(self) -> Response {
        (StatusCode::OK, axum::Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// Failed reply.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorDetail,
    pub metadata: ReplyMetadata,
}

impl ErrorEnvelope {
    fn reply(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
        let body = Self {
            success: false,
            error: ErrorDetail {
                code,
                message: message.into(),
            },
            metadata: ReplyMetadata::now(),
        };
        (status, axum::Json(body)).into_response()
    }

    /// 400: the request itself is unusable.
    pub fn bad_request(message: impl Into<String>) -> Response {
        Self::reply(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// 502: a data provider failed.
    pub fn upstream(message: impl Into<String>) -> Response {
        Self::reply(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn body(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_shape() {
        let resp = Envelope::with_data(vec![1, 2, 3]).into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let v = body(resp).await;
        assert_eq!(v["success"], true);
        assert_eq!(v["data"], serde_json::json!([1, 2, 3]));
        assert_eq!(v["metadata"]["version"], env!("CARGO_PKG_VERSION"));
        assert!(v["metadata"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_failure_shape() {
        let resp = ErrorEnvelope::upstream("OpenAQ returned status 503");
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let v = body(resp).await;
        assert_eq!(v["success"], false);
        assert_eq!(v["error"]["code"], "UPSTREAM_ERROR");
        assert_eq!(v["error"]["message"], "OpenAQ returned status 503");
        assert!(v.get("data").is_none());
    }
}
