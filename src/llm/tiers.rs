//! Live analysis tiers
//!
//! - [`ProxyTier`]: POST to the backend proxy (`/api/gemini/analyze`)
//! - [`DirectTier`]: call the generative provider's `generateContent`
//!
//! Both return the raw JSON analysis object. Schema validation and mapping
//! happen in the orchestrator so that every tier is judged the same way.

use super::prompt::build_prompt;
use super::validation::ValidationError;
use crate::config::AiConfig;
use crate::types::{AnalysisPayload, Tier};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;

/// Why one tier attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("tier unavailable: {0}")]
    Unavailable(&'static str),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("upstream degraded: {0}")]
    Degraded(String),
    #[error("invalid analysis: {0}")]
    Validation(#[from] ValidationError),
}

/// One way of obtaining a raw analysis for a payload.
#[async_trait]
pub trait AnalysisTier: Send + Sync {
    fn tier(&self) -> Tier;

    /// Hard cutoff applied by the orchestrator around [`attempt`](Self::attempt).
    fn timeout(&self) -> Duration;

    async fn attempt(&self, payload: &AnalysisPayload) -> Result<Value, AttemptError>;
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, AttemptError> {
    // The orchestrator enforces the same cutoff; the client bound stops
    // abandoned requests from lingering.
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("airsense/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

// ============================================================================
// Proxy
// ============================================================================

/// Envelope metadata returned by the proxy endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyMetadata {
    /// Server-side processing time in milliseconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProxyReply {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    metadata: ProxyMetadata,
}

/// Backend proxy tier.
pub struct ProxyTier {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl ProxyTier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, AttemptError> {
        Ok(Self {
            http: build_client(timeout)?,
            url: url.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl AnalysisTier for ProxyTier {
    fn tier(&self) -> Tier {
        Tier::Proxy
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, payload: &AnalysisPayload) -> Result<Value, AttemptError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&json!({ "payload": payload }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        let reply: ProxyReply = resp
            .json()
            .await
            .map_err(|e| AttemptError::Malformed(e.to_string()))?;

        // The proxy answers 200 even when it degraded upstream.
        if !reply.success || reply.metadata.fallback {
            return Err(AttemptError::Degraded(
                reply
                    .metadata
                    .error
                    .unwrap_or_else(|| "proxy served a fallback result".to_string()),
            ));
        }

        reply
            .data
            .ok_or_else(|| AttemptError::Malformed("proxy reply has no data".to_string()))
    }
}

// ============================================================================
// Direct provider
// ============================================================================

/// Sampling configuration sent as `generationConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl From<&AiConfig> for GenerationConfig {
    fn from(ai: &AiConfig) -> Self {
        Self {
            temperature: ai.temperature,
            top_k: ai.top_k,
            top_p: ai.top_p,
            max_output_tokens: ai.max_output_tokens,
        }
    }
}

/// Direct call to the generative provider.
pub struct DirectTier {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    generation: GenerationConfig,
    timeout: Duration,
}

impl DirectTier {
    pub fn new(ai: &AiConfig, api_key: &str) -> Result<Self, AttemptError> {
        let timeout = Duration::from_secs(ai.direct_timeout_secs);
        Ok(Self {
            http: build_client(timeout)?,
            endpoint: ai.endpoint.trim_end_matches('/').to_string(),
            model: ai.model.clone(),
            api_key: api_key.to_string(),
            generation: GenerationConfig::from(ai),
            timeout,
        })
    }

    /// Request body for a payload: prompt text plus one inline part per frame.
    pub fn request_body(&self, payload: &AnalysisPayload) -> Value {
        let mut parts = vec![json!({ "text": build_prompt(payload) })];
        parts.extend(payload.frames.iter().map(|frame| {
            json!({
                "inline_data": {
                    "mime_type": frame.mime_type,
                    "data": frame.data,
                }
            })
        }));

        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": self.generation.temperature,
                "topK": self.generation.top_k,
                "topP": self.generation.top_p,
                "maxOutputTokens": self.generation.max_output_tokens,
                "responseMimeType": "application/json",
            }
        })
    }
}

#[async_trait]
impl AnalysisTier for DirectTier {
    fn tier(&self) -> Tier {
        Tier::Direct
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, payload: &AnalysisPayload) -> Result<Value, AttemptError> {
        let url = format!("{}/{}:generateContent", self.endpoint, self.model);
        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(payload))
            .send()
            .await
            // The URL carries the key.
            .map_err(|e| AttemptError::Transport(e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| AttemptError::Malformed(e.without_url().to_string()))?;

        let text = candidate_text(&body)
            .ok_or_else(|| AttemptError::Malformed("no candidate text in response".to_string()))?;

        parse_model_json(text)
    }
}

/// `candidates[0].content.parts[0].text`
fn candidate_text(body: &Value) -> Option<&str> {
    body.pointer("/candidates/0/content/parts/0/text")?.as_str()
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)\A```[A-Za-z0-9_-]*[ \t]*\n?(.*?)\s*```\z").ok())
        .as_ref()
}

/// Remove a Markdown code fence wrapping the whole model text, if present.
///
/// Backticks anywhere else, including inside JSON strings, are left alone.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    fence_regex()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed)
}

/// Strictly parse model output as JSON after fence stripping.
pub fn parse_model_json(text: &str) -> Result<Value, AttemptError> {
    serde_json::from_str(strip_code_fence(text)).map_err(|e| AttemptError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::types::{AnalysisMode, AnalysisOptions, FeatureSet, Frame, SourceKind};
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[test]
    fn test_strip_json_fence() {
        let text = "```json\n{\"summary\": \"ok\"}\n```";
        assert_eq!(strip_code_fence(text), "{\"summary\": \"ok\"}");
    }

    #[test]
    fn test_strip_bare_fence() {
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
    }

    #[test]
    fn test_unfenced_text_untouched() {
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_backticks_inside_json_string_survive() {
        let text = r#"{"summary": "Run ```make``` first", "forecast": [], "pollution_source": {}}"#;
        assert_eq!(strip_code_fence(text), text);
        let value = parse_model_json(text).unwrap();
        assert_eq!(value["summary"], "Run ```make``` first");
    }

    #[test]
    fn test_fence_must_wrap_whole_text() {
        assert!(parse_model_json("Sure:\n```json\n{\"a\": 1}\n```").is_err());
        assert!(parse_model_json("```json\n{\"a\": 1}\n```\nHope this helps").is_err());
        let fenced = "```json\n{\"cmd\": \"```x```\"}\n```";
        assert_eq!(parse_model_json(fenced).unwrap()["cmd"], "```x```");
    }

    #[test]
    fn test_parse_model_json_is_strict() {
        assert!(parse_model_json("```json\n{\"a\": 1}\n```").is_ok());
        assert!(matches!(
            parse_model_json("Here is your analysis: {\"a\": 1}"),
            Err(AttemptError::Malformed(_))
        ));
    }

    #[test]
    fn test_candidate_text() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": "{}"}]}}]});
        assert_eq!(candidate_text(&body), Some("{}"));
        assert_eq!(candidate_text(&json!({"candidates": []})), None);
    }

    #[test]
    fn test_request_body_attaches_frames() {
        let config = AppConfig::default();
        let tier = DirectTier::new(&config.ai, "test-key").unwrap();
        let payload = AnalysisPayload {
            mode: AnalysisMode::RoomAdvisor,
            source: SourceKind::Csv,
            requested_at: Utc::now(),
            features: FeatureSet::for_mode(AnalysisMode::RoomAdvisor),
            time_series: Vec::new(),
            frames: vec![Frame {
                mime_type: "image/jpeg".to_string(),
                data: "aGVsbG8=".to_string(),
                captured_at: None,
            }],
            sensor_summary: BTreeMap::new(),
            options: AnalysisOptions::default(),
            total_entries: 0,
            spike_count: None,
        };

        let body = tier.request_body(&payload);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["topK"], config.ai.top_k);
        assert!(!body.to_string().contains("test-key"));
    }

    #[test]
    fn test_degraded_proxy_reply_shape() {
        let reply: ProxyReply = serde_json::from_value(json!({
            "success": true,
            "data": {"summary": "offline"},
            "metadata": {"duration": 5, "timestamp": "2024-01-01T00:00:00Z", "fallback": true}
        }))
        .unwrap();
        assert!(reply.metadata.fallback);
        assert!(reply.data.is_some());
    }
}
