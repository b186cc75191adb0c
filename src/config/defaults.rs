//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery. Values that operators may tune
//! are mirrored as fields in [`AppConfig`](super::AppConfig).

// ============================================================================
// AI Orchestrator
// ============================================================================

/// Hard cutoff for one proxy attempt (seconds).
pub const PROXY_TIMEOUT_SECS: u64 = 30;

/// Hard cutoff for one direct provider attempt (seconds).
pub const DIRECT_TIMEOUT_SECS: u64 = 45;

/// Additional passes through proxy → direct after the first one.
pub const MAX_RETRIES: u32 = 1;

/// Fixed delay before a retry pass (milliseconds).
pub const RETRY_BACKOFF_MS: u64 = 2_000;

/// Bounded LRU response cache capacity (distinct payloads).
pub const RESPONSE_CACHE_CAPACITY: usize = 64;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

pub const GENERATION_TEMPERATURE: f64 = 0.7;
pub const GENERATION_TOP_K: u32 = 40;
pub const GENERATION_TOP_P: f64 = 0.95;
pub const GENERATION_MAX_OUTPUT_TOKENS: u32 = 8_192;

// ============================================================================
// Payload Shaping
// ============================================================================

/// Most recent entries kept per mode.
pub const FORECAST_SAMPLE_SIZE: usize = 50;
pub const HEALTH_RISK_SAMPLE_SIZE: usize = 30;
pub const ROOM_ADVISOR_SAMPLE_SIZE: usize = 20;
pub const SOURCE_DETECTION_SAMPLE_SIZE: usize = 20;
pub const CHAT_SAMPLE_SIZE: usize = 20;

/// Frame caps.
pub const MAX_FRAMES: usize = 5;
pub const CHAT_MAX_FRAMES: usize = 3;

/// Spike thresholds for source detection (µg/m³).
pub const SPIKE_PM25: f64 = 75.0;
pub const SPIKE_PM10: f64 = 100.0;

pub const DEFAULT_FORECAST_HOURS: u32 = 24;

/// Longest forecast horizon accepted from callers (hours).
pub const MAX_FORECAST_HOURS: u32 = 72;
pub const DEFAULT_EXPOSURE_HOURS: f64 = 8.0;

// ============================================================================
// Sources
// ============================================================================

/// Default channel-feed result count.
pub const THINGSPEAK_DEFAULT_RESULTS: usize = 200;

/// Provider hard limit on channel-feed result count.
pub const THINGSPEAK_MAX_RESULTS: usize = 8_000;

pub const OPENAQ_DEFAULT_LIMIT: usize = 100;

/// HTTP timeout for data-source fetches (seconds).
pub const SOURCE_HTTP_TIMEOUT_SECS: u64 = 20;

/// Upload size cap (bytes). 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Spacing of synthesized CSV timestamps (seconds).
pub const SYNTHETIC_TIMESTAMP_STEP_SECS: i64 = 60;
