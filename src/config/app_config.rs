//! Application Configuration - endpoints, timeouts and retry policy as TOML values
//!
//! Every tunable has a `Default` matching the constants in
//! [`defaults`](super::defaults), so an absent config file changes nothing.
//! Secrets never come from TOML: they are read from the environment into
//! [`Credentials`], which is skipped by serde and redacted in `Debug`.

use super::defaults;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "AIRSENSE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "airsense.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `AppConfig::load()` which searches:
/// 1. `$AIRSENSE_CONFIG` env var
/// 2. `./airsense.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Where this process runs; gates the proxy tier
    #[serde(default)]
    pub deployment: DeploymentConfig,

    /// AI provider, timeouts and retry policy
    #[serde(default)]
    pub ai: AiConfig,

    /// Internal proxy tier
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Data-source endpoints
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Secrets from the environment
    #[serde(skip)]
    pub credentials: Credentials,
}

impl AppConfig {
    /// Load configuration using the standard search order, then attach
    /// credentials and environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file_or_default();
        config.apply_env_overrides();
        config.credentials = Credentials::from_env();
        config
    }

    fn load_file_or_default() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", CONFIG_PATH_ENV);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_PATH_ENV);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_PATH_ENV);
            }
        }

        // 2. Check ./airsense.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path. Credentials are left empty.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// `AIRSENSE_SERVER_ADDR` and `AIRSENSE_DEPLOYMENT` override the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("AIRSENSE_SERVER_ADDR") {
            self.server.addr = addr;
        }
        if let Ok(env) = std::env::var("AIRSENSE_DEPLOYMENT") {
            match env.trim().to_lowercase().as_str() {
                "local" => self.deployment.environment = Environment::Local,
                "hosted" => self.deployment.environment = Environment::Hosted,
                other => warn!(value = %other, "Ignoring unknown AIRSENSE_DEPLOYMENT value"),
            }
        }
    }

    /// Serialize to TOML (credentials are never included).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Replace credentials, e.g. in tests or when keys come from a request.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Whether the proxy tier is attempted in this deployment.
    pub fn proxy_enabled(&self) -> bool {
        match self.proxy.mode {
            ProxyMode::Always => true,
            ProxyMode::Never => false,
            ProxyMode::LocalOnly => self.deployment.environment == Environment::Local,
        }
    }

    /// Capability flags safe to expose on status endpoints.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_live_credential: self.credentials.has_ai_key(),
            proxy_enabled: self.proxy_enabled(),
            environment: self.deployment.environment,
            model: self.ai.model.clone(),
        }
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Timeouts must be > 0
    /// - Sampling parameters must be within provider ranges
    /// - Cache capacity and upload limit must be > 0
    /// - Endpoint URLs must be http(s)
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();
        let ai = &self.ai;

        if ai.proxy_timeout_secs == 0 {
            errors.push("ai.proxy_timeout_secs must be > 0".to_string());
        }
        if ai.direct_timeout_secs == 0 {
            errors.push("ai.direct_timeout_secs must be > 0".to_string());
        }
        if ai.cache_capacity == 0 {
            errors.push("ai.cache_capacity must be > 0".to_string());
        }
        if ai.max_output_tokens == 0 {
            errors.push("ai.max_output_tokens must be > 0".to_string());
        }
        if self.server.max_upload_bytes == 0 {
            errors.push("server.max_upload_bytes must be > 0".to_string());
        }
        if self.sources.thingspeak.default_results == 0
            || self.sources.thingspeak.default_results > defaults::THINGSPEAK_MAX_RESULTS
        {
            errors.push(format!(
                "sources.thingspeak.default_results = {} must be within 1-{}",
                self.sources.thingspeak.default_results,
                defaults::THINGSPEAK_MAX_RESULTS
            ));
        }

        for (name, url) in [
            ("ai.endpoint", &ai.endpoint),
            ("proxy.url", &self.proxy.url),
            ("sources.thingspeak.base_url", &self.sources.thingspeak.base_url),
            ("sources.openaq.base_url", &self.sources.openaq.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("{name} = '{url}' must start with http:// or https://"));
            }
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Credentials
// ============================================================================

/// Provider secrets. Never serialized, redacted in `Debug`.
#[derive(Clone, Default)]
pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub openaq_api_key: Option<String>,
}

impl Credentials {
    /// Read `GEMINI_API_KEY` and `OPENAQ_API_KEY`; blank values count as unset.
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            gemini_api_key: read("GEMINI_API_KEY"),
            openaq_api_key: read("OPENAQ_API_KEY"),
        }
    }

    pub fn has_ai_key(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("gemini_api_key", &mark(&self.gemini_api_key))
            .field("openaq_api_key", &mark(&self.openaq_api_key))
            .finish()
    }
}

/// What the running configuration can do, without revealing secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub has_live_credential: bool,
    pub proxy_enabled: bool,
    pub environment: Environment,
    pub model: String,
}

// ============================================================================
// Server Config
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by `AIRSENSE_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Upload / request body cap in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_server_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_upload_bytes() -> usize {
    defaults::MAX_UPLOAD_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

// ============================================================================
// Deployment
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Hosted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub environment: Environment,
}

// ============================================================================
// AI Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the provider's model collection; the model name and
    /// `:generateContent` are appended.
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_proxy_timeout_secs")]
    pub proxy_timeout_secs: u64,

    #[serde(default = "default_direct_timeout_secs")]
    pub direct_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_model() -> String {
    defaults::DEFAULT_MODEL.to_string()
}
fn default_ai_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}
fn default_proxy_timeout_secs() -> u64 {
    defaults::PROXY_TIMEOUT_SECS
}
fn default_direct_timeout_secs() -> u64 {
    defaults::DIRECT_TIMEOUT_SECS
}
fn default_max_retries() -> u32 {
    defaults::MAX_RETRIES
}
fn default_retry_backoff_ms() -> u64 {
    defaults::RETRY_BACKOFF_MS
}
fn default_temperature() -> f64 {
    defaults::GENERATION_TEMPERATURE
}
fn default_top_k() -> u32 {
    defaults::GENERATION_TOP_K
}
fn default_top_p() -> f64 {
    defaults::GENERATION_TOP_P
}
fn default_max_output_tokens() -> u32 {
    defaults::GENERATION_MAX_OUTPUT_TOKENS
}
fn default_cache_capacity() -> usize {
    defaults::RESPONSE_CACHE_CAPACITY
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_ai_endpoint(),
            proxy_timeout_secs: default_proxy_timeout_secs(),
            direct_timeout_secs: default_direct_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

// ============================================================================
// Proxy Config
// ============================================================================

/// When the proxy tier is attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    Always,
    /// Only when `deployment.environment = "local"`.
    #[default]
    LocalOnly,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_url")]
    pub url: String,
    #[serde(default)]
    pub mode: ProxyMode,
}

fn default_proxy_url() -> String {
    "http://localhost:8080/api/gemini/analyze".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            url: default_proxy_url(),
            mode: ProxyMode::default(),
        }
    }
}

// ============================================================================
// Sources
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub thingspeak: ThingSpeakConfig,
    #[serde(default)]
    pub openaq: OpenAqConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThingSpeakConfig {
    #[serde(default = "default_thingspeak_url")]
    pub base_url: String,
    #[serde(default = "default_thingspeak_results")]
    pub default_results: usize,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_thingspeak_url() -> String {
    "https://api.thingspeak.com".to_string()
}
fn default_thingspeak_results() -> usize {
    defaults::THINGSPEAK_DEFAULT_RESULTS
}
fn default_source_timeout_secs() -> u64 {
    defaults::SOURCE_HTTP_TIMEOUT_SECS
}

impl Default for ThingSpeakConfig {
    fn default() -> Self {
        Self {
            base_url: default_thingspeak_url(),
            default_results: default_thingspeak_results(),
            timeout_secs: default_source_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAqConfig {
    #[serde(default = "default_openaq_url")]
    pub base_url: String,
    #[serde(default = "default_openaq_limit")]
    pub default_limit: usize,
    #[serde(default = "default_openaq_parameters")]
    pub default_parameters: Vec<String>,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_openaq_url() -> String {
    "https://api.openaq.org/v2".to_string()
}
fn default_openaq_limit() -> usize {
    defaults::OPENAQ_DEFAULT_LIMIT
}
fn default_openaq_parameters() -> Vec<String> {
    vec!["pm25".to_string(), "pm10".to_string()]
}

impl Default for OpenAqConfig {
    fn default() -> Self {
        Self {
            base_url: default_openaq_url(),
            default_limit: default_openaq_limit(),
            default_parameters: default_openaq_parameters(),
            timeout_secs: default_source_timeout_secs(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: AppConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.ai.proxy_timeout_secs, 30);
        assert_eq!(config.ai.direct_timeout_secs, 45);
        assert_eq!(config.ai.max_retries, 1);
        assert_eq!(config.ai.retry_backoff_ms, 2_000);
        assert_eq!(config.sources.thingspeak.default_results, 200);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[ai]
max_retries = 3

[proxy]
mode = "never"
"#;
        let config = AppConfig::from_toml_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.ai.max_retries, 3);
        assert_eq!(config.proxy.mode, ProxyMode::Never);
        // Non-overridden values retain defaults
        assert_eq!(config.ai.direct_timeout_secs, 45);
        assert!(!config.proxy_enabled());
    }

    #[test]
    fn test_validation_catches_zero_timeout() {
        let mut config = AppConfig::default();
        config.ai.direct_timeout_secs = 0;
        let result = config.validate();
        assert!(result.is_err(), "Zero timeout should fail validation");
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("direct_timeout_secs")));
        }
    }

    #[test]
    fn test_validation_catches_bad_url() {
        let mut config = AppConfig::default();
        config.proxy.url = "localhost:3000".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_proxy_local_only_rule() {
        let mut config = AppConfig::default();
        assert!(config.proxy_enabled());
        config.deployment.environment = Environment::Hosted;
        assert!(!config.proxy_enabled());
        config.proxy.mode = ProxyMode::Always;
        assert!(config.proxy_enabled());
    }

    #[test]
    fn test_credentials_never_serialized_or_printed() {
        let config = AppConfig::default().with_credentials(Credentials {
            gemini_api_key: Some("secret-key-123".to_string()),
            openaq_api_key: None,
        });
        let toml_str = config.to_toml().unwrap();
        assert!(!toml_str.contains("secret-key-123"));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-key-123"));
        assert!(debug.contains("<set>"));
        assert!(config.capabilities().has_live_credential);
    }

    #[test]
    fn test_roundtrip_toml() {
        let original = AppConfig::default();
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped = AppConfig::from_toml_str(&toml_str).expect("deserialization should work");
        assert_eq!(original.ai.model, roundtripped.ai.model);
        assert_eq!(original.proxy.url, roundtripped.proxy.url);
        assert_eq!(
            original.sources.openaq.default_parameters,
            roundtripped.sources.openaq.default_parameters
        );
    }
}
