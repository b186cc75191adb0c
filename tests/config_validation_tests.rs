//! Config Validation Tests
//!
//! Typo detection, range validation and TOML file loading, exercised
//! independently from the rest of the pipeline.

use airsense::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use airsense::config::{AppConfig, ConfigError, Credentials, Environment, ProxyMode};
use std::io::Write;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_ai_section_warns_with_suggestion() {
    let toml_str = r#"
[ai]
max_retires = 2
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("max_retires"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("ai.max_retries"));
}

#[test]
fn unrelated_key_has_no_suggestion() {
    let warnings = validate_unknown_keys("[server]\ncompletely_unrelated_setting = 1\n");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].suggestion.is_none());
}

#[test]
fn every_default_key_is_known() {
    let toml_str = AppConfig::default().to_toml().unwrap();
    assert!(
        validate_unknown_keys(&toml_str).is_empty(),
        "default config serializes only known keys"
    );
}

#[test]
fn suggestion_respects_distance_limit() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("proxy.mdoe", &known).as_deref(),
        Some("proxy.mode")
    );
    assert!(suggest_correction("proxy.transport_protocol", &known).is_none());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn zero_timeout_is_rejected() {
    let err = AppConfig::from_toml_str("[ai]\nproxy_timeout_secs = 0\n").unwrap_err();
    match err {
        ConfigError::Validation(errors) => {
            assert!(errors.iter().any(|e| e.contains("proxy_timeout_secs")));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn all_violations_are_reported_together() {
    let toml_str = r#"
[server]
max_upload_bytes = 0

[ai]
cache_capacity = 0
temperature = 3.5
"#;
    match AppConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 3, "{errors:?}"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn non_http_endpoint_is_rejected() {
    let err = AppConfig::from_toml_str("[proxy]\nurl = \"ftp://example.com/analyze\"\n").unwrap_err();
    assert!(err.to_string().contains("proxy.url"));
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn load_from_file_reads_sections() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[deployment]
environment = "hosted"

[proxy]
mode = "local_only"

[ai]
max_retries = 2
retry_backoff_ms = 500

[sources.openaq]
default_parameters = ["pm25"]
"#
    )
    .unwrap();

    let config = AppConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.deployment.environment, Environment::Hosted);
    assert_eq!(config.proxy.mode, ProxyMode::LocalOnly);
    assert!(!config.proxy_enabled(), "local_only proxy is off when hosted");
    assert_eq!(config.ai.max_retries, 2);
    assert_eq!(config.sources.openaq.default_parameters, vec!["pm25".to_string()]);
    // Untouched sections keep their defaults.
    assert_eq!(config.server.addr, "0.0.0.0:8080");
}

#[test]
fn load_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AppConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn malformed_file_reports_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[ai\nmodel = ").unwrap();
    let err = AppConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
    assert!(err.to_string().contains(&file.path().display().to_string()));
}

// ============================================================================
// Credentials
// ============================================================================

#[test]
fn credentials_are_redacted_and_never_serialized() {
    let config = AppConfig::default().with_credentials(Credentials {
        gemini_api_key: Some("super-secret-key".to_string()),
        openaq_api_key: None,
    });

    assert!(!format!("{config:?}").contains("super-secret-key"));
    assert!(!config.to_toml().unwrap().contains("super-secret-key"));

    let caps = config.capabilities();
    assert!(caps.has_live_credential);
    assert!(!serde_json::to_string(&caps).unwrap().contains("super-secret-key"));
}
