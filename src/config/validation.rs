//! Config validation: unknown-key detection with Levenshtein suggestions
//! and value range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for AppConfig.
///
/// This is maintained manually to match the struct hierarchy in app_config.rs.
/// Any new field added to AppConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [server]
        "server",
        "server.addr",
        "server.max_upload_bytes",
        // [deployment]
        "deployment",
        "deployment.environment",
        // [ai]
        "ai",
        "ai.model",
        "ai.endpoint",
        "ai.proxy_timeout_secs",
        "ai.direct_timeout_secs",
        "ai.max_retries",
        "ai.retry_backoff_ms",
        "ai.temperature",
        "ai.top_k",
        "ai.top_p",
        "ai.max_output_tokens",
        "ai.cache_capacity",
        // [proxy]
        "proxy",
        "proxy.url",
        "proxy.mode",
        // [sources]
        "sources",
        // [sources.thingspeak]
        "sources.thingspeak",
        "sources.thingspeak.base_url",
        "sources.thingspeak.default_results",
        "sources.thingspeak.timeout_secs",
        // [sources.openaq]
        "sources.openaq",
        "sources.openaq.base_url",
        "sources.openaq.default_limit",
        "sources.openaq.default_parameters",
        "sources.openaq.timeout_secs",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.len();
    let b_len = b.len();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist <= 3 {
            if let Some((_, best_dist)) = best {
                if dist < best_dist {
                    best = Some((k, dist));
                }
            } else {
                best = Some((k, dist));
            }
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns. Existing configs
/// always continue to work.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();

    for key in &found {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(key, &known);
            let message = format!("Unknown config key '{key}'");
            warnings.push(ValidationWarning {
                field: key.clone(),
                message,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate value ranges on a parsed AppConfig.
///
/// Returns (errors, warnings). Errors are values the provider rejects;
/// warnings are legal but likely to make analysis slow or erratic.
pub fn validate_ranges(config: &super::AppConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let ai = &config.ai;

    if !(0.0..=2.0).contains(&ai.temperature) {
        errors.push(format!(
            "ai.temperature = {:.2} is outside the accepted range (0-2)",
            ai.temperature
        ));
    }
    if !(0.0..=1.0).contains(&ai.top_p) {
        errors.push(format!(
            "ai.top_p = {:.2} is outside the accepted range (0-1)",
            ai.top_p
        ));
    }
    if ai.top_k == 0 {
        errors.push("ai.top_k must be >= 1".to_string());
    }

    if ai.max_retries > 5 {
        warnings.push(ValidationWarning {
            field: "ai.max_retries".to_string(),
            message: format!(
                "ai.max_retries = {} means up to {} provider calls per analysis",
                ai.max_retries,
                (ai.max_retries + 1) * 2
            ),
            suggestion: None,
        });
    }
    if ai.retry_backoff_ms > 60_000 {
        warnings.push(ValidationWarning {
            field: "ai.retry_backoff_ms".to_string(),
            message: format!(
                "ai.retry_backoff_ms = {} is longer than a minute",
                ai.retry_backoff_ms
            ),
            suggestion: None,
        });
    }
    for (field, secs) in [
        ("ai.proxy_timeout_secs", ai.proxy_timeout_secs),
        ("ai.direct_timeout_secs", ai.direct_timeout_secs),
    ] {
        if secs > 300 {
            warnings.push(ValidationWarning {
                field: field.to_string(),
                message: format!("{field} = {secs} is outside typical range (1-300 s)"),
                suggestion: None,
            });
        }
    }
    if config.sources.openaq.default_parameters.is_empty() {
        warnings.push(ValidationWarning {
            field: "sources.openaq.default_parameters".to_string(),
            message: "sources.openaq.default_parameters is empty; \
                      OpenAQ requests without --parameter will fail"
                .to_string(),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
