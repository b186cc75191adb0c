//! Lenient mapping from raw AI JSON to typed results
//!
//! Nothing here fails. A missing or malformed feature becomes its default:
//! an empty forecast, an `"unknown"` pollution source, `level: "unknown",
//! score: 0` for every demographic group, empty ventilation and layout
//! advice.

use crate::types::{
    AnalysisResult, Feature, FeatureSet, ForecastPoint, HealthRisk, HealthRiskGroups,
    LayoutIssue, LayoutSuggestions, PollutionSource, VentilationTips, VentilationWindow,
    HEALTH_RISK_GROUPS,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

const DEFAULT_SUMMARY: &str = "No summary was provided for this analysis.";

/// One typed feature substructure.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureResult {
    Forecast(Vec<ForecastPoint>),
    PollutionSource(PollutionSource),
    HealthRisk(HealthRiskGroups),
    Ventilation(VentilationTips),
    Layout(LayoutSuggestions),
}

/// Extract one feature from a raw AI result, substituting its default.
pub fn extract(raw: &Value, feature: Feature) -> FeatureResult {
    let value = raw.get(feature.key());
    match feature {
        Feature::Forecast => FeatureResult::Forecast(value.map(forecast).unwrap_or_default()),
        Feature::PollutionSource => FeatureResult::PollutionSource(
            value
                .and_then(parse::<PollutionSource>)
                .unwrap_or_else(unknown_source),
        ),
        Feature::HealthRisk => FeatureResult::HealthRisk(health_groups(value)),
        Feature::Ventilation => {
            FeatureResult::Ventilation(value.map(ventilation).unwrap_or_default())
        }
        Feature::Layout => FeatureResult::Layout(value.map(layout).unwrap_or_default()),
    }
}

/// Map a whole raw result. Only requested features are present in the output.
pub fn map_result(raw: &Value, features: FeatureSet) -> AnalysisResult {
    let mut result = AnalysisResult {
        forecast: None,
        pollution_source: None,
        health_risk_groups: None,
        ventilation_tips: None,
        layout_suggestions: None,
        summary: raw
            .get("summary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SUMMARY)
            .to_string(),
        confidence: raw
            .get("confidence")
            .and_then(Value::as_f64)
            .map(normalize_confidence)
            .unwrap_or(0.0),
        evidence: raw
            .get("evidence")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    for feature in features.iter() {
        match extract(raw, feature) {
            FeatureResult::Forecast(v) => result.forecast = Some(v),
            FeatureResult::PollutionSource(v) => result.pollution_source = Some(v),
            FeatureResult::HealthRisk(v) => result.health_risk_groups = Some(v),
            FeatureResult::Ventilation(v) => result.ventilation_tips = Some(v),
            FeatureResult::Layout(v) => result.layout_suggestions = Some(v),
        }
    }
    result
}

/// Accept both `0..1` and percentage confidences.
fn normalize_confidence(c: f64) -> f64 {
    if !c.is_finite() {
        return 0.0;
    }
    let c = if c > 1.0 { c / 100.0 } else { c };
    c.clamp(0.0, 1.0)
}

fn parse<T: DeserializeOwned>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}

/// Malformed points are skipped individually.
fn forecast(value: &Value) -> Vec<ForecastPoint> {
    value
        .as_array()
        .map(|points| points.iter().filter_map(parse::<ForecastPoint>).collect())
        .unwrap_or_default()
}

fn unknown_source() -> PollutionSource {
    PollutionSource {
        primary: "unknown".to_string(),
        confidence: 0.0,
        contributors: Vec::new(),
        explanation: String::new(),
    }
}

/// Every known group is always present; extra groups from the model are kept.
fn health_groups(value: Option<&Value>) -> HealthRiskGroups {
    let mut groups: HealthRiskGroups = HEALTH_RISK_GROUPS
        .iter()
        .map(|g| (g.to_string(), HealthRisk::default()))
        .collect();
    if let Some(map) = value.and_then(Value::as_object) {
        for (group, risk) in map {
            if let Some(risk) = parse::<HealthRisk>(risk) {
                groups.insert(group.clone(), risk);
            }
        }
    }
    groups
}

/// Object form, or an array of windows and/or plain recommendation strings.
fn ventilation(value: &Value) -> VentilationTips {
    match value {
        Value::Object(_) => parse(value).unwrap_or_default(),
        Value::Array(items) => {
            let mut tips = VentilationTips::default();
            for item in items {
                match item {
                    Value::String(s) => tips.recommendations.push(s.clone()),
                    other => {
                        if let Some(window) = parse::<VentilationWindow>(other) {
                            tips.schedule.push(window);
                        }
                    }
                }
            }
            tips
        }
        _ => VentilationTips::default(),
    }
}

/// Object form, or a bare array of issues.
fn layout(value: &Value) -> LayoutSuggestions {
    match value {
        Value::Object(_) => parse(value).unwrap_or_default(),
        Value::Array(items) => LayoutSuggestions {
            issues: items.iter().filter_map(parse::<LayoutIssue>).collect(),
            overall_score: None,
        },
        _ => LayoutSuggestions::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_health_groups_default_to_unknown() {
        let FeatureResult::HealthRisk(groups) = extract(&json!({}), Feature::HealthRisk) else {
            panic!("wrong variant");
        };
        assert_eq!(groups.len(), 4);
        for g in HEALTH_RISK_GROUPS {
            assert_eq!(groups[g].level, "unknown");
            assert_eq!(groups[g].score, 0.0);
        }
    }

    #[test]
    fn test_partial_health_groups_are_filled() {
        let raw = json!({"health_risk_groups": {
            "children": {"level": "high", "score": 7.5, "advice": "Stay indoors"},
            "elderly": "not an object"
        }});
        let FeatureResult::HealthRisk(groups) = extract(&raw, Feature::HealthRisk) else {
            panic!("wrong variant");
        };
        assert_eq!(groups["children"].level, "high");
        assert_eq!(groups["elderly"].level, "unknown");
        assert_eq!(groups["general"].score, 0.0);
    }

    #[test]
    fn test_forecast_skips_bad_points() {
        let raw = json!({"forecast": [
            {"hour": 1, "pm25": 10.0},
            {"hour": "two", "pm25": 11.0},
            {"hour": 3, "pm25": 12.0, "confidence": 0.5}
        ]});
        let FeatureResult::Forecast(points) = extract(&raw, Feature::Forecast) else {
            panic!("wrong variant");
        };
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].hour, 3);
    }

    #[test]
    fn test_malformed_source_becomes_unknown() {
        let raw = json!({"pollution_source": ["traffic"]});
        let FeatureResult::PollutionSource(src) = extract(&raw, Feature::PollutionSource) else {
            panic!("wrong variant");
        };
        assert_eq!(src.primary, "unknown");
    }

    #[test]
    fn test_ventilation_array_form() {
        let raw = json!({"ventilation_tips": [
            "Open windows after rush hour",
            {"start_hour": 10, "end_hour": 12, "action": "open", "reason": "low outdoor PM"}
        ]});
        let FeatureResult::Ventilation(tips) = extract(&raw, Feature::Ventilation) else {
            panic!("wrong variant");
        };
        assert_eq!(tips.recommendations.len(), 1);
        assert_eq!(tips.schedule[0].start_hour, 10);
    }

    #[test]
    fn test_map_result_key_set_follows_features() {
        let raw = json!({
            "forecast": [{"hour": 1, "pm25": 10.0}],
            "pollution_source": {"primary": "traffic", "confidence": 0.8},
            "layout_suggestions": {"issues": []},
            "summary": "Air is fine",
            "confidence": 85,
            "evidence": ["pm25 stable", 3]
        });
        let result = map_result(&raw, FeatureSet::for_mode(crate::types::AnalysisMode::Forecast));
        let v = serde_json::to_value(&result).unwrap();
        let mut keys: Vec<&str> = v.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["confidence", "evidence", "forecast", "pollution_source", "summary"]
        );
        assert_eq!(result.confidence, 0.85);
        assert_eq!(result.evidence, vec!["pm25 stable".to_string()]);
        assert_eq!(result.pollution_source.unwrap().primary, "traffic");
    }

    #[test]
    fn test_map_result_defaults_summary() {
        let result = map_result(&json!(null), FeatureSet::default());
        assert_eq!(result.summary, DEFAULT_SUMMARY);
        assert_eq!(result.confidence, 0.0);
        assert!(result.evidence.is_empty());
    }
}
