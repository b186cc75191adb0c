//! Deterministic offline analysis
//!
//! Used when every tier failed or none is configured. The output depends only
//! on the payload's feature flags, options and sensor summary, never on the
//! clock or the network, so identical payloads give identical results.

use crate::config::defaults;
use crate::types::{
    AnalysisMode, AnalysisPayload, AnalysisResult, ForecastPoint, HealthRisk, HealthRiskGroups,
    LayoutIssue, LayoutSuggestions, Metric, PollutionSource, SourceContribution, VentilationTips,
    VentilationWindow, HEALTH_RISK_GROUPS,
};

/// Baseline PM2.5 when the payload has no PM2.5 summary (µg/m³).
const BASELINE_PM25: f64 = 15.0;

/// Confidence reported for synthesized results.
const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Build a placeholder result with exactly the requested feature keys.
pub fn synthesize(payload: &AnalysisPayload) -> AnalysisResult {
    let features = payload.features;
    let pm25 = avg(payload, Metric::Pm25).unwrap_or(BASELINE_PM25);
    let pm10 = avg(payload, Metric::Pm10);

    AnalysisResult {
        forecast: features.forecast.then(|| forecast(payload, pm25, pm10)),
        pollution_source: features.source_detection.then(|| pollution_source(pm25, pm10)),
        health_risk_groups: features.health_risk.then(|| health_groups(payload, pm25)),
        ventilation_tips: features.ventilation.then(|| ventilation(payload, pm25)),
        layout_suggestions: features.layout.then(layout),
        summary: summary(payload, pm25),
        confidence: FALLBACK_CONFIDENCE,
        evidence: evidence(payload),
    }
}

fn avg(payload: &AnalysisPayload, metric: Metric) -> Option<f64> {
    payload.sensor_summary.get(&metric).map(|s| s.avg)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Daily cycle around the observed average: higher in the morning and
/// evening rush, lower overnight.
fn diurnal_factor(hour: u32) -> f64 {
    match hour % 24 {
        7..=9 | 17..=20 => 1.2,
        0..=5 => 0.85,
        _ => 1.0,
    }
}

fn forecast(payload: &AnalysisPayload, pm25: f64, pm10: Option<f64>) -> Vec<ForecastPoint> {
    let hours = payload
        .options
        .forecast_hours
        .unwrap_or(defaults::DEFAULT_FORECAST_HOURS)
        .min(defaults::MAX_FORECAST_HOURS);
    (1..=hours)
        .map(|hour| {
            let factor = diurnal_factor(hour);
            ForecastPoint {
                hour,
                timestamp: None,
                pm25: round1(pm25 * factor),
                pm10: pm10.map(|v| round1(v * factor)),
                // Confidence decays with horizon.
                confidence: Some(round1((0.6 - hour as f64 * 0.01).max(0.2))),
            }
        })
        .collect()
}

fn pollution_source(pm25: f64, pm10: Option<f64>) -> PollutionSource {
    // Fine-to-coarse ratio separates combustion from dust.
    let ratio = pm10.filter(|v| *v > 0.0).map(|v| pm25 / v);
    let (primary, contributors) = match ratio {
        Some(r) if r >= 0.6 => ("combustion", [("combustion", 0.6), ("traffic", 0.3), ("other", 0.1)]),
        Some(_) => ("dust", [("dust", 0.5), ("construction", 0.3), ("other", 0.2)]),
        None => ("unknown", [("traffic", 0.4), ("combustion", 0.3), ("other", 0.3)]),
    };
    PollutionSource {
        primary: primary.to_string(),
        confidence: FALLBACK_CONFIDENCE,
        contributors: contributors
            .iter()
            .map(|(source, share)| SourceContribution {
                source: source.to_string(),
                share: *share,
            })
            .collect(),
        explanation: "Estimated offline from the PM2.5/PM10 ratio; live analysis was unavailable."
            .to_string(),
    }
}

/// `(level, score)` band for a PM2.5 concentration.
fn pm25_band(pm25: f64) -> (&'static str, f64) {
    match pm25 {
        v if v <= 12.0 => ("low", 2.0),
        v if v <= 35.4 => ("moderate", 4.0),
        v if v <= 55.4 => ("high", 6.0),
        _ => ("very_high", 8.0),
    }
}

fn health_groups(payload: &AnalysisPayload, pm25: f64) -> HealthRiskGroups {
    let exposure = payload
        .options
        .exposure_hours
        .unwrap_or(defaults::DEFAULT_EXPOSURE_HOURS);
    // Longer exposure raises the effective dose.
    let dose = pm25 * (exposure / defaults::DEFAULT_EXPOSURE_HOURS).max(0.5);

    HEALTH_RISK_GROUPS
        .iter()
        .map(|group| {
            let sensitive = *group != "general";
            let (level, score) = pm25_band(if sensitive { dose * 1.5 } else { dose });
            let advice = match level {
                "low" => "No precautions needed.",
                "moderate" if sensitive => "Limit prolonged exertion indoors and out.",
                "moderate" => "Unusually sensitive people should limit exertion.",
                _ if sensitive => "Avoid exertion and keep windows closed; use filtration.",
                _ => "Reduce prolonged exertion and improve ventilation.",
            };
            (
                group.to_string(),
                HealthRisk {
                    level: level.to_string(),
                    score,
                    advice: advice.to_string(),
                },
            )
        })
        .collect()
}

fn ventilation(payload: &AnalysisPayload, pm25: f64) -> VentilationTips {
    let outdoor_cleaner = payload.options.outdoor_pm25.is_some_and(|o| o < pm25);
    let mut recommendations = vec![
        "Ventilate outside the morning and evening rush hours.".to_string(),
        "Run extraction while cooking and for 15 minutes after.".to_string(),
    ];
    if outdoor_cleaner {
        recommendations.insert(0, "Outdoor air is cleaner than indoor air: open windows.".to_string());
    } else if payload.options.outdoor_pm25.is_some() {
        recommendations.insert(0, "Outdoor air is not cleaner: prefer filtration over open windows.".to_string());
    }
    VentilationTips {
        schedule: vec![
            VentilationWindow {
                start_hour: 10,
                end_hour: 12,
                action: "open windows".to_string(),
                reason: "Traffic emissions are typically low late morning.".to_string(),
            },
            VentilationWindow {
                start_hour: 17,
                end_hour: 20,
                action: "keep windows closed".to_string(),
                reason: "Evening rush-hour traffic raises outdoor particulates.".to_string(),
            },
        ],
        recommendations,
    }
}

fn layout() -> LayoutSuggestions {
    LayoutSuggestions {
        issues: vec![
            LayoutIssue {
                area: "sensor placement".to_string(),
                issue: "Readings may be biased by nearby sources.".to_string(),
                suggestion: "Place the sensor at breathing height, away from windows and the kitchen."
                    .to_string(),
                priority: "medium".to_string(),
            },
            LayoutIssue {
                area: "airflow".to_string(),
                issue: "Furniture can block cross-ventilation paths.".to_string(),
                suggestion: "Keep the path between opposite openings clear.".to_string(),
                priority: "low".to_string(),
            },
        ],
        overall_score: None,
    }
}

fn summary(payload: &AnalysisPayload, pm25: f64) -> String {
    let (level, _) = pm25_band(pm25);
    let lead = match payload.mode {
        AnalysisMode::Chat => "Live analysis is unavailable, so this answer is generated offline.",
        _ => "Live analysis is unavailable; this result is a deterministic offline estimate.",
    };
    format!(
        "{lead} Average PM2.5 across {} readings is {:.1} µg/m³ ({level}).",
        payload.total_entries, pm25
    )
}

fn evidence(payload: &AnalysisPayload) -> Vec<String> {
    let mut out: Vec<String> = payload
        .sensor_summary
        .iter()
        .map(|(metric, s)| {
            format!(
                "{metric}: avg {:.1} {} (min {:.1}, max {:.1}, n={})",
                s.avg, s.unit, s.min, s.max, s.count
            )
        })
        .collect();
    if let Some(spikes) = payload.spike_count {
        out.push(format!("{spikes} spike readings above threshold"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisOptions, FeatureSet, MetricSummary, SourceKind};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn payload(mode: AnalysisMode) -> AnalysisPayload {
        let mut summary = BTreeMap::new();
        summary.insert(
            Metric::Pm25,
            MetricSummary {
                min: 10.0,
                max: 50.0,
                avg: 30.0,
                count: 10,
                unit: "µg/m³".to_string(),
            },
        );
        AnalysisPayload {
            mode,
            source: SourceKind::Csv,
            requested_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            features: FeatureSet::for_mode(mode),
            time_series: Vec::new(),
            frames: Vec::new(),
            sensor_summary: summary,
            options: AnalysisOptions {
                forecast_hours: Some(6),
                ..AnalysisOptions::default()
            },
            total_entries: 10,
            spike_count: None,
        }
    }

    fn keys(result: &AnalysisResult) -> Vec<String> {
        let v = serde_json::to_value(result).unwrap();
        let mut keys: Vec<String> = v.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_key_set_matches_features() {
        let r = synthesize(&payload(AnalysisMode::Forecast));
        assert_eq!(
            keys(&r),
            vec!["confidence", "evidence", "forecast", "pollution_source", "summary"]
        );
        let r = synthesize(&payload(AnalysisMode::RoomAdvisor));
        assert_eq!(
            keys(&r),
            vec!["confidence", "evidence", "layout_suggestions", "summary", "ventilation_tips"]
        );
        let r = synthesize(&payload(AnalysisMode::Chat));
        assert_eq!(keys(&r), vec!["confidence", "evidence", "summary"]);
    }

    #[test]
    fn test_forecast_length_follows_hours() {
        let r = synthesize(&payload(AnalysisMode::Forecast));
        let forecast = r.forecast.unwrap();
        assert_eq!(forecast.len(), 6);
        assert_eq!(forecast[0].hour, 1);
        assert_eq!(forecast[5].hour, 6);
    }

    #[test]
    fn test_forecast_length_is_capped() {
        let mut p = payload(AnalysisMode::Forecast);
        p.options.forecast_hours = Some(2_000_000);
        let forecast = synthesize(&p).forecast.unwrap();
        assert_eq!(forecast.len(), defaults::MAX_FORECAST_HOURS as usize);
    }

    #[test]
    fn test_deterministic() {
        let p = payload(AnalysisMode::HealthRisk);
        assert_eq!(synthesize(&p), synthesize(&p));
    }

    #[test]
    fn test_health_groups_complete() {
        let r = synthesize(&payload(AnalysisMode::HealthRisk));
        let groups = r.health_risk_groups.unwrap();
        assert_eq!(groups.len(), 4);
        assert_eq!(groups["general"].level, "moderate");
        // Sensitive groups sit one band higher at 30 µg/m³.
        assert_eq!(groups["children"].level, "high");
    }
}
