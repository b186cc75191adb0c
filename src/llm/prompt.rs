//! Prompt templates for the direct provider tier
//!
//! One template per mode. Placeholders are filled with `.replace` and the
//! response format section lists exactly the keys the schema validator will
//! require.

use crate::config::defaults;
use crate::types::{AnalysisMode, AnalysisPayload, Feature, Metric, TimeSeriesEntry};

const BASE_PROMPT: &str = r#"You are an air-quality analyst reviewing environmental sensor data.

### DATA
Source: {source} | Readings in dataset: {total} | Readings below: {sampled}

### SENSOR SUMMARY
{summary_table}

### READINGS (oldest first)
{readings}

{task}

### RESPONSE FORMAT
Respond with one JSON object and nothing else. No markdown. Keys:
{feature_keys}- summary: string, two or three sentences
- confidence: number between 0 and 1
- evidence: array of short strings citing specific readings"#;

const FORECAST_TASK: &str = r#"### TASK
Forecast PM2.5 (and PM10 when it is measured) for each of the next {hours} hours.
Then attribute the most likely pollution source from the pattern of the readings."#;

const SOURCE_TASK: &str = r#"### TASK
The readings above are spikes only (PM2.5 > {spike_pm25} or PM10 > {spike_pm10}); {spikes} spikes were found in total.
Identify the most likely pollution source and its contributors."#;

const HEALTH_TASK: &str = r#"### TASK
Assess health risk for {exposure} hours of exposure at these levels for each group:
general, children, elderly, respiratory."#;

const ROOM_TASK: &str = r#"### TASK
Advise on ventilation timing and room layout for a {room_type}.
Outdoor PM2.5: {outdoor}. {frames} room image(s) are attached."#;

const CHAT_TASK: &str = r#"### QUESTION
{message}

Answer the question in `summary`, grounded in the readings. {frames} image(s) are attached."#;

/// Build the text prompt for a payload.
pub fn build_prompt(payload: &AnalysisPayload) -> String {
    let options = &payload.options;
    let frames = payload.frames.len().to_string();

    let task = match payload.mode {
        AnalysisMode::Forecast => FORECAST_TASK.replace(
            "{hours}",
            &options
                .forecast_hours
                .unwrap_or(defaults::DEFAULT_FORECAST_HOURS)
                .to_string(),
        ),
        AnalysisMode::SourceDetection => SOURCE_TASK
            .replace("{spike_pm25}", &defaults::SPIKE_PM25.to_string())
            .replace("{spike_pm10}", &defaults::SPIKE_PM10.to_string())
            .replace("{spikes}", &payload.spike_count.unwrap_or(0).to_string()),
        AnalysisMode::HealthRisk => HEALTH_TASK.replace(
            "{exposure}",
            &options
                .exposure_hours
                .unwrap_or(defaults::DEFAULT_EXPOSURE_HOURS)
                .to_string(),
        ),
        AnalysisMode::RoomAdvisor => ROOM_TASK
            .replace("{room_type}", options.room_type.as_deref().unwrap_or("room"))
            .replace(
                "{outdoor}",
                &options
                    .outdoor_pm25
                    .map(|v| format!("{v:.1} µg/m³"))
                    .unwrap_or_else(|| "unknown".to_string()),
            )
            .replace("{frames}", &frames),
        AnalysisMode::Chat => CHAT_TASK
            .replace(
                "{message}",
                options
                    .message
                    .as_deref()
                    .unwrap_or("Summarise the air quality in this data."),
            )
            .replace("{frames}", &frames),
    };

    BASE_PROMPT
        .replace("{source}", payload.source.as_str())
        .replace("{total}", &payload.total_entries.to_string())
        .replace("{sampled}", &payload.time_series.len().to_string())
        .replace("{summary_table}", &summary_table(payload))
        .replace("{readings}", &readings(&payload.time_series))
        .replace("{feature_keys}", &feature_keys(payload))
        .replace("{task}", &task)
}

fn summary_table(payload: &AnalysisPayload) -> String {
    if payload.sensor_summary.is_empty() {
        return "No metric has values.".to_string();
    }
    payload
        .sensor_summary
        .iter()
        .map(|(metric, s)| {
            format!(
                "{metric}: min {:.1} | avg {:.1} | max {:.1} {} (n={})",
                s.min, s.avg, s.max, s.unit, s.count
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn readings(series: &[TimeSeriesEntry]) -> String {
    if series.is_empty() {
        return "None.".to_string();
    }
    series
        .iter()
        .map(|e| {
            let values: Vec<String> = Metric::ALL
                .into_iter()
                .filter_map(|m| e.get(m).map(|v| format!("{m}={v}")))
                .collect();
            format!("{} {}", e.timestamp, values.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn feature_keys(payload: &AnalysisPayload) -> String {
    payload
        .features
        .iter()
        .map(|f| {
            let shape = match f {
                Feature::Forecast => {
                    r#"array of {"hour": integer from 1, "pm25": number, "pm10": number, "confidence": number 0-1}"#
                }
                Feature::PollutionSource => {
                    r#"{"primary": string, "confidence": number 0-1, "contributors": [{"source": string, "share": number 0-1}], "explanation": string}"#
                }
                Feature::HealthRisk => {
                    r#"object keyed by general, children, elderly, respiratory; each {"level": "low"|"moderate"|"high"|"very_high", "score": number 0-10, "advice": string}"#
                }
                Feature::Ventilation => {
                    r#"{"schedule": [{"start_hour": integer, "end_hour": integer, "action": string, "reason": string}], "recommendations": [string]}"#
                }
                Feature::Layout => {
                    r#"{"issues": [{"area": string, "issue": string, "suggestion": string, "priority": "low"|"medium"|"high"}], "overall_score": number 0-10}"#
                }
            };
            format!("- {}: {}\n", f.key(), shape)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisOptions, FeatureSet, SourceKind};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn payload(mode: AnalysisMode, options: AnalysisOptions) -> AnalysisPayload {
        AnalysisPayload {
            mode,
            source: SourceKind::Thingspeak,
            requested_at: Utc::now(),
            features: FeatureSet::for_mode(mode),
            time_series: vec![TimeSeriesEntry::new("2024-01-01T00:00:00Z", 0).with(Metric::Pm25, 12.5)],
            frames: Vec::new(),
            sensor_summary: BTreeMap::new(),
            options,
            total_entries: 1,
            spike_count: None,
        }
    }

    #[test]
    fn test_forecast_prompt_lists_required_keys() {
        let prompt = build_prompt(&payload(
            AnalysisMode::Forecast,
            AnalysisOptions {
                forecast_hours: Some(12),
                ..AnalysisOptions::default()
            },
        ));
        assert!(prompt.contains("next 12 hours"));
        assert!(prompt.contains("- forecast: array"));
        assert!(prompt.contains("- pollution_source: {"));
        assert!(!prompt.contains("health_risk_groups"));
        assert!(prompt.contains("2024-01-01T00:00:00Z pm25=12.5"));
    }

    #[test]
    fn test_chat_prompt_carries_message() {
        let prompt = build_prompt(&payload(
            AnalysisMode::Chat,
            AnalysisOptions {
                message: Some("Is it safe to jog?".to_string()),
                ..AnalysisOptions::default()
            },
        ));
        assert!(prompt.contains("Is it safe to jog?"));
        assert!(prompt.contains("0 image(s)"));
    }

    #[test]
    fn test_no_placeholders_left() {
        for mode in [
            AnalysisMode::Forecast,
            AnalysisMode::SourceDetection,
            AnalysisMode::HealthRisk,
            AnalysisMode::RoomAdvisor,
            AnalysisMode::Chat,
        ] {
            let prompt = build_prompt(&payload(mode, AnalysisOptions::default()));
            for placeholder in ["{source}", "{total}", "{task}", "{hours}", "{frames}", "{message}"] {
                assert!(!prompt.contains(placeholder), "{mode}: {placeholder} left in prompt");
            }
        }
    }
}
