//! OpenAQ public air-quality adapter
//!
//! Issues one `GET {base}/measurements?city=..&parameter=..` per requested
//! parameter concurrently, then merges the answers into one series keyed by
//! timestamp. Later parameters overwrite nothing but their own metric, and a
//! repeated timestamp within one parameter keeps the last value seen.

use super::{assemble, http_client, SourceError};
use crate::config::OpenAqConfig;
use crate::types::{
    FieldMapping, Metric, NormalizedDataset, SourceDetails, SourceKind, TimeSeriesEntry,
};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

const PROVIDER: &str = "OpenAQ";

/// Provider cap on `limit`.
const MAX_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementDate {
    pub utc: String,
    #[serde(default)]
    pub local: Option<String>,
}

/// One row of `/measurements`.
#[derive(Debug, Clone, Deserialize)]
pub struct Measurement {
    pub date: MeasurementDate,
    pub parameter: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementsResponse {
    #[serde(default)]
    pub results: Vec<Measurement>,
}

/// Parameters for one city fetch.
#[derive(Debug, Clone, Default)]
pub struct OpenAqRequest {
    pub city: String,
    /// OpenAQ parameter names; empty means the configured defaults.
    pub parameters: Vec<String>,
    pub limit: Option<usize>,
}

/// Public-API adapter.
pub struct OpenAqAdapter {
    http: reqwest::Client,
    config: OpenAqConfig,
    api_key: Option<String>,
}

impl OpenAqAdapter {
    pub fn new(config: &OpenAqConfig, api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            config: config.clone(),
            api_key,
        })
    }

    /// Fetch every requested parameter for a city and merge the results.
    pub async fn fetch(&self, request: &OpenAqRequest) -> Result<NormalizedDataset, SourceError> {
        let city = request.city.trim();
        if city.is_empty() {
            return Err(SourceError::InvalidInput("city is required".to_string()));
        }

        let requested = if request.parameters.is_empty() {
            &self.config.default_parameters
        } else {
            &request.parameters
        };
        let parameters = resolve_parameters(requested)?;
        let limit = request
            .limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, MAX_LIMIT);

        info!(city, parameters = parameters.len(), limit, "Fetching OpenAQ measurements");

        let fetches = parameters
            .iter()
            .map(|(name, metric)| async move {
                let rows = self.fetch_parameter(city, name, limit).await?;
                Ok::<_, SourceError>((*metric, rows))
            });
        let per_parameter = try_join_all(fetches).await?;

        let mut mapping = FieldMapping {
            timestamp: Some("date.utc".to_string()),
            ..FieldMapping::default()
        };
        for (name, metric) in &parameters {
            mapping.metrics.entry(*metric).or_insert_with(|| name.clone());
        }

        let rows = merge_measurements(&per_parameter);
        if rows.is_empty() {
            return Err(SourceError::NoData(format!(
                "no measurements found for city '{city}'"
            )));
        }

        let mut details = SourceDetails::new(city, mapping);
        details.parameters = parameters.into_iter().map(|(name, _)| name).collect();
        assemble(SourceKind::Openaq, details, rows, Vec::new())
    }

    async fn fetch_parameter(
        &self,
        city: &str,
        parameter: &str,
        limit: usize,
    ) -> Result<Vec<Measurement>, SourceError> {
        let url = format!("{}/measurements", self.config.base_url.trim_end_matches('/'));
        let limit = limit.to_string();
        let mut req = self.http.get(&url).query(&[
            ("city", city),
            ("parameter", parameter),
            ("limit", limit.as_str()),
            ("order_by", "datetime"),
            ("sort", "desc"),
        ]);
        if let Some(key) = &self.api_key {
            req = req.header("X-API-Key", key);
        }

        let resp = req.send().await.map_err(|e| SourceError::Transport {
            provider: PROVIDER,
            source: e,
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                provider: PROVIDER,
                status,
            });
        }

        let body: MeasurementsResponse = resp.json().await.map_err(|e| {
            SourceError::MalformedBody {
                provider: PROVIDER,
                message: e.to_string(),
            }
        })?;
        debug!(parameter, rows = body.results.len(), "OpenAQ parameter fetched");
        Ok(body.results)
    }
}

/// Map OpenAQ parameter names to metrics, rejecting unsupported ones.
/// Duplicates are ignored; order is kept.
pub fn resolve_parameters(names: &[String]) -> Result<Vec<(String, Metric)>, SourceError> {
    let mut out: Vec<(String, Metric)> = Vec::new();
    let mut unknown = Vec::new();
    for name in names {
        let name = name.trim().to_lowercase();
        match Metric::from_name(&name) {
            Some(metric) => {
                if !out.iter().any(|(n, _)| *n == name) {
                    out.push((name, metric));
                }
            }
            None => unknown.push(name),
        }
    }
    if !unknown.is_empty() {
        return Err(SourceError::InvalidInput(format!(
            "unsupported OpenAQ parameter(s): {}",
            unknown.join(", ")
        )));
    }
    if out.is_empty() {
        return Err(SourceError::InvalidInput(
            "at least one parameter is required".to_string(),
        ));
    }
    Ok(out)
}

/// Merge per-parameter measurements into one ascending series.
///
/// Rows are keyed by `date.utc`; parameters are applied in request order and
/// within a parameter the last row for a timestamp wins. Indices are assigned
/// after sorting.
pub fn merge_measurements(per_parameter: &[(Metric, Vec<Measurement>)]) -> Vec<TimeSeriesEntry> {
    let mut by_timestamp: HashMap<&str, TimeSeriesEntry> = HashMap::new();

    for (metric, rows) in per_parameter {
        for row in rows {
            let entry = by_timestamp
                .entry(row.date.utc.as_str())
                .or_insert_with(|| TimeSeriesEntry::new(row.date.utc.clone(), 0));
            entry.set(*metric, Some(row.value));
        }
    }

    let mut merged: Vec<TimeSeriesEntry> = by_timestamp.into_values().collect();
    merged.sort_by(|a, b| sort_key(&a.timestamp).cmp(&sort_key(&b.timestamp)));
    for (i, entry) in merged.iter_mut().enumerate() {
        entry.index = i;
    }
    merged
}

/// Parsed instant first, raw text as tiebreak for unparseable stamps.
fn sort_key(timestamp: &str) -> (Option<DateTime<Utc>>, &str) {
    let parsed = DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|d| d.with_timezone(&Utc));
    (parsed, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(utc: &str, parameter: &str, value: f64) -> Measurement {
        Measurement {
            date: MeasurementDate {
                utc: utc.to_string(),
                local: None,
            },
            parameter: parameter.to_string(),
            value,
            unit: Some("µg/m³".to_string()),
            location: Some("Station A".to_string()),
        }
    }

    #[test]
    fn test_merge_by_timestamp_sorted_and_reindexed() {
        let pm25 = vec![
            m("2024-03-01T02:00:00Z", "pm25", 15.0),
            m("2024-03-01T01:00:00Z", "pm25", 12.0),
        ];
        let pm10 = vec![
            m("2024-03-01T01:00:00Z", "pm10", 30.0),
            m("2024-03-01T03:00:00Z", "pm10", 33.0),
        ];
        let merged = merge_measurements(&[(Metric::Pm25, pm25), (Metric::Pm10, pm10)]);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].timestamp, "2024-03-01T01:00:00Z");
        assert_eq!(merged[0].pm25, Some(12.0));
        assert_eq!(merged[0].pm10, Some(30.0));
        assert_eq!(merged[1].pm10, None);
        assert_eq!(merged[2].pm25, None);
        assert_eq!(merged[2].pm10, Some(33.0));
        let indices: Vec<usize> = merged.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_merge_last_write_wins_within_parameter() {
        let pm25 = vec![
            m("2024-03-01T01:00:00Z", "pm25", 10.0),
            m("2024-03-01T01:00:00Z", "pm25", 11.0),
        ];
        let merged = merge_measurements(&[(Metric::Pm25, pm25)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pm25, Some(11.0));
    }

    #[test]
    fn test_resolve_parameters() {
        let ok = resolve_parameters(&["PM25".into(), "pm10".into(), "pm25".into()]).unwrap();
        assert_eq!(
            ok,
            vec![("pm25".to_string(), Metric::Pm25), ("pm10".to_string(), Metric::Pm10)]
        );
        assert!(resolve_parameters(&["o3".into()]).is_err());
        assert!(resolve_parameters(&[]).is_err());
    }

    #[test]
    fn test_response_parses_provider_shape() {
        let body = r#"{"meta":{"found":2},"results":[
            {"date":{"utc":"2024-03-01T01:00:00Z","local":"2024-03-01T02:00:00+01:00"},
             "parameter":"pm25","value":9.5,"unit":"µg/m³","location":"Central"}]}"#;
        let parsed: MeasurementsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].value, 9.5);
    }

    #[tokio::test]
    async fn test_fetch_rejects_missing_city() {
        let adapter = OpenAqAdapter::new(&OpenAqConfig::default(), None).unwrap();
        let err = adapter.fetch(&OpenAqRequest::default()).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidInput(_)));
    }
}
