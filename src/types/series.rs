//! Normalized time-series data model
//!
//! Every source adapter produces a [`NormalizedDataset`]; downstream stages
//! (interpolation, payload shaping) only ever see this shape.

use super::Metric;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Time Series Entry
// ============================================================================

/// One reading row after normalization.
///
/// `index` is the position of the row in the provider's original ordering,
/// not its position after filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesEntry {
    pub timestamp: String,
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm25: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm10: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2: Option<f64>,
}

impl TimeSeriesEntry {
    /// Create an entry with every metric unset.
    pub fn new(timestamp: impl Into<String>, index: usize) -> Self {
        Self {
            timestamp: timestamp.into(),
            index,
            pm25: None,
            pm10: None,
            temperature: None,
            humidity: None,
            noise: None,
            co2: None,
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Pm25 => self.pm25,
            Metric::Pm10 => self.pm10,
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Noise => self.noise,
            Metric::Co2 => self.co2,
        }
    }

    /// Set a metric value. Non-finite values are stored as missing.
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        let slot = match metric {
            Metric::Pm25 => &mut self.pm25,
            Metric::Pm10 => &mut self.pm10,
            Metric::Temperature => &mut self.temperature,
            Metric::Humidity => &mut self.humidity,
            Metric::Noise => &mut self.noise,
            Metric::Co2 => &mut self.co2,
        };
        *slot = value;
    }

    /// Builder form of [`set`](Self::set), handy for fixtures.
    #[must_use]
    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.set(metric, Some(value));
        self
    }

    /// True when at least one metric carries a value.
    pub fn has_any_metric(&self) -> bool {
        Metric::ALL.iter().any(|m| self.get(*m).is_some())
    }
}

// ============================================================================
// Field Mapping
// ============================================================================

/// Inferred correspondence between provider columns and semantic metrics.
///
/// Serializes flat: `{"timestamp": "created_at", "pm25": "field1", ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub metrics: BTreeMap<Metric, String>,
}

impl FieldMapping {
    pub fn column_for(&self, metric: Metric) -> Option<&str> {
        self.metrics.get(&metric).map(String::as_str)
    }

    pub fn has_metrics(&self) -> bool {
        !self.metrics.is_empty()
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Aggregate statistics for one metric. Only emitted when `count >= 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
    pub unit: String,
}

pub type SensorSummary = BTreeMap<Metric, MetricSummary>;

// ============================================================================
// Dataset
// ============================================================================

/// Which adapter produced a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Thingspeak,
    Openaq,
    Csv,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Thingspeak => "thingspeak",
            SourceKind::Openaq => "openaq",
            SourceKind::Csv => "csv",
        }
    }
}

/// Fetch/parse provenance. Never carries credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDetails {
    /// Channel id, city or file name.
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mapping: FieldMapping,
    /// Provider parameters requested (OpenAQ) or skipped as unknown.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    pub rows_fetched: usize,
    #[serde(default)]
    pub timestamps_synthesized: bool,
    pub fetched_at: DateTime<Utc>,
}

impl SourceDetails {
    pub fn new(identifier: impl Into<String>, mapping: FieldMapping) -> Self {
        Self {
            identifier: identifier.into(),
            name: None,
            description: None,
            mapping,
            parameters: Vec::new(),
            rows_fetched: 0,
            timestamps_synthesized: false,
            fetched_at: Utc::now(),
        }
    }
}

/// Row accounting. `cleaned_count == time_series.len()` and
/// `dropped_count == original_count - cleaned_count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMeta {
    pub original_count: usize,
    pub cleaned_count: usize,
    pub dropped_count: usize,
    /// Non-fatal parser errors (CSV only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Common output shape of every source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedDataset {
    pub source: SourceKind,
    pub source_details: SourceDetails,
    pub time_series: Vec<TimeSeriesEntry>,
    pub sensor_summary: SensorSummary,
    pub meta: DatasetMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_rejects_non_finite() {
        let mut entry = TimeSeriesEntry::new("t0", 0);
        entry.set(Metric::Pm25, Some(f64::NAN));
        entry.set(Metric::Pm10, Some(f64::INFINITY));
        assert!(!entry.has_any_metric());
        entry.set(Metric::Noise, Some(41.0));
        assert!(entry.has_any_metric());
    }

    #[test]
    fn test_entry_serializes_without_null_metrics() {
        let entry = TimeSeriesEntry::new("2024-01-01T00:00:00Z", 3).with(Metric::Pm25, 12.5);
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["pm25"], 12.5);
        assert!(v.get("pm10").is_none());
        assert_eq!(v["index"], 3);
    }

    #[test]
    fn test_field_mapping_serializes_flat() {
        let mut mapping = FieldMapping {
            timestamp: Some("created_at".to_string()),
            ..Default::default()
        };
        mapping.metrics.insert(Metric::Pm25, "field1".to_string());

        let v = serde_json::to_value(&mapping).unwrap();
        assert_eq!(v["timestamp"], "created_at");
        assert_eq!(v["pm25"], "field1");

        let back: FieldMapping = serde_json::from_value(v).unwrap();
        assert_eq!(back, mapping);
    }
}
