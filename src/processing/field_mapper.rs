//! Field mapping heuristics
//!
//! Detects which provider column carries which semantic metric by
//! case-insensitive substring rules over column labels.
//!
//! A label is classified by the first rule that matches it, in the order
//! pm25, pm10, temperature, humidity, noise, co2, timestamp. Once a target is
//! mapped, later labels classified to the same target are ignored.

use crate::types::{FieldMapping, Metric};
use tracing::debug;

/// What a column label was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    Metric(Metric),
    Timestamp,
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    Contains(&'static str),
    Exact(&'static str),
}

impl Pattern {
    fn matches(self, label: &str) -> bool {
        match self {
            Pattern::Contains(needle) => label.contains(needle),
            Pattern::Exact(name) => label == name,
        }
    }
}

/// Ordered classification rules. Earlier rules take priority.
const RULES: &[(FieldTarget, &[Pattern])] = &[
    (
        FieldTarget::Metric(Metric::Pm25),
        &[
            Pattern::Contains("pm2.5"),
            Pattern::Contains("pm25"),
            Pattern::Contains("pm 2.5"),
        ],
    ),
    (
        FieldTarget::Metric(Metric::Pm10),
        &[Pattern::Contains("pm10"), Pattern::Contains("pm 10")],
    ),
    (FieldTarget::Metric(Metric::Temperature), &[Pattern::Contains("temp")]),
    (
        FieldTarget::Metric(Metric::Humidity),
        &[Pattern::Contains("humid"), Pattern::Contains("moisture")],
    ),
    (
        FieldTarget::Metric(Metric::Noise),
        &[
            Pattern::Contains("noise"),
            Pattern::Contains("sound"),
            Pattern::Contains("db"),
            Pattern::Contains("decibel"),
        ],
    ),
    (
        FieldTarget::Metric(Metric::Co2),
        &[Pattern::Contains("co2"), Pattern::Contains("carbon")],
    ),
    (
        FieldTarget::Timestamp,
        &[
            Pattern::Contains("time"),
            Pattern::Contains("date"),
            Pattern::Exact("timestamp"),
            Pattern::Exact("created_at"),
            Pattern::Exact("datetime"),
        ],
    ),
];

/// Metric order used by the CSV positional fallback (`field1..field5`).
const POSITIONAL_METRICS: [Metric; 5] = [
    Metric::Pm25,
    Metric::Pm10,
    Metric::Temperature,
    Metric::Humidity,
    Metric::Noise,
];

/// Classify a single label. Returns `None` for unrecognized labels.
pub fn classify_label(label: &str) -> Option<FieldTarget> {
    let normalized = label.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    RULES
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.matches(&normalized)))
        .map(|(target, _)| *target)
}

/// Stateless mapper over column labels.
pub struct FieldMapper;

impl FieldMapper {
    /// Map `(column_id, display_label)` pairs.
    ///
    /// Channel feeds pass `("field3", "Temperature")`; CSV headers pass the
    /// header as both id and label. Labels that are empty are skipped.
    pub fn map_labels<'a, I>(columns: I) -> FieldMapping
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut mapping = FieldMapping::default();

        for (column, label) in columns {
            let Some(target) = classify_label(label) else {
                continue;
            };
            match target {
                FieldTarget::Metric(metric) => {
                    mapping
                        .metrics
                        .entry(metric)
                        .or_insert_with(|| column.to_string());
                }
                FieldTarget::Timestamp => {
                    if mapping.timestamp.is_none() {
                        mapping.timestamp = Some(column.to_string());
                    }
                }
            }
        }

        debug!(
            metrics = mapping.metrics.len(),
            has_timestamp = mapping.timestamp.is_some(),
            "Field mapping derived"
        );
        mapping
    }

    /// Map CSV headers by name only.
    pub fn map_headers<S: AsRef<str>>(headers: &[S]) -> FieldMapping {
        Self::map_labels(headers.iter().map(|h| (h.as_ref(), h.as_ref())))
    }

    /// Map CSV headers, falling back to positions when no metric matched by name.
    ///
    /// Fallback order: headers literally named `field1..field5` map to pm25,
    /// pm10, temperature, humidity, noise. If none of those names exist, the
    /// columns after the first are taken by position in the same order. The
    /// first column becomes the timestamp when no timestamp was named and it
    /// is not already claimed by a metric.
    ///
    /// Returns the mapping and whether the fallback was used.
    pub fn map_csv_headers<S: AsRef<str>>(headers: &[S]) -> (FieldMapping, bool) {
        let mut mapping = Self::map_headers(headers);
        if mapping.has_metrics() || headers.is_empty() {
            return (mapping, false);
        }

        let names: Vec<&str> = headers.iter().map(AsRef::as_ref).collect();
        let slot_name = |i: usize| format!("field{}", i + 1);
        let has_slot_names = (0..POSITIONAL_METRICS.len())
            .any(|i| names.iter().any(|n| n.trim().eq_ignore_ascii_case(&slot_name(i))));

        for (i, metric) in POSITIONAL_METRICS.iter().enumerate() {
            let column = if has_slot_names {
                names
                    .iter()
                    .find(|n| n.trim().eq_ignore_ascii_case(&slot_name(i)))
                    .copied()
            } else {
                names.get(i + 1).copied()
            };
            if let Some(column) = column {
                mapping.metrics.insert(*metric, column.to_string());
            }
        }

        if mapping.timestamp.is_none() {
            let first = names[0];
            let claimed = mapping.metrics.values().any(|c| c == first);
            if !claimed {
                mapping.timestamp = Some(first.to_string());
            }
        }

        debug!(
            metrics = mapping.metrics.len(),
            by_slot_name = has_slot_names,
            "Positional CSV mapping fallback applied"
        );
        (mapping, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_labels() {
        let mapping = FieldMapper::map_headers(&["Timestamp", "PM2.5 (ug/m3)", "Temp C"]);
        assert_eq!(mapping.timestamp.as_deref(), Some("Timestamp"));
        assert_eq!(mapping.column_for(Metric::Pm25), Some("PM2.5 (ug/m3)"));
        assert_eq!(mapping.column_for(Metric::Temperature), Some("Temp C"));
        assert_eq!(mapping.column_for(Metric::Humidity), None);
        assert_eq!(mapping.column_for(Metric::Noise), None);
        assert_eq!(mapping.column_for(Metric::Co2), None);
    }

    #[test]
    fn test_first_matching_label_wins() {
        let mapping = FieldMapper::map_headers(&["temp_indoor", "temp_outdoor"]);
        assert_eq!(mapping.column_for(Metric::Temperature), Some("temp_indoor"));
    }

    #[test]
    fn test_earlier_rule_takes_priority() {
        // "pm10 db" matches both pm10 and noise; pm10 is declared first.
        assert_eq!(
            classify_label("PM10 dB"),
            Some(FieldTarget::Metric(Metric::Pm10))
        );
        let mapping = FieldMapper::map_headers(&["PM10 dB"]);
        assert_eq!(mapping.column_for(Metric::Noise), None);
    }

    #[test]
    fn test_synonyms() {
        assert_eq!(classify_label("Soil Moisture"), Some(FieldTarget::Metric(Metric::Humidity)));
        assert_eq!(classify_label("Sound Level"), Some(FieldTarget::Metric(Metric::Noise)));
        assert_eq!(classify_label("Carbon Dioxide"), Some(FieldTarget::Metric(Metric::Co2)));
        assert_eq!(classify_label("pm 2.5"), Some(FieldTarget::Metric(Metric::Pm25)));
        assert_eq!(classify_label("created_at"), Some(FieldTarget::Timestamp));
        assert_eq!(classify_label("Reading Date"), Some(FieldTarget::Timestamp));
        assert_eq!(classify_label("entry_id"), None);
        assert_eq!(classify_label("   "), None);
    }

    #[test]
    fn test_channel_labels_keep_slot_ids() {
        let mapping = FieldMapper::map_labels([
            ("field1", "PM2.5"),
            ("field2", "PM10"),
            ("field3", "Humidity %"),
            ("field4", ""),
        ]);
        assert_eq!(mapping.column_for(Metric::Pm25), Some("field1"));
        assert_eq!(mapping.column_for(Metric::Pm10), Some("field2"));
        assert_eq!(mapping.column_for(Metric::Humidity), Some("field3"));
        assert_eq!(mapping.metrics.len(), 3);
    }

    #[test]
    fn test_csv_named_headers_skip_fallback() {
        let (mapping, fallback) = FieldMapper::map_csv_headers(&["timestamp", "pm2.5", "pm10"]);
        assert!(!fallback);
        assert_eq!(mapping.column_for(Metric::Pm10), Some("pm10"));
    }

    #[test]
    fn test_csv_fallback_by_slot_name() {
        let (mapping, fallback) =
            FieldMapper::map_csv_headers(&["created_at", "entry_id", "field1", "field2", "field3"]);
        assert!(fallback);
        assert_eq!(mapping.timestamp.as_deref(), Some("created_at"));
        assert_eq!(mapping.column_for(Metric::Pm25), Some("field1"));
        assert_eq!(mapping.column_for(Metric::Pm10), Some("field2"));
        assert_eq!(mapping.column_for(Metric::Temperature), Some("field3"));
        assert_eq!(mapping.column_for(Metric::Humidity), None);
    }

    #[test]
    fn test_csv_fallback_by_position() {
        let (mapping, fallback) = FieldMapper::map_csv_headers(&["a", "b", "c"]);
        assert!(fallback);
        assert_eq!(mapping.timestamp.as_deref(), Some("a"));
        assert_eq!(mapping.column_for(Metric::Pm25), Some("b"));
        assert_eq!(mapping.column_for(Metric::Pm10), Some("c"));
        assert_eq!(mapping.column_for(Metric::Temperature), None);
    }
}
