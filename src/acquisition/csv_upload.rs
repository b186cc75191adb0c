//! CSV upload adapter and dataset export
//!
//! Upload format: header row, comma separated, one reading per row, e.g.
//! `timestamp,pm2.5,pm10,temperature,humidity,noise`. Headers are mapped by
//! name first and positionally only when nothing matched. Rows the CSV
//! reader rejects are reported in `meta.errors` and skipped.

use super::{assemble, SourceError};
use crate::config::defaults;
use crate::processing::FieldMapper;
use crate::types::{Metric, NormalizedDataset, SourceDetails, SourceKind, TimeSeriesEntry};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::path::Path;
use tracing::{info, warn};

const ALLOWED_EXTENSIONS: [&str; 2] = ["csv", "txt"];

/// Columns written by [`to_csv`], in order. `co2` is appended only when the
/// dataset carries it.
const EXPORT_COLUMNS: [(&str, Metric); 5] = [
    ("pm2.5", Metric::Pm25),
    ("pm10", Metric::Pm10),
    ("temperature", Metric::Temperature),
    ("humidity", Metric::Humidity),
    ("noise", Metric::Noise),
];

/// Sample file offered for download.
pub const SAMPLE_CSV: &str = "\
timestamp,pm2.5,pm10,temperature,humidity,noise
2024-03-01T08:00:00Z,12.4,20.1,21.5,41,38
2024-03-01T08:05:00Z,13.0,21.7,21.6,41,40
2024-03-01T08:10:00Z,18.9,29.3,21.8,42,52
2024-03-01T08:15:00Z,,31.0,21.9,42,55
2024-03-01T08:20:00Z,35.2,48.6,22.1,43,61
2024-03-01T08:25:00Z,82.7,115.4,22.4,44,67
2024-03-01T08:30:00Z,41.3,60.2,22.3,44,58
2024-03-01T08:35:00Z,22.8,35.9,22.0,43,47
2024-03-01T08:40:00Z,15.1,24.4,21.8,42,
2024-03-01T08:45:00Z,12.9,20.8,21.7,42,39
";

/// An uploaded file.
#[derive(Debug, Clone, Copy)]
pub struct CsvUpload<'a> {
    pub file_name: &'a str,
    pub contents: &'a [u8],
}

/// CSV adapter. Stateless apart from the size cap.
#[derive(Debug, Clone)]
pub struct CsvAdapter {
    max_bytes: usize,
}

impl Default for CsvAdapter {
    fn default() -> Self {
        Self::new(defaults::MAX_UPLOAD_BYTES)
    }
}

impl CsvAdapter {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Parse an upload, synthesizing timestamps relative to the current time.
    pub fn parse(&self, upload: CsvUpload<'_>) -> Result<NormalizedDataset, SourceError> {
        self.parse_at(upload, Utc::now())
    }

    /// Parse an upload with an explicit "now" for synthesized timestamps.
    pub fn parse_at(
        &self,
        upload: CsvUpload<'_>,
        now: DateTime<Utc>,
    ) -> Result<NormalizedDataset, SourceError> {
        self.validate(&upload)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(upload.contents);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(SourceError::EmptyFile);
        }

        let (mapping, positional) = FieldMapper::map_csv_headers(&headers);
        if positional {
            warn!(file = upload.file_name, "No CSV header matched a metric, using column positions");
        }

        let column_of = |name: &str| headers.iter().position(|h| h == name);
        let metric_columns: Vec<(Metric, usize)> = mapping
            .metrics
            .iter()
            .filter_map(|(metric, name)| column_of(name).map(|i| (*metric, i)))
            .collect();
        let timestamp_column = mapping.timestamp.as_deref().and_then(column_of);

        let mut errors = Vec::new();
        let mut parsed: Vec<(Option<String>, TimeSeriesEntry)> = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    errors.push(format!("row {}: {}", row + 2, e));
                    continue;
                }
            };
            if record.iter().all(str::is_empty) {
                continue;
            }

            let index = parsed.len();
            let mut entry = TimeSeriesEntry::new(String::new(), index);
            for (metric, col) in &metric_columns {
                entry.set(*metric, record.get(*col).and_then(parse_number));
            }
            let stamp = timestamp_column
                .and_then(|c| record.get(c))
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            parsed.push((stamp, entry));
        }

        if parsed.is_empty() {
            return Err(SourceError::EmptyFile);
        }

        let total = parsed.len();
        let mut synthesized = false;
        let rows: Vec<TimeSeriesEntry> = parsed
            .into_iter()
            .map(|(stamp, mut entry)| {
                let index = entry.index;
                entry.timestamp = stamp.unwrap_or_else(|| {
                    synthesized = true;
                    synthetic_timestamp(now, index, total)
                });
                entry
            })
            .collect();

        if !errors.is_empty() {
            warn!(file = upload.file_name, errors = errors.len(), "CSV rows skipped");
        }
        info!(file = upload.file_name, rows = total, synthesized, "CSV parsed");

        let mut details = SourceDetails::new(upload.file_name, mapping);
        details.timestamps_synthesized = synthesized;
        assemble(SourceKind::Csv, details, rows, errors)
    }

    fn validate(&self, upload: &CsvUpload<'_>) -> Result<(), SourceError> {
        let extension = Path::new(upload.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(SourceError::UnsupportedFileType(upload.file_name.to_string()));
        }
        if upload.contents.len() > self.max_bytes {
            return Err(SourceError::FileTooLarge {
                size: upload.contents.len(),
                limit: self.max_bytes,
            });
        }
        if upload.contents.iter().all(u8::is_ascii_whitespace) {
            return Err(SourceError::EmptyFile);
        }
        Ok(())
    }
}

/// Row `i` of `total` sits `(total - 1 - i)` minutes before `now`.
fn synthetic_timestamp(now: DateTime<Utc>, index: usize, total: usize) -> String {
    let steps = total.saturating_sub(1).saturating_sub(index) as i64;
    (now - Duration::seconds(steps * defaults::SYNTHETIC_TIMESTAMP_STEP_SECS))
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Write a dataset in the upload format so it re-imports unchanged.
pub fn to_csv(dataset: &NormalizedDataset) -> Result<String, SourceError> {
    let with_co2 = dataset.time_series.iter().any(|e| e.co2.is_some());
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["timestamp"];
    header.extend(EXPORT_COLUMNS.iter().map(|(name, _)| *name));
    if with_co2 {
        header.push("co2");
    }
    writer.write_record(&header)?;

    for entry in &dataset.time_series {
        let mut record = vec![entry.timestamp.clone()];
        record.extend(EXPORT_COLUMNS.iter().map(|(_, m)| format_value(entry.get(*m))));
        if with_co2 {
            record.push(format_value(entry.co2));
        }
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SourceError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|e| SourceError::InvalidInput(e.to_string()))
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
