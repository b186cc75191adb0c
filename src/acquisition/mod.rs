//! Sensor data acquisition module
//!
//! Source adapters turning provider payloads into a [`NormalizedDataset`]:
//! - [`thingspeak`]: channel feeds with generic `field1..field8` slots
//! - [`openaq`]: public air-quality measurements, one request per parameter
//! - [`csv_upload`]: user-supplied CSV files
//!
//! Adapters surface failures as [`SourceError`] and never retry on their own.

pub mod csv_upload;
pub mod openaq;
pub mod thingspeak;

pub use csv_upload::{CsvAdapter, CsvUpload};
pub use openaq::{OpenAqAdapter, OpenAqRequest};
pub use thingspeak::{ThingSpeakAdapter, ThingSpeakRequest};

use crate::processing::{clean, summarize, CleaningMethod};
use crate::types::{DatasetMeta, NormalizedDataset, SourceDetails, SourceKind, TimeSeriesEntry};
use tracing::{info, warn};

/// Data-source failures.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned status {status}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("{provider} returned a malformed body: {message}")]
    MalformedBody {
        provider: &'static str,
        message: String,
    },
    #[error("No data: {0}")]
    NoData(String),
    #[error("The uploaded file is empty")]
    EmptyFile,
    #[error("Unsupported file type '{0}' (expected .csv or .txt)")]
    UnsupportedFileType(String),
    #[error("File is {size} bytes, larger than the {limit} byte limit")]
    FileTooLarge { size: usize, limit: usize },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SourceError {
    /// Input validation failures are the caller's fault and map to 400.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SourceError::InvalidInput(_)
                | SourceError::EmptyFile
                | SourceError::UnsupportedFileType(_)
                | SourceError::FileTooLarge { .. }
                | SourceError::Csv(_)
        )
    }
}

/// Build a dataset from mapped rows.
///
/// Rows without any mapped metric are dropped, so `original_count` is the
/// number of provider rows and `dropped_count` the rows that carried nothing.
/// Fails with [`SourceError::NoData`] when no row survives.
pub fn assemble(
    source: SourceKind,
    mut details: SourceDetails,
    rows: Vec<TimeSeriesEntry>,
    errors: Vec<String>,
) -> Result<NormalizedDataset, SourceError> {
    let original_count = rows.len();
    let time_series: Vec<TimeSeriesEntry> =
        rows.into_iter().filter(TimeSeriesEntry::has_any_metric).collect();
    let cleaned_count = time_series.len();
    details.rows_fetched = original_count;

    if cleaned_count == 0 {
        warn!(
            source = source.as_str(),
            identifier = %details.identifier,
            original = original_count,
            "No usable rows"
        );
        return Err(SourceError::NoData(format!(
            "{} rows from {} carried no usable sensor values",
            original_count, details.identifier
        )));
    }

    info!(
        source = source.as_str(),
        identifier = %details.identifier,
        original = original_count,
        kept = cleaned_count,
        dropped = original_count - cleaned_count,
        "Dataset assembled"
    );

    Ok(NormalizedDataset {
        source,
        source_details: details,
        sensor_summary: summarize(&time_series),
        time_series,
        meta: DatasetMeta {
            original_count,
            cleaned_count,
            dropped_count: original_count - cleaned_count,
            errors,
        },
    })
}

/// Apply gap filling to a dataset and recompute its summary and counts.
///
/// `original_count` is kept, so rows removed by [`CleaningMethod::Drop`]
/// add to `dropped_count`.
pub fn clean_dataset(mut dataset: NormalizedDataset, method: CleaningMethod) -> NormalizedDataset {
    dataset.time_series = clean(&dataset.time_series, method);
    dataset.sensor_summary = summarize(&dataset.time_series);
    dataset.meta.cleaned_count = dataset.time_series.len();
    dataset.meta.dropped_count = dataset
        .meta
        .original_count
        .saturating_sub(dataset.meta.cleaned_count);
    info!(
        method = method.as_str(),
        kept = dataset.meta.cleaned_count,
        dropped = dataset.meta.dropped_count,
        "Dataset cleaned"
    );
    dataset
}

/// Shared `reqwest` client builder for source adapters.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!("airsense/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SourceError::Transport {
            provider: "http client",
            source: e,
        })
}
