//! CSV dataset endpoints

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::warn;

use crate::acquisition::csv_upload::SAMPLE_CSV;
use crate::acquisition::{clean_dataset, CsvAdapter, CsvUpload, SourceError};
use crate::api::envelope::{DatasetEnvelope, ErrorEnvelope};
use crate::processing::CleaningMethod;

use super::AppState;

/// Query parameters for a CSV upload
#[derive(Debug, Default, Deserialize)]
pub struct CsvUploadQuery {
    /// Original file name; its extension is validated
    pub file_name: Option<String>,
    /// Optional gap filling (`linear`, `forward_fill`, `drop`)
    pub clean: Option<String>,
}

/// POST /api/datasets/csv - raw CSV body → normalized dataset
pub async fn upload_csv(
    State(state): State<AppState>,
    Query(query): Query<CsvUploadQuery>,
    body: Bytes,
) -> Response {
    let method = match query.clean.as_deref().map(str::parse::<CleaningMethod>) {
        Some(Ok(method)) => Some(method),
        Some(Err(e)) => return ErrorEnvelope::bad_request(e),
        None => None,
    };

    let file_name = query.file_name.as_deref().unwrap_or("upload.csv");
    let adapter = CsvAdapter::new(state.max_upload_bytes);

    match adapter.parse(CsvUpload {
        file_name,
        contents: &body,
    }) {
        Ok(dataset) => {
            let dataset = match method {
                Some(method) => clean_dataset(dataset, method),
                None => dataset,
            };
            DatasetEnvelope::with_data(dataset).into_response()
        }
        Err(e) => source_error_response(&e),
    }
}

/// GET /api/datasets/sample.csv
pub async fn sample_csv() -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"sample-sensor-data.csv\"",
            ),
        ],
        SAMPLE_CSV,
    )
        .into_response()
}

/// Map an adapter failure to a status: input problems and empty results are
/// 400, provider problems 502.
pub fn source_error_response(e: &SourceError) -> Response {
    warn!(error = %e, "Dataset request failed");
    match e {
        _ if e.is_input_error() => ErrorEnvelope::bad_request(e.to_string()),
        SourceError::NoData(_) => ErrorEnvelope::bad_request(e.to_string()),
        _ => ErrorEnvelope::upstream(e.to_string()),
    }
}
