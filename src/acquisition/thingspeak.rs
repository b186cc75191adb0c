//! ThingSpeak channel-feed adapter
//!
//! `GET {base}/channels/{id}/feeds.json?api_key=..&results=N` returns the
//! channel metadata (labels for the generic `field1..field8` slots) and the
//! feed rows. Slot labels drive the [`FieldMapper`]; the API key is only ever
//! sent upstream and never stored in the dataset.

use super::{assemble, http_client, SourceError};
use crate::config::{defaults, ThingSpeakConfig};
use crate::processing::FieldMapper;
use crate::types::{NormalizedDataset, SourceDetails, SourceKind, TimeSeriesEntry};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

const PROVIDER: &str = "ThingSpeak";

/// Number of generic field slots a channel exposes.
const FIELD_SLOTS: usize = 8;

/// Channel metadata block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelInfo {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `field1..field8` labels plus anything else the provider adds.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ChannelInfo {
    fn slot_label(&self, slot: &str) -> Option<&str> {
        self.extra
            .get(slot)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// One feed row. Slot values arrive as strings, numbers or null.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedRow {
    pub created_at: String,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

/// Full `feeds.json` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelFeed {
    #[serde(default)]
    pub channel: ChannelInfo,
    #[serde(default)]
    pub feeds: Vec<FeedRow>,
}

/// Parameters for one channel fetch.
#[derive(Debug, Clone, Default)]
pub struct ThingSpeakRequest {
    pub channel_id: String,
    /// Read key for private channels.
    pub api_key: Option<String>,
    /// Requested row count, clamped to the provider limit.
    pub results: Option<usize>,
}

/// Channel-feed adapter.
pub struct ThingSpeakAdapter {
    http: reqwest::Client,
    config: ThingSpeakConfig,
}

impl ThingSpeakAdapter {
    pub fn new(config: &ThingSpeakConfig) -> Result<Self, SourceError> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            config: config.clone(),
        })
    }

    /// Fetch and normalize a channel feed.
    pub async fn fetch(&self, request: &ThingSpeakRequest) -> Result<NormalizedDataset, SourceError> {
        let channel_id = request.channel_id.trim();
        if channel_id.is_empty() {
            return Err(SourceError::InvalidInput("channel id is required".to_string()));
        }
        if !channel_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(SourceError::InvalidInput(format!(
                "channel id '{channel_id}' must be numeric"
            )));
        }

        let results = clamp_results(request.results.unwrap_or(self.config.default_results));
        let url = format!(
            "{}/channels/{}/feeds.json",
            self.config.base_url.trim_end_matches('/'),
            channel_id
        );

        let mut query: Vec<(&str, String)> = vec![("results", results.to_string())];
        if let Some(key) = request.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            query.push(("api_key", key.trim().to_string()));
        }

        info!(channel = channel_id, results, "Fetching ThingSpeak channel feed");
        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                provider: PROVIDER,
                source: e.without_url(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                provider: PROVIDER,
                status,
            });
        }

        let body = resp.text().await.map_err(|e| SourceError::Transport {
            provider: PROVIDER,
            source: e.without_url(),
        })?;
        let feed: ChannelFeed =
            serde_json::from_str(&body).map_err(|e| SourceError::MalformedBody {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        normalize_channel_feed(channel_id, feed)
    }
}

/// Clamp a requested result count to `1..=8000`.
pub fn clamp_results(results: usize) -> usize {
    results.clamp(1, defaults::THINGSPEAK_MAX_RESULTS)
}

/// Turn a parsed channel feed into a dataset. Pure, no I/O.
pub fn normalize_channel_feed(
    channel_id: &str,
    feed: ChannelFeed,
) -> Result<NormalizedDataset, SourceError> {
    if feed.feeds.is_empty() {
        return Err(SourceError::NoData(format!(
            "channel {channel_id} returned no feed entries"
        )));
    }

    let slots: Vec<String> = (1..=FIELD_SLOTS).map(|i| format!("field{i}")).collect();
    let labelled: Vec<(&str, &str)> = slots
        .iter()
        .filter_map(|slot| feed.channel.slot_label(slot).map(|label| (slot.as_str(), label)))
        .collect();

    let mut mapping = FieldMapper::map_labels(labelled);
    // Slot labels never describe the row timestamp; it is always `created_at`.
    mapping.timestamp = Some("created_at".to_string());

    if !mapping.has_metrics() {
        return Err(SourceError::NoData(format!(
            "channel {channel_id} has no fields recognisable as sensor metrics"
        )));
    }

    let rows: Vec<TimeSeriesEntry> = feed
        .feeds
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut entry = TimeSeriesEntry::new(row.created_at.clone(), index);
            for (metric, column) in &mapping.metrics {
                entry.set(*metric, row.fields.get(column).and_then(coerce_number));
            }
            entry
        })
        .collect();

    debug!(channel = channel_id, rows = rows.len(), "Channel feed mapped");

    let mut details = SourceDetails::new(channel_id, mapping);
    details.name = feed.channel.name.clone();
    details.description = feed.channel.description.clone();

    assemble(SourceKind::Thingspeak, details, rows, Vec::new())
}

/// Slot values are strings in practice; numbers are accepted too.
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}
