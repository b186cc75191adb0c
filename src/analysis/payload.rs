//! Payload shaping for AI analysis
//!
//! A payload is always bounded: the series is cut to the most recent N
//! entries for the mode and frames are capped. Source detection first keeps
//! only spike entries so the model looks at anomalies.

use crate::config::defaults;
use crate::types::{
    AnalysisMode, AnalysisOptions, AnalysisPayload, FeatureSet, Frame, NormalizedDataset,
    TimeSeriesEntry,
};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Caller-supplied extras for [`PayloadBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct PayloadOptions {
    pub options: AnalysisOptions,
    pub frames: Vec<Frame>,
    /// Explicit feature flags; `None` uses the mode's defaults.
    pub features: Option<FeatureSet>,
}

/// Most recent entries kept for a mode.
pub fn sample_size(mode: AnalysisMode) -> usize {
    match mode {
        AnalysisMode::Forecast => defaults::FORECAST_SAMPLE_SIZE,
        AnalysisMode::HealthRisk => defaults::HEALTH_RISK_SAMPLE_SIZE,
        AnalysisMode::RoomAdvisor => defaults::ROOM_ADVISOR_SAMPLE_SIZE,
        AnalysisMode::SourceDetection => defaults::SOURCE_DETECTION_SAMPLE_SIZE,
        AnalysisMode::Chat => defaults::CHAT_SAMPLE_SIZE,
    }
}

/// Frame cap for a mode.
pub fn frame_cap(mode: AnalysisMode) -> usize {
    match mode {
        AnalysisMode::Chat => defaults::CHAT_MAX_FRAMES,
        _ => defaults::MAX_FRAMES,
    }
}

/// `pm25 > 75` or `pm10 > 100`.
pub fn is_spike(entry: &TimeSeriesEntry) -> bool {
    entry.pm25.is_some_and(|v| v > defaults::SPIKE_PM25)
        || entry.pm10.is_some_and(|v| v > defaults::SPIKE_PM10)
}

/// Caps a requested horizon at [`defaults::MAX_FORECAST_HOURS`].
pub fn clamp_forecast_hours(hours: u32) -> u32 {
    hours.min(defaults::MAX_FORECAST_HOURS)
}

/// Builds [`AnalysisPayload`]s from datasets.
pub struct PayloadBuilder;

impl PayloadBuilder {
    pub fn build(
        mode: AnalysisMode,
        dataset: &NormalizedDataset,
        extras: PayloadOptions,
    ) -> AnalysisPayload {
        Self::build_at(mode, dataset, extras, Utc::now())
    }

    /// Same as [`build`](Self::build) with an explicit `requestedAt`.
    pub fn build_at(
        mode: AnalysisMode,
        dataset: &NormalizedDataset,
        extras: PayloadOptions,
        requested_at: DateTime<Utc>,
    ) -> AnalysisPayload {
        let PayloadOptions {
            mut options,
            mut frames,
            features,
        } = extras;

        let (candidates, spike_count): (Vec<&TimeSeriesEntry>, Option<usize>) =
            if mode == AnalysisMode::SourceDetection {
                let spikes: Vec<&TimeSeriesEntry> =
                    dataset.time_series.iter().filter(|e| is_spike(e)).collect();
                let count = spikes.len();
                (spikes, Some(count))
            } else {
                (dataset.time_series.iter().collect(), None)
            };

        let keep = sample_size(mode);
        let skip = candidates.len().saturating_sub(keep);
        let time_series: Vec<TimeSeriesEntry> =
            candidates.into_iter().skip(skip).cloned().collect();

        frames.truncate(frame_cap(mode));

        let features = features.unwrap_or_else(|| FeatureSet::for_mode(mode));
        if features.forecast && options.forecast_hours.is_none() {
            options.forecast_hours = Some(defaults::DEFAULT_FORECAST_HOURS);
        }
        options.forecast_hours = options.forecast_hours.map(clamp_forecast_hours);
        if features.health_risk && options.exposure_hours.is_none() {
            options.exposure_hours = Some(defaults::DEFAULT_EXPOSURE_HOURS);
        }

        debug!(
            mode = mode.as_str(),
            total = dataset.time_series.len(),
            sampled = time_series.len(),
            frames = frames.len(),
            ?spike_count,
            "Analysis payload built"
        );

        AnalysisPayload {
            mode,
            source: dataset.source,
            requested_at,
            features,
            time_series,
            frames,
            sensor_summary: dataset.sensor_summary.clone(),
            options,
            total_entries: dataset.time_series.len(),
            spike_count,
        }
    }

    /// Re-applies the mode bounds to a payload built elsewhere.
    ///
    /// Keeps the most recent `sample_size(mode)` entries, the first
    /// `frame_cap(mode)` frames and a clamped forecast horizon.
    pub fn bound(mut payload: AnalysisPayload) -> AnalysisPayload {
        let mode = payload.mode;
        let received = (payload.time_series.len(), payload.frames.len());

        let skip = payload.time_series.len().saturating_sub(sample_size(mode));
        payload.time_series.drain(..skip);
        payload.frames.truncate(frame_cap(mode));
        payload.options.forecast_hours = payload.options.forecast_hours.map(clamp_forecast_hours);

        if received != (payload.time_series.len(), payload.frames.len()) {
            debug!(
                mode = mode.as_str(),
                entries = received.0,
                frames = received.1,
                kept_entries = payload.time_series.len(),
                kept_frames = payload.frames.len(),
                "Payload trimmed to mode bounds"
            );
        }
        payload
    }
}
