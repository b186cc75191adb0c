//! Shared data structures for the sensor normalization and AI analysis pipeline
//!
//! This module defines the core types flowing between stages:
//! - Stage 1: provider payload → [`TimeSeriesEntry`] rows with a [`FieldMapping`]
//! - Stage 2: [`NormalizedDataset`] with [`SensorSummary`] and row accounting
//! - Stage 3: [`AnalysisPayload`] (bounded, per mode)
//! - Stage 4: [`AnalysisResult`] + [`AnalysisProvenance`] from the orchestrator

mod analysis;
mod metric;
mod series;

pub use analysis::*;
pub use metric::*;
pub use series::*;
