//! AirSense: environmental sensor normalization and air-quality analysis
//!
//! Ingests sensor feeds from heterogeneous sources, normalizes them into one
//! time-series shape and runs resilient AI analysis over the result.
//!
//! ## Architecture
//!
//! - **Acquisition**: ThingSpeak channel feeds, OpenAQ measurements, CSV uploads
//! - **Processing**: field mapping heuristics, summary statistics, gap filling
//! - **Analysis**: bounded payload shaping and lenient result mapping
//! - **LLM Module**: proxy → direct → retry → deterministic fallback
//! - **API**: axum endpoints for health, the analysis proxy and CSV ingest

pub mod acquisition;
pub mod analysis;
pub mod api;
pub mod config;
pub mod llm;
pub mod processing;
pub mod types;

// Re-export application configuration
pub use config::AppConfig;

// Re-export commonly used types
pub use types::{
    AnalysisMode, AnalysisOutcome, AnalysisPayload, AnalysisResult, Metric, NormalizedDataset,
    TimeSeriesEntry,
};

// Re-export pipeline entry points
pub use acquisition::{CsvAdapter, OpenAqAdapter, SourceError, ThingSpeakAdapter};
pub use analysis::{PayloadBuilder, PayloadOptions};
pub use llm::AiOrchestrator;
pub use processing::CleaningMethod;
