//! Analysis request shaping and response mapping
//!
//! - [`payload`]: bounded [`AnalysisPayload`](crate::types::AnalysisPayload) construction
//! - [`result_mapper`]: lenient raw JSON → [`AnalysisResult`](crate::types::AnalysisResult)

pub mod payload;
pub mod result_mapper;

pub use payload::{is_spike, PayloadBuilder, PayloadOptions};
pub use result_mapper::{extract, map_result, FeatureResult};
