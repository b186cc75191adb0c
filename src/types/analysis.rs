//! AI analysis request and result types
//!
//! - [`AnalysisPayload`]: bounded request handed to the orchestrator
//! - [`AnalysisResult`]: feature substructures returned by the model (or fallback)
//! - [`AnalysisProvenance`]: which tier answered and how each attempt went

use super::{SensorSummary, SourceKind, TimeSeriesEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Modes and Features
// ============================================================================

/// Analysis mode requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Forecast,
    SourceDetection,
    HealthRisk,
    RoomAdvisor,
    Chat,
}

impl AnalysisMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisMode::Forecast => "forecast",
            AnalysisMode::SourceDetection => "source_detection",
            AnalysisMode::HealthRisk => "health_risk",
            AnalysisMode::RoomAdvisor => "room_advisor",
            AnalysisMode::Chat => "chat",
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One feature substructure of an [`AnalysisResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Forecast,
    PollutionSource,
    HealthRisk,
    Ventilation,
    Layout,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Forecast,
        Feature::PollutionSource,
        Feature::HealthRisk,
        Feature::Ventilation,
        Feature::Layout,
    ];

    /// Top-level key of this feature in the AI JSON.
    pub fn key(self) -> &'static str {
        match self {
            Feature::Forecast => "forecast",
            Feature::PollutionSource => "pollution_source",
            Feature::HealthRisk => "health_risk_groups",
            Feature::Ventilation => "ventilation_tips",
            Feature::Layout => "layout_suggestions",
        }
    }
}

/// Feature flags carried in every payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSet {
    #[serde(default)]
    pub forecast: bool,
    #[serde(default)]
    pub source_detection: bool,
    #[serde(default)]
    pub health_risk: bool,
    #[serde(default)]
    pub ventilation: bool,
    #[serde(default)]
    pub layout: bool,
}

impl FeatureSet {
    /// Features each mode requests by default.
    ///
    /// Forecast is the general analysis path and also asks for source
    /// attribution; chat asks for no structured feature.
    pub fn for_mode(mode: AnalysisMode) -> Self {
        let mut set = Self::default();
        match mode {
            AnalysisMode::Forecast => {
                set.forecast = true;
                set.source_detection = true;
            }
            AnalysisMode::SourceDetection => set.source_detection = true,
            AnalysisMode::HealthRisk => set.health_risk = true,
            AnalysisMode::RoomAdvisor => {
                set.ventilation = true;
                set.layout = true;
            }
            AnalysisMode::Chat => {}
        }
        set
    }

    pub fn contains(&self, feature: Feature) -> bool {
        match feature {
            Feature::Forecast => self.forecast,
            Feature::PollutionSource => self.source_detection,
            Feature::HealthRisk => self.health_risk,
            Feature::Ventilation => self.ventilation,
            Feature::Layout => self.layout,
        }
    }

    /// Union of two sets.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            forecast: self.forecast || other.forecast,
            source_detection: self.source_detection || other.source_detection,
            health_risk: self.health_risk || other.health_risk,
            ventilation: self.ventilation || other.ventilation,
            layout: self.layout || other.layout,
        }
    }

    /// Requested features in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Camera/room image attached to a request (base64 encoded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub mime_type: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
}

/// Per-mode options forwarded to the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_hours: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outdoor_pm25: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Bounded request object sent to the AI tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub mode: AnalysisMode,
    pub source: SourceKind,
    pub requested_at: DateTime<Utc>,
    pub features: FeatureSet,
    pub time_series: Vec<TimeSeriesEntry>,
    #[serde(default)]
    pub frames: Vec<Frame>,
    pub sensor_summary: SensorSummary,
    #[serde(default)]
    pub options: AnalysisOptions,
    /// Entries in the dataset before sampling.
    #[serde(default)]
    pub total_entries: usize,
    /// Spike entries found before sampling (source detection only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spike_count: Option<usize>,
}

// ============================================================================
// Result Substructures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub hour: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub pm25: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm10: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceContribution {
    pub source: String,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionSource {
    pub primary: String,
    pub confidence: f64,
    #[serde(default)]
    pub contributors: Vec<SourceContribution>,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRisk {
    pub level: String,
    pub score: f64,
    #[serde(default)]
    pub advice: String,
}

impl Default for HealthRisk {
    fn default() -> Self {
        Self {
            level: "unknown".to_string(),
            score: 0.0,
            advice: String::new(),
        }
    }
}

/// Demographic groups scored by health-risk analysis.
pub const HEALTH_RISK_GROUPS: [&str; 4] = ["general", "children", "elderly", "respiratory"];

pub type HealthRiskGroups = BTreeMap<String, HealthRisk>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VentilationWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub action: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VentilationTips {
    #[serde(default)]
    pub schedule: Vec<VentilationWindow>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutIssue {
    pub area: String,
    pub issue: String,
    pub suggestion: String,
    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_priority() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutSuggestions {
    #[serde(default)]
    pub issues: Vec<LayoutIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
}

// ============================================================================
// Analysis Result
// ============================================================================

/// Typed AI analysis. Only requested features are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<ForecastPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pollution_source: Option<PollutionSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_risk_groups: Option<HealthRiskGroups>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ventilation_tips: Option<VentilationTips>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_suggestions: Option<LayoutSuggestions>,
    pub summary: String,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
}

// ============================================================================
// Provenance
// ============================================================================

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Cache,
    Proxy,
    Direct,
    Fallback,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Cache => write!(f, "cache"),
            Tier::Proxy => write!(f, "proxy"),
            Tier::Direct => write!(f, "direct"),
            Tier::Fallback => write!(f, "fallback"),
        }
    }
}

/// Timing and outcome of one network attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub tier: Tier,
    /// 0 for the first pass, 1 for the first retry, ...
    pub attempt: u32,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisProvenance {
    pub tier: Tier,
    /// True when the result was synthesized locally.
    pub fallback: bool,
    pub attempts: Vec<AttemptRecord>,
    pub total_duration_ms: u64,
    /// Last attempt error when the fallback path was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What [`analyze`](crate::llm::AiOrchestrator::analyze) always returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub provenance: AnalysisProvenance,
}
