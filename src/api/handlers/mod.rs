//! API route handlers
//!
//! - Health and capability status
//! - Analysis proxy endpoint backed by the orchestrator
//! - CSV dataset ingestion

mod analyze;
mod datasets;
mod status;

pub use analyze::*;
pub use datasets::*;
pub use status::*;

use std::sync::Arc;

use crate::config::{AppConfig, Capabilities};
use crate::llm::{AiOrchestrator, AttemptError};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator without a proxy tier: this server is the proxy
    pub orchestrator: Arc<AiOrchestrator>,
    /// Capability flags reported on the health endpoint
    pub capabilities: Capabilities,
    /// Largest accepted CSV upload in bytes
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Build handler state from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, AttemptError> {
        let orchestrator = AiOrchestrator::from_config(config)?.without_proxy();
        Ok(Self::new(orchestrator, config))
    }

    /// Wrap an existing orchestrator. The proxy tier is always removed.
    pub fn new(orchestrator: AiOrchestrator, config: &AppConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator.without_proxy()),
            capabilities: config.capabilities(),
            max_upload_bytes: config.server.max_upload_bytes,
        }
    }
}
