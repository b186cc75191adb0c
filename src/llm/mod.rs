//! AI Analysis Module
//!
//! Resilient call path to the generative provider.
//!
//! ## Architecture
//!
//! - **AiOrchestrator**: drives the tier sequence and always returns a result
//! - **Tiers**: backend proxy first, then the direct provider call
//! - **State machine**: pure transitions for attempt, retry and fallback
//! - **Fallback**: deterministic offline analysis when every tier fails
//!
//! Live answers are schema-checked before mapping and cached by payload hash.

pub mod cache;
pub mod fallback;
pub mod orchestrator;
pub mod prompt;
pub mod state;
pub mod tiers;
pub mod validation;

pub use cache::{cache_key, LruResponseCache, ResponseCache};
pub use orchestrator::{AiOrchestrator, OrchestratorStats};
pub use prompt::build_prompt;
pub use state::{transition, Event, OrchestratorState, RetryPolicy};
pub use tiers::{AnalysisTier, AttemptError, DirectTier, ProxyMetadata, ProxyTier};
pub use validation::{ResponseSchema, ValidationError};
