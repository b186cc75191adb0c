//! Application Configuration Module
//!
//! Endpoint, timeout and retry settings loaded from TOML, plus provider
//! credentials read from the environment.
//!
//! ## Loading Order
//!
//! 1. `AIRSENSE_CONFIG` environment variable (path to TOML file)
//! 2. `airsense.toml` in the current working directory
//! 3. Built-in defaults
//!
//! There is no global instance: `main` loads an [`AppConfig`] once and
//! hands it (or the pieces it needs) to each component.

mod app_config;
pub mod defaults;
pub mod validation;

pub use app_config::*;
