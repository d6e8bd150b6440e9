//! Vessel Configuration Module
//!
//! Provides the device registry and engine tuning loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `DECKWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `deckwatch.toml` in the current working directory
//! 3. Built-in defaults (the shipped device registry)
//!
//! ## Usage
//!
//! ```ignore
//! let config = VesselConfig::load();
//! let engine = TelemetryEngine::new(config, provider);
//! ```
//!
//! The config is handed to the engine by value; there is no process-global
//! copy, so independent engines can run side by side with different registries.

mod vessel_config;
pub mod defaults;
pub mod validation;

pub use vessel_config::*;
