//! Configuration loading and layering.
//!
//! Handles `.reviewloom.toml` loading, environment variable resolution,
//! and CLI flag merging with proper priority ordering.

pub mod loader;

pub use loader::{
    Admission, Config, ConfigError, LocatorConfig, PipelineConfig, PolicyKind, ProviderConfig,
    ReputationConfig,
};
