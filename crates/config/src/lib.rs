//! Configuration management for long-form synthesis
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (LONGFORM_TTS_ prefix, `__` separator)
//! - Programmatic overrides on `Settings`

pub mod constants;
pub mod settings;
pub mod telemetry;

pub use settings::{
    load_settings, load_settings_from, DegradationConfig, ObservabilityConfig, PipelineConfig,
    ProgressWeights, RetryConfig, Settings,
};
pub use telemetry::init_tracing;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Tracing setup failed: {0}")]
    Telemetry(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => ConfigError::MissingField(key),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}
