//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{degradation, limits, pacing, progress, recursion, retry};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Chunking, recursion and concurrency
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retry of transient provider failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Degradation chain for units that cannot be synthesized as-is
    #[serde(default)]
    pub degradation: DegradationConfig,

    /// Progress weighting
    #[serde(default)]
    pub progress: ProgressWeights,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Provider used when a job does not name one
    #[serde(default)]
    pub default_provider: Option<String>,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "at least one attempt is required"));
        }
        if self.retry.backoff_ms.is_empty() {
            return Err(invalid("retry.backoff_ms", "at least one backoff delay is required"));
        }
        if self.pipeline.recursion_limit == 0 {
            return Err(invalid("pipeline.recursion_limit", "must be greater than zero"));
        }
        if self.pipeline.max_concurrent_units == 0 {
            return Err(invalid("pipeline.max_concurrent_units", "must be greater than zero"));
        }
        if self.pipeline.default_token_limit == 0 || self.pipeline.default_byte_limit == 0 {
            return Err(invalid("pipeline.default_*_limit", "limits must be greater than zero"));
        }

        let weights = [
            ("progress.setup_weight", self.progress.setup_weight),
            ("progress.dispatch_weight", self.progress.dispatch_weight),
            ("progress.concat_weight", self.progress.concat_weight),
            ("progress.cost_weight", self.progress.cost_weight),
        ];
        for (field, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, "weights must be finite and non-negative"));
            }
        }

        if self.degradation.substitute && self.degradation.placeholder_text.trim().is_empty() {
            return Err(invalid(
                "degradation.placeholder_text",
                "placeholder text is required while substitution is enabled",
            ));
        }

        if self.retry.backoff_ms.len() < self.retry.max_attempts.saturating_sub(1) as usize {
            tracing::debug!(
                "retry.backoff_ms has fewer entries than retries; the last delay is reused"
            );
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Chunking, recursion and concurrency configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Hard ceiling on nested re-chunking of a failing unit
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,

    /// Units at or below this cost are not split again
    #[serde(default = "default_min_unit_cost")]
    pub min_unit_cost: usize,

    /// Units in flight at once
    #[serde(default = "default_max_concurrent_units")]
    pub max_concurrent_units: usize,

    /// Overrides the provider's minimum request spacing (0 disables pacing)
    #[serde(default)]
    pub request_interval_ms: Option<u64>,

    /// Token budget for providers that do not state one
    #[serde(default = "default_token_limit")]
    pub default_token_limit: usize,

    /// Byte budget for providers that do not state one
    #[serde(default = "default_byte_limit")]
    pub default_byte_limit: usize,
}

impl PipelineConfig {
    /// Request spacing override, if configured
    pub fn request_interval(&self) -> Option<Duration> {
        self.request_interval_ms.map(Duration::from_millis)
    }
}

fn default_recursion_limit() -> usize {
    recursion::RECURSION_LIMIT
}
fn default_min_unit_cost() -> usize {
    recursion::MIN_UNIT_COST
}
fn default_max_concurrent_units() -> usize {
    pacing::MAX_CONCURRENT_UNITS
}
fn default_token_limit() -> usize {
    limits::DEFAULT_TOKEN_LIMIT
}
fn default_byte_limit() -> usize {
    limits::DEFAULT_BYTE_LIMIT
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
            min_unit_cost: default_min_unit_cost(),
            max_concurrent_units: default_max_concurrent_units(),
            request_interval_ms: None,
            default_token_limit: default_token_limit(),
            default_byte_limit: default_byte_limit(),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per unit, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Escalating delays; the last entry is reused for later attempts
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,
}

fn default_max_attempts() -> u32 {
    retry::MAX_ATTEMPTS
}
fn default_backoff_ms() -> Vec<u64> {
    retry::BACKOFF_MS.to_vec()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Degradation chain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationConfig {
    /// Retry with only letters, digits and spaces
    #[serde(default = "default_true")]
    pub sanitize: bool,

    /// Retry with markup symbols removed
    #[serde(default = "default_true")]
    pub strip_markup: bool,

    /// Retry with same-language alternate voices
    #[serde(default = "default_true")]
    pub voice_fallback: bool,

    /// Speak a placeholder instead of leaving a gap
    #[serde(default = "default_true")]
    pub substitute: bool,

    /// Explicit fallback voices, replacing the provider-derived list
    #[serde(default)]
    pub fallback_voices: Option<Vec<String>>,

    /// Placeholder phrase
    #[serde(default = "default_placeholder_text")]
    pub placeholder_text: String,

    /// Voice for the placeholder (provider default when unset)
    #[serde(default)]
    pub placeholder_voice: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_placeholder_text() -> String {
    degradation::PLACEHOLDER_TEXT.to_string()
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            sanitize: true,
            strip_markup: true,
            voice_fallback: true,
            substitute: true,
            fallback_voices: None,
            placeholder_text: default_placeholder_text(),
            placeholder_voice: None,
        }
    }
}

/// Relative weights that make up a job's progress total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressWeights {
    #[serde(default = "default_setup_weight")]
    pub setup_weight: f64,

    #[serde(default = "default_dispatch_weight")]
    pub dispatch_weight: f64,

    /// Only applied when a job has more than one unit
    #[serde(default = "default_concat_weight")]
    pub concat_weight: f64,

    /// Per token or byte of unit cost
    #[serde(default = "default_cost_weight")]
    pub cost_weight: f64,
}

fn default_setup_weight() -> f64 {
    progress::SETUP_WEIGHT
}
fn default_dispatch_weight() -> f64 {
    progress::DISPATCH_WEIGHT
}
fn default_concat_weight() -> f64 {
    progress::CONCAT_WEIGHT
}
fn default_cost_weight() -> f64 {
    progress::COST_WEIGHT
}

impl Default for ProgressWeights {
    fn default() -> Self {
        Self {
            setup_weight: default_setup_weight(),
            dispatch_weight: default_dispatch_weight(),
            concat_weight: default_concat_weight(),
            cost_weight: default_cost_weight(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from `config/` and the environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (LONGFORM_TTS_ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_from_builder(Config::builder(), Path::new("config"), env)
}

/// Load settings from an explicit configuration directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::FileNotFound(dir.display().to_string()));
    }
    load_from_builder(Config::builder(), dir, env)
}

fn load_from_builder(
    mut builder: config::ConfigBuilder<config::builder::DefaultState>,
    dir: &Path,
    env: Option<&str>,
) -> Result<Settings, ConfigError> {
    builder = builder.add_source(
        File::with_name(&dir.join("default").to_string_lossy()).required(false),
    );

    if let Some(env_name) = env {
        builder = builder.add_source(
            File::with_name(&dir.join(env_name).to_string_lossy()).required(false),
        );
    }

    builder = builder.add_source(
        Environment::with_prefix("LONGFORM_TTS")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
