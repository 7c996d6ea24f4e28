//! Tracing initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::{ConfigError, ObservabilityConfig};

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Fails if a global subscriber
/// is already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), ConfigError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("longform_tts={}", config.log_level).into()
    });

    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ConfigError::Telemetry(e.to_string()))
}
