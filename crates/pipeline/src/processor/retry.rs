//! Retry policy for transient provider failures

use std::time::Duration;

use longform_tts_config::RetryConfig;
use longform_tts_core::SynthesisError;
use tokio_util::sync::CancellationToken;

/// Bounded attempts with escalating delays
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt follows failed attempt `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32, error: &SynthesisError) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }

    /// Delay after failed attempt `attempt` (1-based); the last delay repeats
    pub fn delay(&self, attempt: u32) -> Duration {
        let index = (attempt.max(1) - 1) as usize;
        self.backoff
            .get(index)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or_default()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.backoff_ms.iter().copied().map(Duration::from_millis).collect(),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Sleep unless cancelled first
pub async fn sleep_cancellable(
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), SynthesisError> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(SynthesisError::Cancelled)
        } else {
            Ok(())
        };
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(SynthesisError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
