use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SynthesisError;
use crate::types::{MeasurementScheme, ProviderCapabilities, SynthesisRequest};
use crate::voice::language_fallback_voices;

/// Remote speech-synthesis service
///
/// A provider is injected once and shared by every job and worker, so
/// `synthesize` must be safe to call concurrently. Implementations should
/// return promptly with [`SynthesisError::Cancelled`] once `cancel` fires.
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    /// Provider name (e.g., "openai", "google")
    fn name(&self) -> &str;

    /// Human-readable name
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Measurement scheme, limits and optional behaviours
    fn capabilities(&self) -> ProviderCapabilities;

    /// Voice used when a request does not name one
    fn default_voice(&self) -> &str;

    /// Output formats, preferred first
    fn supported_formats(&self) -> Vec<String>;

    /// Check credentials and settings before any work starts
    fn validate_config(&self) -> Result<(), SynthesisError> {
        Ok(())
    }

    /// Synthesize one unit of text into audio bytes
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SynthesisError>;

    fn max_cost_per_unit(&self) -> usize {
        self.capabilities().max_cost_per_unit
    }

    fn measurement_scheme(&self) -> MeasurementScheme {
        self.capabilities().measurement
    }

    fn supports_voice_fallback(&self) -> bool {
        self.capabilities().voice_fallback
    }

    fn requires_model(&self) -> bool {
        !self.capabilities().model_optional
    }

    /// Ordered alternates for `original_voice`
    ///
    /// The default derives same-language voices from the voice's language
    /// prefix when the provider declares voice fallback support.
    fn fallback_voices(&self, original_voice: &str) -> Vec<String> {
        if self.supports_voice_fallback() {
            language_fallback_voices(original_voice)
        } else {
            Vec::new()
        }
    }
}
