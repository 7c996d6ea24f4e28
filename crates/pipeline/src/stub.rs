//! Provider that needs no network

use async_trait::async_trait;
use longform_tts_config::constants::limits::DEFAULT_BYTE_LIMIT;
use longform_tts_core::{
    ProviderCapabilities, SynthesisError, SynthesisProvider, SynthesisRequest,
};
use tokio_util::sync::CancellationToken;

/// 16-bit mono PCM at 24 kHz, roughly 50ms per character
const SILENCE_BYTES_PER_CHAR: usize = 2 * 24_000 / 20;

/// Stub provider when no real service is wired up (returns silence)
pub struct StubProvider {
    capabilities: ProviderCapabilities,
}

impl StubProvider {
    pub fn new() -> Self {
        tracing::warn!("Using stub synthesis provider - audio output will be silence");
        Self {
            capabilities: ProviderCapabilities::bytes(DEFAULT_BYTE_LIMIT),
        }
    }

    pub fn with_capabilities(capabilities: ProviderCapabilities) -> Self {
        Self { capabilities }
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SynthesisProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn display_name(&self) -> &str {
        "Stub (silence)"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities.clone()
    }

    fn default_voice(&self) -> &str {
        "en-US-Standard-A"
    }

    fn supported_formats(&self) -> Vec<String> {
        vec!["pcm".to_string()]
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SynthesisError> {
        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }
        Ok(vec![0u8; request.text.chars().count() * SILENCE_BYTES_PER_CHAR])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use longform_tts_core::MeasurementScheme;

    #[tokio::test]
    async fn test_silence_proportional_to_text() {
        let stub = StubProvider::default();
        let cancel = CancellationToken::new();
        let short = stub.synthesize(&SynthesisRequest::new("ab"), &cancel).await.unwrap();
        let long = stub.synthesize(&SynthesisRequest::new("abcd"), &cancel).await.unwrap();
        assert_eq!(long.len(), short.len() * 2);
        assert!(long.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_capabilities() {
        let stub = StubProvider::new();
        assert_eq!(stub.measurement_scheme(), MeasurementScheme::Bytes);
        assert_eq!(stub.max_cost_per_unit(), DEFAULT_BYTE_LIMIT);
        assert!(!stub.supports_voice_fallback());
    }

    #[tokio::test]
    async fn test_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = StubProvider::default()
            .synthesize(&SynthesisRequest::new("ab"), &cancel)
            .await;
        assert_eq!(result, Err(SynthesisError::Cancelled));
    }
}
