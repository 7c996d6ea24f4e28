//! Named provider registry

use std::collections::BTreeMap;
use std::sync::Arc;

use longform_tts_config::Settings;
use longform_tts_core::{ProviderInfo, SynthesisProvider};

use crate::PipelineError;

/// Providers by name, with an optional explicit default
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn SynthesisProvider>>,
    default: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider under its own name, returning any provider it replaced
    pub fn register(
        &mut self,
        provider: Arc<dyn SynthesisProvider>,
    ) -> Option<Arc<dyn SynthesisProvider>> {
        let name = provider.name().to_string();
        tracing::debug!(provider = %name, "registered provider");
        self.providers.insert(name, provider)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SynthesisProvider>, PipelineError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownProvider(name.to_string()))
    }

    pub fn set_default(&mut self, name: &str) -> Result<(), PipelineError> {
        if !self.providers.contains_key(name) {
            return Err(PipelineError::UnknownProvider(name.to_string()));
        }
        self.default = Some(name.to_string());
        Ok(())
    }

    /// Make the configured default provider, if any, the default
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<(), PipelineError> {
        match settings.default_provider.as_deref() {
            Some(name) => self.set_default(name),
            None => Ok(()),
        }
    }

    /// Explicit default, else the first provider by name
    pub fn default_provider(&self) -> Result<Arc<dyn SynthesisProvider>, PipelineError> {
        if let Some(name) = &self.default {
            return self.get(name);
        }
        self.providers
            .values()
            .next()
            .cloned()
            .ok_or(PipelineError::NoDefaultProvider)
    }

    /// Named provider, or the default when no name is given
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn SynthesisProvider>, PipelineError> {
        match name {
            Some(name) => self.get(name),
            None => self.default_provider(),
        }
    }

    /// Registered names, sorted
    pub fn available(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn info(&self) -> Vec<ProviderInfo> {
        self.providers
            .values()
            .map(|provider| ProviderInfo {
                name: provider.name().to_string(),
                display_name: provider.display_name().to_string(),
                default_voice: provider.default_voice().to_string(),
                supported_formats: provider.supported_formats(),
                configured: provider.validate_config().is_ok(),
            })
            .collect()
    }

    /// Check one provider's configuration
    pub fn validate(&self, name: &str) -> Result<(), PipelineError> {
        self.get(name)?
            .validate_config()
            .map_err(|e| PipelineError::Configuration(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StubProvider;
    use async_trait::async_trait;
    use longform_tts_core::{
        CancellationToken, ProviderCapabilities, SynthesisError, SynthesisRequest,
    };

    struct Unconfigured;

    #[async_trait]
    impl SynthesisProvider for Unconfigured {
        fn name(&self) -> &str {
            "alpha"
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities::tokens(2000)
        }

        fn default_voice(&self) -> &str {
            "alloy"
        }

        fn supported_formats(&self) -> Vec<String> {
            vec!["mp3".into(), "wav".into()]
        }

        fn validate_config(&self) -> Result<(), SynthesisError> {
            Err(SynthesisError::Configuration("API key not set".into()))
        }

        async fn synthesize(
            &self,
            _request: &SynthesisRequest,
            _cancel: &CancellationToken,
        ) -> Result<Vec<u8>, SynthesisError> {
            Err(SynthesisError::Configuration("API key not set".into()))
        }
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider::default()));
        registry.register(Arc::new(Unconfigured));
        registry
    }

    #[test]
    fn test_empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(
            registry.default_provider().err(),
            Some(PipelineError::NoDefaultProvider)
        );
    }

    #[test]
    fn test_default_selection() {
        let mut registry = registry();
        assert_eq!(registry.available(), vec!["alpha", "stub"]);
        assert_eq!(registry.default_provider().unwrap().name(), "alpha");

        registry.set_default("stub").unwrap();
        assert_eq!(registry.resolve(None).unwrap().name(), "stub");
        assert_eq!(registry.resolve(Some("alpha")).unwrap().name(), "alpha");
        assert_eq!(
            registry.set_default("missing"),
            Err(PipelineError::UnknownProvider("missing".into()))
        );
    }

    #[test]
    fn test_settings_choose_default() {
        let mut registry = registry();
        registry.apply_settings(&Settings::default()).unwrap();
        assert_eq!(registry.resolve(None).unwrap().name(), "alpha");

        let mut settings = Settings::default();
        settings.default_provider = Some("stub".to_string());
        registry.apply_settings(&settings).unwrap();
        assert_eq!(registry.resolve(None).unwrap().name(), "stub");

        settings.default_provider = Some("missing".to_string());
        assert_eq!(
            registry.apply_settings(&settings),
            Err(PipelineError::UnknownProvider("missing".into()))
        );
    }

    #[test]
    fn test_info_and_validation() {
        let registry = registry();
        let info = registry.info();
        assert_eq!(info.len(), 2);
        assert!(!info[0].configured);
        assert_eq!(info[0].supported_formats, vec!["mp3", "wav"]);
        assert!(info[1].configured);
        assert_eq!(info[1].display_name, "Stub (silence)");

        assert!(registry.validate("stub").is_ok());
        assert!(matches!(
            registry.validate("alpha"),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            registry.validate("beta"),
            Err(PipelineError::UnknownProvider(_))
        ));
    }
}
