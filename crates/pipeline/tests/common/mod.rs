//! Scripted in-memory providers and recording sinks

#![allow(dead_code)]

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use longform_tts_config::Settings;
use longform_tts_core::{
    CancellationToken, ProgressSink, ProviderCapabilities, SynthesisError, SynthesisProvider,
    SynthesisRequest,
};
use longform_tts_pipeline::{ByteMeasurer, Synthesizer};
use parking_lot::Mutex;
use rand::Rng;

type Script = dyn Fn(&SynthesisRequest, usize) -> Result<Vec<u8>, SynthesisError> + Send + Sync;
type Latency = dyn Fn(&SynthesisRequest) -> Duration + Send + Sync;

/// Provider whose answers come from a closure of (request, call number)
pub struct ScriptedProvider {
    capabilities: ProviderCapabilities,
    script: Box<Script>,
    latency: Box<Latency>,
    config_error: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl ScriptedProvider {
    pub fn new<F>(capabilities: ProviderCapabilities, script: F) -> Self
    where
        F: Fn(&SynthesisRequest, usize) -> Result<Vec<u8>, SynthesisError> + Send + Sync + 'static,
    {
        Self {
            capabilities,
            script: Box::new(script),
            latency: Box::new(|_| Duration::ZERO),
            config_error: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Echoes the request text as audio
    pub fn echo(capabilities: ProviderCapabilities) -> Self {
        Self::new(capabilities, |request, _| Ok(request.text.as_bytes().to_vec()))
    }

    /// Uniformly random delay per request
    pub fn with_latency(self, latency_ms: Range<u64>) -> Self {
        self.with_latency_fn(move |_| {
            Duration::from_millis(rand::thread_rng().gen_range(latency_ms.clone()))
        })
    }

    pub fn with_latency_fn<F>(mut self, latency: F) -> Self
    where
        F: Fn(&SynthesisRequest) -> Duration + Send + Sync + 'static,
    {
        self.latency = Box::new(latency);
        self
    }

    pub fn with_config_error(mut self, message: &str) -> Self {
        self.config_error = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SynthesisProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities.clone()
    }

    fn default_voice(&self) -> &str {
        "en-US-Standard-A"
    }

    fn supported_formats(&self) -> Vec<String> {
        vec!["mp3".to_string()]
    }

    fn validate_config(&self) -> Result<(), SynthesisError> {
        match &self.config_error {
            Some(message) => Err(SynthesisError::Configuration(message.clone())),
            None => Ok(()),
        }
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SynthesisError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(request.clone());

        let delay = (self.latency)(request);
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(SynthesisError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        (self.script)(request, call)
    }
}

/// Sink that keeps everything it hears
#[derive(Default)]
pub struct RecordingSink {
    pub fractions: Mutex<Vec<f64>>,
    pub warnings: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn fractions(&self) -> Vec<f64> {
        self.fractions.lock().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, fraction: f64, _message: &str) {
        self.fractions.lock().push(fraction);
    }

    fn on_warning(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }
}

/// Settings with millisecond backoffs
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry.backoff_ms = vec![1, 2, 3];
    settings
}

pub fn byte_synthesizer(provider: Arc<ScriptedProvider>, settings: Settings) -> Synthesizer {
    Synthesizer::with_measurer(provider, settings, Arc::new(ByteMeasurer))
}
