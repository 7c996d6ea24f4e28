//! Job-level synthesis
//!
//! One call to [`Synthesizer::synthesize`] is one job: validate the
//! provider, fill request defaults, chunk, dispatch every unit under the
//! rate gate and concurrency cap, then concatenate the audio in input order.

use std::sync::Arc;

use longform_tts_config::Settings;
use longform_tts_core::{
    Budget, MeasurementScheme, ProgressSink, SynthesisProvider, SynthesisRequest, Unit,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::chunker::{measurer_for, HierarchicalChunker, SizeMeasurer, TextPatterns};
use crate::processor::{preview, UnitProcessor};
use crate::progress::{JobProgress, SkippedUnit};
use crate::scheduler::{ConcurrencyController, RequestGate};
use crate::PipelineError;

/// Result of a finished job
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub job_id: Uuid,
    /// Audio of every unit that produced any, in input order
    pub audio: Vec<u8>,
    /// Units given up on, in input order
    pub skipped: Vec<SkippedUnit>,
    /// Job-level units the input was split into
    pub unit_count: usize,
    /// Format every unit was requested in
    pub format: String,
}

impl SynthesisOutput {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Long-form synthesis against one provider
///
/// The provider and its request gate are shared by every job run through
/// the same synthesizer.
pub struct Synthesizer {
    provider: Arc<dyn SynthesisProvider>,
    settings: Settings,
    chunker: HierarchicalChunker,
    gate: Arc<RequestGate>,
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn SynthesisProvider>, settings: Settings) -> Self {
        let measurer = measurer_for(provider.measurement_scheme());
        Self::with_measurer(provider, settings, measurer)
    }

    /// Use a specific measurer instead of the provider scheme's default
    pub fn with_measurer(
        provider: Arc<dyn SynthesisProvider>,
        settings: Settings,
        measurer: Arc<dyn SizeMeasurer>,
    ) -> Self {
        let interval = settings
            .pipeline
            .request_interval()
            .or(provider.capabilities().min_request_interval);
        Self {
            chunker: HierarchicalChunker::new(TextPatterns::shared(), measurer),
            gate: Arc::new(RequestGate::new(interval)),
            provider,
            settings,
        }
    }

    pub fn provider(&self) -> &Arc<dyn SynthesisProvider> {
        &self.provider
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Per-unit budget; providers stating no limit get the configured default
    pub fn budget(&self) -> Budget {
        let scheme = self.provider.measurement_scheme();
        let limit = match self.provider.max_cost_per_unit() {
            0 => match scheme {
                MeasurementScheme::Tokens => self.settings.pipeline.default_token_limit,
                MeasurementScheme::Bytes => self.settings.pipeline.default_byte_limit,
            },
            limit => limit,
        };
        Budget::new(limit, scheme)
    }

    /// Units the job input would be split into
    pub fn chunk(&self, text: &str) -> Vec<Unit> {
        self.chunker.chunk(text, self.budget())
    }

    /// Fill empty voice and format from the provider, reset non-positive
    /// speed, drop a blank model
    pub fn apply_defaults(&self, mut request: SynthesisRequest) -> SynthesisRequest {
        if request.voice.trim().is_empty() {
            request.voice = self.provider.default_voice().to_string();
        }
        if request.format.trim().is_empty() {
            if let Some(format) = self.provider.supported_formats().into_iter().next() {
                request.format = format;
            }
        }
        if !request.speed.is_finite() || request.speed <= 0.0 {
            request.speed = 1.0;
        }
        if request.model.as_deref().is_some_and(|model| model.trim().is_empty()) {
            request.model = None;
        }
        request
    }

    /// Reject requests the provider cannot serve before any unit starts
    pub fn check_request(&self, request: &SynthesisRequest) -> Result<(), PipelineError> {
        if request.model.is_none() && self.provider.requires_model() {
            return Err(PipelineError::Configuration(format!(
                "provider '{}' requires a model identifier",
                self.provider.name()
            )));
        }
        Ok(())
    }

    /// Synthesize `text` into one audio buffer
    ///
    /// `request` supplies voice, speed, format and model; its text is
    /// ignored. Only invalid provider configuration and cancellation fail the
    /// job; every other per-unit failure is reported through `progress` and
    /// listed in [`SynthesisOutput::skipped`].
    pub async fn synthesize(
        &self,
        text: &str,
        request: SynthesisRequest,
        progress: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<SynthesisOutput, PipelineError> {
        let job_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "synthesis_job",
            %job_id,
            provider = self.provider.name()
        );
        self.run_job(job_id, text, request, progress, cancel)
            .instrument(span)
            .await
    }

    async fn run_job(
        &self,
        job_id: Uuid,
        text: &str,
        request: SynthesisRequest,
        progress: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<SynthesisOutput, PipelineError> {
        self.provider.validate_config().map_err(|e| {
            tracing::error!(error = %e, "provider configuration invalid");
            PipelineError::Configuration(e.to_string())
        })?;

        let request = self.apply_defaults(request.with_text(String::new()));
        self.check_request(&request)?;
        let request = Arc::new(request);
        let budget = self.budget();
        let units = self.chunker.chunk(text, budget);
        let unit_count = units.len();

        tracing::info!(
            units = unit_count,
            limit = budget.limit,
            scheme = %budget.scheme,
            voice = %request.voice,
            format = %request.format,
            "starting synthesis job"
        );

        let job = Arc::new(JobProgress::begin(
            progress,
            self.settings.progress.clone(),
            &units,
        ));

        if units.is_empty() {
            job.finish("Nothing to synthesize");
            return Ok(SynthesisOutput {
                job_id,
                audio: Vec::new(),
                skipped: Vec::new(),
                unit_count,
                format: request.format.clone(),
            });
        }

        let processor = Arc::new(UnitProcessor::new(
            Arc::clone(&self.provider),
            self.chunker.clone(),
            Arc::clone(&self.gate),
            &self.settings,
        ));
        let units = Arc::new(units);
        let controller = ConcurrencyController::new(self.settings.pipeline.max_concurrent_units);

        let slots = controller
            .run(unit_count, cancel, |index| {
                let processor = Arc::clone(&processor);
                let units = Arc::clone(&units);
                let request = Arc::clone(&request);
                let job = Arc::clone(&job);
                let cancel = cancel.clone();
                async move {
                    let unit = units[index].clone();
                    processor.process(index, unit, &request, &job, &cancel).await
                }
                .in_current_span()
            })
            .await;

        let mut audio = Vec::new();
        let mut completed_units = 0;
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(Some(bytes))) => {
                    audio.extend_from_slice(&bytes);
                    completed_units += 1;
                }
                Some(Ok(None)) => completed_units += 1,
                Some(Err(_)) => {}
                None if cancel.is_cancelled() => {}
                None => {
                    let unit = &units[index];
                    job.warn(&format!(
                        "A section could not be processed ({}). Skipping it.",
                        preview(&unit.text)
                    ));
                    job.record_skip(SkippedUnit {
                        index,
                        depth: unit.depth,
                        span: unit.span.clone(),
                        preview: preview(&unit.text),
                        reason: "worker task did not complete".to_string(),
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            tracing::info!(completed_units, total = unit_count, "synthesis job cancelled");
            return Err(PipelineError::Cancelled {
                completed_units,
                partial_audio: audio,
            });
        }

        job.finish("Synthesis complete");
        let skipped = job.take_skipped();
        if !skipped.is_empty() {
            tracing::warn!(skipped = skipped.len(), total = unit_count, "job finished with skipped units");
        }
        tracing::info!(bytes = audio.len(), units = unit_count, "synthesis job complete");

        Ok(SynthesisOutput {
            job_id,
            audio,
            skipped,
            unit_count,
            format: request.format.clone(),
        })
    }
}
