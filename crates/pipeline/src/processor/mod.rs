//! Per-unit synthesis state machine
//!
//! Each unit moves through explicit steps until it produces audio or is
//! skipped:
//!
//! ```text
//! Attempt ──ok──────────────────────────────────────────────▶ audio
//!    │ retries exhausted / not retryable
//!    ├─ several words ▶ Subchunk ──▶ recurse on each sub-unit
//!    │                    │ no size reduction
//!    ▼                    ▼
//! Sanitize ─▶ StripMarkup ─▶ VoiceFallback ─▶ Substitute ─▶ Fail
//! ```
//!
//! Every outbound request takes a turn at the shared [`RequestGate`].
//! Only cancellation escapes as an error; every other failure ends in a
//! recorded [`SkippedUnit`].

pub mod degrade;
pub mod retry;

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use longform_tts_config::{DegradationConfig, PipelineConfig, Settings};
use longform_tts_core::{Budget, SynthesisError, SynthesisProvider, SynthesisRequest, Unit};
use tokio_util::sync::CancellationToken;

use crate::chunker::HierarchicalChunker;
use crate::progress::{JobProgress, SkippedUnit, UnitTracker};
use crate::scheduler::RequestGate;

pub use degrade::{preview, sanitize_for_speech, strip_markup};
pub use retry::{sleep_cancellable, RetryPolicy};

const RATE_LIMIT_ADVISORY: &str =
    "The provider may be rate-limiting or throttling requests. Waiting before retrying...";
const SANITIZE_NOTICE: &str =
    "A section contained characters the provider rejected. Retrying with them removed.";
const STRIP_MARKUP_NOTICE: &str =
    "A section contained formatting symbols the provider rejected. Retrying without them.";

/// Next step for a unit; every non-terminal step carries the last error
#[derive(Debug)]
enum Step {
    Attempt,
    Subchunk(SynthesisError),
    Sanitize(SynthesisError),
    StripMarkup(SynthesisError),
    VoiceFallback(SynthesisError),
    Substitute(SynthesisError),
    Fail(SynthesisError),
}

/// Shared per-job inputs for one job-level unit and its descendants
struct UnitContext<'a> {
    index: usize,
    request: &'a SynthesisRequest,
    job: &'a JobProgress,
    cancel: &'a CancellationToken,
}

/// Drives units through retry, re-chunking and degradation
pub struct UnitProcessor {
    provider: Arc<dyn SynthesisProvider>,
    chunker: HierarchicalChunker,
    gate: Arc<RequestGate>,
    retry: RetryPolicy,
    pipeline: PipelineConfig,
    degradation: DegradationConfig,
}

impl UnitProcessor {
    pub fn new(
        provider: Arc<dyn SynthesisProvider>,
        chunker: HierarchicalChunker,
        gate: Arc<RequestGate>,
        settings: &Settings,
    ) -> Self {
        Self {
            provider,
            chunker,
            gate,
            retry: RetryPolicy::from(&settings.retry),
            pipeline: settings.pipeline.clone(),
            degradation: settings.degradation.clone(),
        }
    }

    /// Process one job-level unit
    ///
    /// Returns `Ok(None)` when the unit was skipped; the skip is recorded on
    /// `job`. Only cancellation is returned as an error.
    pub async fn process(
        &self,
        index: usize,
        unit: Unit,
        request: &SynthesisRequest,
        job: &Arc<JobProgress>,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>, SynthesisError> {
        let mut tracker = job.track(&unit);
        let ctx = UnitContext {
            index,
            request,
            job: job.as_ref(),
            cancel,
        };

        let result = self.process_unit(unit, 1.0, &ctx, &mut tracker).await;
        if !matches!(result, Err(SynthesisError::Cancelled)) {
            tracker.complete();
        }
        result
    }

    fn process_unit<'a>(
        &'a self,
        unit: Unit,
        share: f64,
        ctx: &'a UnitContext<'a>,
        tracker: &'a mut UnitTracker,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, SynthesisError>> {
        async move {
            if unit.depth > self.pipeline.recursion_limit {
                tracing::warn!(unit = ctx.index, depth = unit.depth, "re-chunking depth limit reached");
                let error = SynthesisError::ContentRejected("re-chunking depth limit reached".into());
                ctx.job.warn(&format!(
                    "A section could not be split further ({}). Skipping it.",
                    preview(&unit.text)
                ));
                self.record_skip(ctx, &unit, &error);
                return Ok(None);
            }

            let request = ctx.request.with_text(unit.text.clone());
            let mut step = Step::Attempt;

            loop {
                step = match step {
                    Step::Attempt => match self.attempt_with_retry(&request, &unit, ctx).await {
                        Ok(audio) => {
                            if share < 1.0 {
                                tracker.advance(share);
                            }
                            return Ok(Some(audio));
                        }
                        Err(SynthesisError::Cancelled) => return Err(SynthesisError::Cancelled),
                        Err(error) if self.is_splittable(&unit) => Step::Subchunk(error),
                        Err(error) => Step::Sanitize(error),
                    },

                    Step::Subchunk(error) => {
                        let budget = Budget::halved(unit.cost, self.chunker.measurer().scheme());
                        let subs = self
                            .chunker
                            .chunk_at_depth(&unit.text, budget, unit.depth + 1);
                        if !reduces_size(&unit, &subs) {
                            tracing::debug!(unit = ctx.index, cost = unit.cost, "no size reduction, treating as minimal");
                            Step::Sanitize(error)
                        } else {
                            tracing::debug!(
                                unit = ctx.index,
                                depth = unit.depth,
                                cost = unit.cost,
                                sub_units = subs.len(),
                                budget = budget.limit,
                                "re-chunking failed unit"
                            );
                            return self.process_subunits(&unit, subs, share, ctx, tracker).await;
                        }
                    }

                    Step::Sanitize(error) => {
                        let sanitized = sanitize_for_speech(&unit.text);
                        if self.degradation.sanitize && !sanitized.is_empty() && sanitized != unit.text {
                            ctx.job.warn(SANITIZE_NOTICE);
                            match self.try_once(&request.with_text(sanitized), "sanitize", ctx).await {
                                Ok(audio) => return Ok(Some(self.succeed(audio, share, tracker))),
                                Err(SynthesisError::Cancelled) => return Err(SynthesisError::Cancelled),
                                Err(next) => Step::StripMarkup(next),
                            }
                        } else {
                            Step::StripMarkup(error)
                        }
                    }

                    Step::StripMarkup(error) => {
                        let stripped = strip_markup(self.chunker.patterns(), &unit.text);
                        if self.degradation.strip_markup && !stripped.is_empty() && stripped != unit.text {
                            ctx.job.warn(STRIP_MARKUP_NOTICE);
                            match self.try_once(&request.with_text(stripped), "strip_markup", ctx).await {
                                Ok(audio) => return Ok(Some(self.succeed(audio, share, tracker))),
                                Err(SynthesisError::Cancelled) => return Err(SynthesisError::Cancelled),
                                Err(next) => Step::VoiceFallback(next),
                            }
                        } else {
                            Step::VoiceFallback(error)
                        }
                    }

                    Step::VoiceFallback(mut error) => {
                        for voice in self.fallback_voices(&request.voice) {
                            tracing::debug!(unit = ctx.index, voice = %voice, "trying fallback voice");
                            match self.try_once(&request.with_voice(voice), "voice_fallback", ctx).await {
                                Ok(audio) => return Ok(Some(self.succeed(audio, share, tracker))),
                                Err(SynthesisError::Cancelled) => return Err(SynthesisError::Cancelled),
                                Err(next) => error = next,
                            }
                        }
                        Step::Substitute(error)
                    }

                    Step::Substitute(error) => {
                        if !self.degradation.substitute {
                            Step::Fail(error)
                        } else {
                            let voice = self
                                .degradation
                                .placeholder_voice
                                .clone()
                                .unwrap_or_else(|| self.provider.default_voice().to_string());
                            let placeholder = request
                                .with_text(self.degradation.placeholder_text.clone())
                                .with_voice(voice);
                            match self.try_once(&placeholder, "substitute", ctx).await {
                                Ok(audio) => {
                                    ctx.job.warn(&format!(
                                        "A section could not be processed ({}). Substituted a placeholder and continued.",
                                        preview(&unit.text)
                                    ));
                                    return Ok(Some(self.succeed(audio, share, tracker)));
                                }
                                Err(SynthesisError::Cancelled) => return Err(SynthesisError::Cancelled),
                                // Keep the unit's own error; the placeholder failing says little
                                Err(_) => Step::Fail(error),
                            }
                        }
                    }

                    Step::Fail(error) => {
                        tracing::warn!(
                            unit = ctx.index,
                            depth = unit.depth,
                            cost = unit.cost,
                            error = %error,
                            "unit skipped"
                        );
                        ctx.job.warn(&format!(
                            "A section could not be processed ({}). Try rephrasing or splitting it manually.",
                            preview(&unit.text)
                        ));
                        self.record_skip(ctx, &unit, &error);
                        return Ok(None);
                    }
                };
            }
        }
        .boxed()
    }

    /// Recurse on sub-units in order and join whatever audio they produce
    async fn process_subunits(
        &self,
        parent: &Unit,
        subs: Vec<Unit>,
        share: f64,
        ctx: &UnitContext<'_>,
        tracker: &mut UnitTracker,
    ) -> Result<Option<Vec<u8>>, SynthesisError> {
        let total_cost = subs.iter().map(|sub| sub.cost).sum::<usize>().max(1) as f64;
        let mut audio = Vec::new();
        let mut produced = false;

        for mut sub in subs {
            let sub_share = share * sub.cost as f64 / total_cost;
            let start = (parent.span.start + sub.span.start).min(parent.span.end);
            let end = (parent.span.start + sub.span.end).min(parent.span.end);
            sub.span = start..end;

            if let Some(bytes) = self.process_unit(sub, sub_share, ctx, tracker).await? {
                audio.extend_from_slice(&bytes);
                produced = true;
            }
        }

        if produced {
            Ok(Some(audio))
        } else {
            // Each sub-unit already reported its own skip
            tracing::debug!(unit = ctx.index, depth = parent.depth, "all sub-units skipped");
            Ok(None)
        }
    }

    /// Attempts with retry and backoff
    async fn attempt_with_retry(
        &self,
        request: &SynthesisRequest,
        unit: &Unit,
        ctx: &UnitContext<'_>,
    ) -> Result<Vec<u8>, SynthesisError> {
        let mut attempt = 1;
        loop {
            let error = match self.call(request, "attempt", ctx.cancel).await {
                Ok(audio) => {
                    tracing::debug!(unit = ctx.index, depth = unit.depth, attempt, "unit synthesized");
                    return Ok(audio);
                }
                Err(SynthesisError::Cancelled) => return Err(SynthesisError::Cancelled),
                Err(error) => error,
            };

            tracing::debug!(
                unit = ctx.index,
                depth = unit.depth,
                attempt,
                kind = error.kind(),
                error = %error,
                "attempt failed"
            );

            if !self.retry.should_retry(attempt, &error) {
                return Err(error);
            }
            if error.is_rate_limit() {
                ctx.job.warn(RATE_LIMIT_ADVISORY);
            }

            let delay = self.retry.delay(attempt);
            metrics::counter!("longform_tts_retries_total").increment(1);
            tracing::info!(unit = ctx.index, attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
            sleep_cancellable(delay, ctx.cancel).await?;
            attempt += 1;
        }
    }

    /// Single degradation attempt
    async fn try_once(
        &self,
        request: &SynthesisRequest,
        strategy: &'static str,
        ctx: &UnitContext<'_>,
    ) -> Result<Vec<u8>, SynthesisError> {
        metrics::counter!("longform_tts_degradation_attempts_total", "strategy" => strategy)
            .increment(1);
        let result = self.call(request, strategy, ctx.cancel).await;
        if let Err(e) = &result {
            tracing::debug!(unit = ctx.index, strategy, error = %e, "degradation attempt failed");
        }
        result
    }

    /// One gated provider request
    async fn call(
        &self,
        request: &SynthesisRequest,
        stage: &'static str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SynthesisError> {
        self.gate.acquire(cancel).await?;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SynthesisError::Cancelled),
            result = self.provider.synthesize(request, cancel) => result,
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::counter!(
            "longform_tts_provider_requests_total",
            "stage" => stage,
            "outcome" => outcome
        )
        .increment(1);
        result
    }

    fn succeed(&self, audio: Vec<u8>, share: f64, tracker: &mut UnitTracker) -> Vec<u8> {
        if share < 1.0 {
            tracker.advance(share);
        }
        audio
    }

    /// Several words above the cost floor; anything else is a minimal unit
    fn is_splittable(&self, unit: &Unit) -> bool {
        unit.word_count() > 1 && unit.cost > self.pipeline.min_unit_cost
    }

    /// Alternate voices, never including the original
    fn fallback_voices(&self, original: &str) -> Vec<String> {
        if !self.degradation.voice_fallback || !self.provider.supports_voice_fallback() {
            return Vec::new();
        }
        let voices = match &self.degradation.fallback_voices {
            Some(voices) => voices.clone(),
            None => self.provider.fallback_voices(original),
        };
        voices.into_iter().filter(|voice| voice != original).collect()
    }

    fn record_skip(&self, ctx: &UnitContext<'_>, unit: &Unit, error: &SynthesisError) {
        ctx.job.record_skip(SkippedUnit {
            index: ctx.index,
            depth: unit.depth,
            span: unit.span.clone(),
            preview: preview(&unit.text),
            reason: error.to_string(),
        });
    }
}

/// Every sub-unit is strictly smaller than the unit it came from
fn reduces_size(parent: &Unit, subs: &[Unit]) -> bool {
    !subs.is_empty() && subs.iter().all(|sub| sub.cost < parent.cost)
}
