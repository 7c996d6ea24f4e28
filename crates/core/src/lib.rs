//! Core traits and types for long-form speech synthesis
//!
//! This crate holds the vocabulary shared by the configuration and pipeline
//! crates:
//! - Measurement schemes and budgets for per-request size limits
//! - Text units produced by the chunker
//! - Synthesis requests and provider capability descriptions
//! - The `SynthesisProvider` and `ProgressSink` seams
//! - A classified error taxonomy for provider failures

pub mod error;
pub mod traits;
pub mod types;
pub mod voice;

pub use error::SynthesisError;
pub use traits::{NullProgressSink, ProgressSink, SynthesisProvider};
pub use types::{
    Budget, MeasurementScheme, ProviderCapabilities, ProviderInfo, SynthesisRequest, Unit,
};
pub use voice::{language_code, language_fallback_voices};

/// Re-exported so providers and callers share one cancellation primitive
pub use tokio_util::sync::CancellationToken;
