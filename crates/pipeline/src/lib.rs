//! Long-form synthesis pipeline
//!
//! This crate turns arbitrarily long text into one audio buffer through a
//! size-limited synthesis provider:
//! - Size measurement by tokens (cl100k_base) or UTF-8 bytes
//! - Hierarchical chunking on paragraph, sentence, word and grapheme boundaries
//! - Per-unit retry, re-chunking and degradation state machine
//! - Rate-gated, bounded, order-preserving dispatch
//! - Weighted, monotonic progress reporting

pub mod chunker;
pub mod events;
pub mod processor;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod stub;
pub mod synthesizer;

// Chunking exports
pub use chunker::{
    measurer_for, ByteMeasurer, EstimatedTokenMeasurer, HierarchicalChunker, SizeMeasurer,
    TextPatterns, TokenMeasurer,
};

// Processing exports
pub use processor::{RetryPolicy, UnitProcessor};
pub use progress::{JobProgress, SkippedUnit};
pub use scheduler::{ConcurrencyController, RequestGate};

// Job exports
pub use events::{ChannelProgressSink, JobEvent};
pub use registry::ProviderRegistry;
pub use stub::StubProvider;
pub use synthesizer::{SynthesisOutput, Synthesizer};

use thiserror::Error;

/// Job-level errors
///
/// Failures of individual units never surface here; they are reported as
/// [`SkippedUnit`]s on the job output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Provider configuration invalid: {0}")]
    Configuration(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("No provider registered")]
    NoDefaultProvider,

    #[error("Synthesis cancelled after {completed_units} units")]
    Cancelled {
        completed_units: usize,
        /// Audio of the units finished before cancellation, in input order
        partial_audio: Vec<u8>,
    },
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }
}
