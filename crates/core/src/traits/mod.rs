//! Seams between the pipeline and its collaborators
//!
//! - `SynthesisProvider`: the remote speech service
//! - `ProgressSink`: receiver of completion fractions and warnings

mod progress;
mod provider;

pub use progress::{NullProgressSink, ProgressSink};
pub use provider::SynthesisProvider;
