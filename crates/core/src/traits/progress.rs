/// Receiver of job progress and non-fatal warnings
///
/// Called from worker tasks, possibly concurrently. Implementations must be
/// internally synchronized.
pub trait ProgressSink: Send + Sync {
    /// Completion fraction in `[0, 1]`; never decreases within one job
    fn on_progress(&self, fraction: f64, message: &str);

    /// A unit was degraded or skipped
    fn on_warning(&self, message: &str);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _fraction: f64, _message: &str) {}

    fn on_warning(&self, _message: &str) {}
}
