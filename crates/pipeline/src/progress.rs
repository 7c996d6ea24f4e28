//! Job state: weighted progress and skipped units
//!
//! The job total is `setup + sum(dispatch + cost_weight * cost) + concat`,
//! where the concat share only applies to jobs with more than one unit.
//! Completed weight only ever grows, and the sink only hears about a
//! fraction strictly larger than the last one reported.

use std::ops::Range;
use std::sync::Arc;

use longform_tts_config::ProgressWeights;
use longform_tts_core::{ProgressSink, Unit};
use parking_lot::Mutex;

/// A unit whose whole degradation chain failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUnit {
    /// Index of the job-level unit it belongs to
    pub index: usize,
    /// Re-chunking depth it was produced at
    pub depth: usize,
    /// Approximate byte range in the job input
    pub span: Range<usize>,
    /// Truncated text for display
    pub preview: String,
    /// Last provider error
    pub reason: String,
}

#[derive(Debug, Default)]
struct Counters {
    completed: f64,
    reported: f64,
    units_done: usize,
}

/// Progress and skip bookkeeping for one job
pub struct JobProgress {
    sink: Arc<dyn ProgressSink>,
    weights: ProgressWeights,
    total: f64,
    unit_count: usize,
    counters: Mutex<Counters>,
    skipped: Mutex<Vec<SkippedUnit>>,
}

impl JobProgress {
    /// Compute the job total and credit the setup share
    pub fn begin(sink: Arc<dyn ProgressSink>, weights: ProgressWeights, units: &[Unit]) -> Self {
        let unit_weights: f64 = units
            .iter()
            .map(|unit| unit_weight(&weights, unit.cost))
            .sum();
        let concat = if units.len() > 1 {
            weights.concat_weight * units.len() as f64
        } else {
            0.0
        };
        let total = weights.setup_weight + unit_weights + concat;

        let progress = Self {
            sink,
            total,
            unit_count: units.len(),
            counters: Mutex::new(Counters::default()),
            skipped: Mutex::new(Vec::new()),
            weights,
        };
        progress.credit(progress.weights.setup_weight, |_| {
            format!("Prepared {} units", progress.unit_count)
        });
        progress
    }

    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }

    /// Weight one job-level unit contributes
    pub fn weight_of(&self, unit: &Unit) -> f64 {
        unit_weight(&self.weights, unit.cost)
    }

    /// Last fraction sent to the sink
    pub fn reported(&self) -> f64 {
        self.counters.lock().reported
    }

    /// Start tracking one job-level unit
    pub fn track(self: &Arc<Self>, unit: &Unit) -> UnitTracker {
        UnitTracker {
            job: Arc::clone(self),
            weight: self.weight_of(unit),
            credited: 0.0,
        }
    }

    /// Non-fatal notice about a degraded or skipped unit
    pub fn warn(&self, message: &str) {
        tracing::warn!(warning = message, "unit degraded");
        self.sink.on_warning(message);
    }

    pub fn record_skip(&self, skipped: SkippedUnit) {
        metrics::counter!("longform_tts_units_skipped_total").increment(1);
        self.skipped.lock().push(skipped);
    }

    /// Skipped units in job order
    pub fn take_skipped(&self) -> Vec<SkippedUnit> {
        let mut skipped = std::mem::take(&mut *self.skipped.lock());
        skipped.sort_by_key(|s| (s.index, s.span.start));
        skipped
    }

    /// Credit everything left and report completion
    pub fn finish(&self, message: &str) {
        let mut counters = self.counters.lock();
        counters.completed = self.total;
        if counters.reported < 1.0 {
            counters.reported = 1.0;
            self.sink.on_progress(1.0, message);
        }
    }

    fn credit(&self, amount: f64, message: impl FnOnce(usize) -> String) {
        self.credit_inner(amount, false, message);
    }

    fn credit_inner(&self, amount: f64, unit_done: bool, message: impl FnOnce(usize) -> String) {
        if amount <= 0.0 && !unit_done {
            return;
        }
        let mut counters = self.counters.lock();
        counters.completed += amount.max(0.0);
        if unit_done {
            counters.units_done += 1;
        }
        if self.total <= 0.0 {
            return;
        }

        let fraction = (counters.completed / self.total).min(1.0);
        if fraction > counters.reported {
            counters.reported = fraction;
            // Reported under the lock so concurrent workers cannot reorder
            // fractions on their way to the sink.
            self.sink.on_progress(fraction, &message(counters.units_done));
        }
    }
}

fn unit_weight(weights: &ProgressWeights, cost: usize) -> f64 {
    weights.dispatch_weight + weights.cost_weight * cost as f64
}

/// Share of the job weight belonging to one job-level unit
///
/// Sub-units credit their portion as they finish; `complete` credits the
/// rest exactly once.
pub struct UnitTracker {
    job: Arc<JobProgress>,
    weight: f64,
    credited: f64,
}

impl UnitTracker {
    /// Credit `share` (0..=1) of this unit's weight
    pub fn advance(&mut self, share: f64) {
        let amount = (self.weight * share.clamp(0.0, 1.0)).min(self.weight - self.credited);
        if amount <= 0.0 {
            return;
        }
        self.credited += amount;
        let total = self.job.unit_count;
        self.job.credit(amount, |done| format!("Processed {done} of {total} units"));
    }

    /// Credit the remainder and count the unit as done
    pub fn complete(mut self) {
        let remainder = (self.weight - self.credited).max(0.0);
        self.credited = self.weight;
        let total = self.job.unit_count;
        self.job
            .credit_inner(remainder, true, |done| format!("Processed {done} of {total} units"));
    }
}
