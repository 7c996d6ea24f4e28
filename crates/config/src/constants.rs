//! Centralized constants for long-form synthesis
//!
//! Single source of truth for limits and default values. Settings defaults
//! refer to these instead of repeating literals.

/// Per-request size limits
pub mod limits {
    /// Token budget per unit for token-measured providers
    pub const DEFAULT_TOKEN_LIMIT: usize = 2000;

    /// Byte budget per unit for byte-measured providers
    /// (the hard request limit is 5000; the margin absorbs escaping)
    pub const DEFAULT_BYTE_LIMIT: usize = 4500;

    /// Characters assumed per token when no tokenizer is available
    pub const CHARS_PER_TOKEN_ESTIMATE: usize = 3;
}

/// Dispatch limits
pub mod pacing {
    /// Units in flight at once
    pub const MAX_CONCURRENT_UNITS: usize = 8;
}

/// Retry behaviour for transient failures
pub mod retry {
    /// Attempts per unit, including the first
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Delay before the 2nd, 3rd and later attempts
    pub const BACKOFF_MS: [u64; 3] = [30_000, 60_000, 120_000];
}

/// Re-chunking of units that keep failing
pub mod recursion {
    /// Hard ceiling on nested re-chunking
    pub const RECURSION_LIMIT: usize = 20;

    /// Units at or below this cost are never split again
    pub const MIN_UNIT_COST: usize = 1;
}

/// Degradation chain defaults
pub mod degradation {
    /// Spoken in place of a section that could not be synthesized
    pub const PLACEHOLDER_TEXT: &str = "This section could not be processed.";

    /// Characters of offending text quoted in warnings
    pub const PREVIEW_CHARS: usize = 40;
}

/// Progress weighting
pub mod progress {
    /// Weight credited when a job starts
    pub const SETUP_WEIGHT: f64 = 5.0;

    /// Weight per unit for dispatching it
    pub const DISPATCH_WEIGHT: f64 = 1.0;

    /// Weight per unit for the final concatenation (multi-unit jobs only)
    pub const CONCAT_WEIGHT: f64 = 0.5;

    /// Weight per measured cost unit (token or byte)
    pub const COST_WEIGHT: f64 = 0.01;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_escalates() {
        assert!(retry::BACKOFF_MS.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(retry::BACKOFF_MS.len() as u32, retry::MAX_ATTEMPTS);
    }

    #[test]
    fn test_byte_limit_under_hard_limit() {
        assert!(limits::DEFAULT_BYTE_LIMIT < 5000);
    }

    #[test]
    fn test_concurrency_positive() {
        assert!(pacing::MAX_CONCURRENT_UNITS > 0);
    }

    #[test]
    fn test_progress_weights_positive() {
        assert!(progress::SETUP_WEIGHT > 0.0);
        assert!(progress::DISPATCH_WEIGHT > 0.0);
        assert!(progress::CONCAT_WEIGHT >= 0.0);
        assert!(progress::COST_WEIGHT >= 0.0);
    }
}
