//! Provider error taxonomy
//!
//! Providers either return a classified `SynthesisError` directly or hand a
//! raw message to [`SynthesisError::classify`], which recognises the usual
//! upstream signals (5xx status codes, deadlines, quota exhaustion, oversized
//! input, credential problems).

use thiserror::Error;

/// A classified failure of a single provider request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// Network or upstream server failure; worth retrying
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Quota or throughput limit hit; worth retrying after a pause
    #[error("provider rate limit: {0}")]
    RateLimited(String),

    /// The provider refused this particular text
    #[error("content rejected: {0}")]
    ContentRejected(String),

    /// The request exceeded the provider's size limit
    #[error("request too large: {0}")]
    SizeExceeded(String),

    /// Missing credentials or invalid provider setup
    #[error("provider configuration error: {0}")]
    Configuration(String),

    /// The caller cancelled the job or its deadline passed
    #[error("synthesis cancelled")]
    Cancelled,
}

const SIZE_PATTERNS: &[&str] = &[
    "too long",
    "too large",
    "longer than",
    "exceeds the maximum",
    "maximum length",
    "payload too large",
    "413",
];

const RATE_PATTERNS: &[&str] = &[
    "quota",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "resource_exhausted",
    "resource exhausted",
    "429",
];

const TRANSIENT_PATTERNS: &[&str] = &[
    "500",
    "502",
    "503",
    "504",
    "deadline exceeded",
    "deadlineexceeded",
    "deadline_exceeded",
    "timed out",
    "timeout",
    "unavailable",
    "connection reset",
    "connection refused",
    "internal server error",
    "bad gateway",
];

const CONFIGURATION_PATTERNS: &[&str] = &[
    "api key",
    "credential",
    "unauthenticated",
    "unauthorized",
    "permission denied",
    "401",
    "403",
];

impl SynthesisError {
    /// Classify a raw provider message
    ///
    /// Size signals are checked before rate signals so that "exceeds the
    /// maximum length" is not mistaken for a throughput limit. Anything that
    /// matches no pattern is treated as a rejection of the content itself.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

        if matches(SIZE_PATTERNS) {
            SynthesisError::SizeExceeded(message)
        } else if matches(RATE_PATTERNS) {
            SynthesisError::RateLimited(message)
        } else if matches(TRANSIENT_PATTERNS) {
            SynthesisError::Transient(message)
        } else if matches(CONFIGURATION_PATTERNS) {
            SynthesisError::Configuration(message)
        } else {
            SynthesisError::ContentRejected(message)
        }
    }

    /// Whether the same request may succeed if sent again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SynthesisError::Transient(_) | SynthesisError::RateLimited(_)
        )
    }

    /// Whether the user should be told the provider is throttling them
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SynthesisError::RateLimited(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SynthesisError::Cancelled)
    }

    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SynthesisError::Transient(_) => "transient",
            SynthesisError::RateLimited(_) => "rate_limited",
            SynthesisError::ContentRejected(_) => "content_rejected",
            SynthesisError::SizeExceeded(_) => "size_exceeded",
            SynthesisError::Configuration(_) => "configuration",
            SynthesisError::Cancelled => "cancelled",
        }
    }
}
