//! Size measurement under a provider's scheme

use std::sync::Arc;

use longform_tts_config::constants::limits::CHARS_PER_TOKEN_ESTIMATE;
use longform_tts_core::MeasurementScheme;
use tiktoken_rs::CoreBPE;

/// Converts text into the scalar cost a provider limits requests by
pub trait SizeMeasurer: Send + Sync {
    fn scheme(&self) -> MeasurementScheme;

    fn measure(&self, text: &str) -> usize;

    /// Characters that roughly correspond to one unit of cost
    fn chars_per_cost(&self) -> usize;

    /// Cost of `current` and `segment` joined by a single space
    ///
    /// `current_cost` is the already-measured cost of `current`. The default
    /// re-measures the joined text, which is exact for tokenizers whose cost
    /// is not additive.
    fn joined_cost(&self, current: &str, current_cost: usize, segment: &str) -> usize {
        let _ = current_cost;
        if current.is_empty() {
            return self.measure(segment);
        }
        let mut joined = String::with_capacity(current.len() + 1 + segment.len());
        joined.push_str(current);
        joined.push(' ');
        joined.push_str(segment);
        self.measure(&joined)
    }
}

/// UTF-8 byte length
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteMeasurer;

impl SizeMeasurer for ByteMeasurer {
    fn scheme(&self) -> MeasurementScheme {
        MeasurementScheme::Bytes
    }

    fn measure(&self, text: &str) -> usize {
        text.len()
    }

    fn chars_per_cost(&self) -> usize {
        1
    }

    fn joined_cost(&self, current: &str, current_cost: usize, segment: &str) -> usize {
        if current.is_empty() {
            segment.len()
        } else {
            current_cost + 1 + segment.len()
        }
    }
}

/// `cl100k_base` BPE token count
pub struct TokenMeasurer {
    bpe: CoreBPE,
}

impl TokenMeasurer {
    pub fn cl100k() -> Result<Self, String> {
        tiktoken_rs::cl100k_base()
            .map(|bpe| Self { bpe })
            .map_err(|e| e.to_string())
    }
}

impl SizeMeasurer for TokenMeasurer {
    fn scheme(&self) -> MeasurementScheme {
        MeasurementScheme::Tokens
    }

    fn measure(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }

    fn chars_per_cost(&self) -> usize {
        CHARS_PER_TOKEN_ESTIMATE
    }
}

/// Token estimate from character count, used when no tokenizer loads
#[derive(Debug, Clone, Copy)]
pub struct EstimatedTokenMeasurer {
    chars_per_token: usize,
}

impl EstimatedTokenMeasurer {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for EstimatedTokenMeasurer {
    fn default() -> Self {
        Self::new(CHARS_PER_TOKEN_ESTIMATE)
    }
}

impl SizeMeasurer for EstimatedTokenMeasurer {
    fn scheme(&self) -> MeasurementScheme {
        MeasurementScheme::Tokens
    }

    fn measure(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    fn chars_per_cost(&self) -> usize {
        self.chars_per_token
    }
}

/// Measurer for a provider's scheme
///
/// Token providers get the real BPE when it loads, otherwise the estimate.
pub fn measurer_for(scheme: MeasurementScheme) -> Arc<dyn SizeMeasurer> {
    match scheme {
        MeasurementScheme::Bytes => Arc::new(ByteMeasurer),
        MeasurementScheme::Tokens => match TokenMeasurer::cl100k() {
            Ok(measurer) => Arc::new(measurer),
            Err(e) => {
                tracing::warn!(error = %e, "cl100k_base unavailable, estimating token counts");
                Arc::new(EstimatedTokenMeasurer::default())
            }
        },
    }
}
