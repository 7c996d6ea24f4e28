//! Shared data types

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;

/// How a provider measures the size of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementScheme {
    /// BPE token count (OpenAI-style limits)
    Tokens,
    /// UTF-8 byte count (Google-style limits)
    Bytes,
}

impl std::fmt::Display for MeasurementScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeasurementScheme::Tokens => write!(f, "tokens"),
            MeasurementScheme::Bytes => write!(f, "bytes"),
        }
    }
}

/// Cost ceiling for one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub limit: usize,
    pub scheme: MeasurementScheme,
}

impl Budget {
    pub fn new(limit: usize, scheme: MeasurementScheme) -> Self {
        Self {
            limit: limit.max(1),
            scheme,
        }
    }

    /// Budget of half the given cost, never below one
    pub fn halved(cost: usize, scheme: MeasurementScheme) -> Self {
        Self::new(cost / 2, scheme)
    }
}

/// A piece of text sized to fit one provider request
///
/// Units are immutable once produced. A unit that cannot be synthesized is
/// replaced by freshly chunked sub-units rather than edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Text sent to the provider
    pub text: String,
    /// Measured cost under the budget's scheme
    pub cost: usize,
    /// Byte range of the source text this unit was cut from
    pub span: Range<usize>,
    /// Re-chunking depth (0 for units cut from the job input)
    pub depth: usize,
}

impl Unit {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Parameters for one provider call
///
/// Retries with another voice or cleaned-up text derive a new request via
/// `with_text` / `with_voice`; the original is left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub speed: f64,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: String::new(),
            speed: 1.0,
            format: String::new(),
            model: None,
        }
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Copy of this request carrying different text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }

    /// Copy of this request using a different voice
    pub fn with_voice(&self, voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            ..self.clone()
        }
    }
}

/// What a provider can do, described as data instead of name checks
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCapabilities {
    /// Scheme the per-request limit is expressed in
    pub measurement: MeasurementScheme,
    /// Per-request limit in `measurement` units
    pub max_cost_per_unit: usize,
    /// Minimum spacing between outbound requests, if the provider is rate-sensitive
    pub min_request_interval: Option<Duration>,
    /// Whether alternate voices of the same language may be substituted
    pub voice_fallback: bool,
    /// Whether requests may omit the model identifier
    pub model_optional: bool,
}

impl ProviderCapabilities {
    pub fn tokens(max_tokens: usize) -> Self {
        Self {
            measurement: MeasurementScheme::Tokens,
            max_cost_per_unit: max_tokens,
            min_request_interval: None,
            voice_fallback: false,
            model_optional: true,
        }
    }

    pub fn bytes(max_bytes: usize) -> Self {
        Self {
            measurement: MeasurementScheme::Bytes,
            max_cost_per_unit: max_bytes,
            min_request_interval: None,
            voice_fallback: false,
            model_optional: true,
        }
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = Some(interval);
        self
    }

    pub fn with_voice_fallback(mut self, enabled: bool) -> Self {
        self.voice_fallback = enabled;
        self
    }

    /// Requests must carry a model identifier
    pub fn with_model_required(mut self) -> Self {
        self.model_optional = false;
        self
    }

    pub fn budget(&self) -> Budget {
        Budget::new(self.max_cost_per_unit, self.measurement)
    }
}

/// Summary of a registered provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub display_name: String,
    pub default_voice: String,
    pub supported_formats: Vec<String>,
    pub configured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_never_zero() {
        assert_eq!(Budget::new(0, MeasurementScheme::Bytes).limit, 1);
        assert_eq!(Budget::halved(1, MeasurementScheme::Tokens).limit, 1);
        assert_eq!(Budget::halved(9, MeasurementScheme::Bytes).limit, 4);
    }

    #[test]
    fn test_derived_requests_leave_original_untouched() {
        let base = SynthesisRequest::new("Hallo Welt")
            .voice("de-DE-Chirp3-HD-Kore")
            .format("mp3")
            .speed(1.2);

        let other = base.with_voice("de-DE-Neural2-G");
        assert_eq!(base.voice, "de-DE-Chirp3-HD-Kore");
        assert_eq!(other.voice, "de-DE-Neural2-G");
        assert_eq!(other.text, "Hallo Welt");

        let cleaned = base.with_text("Hallo");
        assert_eq!(cleaned.speed, 1.2);
        assert_eq!(base.text, "Hallo Welt");
    }

    #[test]
    fn test_request_serialization_skips_missing_model() {
        let request = SynthesisRequest::new("hi").voice("shimmer").format("mp3");
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("model"));
    }

    #[test]
    fn test_unit_word_count() {
        let unit = Unit {
            text: "one two  three".to_string(),
            cost: 14,
            span: 0..14,
            depth: 0,
        };
        assert_eq!(unit.word_count(), 3);
    }
}
