//! Job request construction and validation.
//!
//! A [`JobRequest`] is built once per submission from the input text and a
//! [`JobParameters`] bag, validated, and then only read. The wire format is
//! the flat JSON object accepted by `POST /api/humanize`.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Target tone of the rewritten text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Neutral,
    Casual,
    Formal,
    Persuasive,
    Academic,
}

impl Tone {
    /// Wire name, as accepted by the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Casual => "casual",
            Self::Formal => "formal",
            Self::Persuasive => "persuasive",
            Self::Academic => "academic",
        }
    }

    /// Parse a wire name. Returns `CoreError::Validation` for unknown tones.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "neutral" => Ok(Self::Neutral),
            "casual" => Ok(Self::Casual),
            "formal" => Ok(Self::Formal),
            "persuasive" => Ok(Self::Persuasive),
            "academic" => Ok(Self::Academic),
            other => Err(CoreError::Validation(format!(
                "Unknown tone: '{other}'. Valid tones: neutral, casual, formal, persuasive, academic"
            ))),
        }
    }
}

/// Operating mode of the transformation.
///
/// `Editor` is the interactive mode; `Academic` is integrity-constrained and
/// makes the backend attach a watermark id to the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityMode {
    #[default]
    Editor,
    Academic,
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Tunable parameters sent alongside the input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct JobParameters {
    pub tone: Tone,
    #[validate(range(min = 0.0, max = 1.0))]
    pub formality: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub burstiness: f64,
    #[validate(range(min = 1, max = 100))]
    pub perplexity_target: u32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub idiom_density: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub conciseness: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub temperature: f64,
    pub seed: Option<i64>,
    #[validate(range(min = 1))]
    pub max_tokens: Option<u32>,
    pub preserve_citations: bool,
    pub preserve_quotes: bool,
    pub keep_language: bool,
    pub integrity_mode: IntegrityMode,
    pub style_profile_id: Option<String>,
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            tone: Tone::Neutral,
            formality: 0.5,
            burstiness: 0.5,
            perplexity_target: 50,
            idiom_density: 0.3,
            conciseness: 0.5,
            temperature: 0.7,
            seed: None,
            max_tokens: None,
            preserve_citations: true,
            preserve_quotes: true,
            keep_language: true,
            integrity_mode: IntegrityMode::Editor,
            style_profile_id: None,
        }
    }
}

impl JobParameters {
    /// Range checks let NaN through, so non-finite values are rejected first.
    fn ensure_finite(&self) -> Result<(), CoreError> {
        let fields = [
            ("formality", self.formality),
            ("burstiness", self.burstiness),
            ("idiom_density", self.idiom_density),
            ("conciseness", self.conciseness),
            ("temperature", self.temperature),
        ];
        match fields.iter().find(|(_, value)| !value.is_finite()) {
            Some((name, value)) => Err(CoreError::Validation(format!(
                "{name} must be a number between 0 and 1, got {value}"
            ))),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// An immutable, validated transformation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRequest {
    text: String,
    #[serde(flatten)]
    parameters: JobParameters,
}

impl JobRequest {
    /// Build a request, rejecting blank text and out-of-range parameters.
    pub fn new(text: impl Into<String>, parameters: JobParameters) -> Result<Self, CoreError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(CoreError::Validation(
                "Input text must not be empty".to_string(),
            ));
        }
        parameters.ensure_finite()?;
        parameters
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        Ok(Self { text, parameters })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &JobParameters {
        &self.parameters
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let request = JobRequest::new("Some text.", JobParameters::default());
        assert!(request.is_ok());
    }

    #[test]
    fn blank_text_rejected() {
        let result = JobRequest::new("   \n\t", JobParameters::default());
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn formality_out_of_range_rejected() {
        let params = JobParameters {
            formality: 1.2,
            ..Default::default()
        };
        assert_matches!(
            JobRequest::new("text", params),
            Err(CoreError::Validation(msg)) if msg.contains("formality")
        );
    }

    #[test]
    fn non_finite_parameters_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let params = JobParameters {
                formality: value,
                ..Default::default()
            };
            assert_matches!(
                JobRequest::new("text", params),
                Err(CoreError::Validation(msg)) if msg.contains("formality")
            );
        }
        let params = JobParameters {
            temperature: f64::NAN,
            ..Default::default()
        };
        assert!(JobRequest::new("text", params).is_err());
    }

    #[test]
    fn perplexity_target_bounds() {
        let low = JobParameters {
            perplexity_target: 0,
            ..Default::default()
        };
        let high = JobParameters {
            perplexity_target: 101,
            ..Default::default()
        };
        let edge = JobParameters {
            perplexity_target: 100,
            ..Default::default()
        };
        assert!(JobRequest::new("text", low).is_err());
        assert!(JobRequest::new("text", high).is_err());
        assert!(JobRequest::new("text", edge).is_ok());
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let params = JobParameters {
            max_tokens: Some(0),
            ..Default::default()
        };
        assert!(JobRequest::new("text", params).is_err());
    }

    #[test]
    fn serializes_flat_with_snake_case_enums() {
        let params = JobParameters {
            tone: Tone::Persuasive,
            integrity_mode: IntegrityMode::Academic,
            seed: Some(42),
            ..Default::default()
        };
        let request = JobRequest::new("Hello there.", params).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["text"], "Hello there.");
        assert_eq!(json["tone"], "persuasive");
        assert_eq!(json["integrity_mode"], "academic");
        assert_eq!(json["seed"], 42);
        assert_eq!(json["perplexity_target"], 50);
        assert!(json["max_tokens"].is_null());
        assert!(json.get("parameters").is_none());
    }

    #[test]
    fn tone_parse_round_trips_wire_names() {
        for tone in [
            Tone::Neutral,
            Tone::Casual,
            Tone::Formal,
            Tone::Persuasive,
            Tone::Academic,
        ] {
            assert_eq!(Tone::parse(tone.as_str()).unwrap(), tone);
        }
        assert!(Tone::parse("sarcastic").is_err());
    }
}
