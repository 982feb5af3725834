//! Style profile to request-parameter mapping.
//!
//! Profiles are created and deleted elsewhere; the client only reads them and
//! folds their precomputed metrics into a [`JobParameters`] bag. The mapping
//! has to stay identical to what the web client applies so that a profile
//! yields the same parameters regardless of which client submits the job.

use serde::{Deserialize, Serialize};

use crate::request::JobParameters;

/// Variance assumed when a profile carries none (maps to burstiness 0.5).
pub const DEFAULT_SENTENCE_LENGTH_VARIANCE: f64 = 10.0;

/// Average sentence length assumed when a profile carries none (maps to
/// conciseness 0.5).
pub const DEFAULT_AVG_SENTENCE_LENGTH: f64 = 15.0;

/// Variance at which burstiness saturates at 1.
const BURSTINESS_VARIANCE_SCALE: f64 = 20.0;

/// Average sentence length at which conciseness bottoms out at 0.
const CONCISENESS_LENGTH_SCALE: f64 = 30.0;

/// Writing-style measurements computed from a profile's sample text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleMetrics {
    /// Share of words longer than eight characters.
    #[serde(default)]
    pub formal_words: Option<f64>,
    #[serde(default)]
    pub sentence_length_variance: Option<f64>,
    #[serde(default)]
    pub avg_sentence_length: Option<f64>,
    #[serde(default)]
    pub lexical_diversity: Option<f64>,
    #[serde(default)]
    pub flesch_kincaid_grade: Option<f64>,
    #[serde(default)]
    pub passive_voice_ratio: Option<f64>,
    #[serde(default)]
    pub adjective_ratio: Option<f64>,
    #[serde(default)]
    pub adverb_ratio: Option<f64>,
    #[serde(default)]
    pub contraction_count: Option<f64>,
}

/// A named, reusable writing style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sample_text: Option<String>,
    #[serde(default)]
    pub metrics: Option<StyleMetrics>,
    /// Creation time as sent by the backend (naive ISO-8601, no offset).
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A metric counts as present only when it is a non-zero finite number.
fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

/// Fold a profile's metrics into `base`.
///
/// - `formality` takes the formal-word ratio when present.
/// - `burstiness` is `min(1, variance / 20)`, variance defaulting to 10.
/// - `conciseness` is `1 - min(1, avg_length / 30)`, length defaulting to 15.
///
/// Every other field of `base` passes through; `style_profile_id` is set to
/// the profile's id. A profile without a metrics snapshot only sets the id.
pub fn derive_parameters(profile: &StyleProfile, base: &JobParameters) -> JobParameters {
    let mut params = JobParameters {
        style_profile_id: Some(profile.id.clone()),
        ..base.clone()
    };

    let Some(metrics) = profile.metrics.as_ref() else {
        return params;
    };

    if let Some(formal) = present(metrics.formal_words) {
        params.formality = formal.clamp(0.0, 1.0);
    }

    let variance =
        present(metrics.sentence_length_variance).unwrap_or(DEFAULT_SENTENCE_LENGTH_VARIANCE);
    params.burstiness = (variance / BURSTINESS_VARIANCE_SCALE).clamp(0.0, 1.0);

    let avg_length = present(metrics.avg_sentence_length).unwrap_or(DEFAULT_AVG_SENTENCE_LENGTH);
    params.conciseness = 1.0 - (avg_length / CONCISENESS_LENGTH_SCALE).clamp(0.0, 1.0);

    params
}

/// Apply a profile selection to `base`.
///
/// Selecting no profile restores `base` with the profile reference cleared,
/// so values derived from a previously selected profile do not linger.
pub fn select_profile(profile: Option<&StyleProfile>, base: &JobParameters) -> JobParameters {
    match profile {
        Some(profile) => derive_parameters(profile, base),
        None => JobParameters {
            style_profile_id: None,
            ..base.clone()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(metrics: Option<StyleMetrics>) -> StyleProfile {
        StyleProfile {
            id: "p-1".to_string(),
            name: "Blog".to_string(),
            description: None,
            sample_text: None,
            metrics,
            created_at: None,
        }
    }

    #[test]
    fn high_variance_clamps_burstiness() {
        let metrics = StyleMetrics {
            sentence_length_variance: Some(30.0),
            ..Default::default()
        };
        let params = derive_parameters(&profile(Some(metrics)), &JobParameters::default());
        assert_eq!(params.burstiness, 1.0);
    }

    #[test]
    fn empty_snapshot_uses_defaults() {
        let base = JobParameters {
            formality: 0.8,
            burstiness: 0.1,
            conciseness: 0.9,
            ..Default::default()
        };
        let params = derive_parameters(&profile(Some(StyleMetrics::default())), &base);
        assert_eq!(params.burstiness, 0.5);
        assert_eq!(params.conciseness, 0.5);
        assert_eq!(params.formality, 0.8);
        assert_eq!(params.style_profile_id.as_deref(), Some("p-1"));
    }

    #[test]
    fn formal_ratio_and_sentence_length_applied() {
        let metrics = StyleMetrics {
            formal_words: Some(0.25),
            sentence_length_variance: Some(5.0),
            avg_sentence_length: Some(24.0),
            ..Default::default()
        };
        let params = derive_parameters(&profile(Some(metrics)), &JobParameters::default());
        assert_eq!(params.formality, 0.25);
        assert_eq!(params.burstiness, 0.25);
        assert!((params.conciseness - 0.2).abs() < 1e-9);
    }

    #[test]
    fn long_sentences_bottom_out_conciseness() {
        let metrics = StyleMetrics {
            avg_sentence_length: Some(45.0),
            ..Default::default()
        };
        let params = derive_parameters(&profile(Some(metrics)), &JobParameters::default());
        assert_eq!(params.conciseness, 0.0);
    }

    #[test]
    fn zero_metrics_count_as_absent() {
        let base = JobParameters {
            formality: 0.7,
            ..Default::default()
        };
        let metrics = StyleMetrics {
            formal_words: Some(0.0),
            sentence_length_variance: Some(0.0),
            avg_sentence_length: Some(0.0),
            ..Default::default()
        };
        let params = derive_parameters(&profile(Some(metrics)), &base);
        assert_eq!(params.formality, 0.7);
        assert_eq!(params.burstiness, 0.5);
        assert_eq!(params.conciseness, 0.5);
    }

    #[test]
    fn other_parameters_pass_through() {
        let base = JobParameters {
            temperature: 0.2,
            seed: Some(7),
            preserve_quotes: false,
            ..Default::default()
        };
        let params = derive_parameters(&profile(Some(StyleMetrics::default())), &base);
        assert_eq!(params.temperature, 0.2);
        assert_eq!(params.seed, Some(7));
        assert!(!params.preserve_quotes);
        assert_eq!(params.perplexity_target, base.perplexity_target);
    }

    #[test]
    fn profile_without_metrics_only_sets_reference() {
        let base = JobParameters::default();
        let params = derive_parameters(&profile(None), &base);
        assert_eq!(
            params,
            JobParameters {
                style_profile_id: Some("p-1".to_string()),
                ..base
            }
        );
    }

    #[test]
    fn selecting_none_restores_base_and_clears_reference() {
        let base = JobParameters {
            style_profile_id: Some("stale".to_string()),
            ..Default::default()
        };
        let params = select_profile(None, &base);
        assert_eq!(params.style_profile_id, None);
        assert_eq!(params.burstiness, base.burstiness);
        assert_eq!(params.conciseness, base.conciseness);
    }

    #[test]
    fn profile_list_payload_deserializes() {
        let raw = r#"[{
            "id": "abc",
            "name": "Academic",
            "description": null,
            "metrics": {"avg_sentence_length": 22.4, "formal_words": 0.31, "contraction_count": 0},
            "created_at": "2024-03-01T10:00:00.123456"
        }]"#;
        let profiles: Vec<StyleProfile> = serde_json::from_str(raw).unwrap();
        assert_eq!(profiles.len(), 1);
        let metrics = profiles[0].metrics.as_ref().unwrap();
        assert_eq!(metrics.formal_words, Some(0.31));
        assert_eq!(
            profiles[0].created_at.as_deref(),
            Some("2024-03-01T10:00:00.123456")
        );
    }
}
