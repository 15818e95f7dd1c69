use thiserror::Error;

/// Failures inside the scoring pipeline.
///
/// Model-path variants (`ModelUnavailable`, `FeatureShape`,
/// `MalformedResponse`) are always absorbed by the percentile fallback and
/// never surface to an end caller on their own. `InsufficientHistory` is the
/// one condition that can exhaust both tiers, and then it surfaces as
/// `TimingOutcome::Unavailable`, never as a raw error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("insufficient history: need {required} observations, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    #[error("feature schema mismatch: {detail}")]
    FeatureShape { detail: String },

    #[error("malformed scoring response: {reason}")]
    MalformedResponse { reason: String },
}

impl ScoreError {
    pub fn model_unavailable(reason: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// True for the failures the fallback tier is allowed to absorb.
    pub fn is_model_path_failure(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable { .. } | Self::FeatureShape { .. } | Self::MalformedResponse { .. }
        )
    }
}
