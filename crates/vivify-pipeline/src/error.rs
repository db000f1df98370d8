//! Pipeline error taxonomy.
//!
//! Per-frame recoverable failures (a driving frame without a detectable
//! face) never appear here: they are absorbed by the orchestrator's
//! hold-last policy and surfaced as an aggregate warning count. Everything
//! in this enum is fatal for the request, and fatal errors abort before any
//! artifact reaches its final path.

use thiserror::Error;

use vivify_inference::InferenceError;
use vivify_media::MediaError;
use vivify_models::DescriptorError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal request-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No face detected in the source portrait")]
    NoFaceDetected,

    #[error("Driving sequence is empty")]
    EmptyInput,

    #[error("Retargeting invoked before a source portrait was prepared")]
    NoSourceLoaded,

    #[error("Internal contract violation: {0}")]
    ContractViolation(String),

    #[error("Media operation failed: {0}")]
    Media(#[from] MediaError),

    #[error("Collaborator failed: {0}")]
    Collaborator(InferenceError),
}

impl From<InferenceError> for PipelineError {
    fn from(e: InferenceError) -> Self {
        match e {
            // A collaborator returning data inconsistent with its declared
            // shape is our contract violation, not a user-facing failure.
            InferenceError::ShapeMismatch { .. } => Self::ContractViolation(e.to_string()),
            other => Self::Collaborator(other),
        }
    }
}

impl From<DescriptorError> for PipelineError {
    fn from(e: DescriptorError) -> Self {
        Self::ContractViolation(e.to_string())
    }
}

impl PipelineError {
    /// Create a contract violation error.
    pub fn contract_violation(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_becomes_contract_violation() {
        let e = InferenceError::shape_mismatch("(1, 72)", "(1, 3)");
        assert!(matches!(
            PipelineError::from(e),
            PipelineError::ContractViolation(_)
        ));
    }

    #[test]
    fn other_inference_errors_stay_collaborator_errors() {
        let e = InferenceError::inference_failed("session died");
        assert!(matches!(
            PipelineError::from(e),
            PipelineError::Collaborator(_)
        ));
    }
}
