//! Error types for elicitation, formalization and the query pipeline.

use std::time::Duration;

use causalq_core::{CapabilityError, CoreError};
use causalq_prob::InferenceError;
use thiserror::Error;

/// Errors raised while turning a query into an accepted causal graph.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ElicitationError {
    /// The collaborator failed to answer a prompt.
    #[error("Elicitation failed: {0}")]
    Failure(#[from] CapabilityError),

    /// A single elicitation call ran past its deadline.
    #[error("Elicitation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Every attempt the retry policy allows was rejected.
    #[error("No acceptable graph after {attempts} attempt(s)")]
    Exhausted {
        attempts: usize,
        last: Option<Box<ElicitationError>>,
    },

    /// The answers did not describe a valid acyclic graph.
    #[error("Invalid candidate graph: {0}")]
    Invalid(#[from] CoreError),
}

impl ElicitationError {
    /// The error that ended the final attempt, for an exhausted builder.
    pub fn last_rejection(&self) -> Option<&ElicitationError> {
        match self {
            ElicitationError::Exhausted { last, .. } => last.as_deref(),
            _ => None,
        }
    }
}

/// Errors that stop a [`QueryPipeline`](crate::QueryPipeline) run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Elicitation(#[from] ElicitationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The pipeline configuration could not be read.
    #[error("Invalid pipeline config: {0}")]
    Config(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_rejection() {
        let cyclic = ElicitationError::Invalid(CoreError::CyclicGraph { name: "a".into() });
        let err = ElicitationError::Exhausted {
            attempts: 3,
            last: Some(Box::new(cyclic.clone())),
        };
        assert_eq!(err.last_rejection(), Some(&cyclic));
        assert_eq!(err.to_string(), "No acceptable graph after 3 attempt(s)");
        assert!(cyclic.last_rejection().is_none());
    }

    #[test]
    fn test_from_conversions() {
        let err: ElicitationError = CapabilityError::HandlerFailed {
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, ElicitationError::Failure(_)));

        let err: PipelineError = err.into();
        assert!(err.to_string().contains("boom"));
    }
}
