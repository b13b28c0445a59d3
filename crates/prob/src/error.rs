//! Error types for identification and estimation.

use causalq_core::CoreError;
use thiserror::Error;

/// Errors raised by a single estimator invocation.
///
/// The multi-criterion sweep catches every one of these and records a
/// missing estimate for the criterion instead of aborting.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EstimatorError {
    /// A required column is absent from the dataset.
    #[error("Dataset has no column {name}")]
    MissingColumn { name: String },

    /// A linear system could not be solved.
    #[error("Singular system in {context}")]
    Singular { context: &'static str },

    /// The identification result gives this criterion nothing to work with.
    #[error("{criterion} is not estimable: {reason}")]
    NotEstimable {
        criterion: &'static str,
        reason: String,
    },

    /// Unknown estimation method name.
    #[error("Unsupported estimation method: {method}")]
    UnsupportedMethod { method: String },

    /// Propensity-based methods need a 0/1 treatment.
    #[error("Treatment {name} is not binary")]
    NonBinaryTreatment { name: String },

    /// Fewer rows than parameters.
    #[error("Need more than {needed} rows, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// An iterative fit did not settle.
    #[error("Did not converge after {iterations} iterations")]
    DidNotConverge { iterations: usize },
}

/// Errors that stop the identify-then-estimate pipeline as a whole.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InferenceError {
    /// Graph-level failure (cycle, unknown variable, bad data).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Identification needed an estimator artifact that could not be built.
    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}
