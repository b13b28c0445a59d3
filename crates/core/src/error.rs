//! # Error Types
//!
//! Structural errors are first-class: a malformed edge line or a cyclic edge
//! set means the elicited description cannot be turned into a structural
//! causal model at all. The formalization loop treats every variant here as
//! a rejected attempt, never as something to patch up.

use thiserror::Error;

/// Core errors for graph construction, parsing and tabular data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// An edge line did not have the shape `source -> target`.
    #[error("Malformed edge line {line:?}: {reason}")]
    MalformedEdgeLine { line: String, reason: String },

    /// A required field of the response bundle was absent or blank.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// Treatment and outcome resolve to the same canonical variable.
    #[error("Treatment and outcome are the same variable: {name}")]
    DuplicateNode { name: String },

    /// An edge points from a variable to itself.
    #[error("Self-loop on variable {name}")]
    SelfLoop { name: String },

    /// A topological operation was invoked on a cyclic graph.
    #[error("Graph contains a cycle through {name}")]
    CyclicGraph { name: String },

    /// A variable is not a node of the graph.
    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    /// The treatment or outcome was declared unobserved.
    #[error("Query variable {name} cannot be unobserved")]
    UnobservedQueryVariable { name: String },

    /// Dataset columns have different lengths.
    #[error("Column {name} has {got} rows, expected {expected}")]
    RaggedColumns {
        name: String,
        expected: usize,
        got: usize,
    },

    /// Two dataset columns share a name.
    #[error("Duplicate column: {name}")]
    DuplicateColumn { name: String },
}
