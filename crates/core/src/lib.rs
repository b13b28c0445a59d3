//! # Core - Causal Query Foundations
//!
//! Typed graph-construction input and the causal graph itself:
//!
//! - **Variables**: canonical identifiers for graph nodes
//! - **Parsing**: the strict text grammar for elicited answers
//! - **Graphs**: annotated causal graphs with observed/unobserved tags
//! - **Separation**: ancestors, edge-removal views and d-separation
//! - **Synthesis**: structural data drawn from a graph
//! - **Roles**: treatment/mediator/confounder/collider scenarios
//! - **Capabilities**: request-typed collaborator contracts
//!
//! ## Flow
//!
//! ```text
//! ResponseBundle ──parse_response──► GraphSpec ──build──► CausalGraph
//!                                                           │
//!                                           synthesize_data ▼
//!                                                         Dataset
//! ```

pub mod capability;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod parse;
pub mod roles;
pub mod separation;
pub mod synth;
pub mod variable;

pub use capability::{Capability, CapabilityError, Handles, Request};
pub use dataset::Dataset;
pub use error::CoreError;
pub use graph::{CausalGraph, EdgeAttrs, EdgePair, GraphSpec, NodeAttrs, UnobservedSpec};
pub use parse::{parse_response, ResponseBundle, UnobservedResponse};
pub use roles::{RoleSpec, ROLE_MODEL_ATE};
pub use separation::Skeleton;
pub use synth::DEFAULT_SEED;
pub use variable::{canonicalize, Variable};
