//! # Prob - Identification and Estimation of Causal Effects
//!
//! Given a validated acyclic [`CausalGraph`](causalq_core::CausalGraph),
//! this crate decides whether and how the effect of the treatment on the
//! outcome is identified, then estimates it.
//!
//! ## Pipeline
//!
//! ```text
//! CausalGraph ──IdentificationStrategy──► Identification ──EffectEstimator──► EffectEstimates
//!                 │                                            │
//!                 ├─ backdoor / frontdoor sets                 ├─ regression, weighting
//!                 ├─ ADMG + one-line ID                        ├─ two-stage, 2SLS, AIPW
//!                 └─ maximal arid projection                   └─ linear Gaussian SEM
//! ```
//!
//! ## Example
//!
//! ```rust
//! use causalq_core::{CausalGraph, GraphSpec};
//! use causalq_prob::{infer_causal_effect, EstimationConfig, IdentificationConfig, PathKind};
//!
//! let graph = CausalGraph::build(
//!     GraphSpec::new("stress", "sleep")
//!         .with_vars(["exercise"])
//!         .with_edges([("exercise", "stress"), ("exercise", "sleep"), ("stress", "sleep")]),
//! )
//! .unwrap();
//!
//! let effect = infer_causal_effect(
//!     &graph,
//!     None,
//!     &IdentificationConfig::default(),
//!     &EstimationConfig::default(),
//! )
//! .unwrap();
//! assert_eq!(effect.identification.kind(), PathKind::Backdoor);
//! assert!(effect.effect().is_some());
//! ```

pub mod admg;
mod error;
pub mod estimators;
pub mod identification;
pub mod inference;
pub mod regression;
pub mod sem;

pub use admg::{Admg, OneLineId};
pub use error::{EstimatorError, InferenceError};
pub use estimators::{AlgebraicMethod, BackdoorMethod, FrontdoorMethod};
pub use identification::{
    AdjustmentSets, Confidence, CriterionPreference, Identification, IdentificationConfig,
    IdentificationPath, IdentificationStrategy, IdentifiedBy, PathKind,
};
pub use inference::{
    infer_causal_effect, CausalEffect, Criterion, EffectEstimates, EffectEstimator,
    EstimationConfig,
};
pub use sem::LinearGaussianSem;
