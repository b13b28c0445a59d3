//! # Effect Estimation
//!
//! [`EffectEstimator`] is a pure dispatcher over an [`Identification`]:
//!
//! ```text
//! Backdoor   → regression / propensity weighting on the backdoor set
//! Frontdoor  → two-stage regression on the frontdoor set
//! IV         → 2SLS when instruments exist, else not estimable
//! Algebraic  → AIPW on the treatment's Markov pillow, or the arid SEM when
//!              the treatment is not fixable (degraded)
//! Arid       → total effect read off a fitted linear Gaussian SEM
//! ```
//!
//! A sweep over several criteria never aborts: every estimator failure is
//! logged and recorded as `None` for that criterion.

use causalq_core::{CausalGraph, Dataset, DEFAULT_SEED};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{EstimatorError, InferenceError};
use crate::estimators::{self, AlgebraicMethod, BackdoorMethod, FrontdoorMethod};
use crate::identification::{
    Confidence, Identification, IdentificationConfig, IdentificationPath, IdentificationStrategy,
    PathKind,
};
use crate::sem::LinearGaussianSem;

// ============================================================================
// Configuration
// ============================================================================

/// Adjustment criteria an estimate can be keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Backdoor,
    Frontdoor,
    InstrumentalVariable,
    Algebraic,
    Arid,
}

impl Criterion {
    pub fn name(&self) -> &'static str {
        match self {
            Criterion::Backdoor => "backdoor",
            Criterion::Frontdoor => "frontdoor",
            Criterion::InstrumentalVariable => "iv",
            Criterion::Algebraic => "algebraic",
            Criterion::Arid => "arid",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<PathKind> for Criterion {
    fn from(kind: PathKind) -> Self {
        match kind {
            PathKind::Backdoor => Criterion::Backdoor,
            PathKind::Frontdoor => Criterion::Frontdoor,
            PathKind::Algebraic => Criterion::Algebraic,
            PathKind::Arid => Criterion::Arid,
        }
    }
}

/// Configuration for [`EffectEstimator`] and [`infer_causal_effect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    /// Criteria to estimate in one sweep, besides the identified path
    pub criteria: Vec<Criterion>,
    /// Backdoor estimator name
    pub backdoor_method: String,
    /// Frontdoor estimator name
    pub frontdoor_method: String,
    /// Estimator name for algebraically identified effects
    pub algebraic_method: String,
    /// Rows to synthesize when no dataset is available
    pub sample_count: usize,
    /// Seed for synthesized data
    pub seed: u64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            criteria: vec![
                Criterion::Backdoor,
                Criterion::Frontdoor,
                Criterion::InstrumentalVariable,
            ],
            backdoor_method: BackdoorMethod::LinearRegression.name().to_string(),
            frontdoor_method: FrontdoorMethod::TwoStageRegression.name().to_string(),
            algebraic_method: AlgebraicMethod::Aipw.name().to_string(),
            sample_count: 1000,
            seed: DEFAULT_SEED,
        }
    }
}

impl EstimationConfig {
    pub fn with_criteria(mut self, criteria: impl IntoIterator<Item = Criterion>) -> Self {
        self.criteria = criteria.into_iter().collect();
        self
    }

    pub fn with_backdoor_method(mut self, method: impl Into<String>) -> Self {
        self.backdoor_method = method.into();
        self
    }

    pub fn with_frontdoor_method(mut self, method: impl Into<String>) -> Self {
        self.frontdoor_method = method.into();
        self
    }

    pub fn with_algebraic_method(mut self, method: impl Into<String>) -> Self {
        self.algebraic_method = method.into();
        self
    }

    pub fn with_sample_count(mut self, n: usize) -> Self {
        self.sample_count = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Estimates keyed by criterion; `None` marks a failed or inapplicable one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectEstimates {
    pub path: PathKind,
    pub confidence: Confidence,
    pub by_criterion: BTreeMap<Criterion, Option<f64>>,
}

impl EffectEstimates {
    /// Estimate for one criterion, if it was requested and succeeded.
    pub fn get(&self, criterion: Criterion) -> Option<f64> {
        self.by_criterion.get(&criterion).copied().flatten()
    }

    /// Estimate along the identified path.
    pub fn effect(&self) -> Option<f64> {
        self.get(self.path.into())
    }
}

/// Identification plus estimates.
#[derive(Debug, Clone)]
pub struct CausalEffect {
    pub identification: Identification,
    pub estimates: EffectEstimates,
}

impl CausalEffect {
    pub fn effect(&self) -> Option<f64> {
        self.estimates.effect()
    }
}

// ============================================================================
// Estimator
// ============================================================================

/// Dispatches an identification outcome to the matching estimators.
#[derive(Debug, Clone, Default)]
pub struct EffectEstimator {
    config: EstimationConfig,
}

fn not_estimable(criterion: Criterion, reason: &str) -> EstimatorError {
    EstimatorError::NotEstimable {
        criterion: criterion.name(),
        reason: reason.to_string(),
    }
}

impl EffectEstimator {
    pub fn new(config: EstimationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimationConfig {
        &self.config
    }

    /// Estimate one criterion. Errors are returned, not swallowed.
    pub fn estimate_criterion(
        &self,
        id: &Identification,
        data: &Dataset,
        criterion: Criterion,
    ) -> Result<f64, EstimatorError> {
        let (t, y) = (&id.treatment, &id.outcome);
        match criterion {
            Criterion::Backdoor => {
                let set = id
                    .sets
                    .backdoor
                    .as_ref()
                    .ok_or_else(|| not_estimable(criterion, "no admissible backdoor set"))?;
                let method: BackdoorMethod = self.config.backdoor_method.parse()?;
                estimators::backdoor(method, data, t, y, set)
            }
            Criterion::Frontdoor => {
                let set = id
                    .sets
                    .frontdoor
                    .as_ref()
                    .ok_or_else(|| not_estimable(criterion, "no frontdoor set"))?;
                let method: FrontdoorMethod = self.config.frontdoor_method.parse()?;
                estimators::frontdoor(method, data, t, y, set)
            }
            Criterion::InstrumentalVariable => {
                let set = id
                    .sets
                    .instruments
                    .as_ref()
                    .ok_or_else(|| not_estimable(criterion, "no instruments"))?;
                estimators::instrumental_variable(data, t, y, set)
            }
            Criterion::Algebraic => match &id.path {
                IdentificationPath::Algebraic(est) => match &est.pillow {
                    Some(pillow) => {
                        let method: AlgebraicMethod = self.config.algebraic_method.parse()?;
                        estimators::aipw(method, data, t, y, pillow)
                    }
                    None => {
                        debug!("treatment not fixable, reading effect off the arid SEM");
                        let arid = est.admg.maximal_arid_projection();
                        LinearGaussianSem::fit(&arid, data)?.total_effect(t, y)
                    }
                },
                _ => Err(not_estimable(criterion, "effect was not identified algebraically")),
            },
            Criterion::Arid => match &id.path {
                IdentificationPath::Arid(est) => {
                    LinearGaussianSem::fit(&est.arid, data)?.total_effect(t, y)
                }
                _ => Err(not_estimable(criterion, "no arid projection was computed")),
            },
        }
    }

    /// Estimate every configured criterion plus the identified path.
    ///
    /// Never fails: each error becomes a `None` entry.
    pub fn estimate(&self, id: &Identification, data: &Dataset) -> EffectEstimates {
        let path = id.kind();
        let mut criteria = self.config.criteria.clone();
        criteria.push(path.into());

        let mut by_criterion = BTreeMap::new();
        for criterion in criteria {
            if by_criterion.contains_key(&criterion) {
                continue;
            }
            let value = match self.estimate_criterion(id, data, criterion) {
                Ok(v) if v.is_finite() => Some(v),
                Ok(v) => {
                    warn!(%criterion, value = v, "estimator returned a non-finite value");
                    None
                }
                Err(err) => {
                    warn!(%criterion, error = %err, "estimator failed");
                    None
                }
            };
            by_criterion.insert(criterion, value);
        }

        EffectEstimates {
            path,
            confidence: id.confidence(),
            by_criterion,
        }
    }
}

/// Identify and estimate the effect of the graph's treatment on its outcome.
///
/// Uses `data` when given, else the dataset attached to the graph, else
/// `config.sample_count` rows synthesized from the graph itself.
pub fn infer_causal_effect(
    graph: &CausalGraph,
    data: Option<&Dataset>,
    identification: &IdentificationConfig,
    estimation: &EstimationConfig,
) -> Result<CausalEffect, InferenceError> {
    let id = IdentificationStrategy::new(*identification).identify(graph)?;

    let synthesized;
    let data = match data.or(graph.data()) {
        Some(data) => data,
        None => {
            debug!(rows = estimation.sample_count, "no dataset supplied, synthesizing");
            synthesized = graph.synthesize_data_seeded(estimation.sample_count, estimation.seed)?;
            &synthesized
        }
    };

    let estimates = EffectEstimator::new(estimation.clone()).estimate(&id, data);
    Ok(CausalEffect {
        identification: id,
        estimates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use causalq_core::{GraphSpec, RoleSpec, ROLE_MODEL_ATE};

    fn stress_sleep() -> CausalGraph {
        CausalGraph::build(
            GraphSpec::new("stress", "sleep")
                .with_vars(["mediator", "confounder"])
                .with_edges([
                    ("stress", "mediator"),
                    ("mediator", "sleep"),
                    ("confounder", "stress"),
                    ("confounder", "sleep"),
                ]),
        )
        .unwrap()
    }

    #[test]
    fn test_sweep_on_stress_sleep() {
        let effect = infer_causal_effect(
            &stress_sleep(),
            None,
            &IdentificationConfig::default(),
            &EstimationConfig::default(),
        )
        .unwrap();
        let est = &effect.estimates;
        assert_eq!(est.path, PathKind::Backdoor);
        assert!(est.get(Criterion::Backdoor).unwrap().is_finite());
        assert!(est.get(Criterion::Frontdoor).is_some());
        assert_eq!(est.by_criterion.get(&Criterion::InstrumentalVariable), Some(&None));
        assert_eq!(effect.effect(), est.get(Criterion::Backdoor));
    }

    #[test]
    fn test_partial_failure_isolation() {
        let config = EstimationConfig::default().with_frontdoor_method("no_such_method");
        let effect = infer_causal_effect(
            &stress_sleep(),
            None,
            &IdentificationConfig::default(),
            &config,
        )
        .unwrap();
        assert!(effect.estimates.get(Criterion::Backdoor).is_some());
        assert_eq!(
            effect.estimates.by_criterion.get(&Criterion::Frontdoor),
            Some(&None)
        );
    }

    #[test]
    fn test_empty_frontdoor_maps_to_none() {
        let g = CausalGraph::build(
            GraphSpec::new("t", "y")
                .with_vars(["c"])
                .with_edges([("c", "t"), ("c", "y"), ("t", "y")]),
        )
        .unwrap();
        let effect = infer_causal_effect(
            &g,
            None,
            &IdentificationConfig::default(),
            &EstimationConfig::default(),
        )
        .unwrap();
        assert!(effect.estimates.get(Criterion::Backdoor).is_some());
        assert_eq!(effect.estimates.get(Criterion::Frontdoor), None);
    }

    #[test]
    fn test_latent_confounder_arid_fallback_is_numeric() {
        let g = CausalGraph::build(
            GraphSpec::new("t", "y")
                .with_edges([("t", "y")])
                .with_unobserved(["u"], Some([("u", "t"), ("u", "y")])),
        )
        .unwrap();
        let effect = infer_causal_effect(
            &g,
            None,
            &IdentificationConfig::default(),
            &EstimationConfig::default(),
        )
        .unwrap();
        assert_eq!(effect.estimates.path, PathKind::Arid);
        assert_eq!(effect.estimates.confidence, Confidence::Degraded);
        assert!(effect.effect().unwrap().is_finite());
    }

    #[test]
    fn test_unfixable_treatment_sem_estimate_is_degraded() {
        // Napkin: w -> z -> x -> y with w <-> x and w <-> y.
        let g = CausalGraph::build(
            GraphSpec::new("x", "y")
                .with_vars(["w", "z"])
                .with_edges([("w", "z"), ("z", "x"), ("x", "y")])
                .with_unobserved(
                    ["u1", "u2"],
                    Some([("u1", "w"), ("u1", "x"), ("u2", "w"), ("u2", "y")]),
                ),
        )
        .unwrap();
        let effect = infer_causal_effect(
            &g,
            None,
            &IdentificationConfig::default(),
            &EstimationConfig::default(),
        )
        .unwrap();
        assert_eq!(effect.estimates.path, PathKind::Algebraic);
        assert_eq!(effect.estimates.confidence, Confidence::Degraded);
        assert!(effect.effect().unwrap().is_finite());
    }

    #[test]
    fn test_algebraic_aipw_on_role_data() {
        let roles = RoleSpec::new("t", "y");
        let data = roles.generate(2000, 9).unwrap();
        let g = CausalGraph::build(roles.to_graph_spec()).unwrap().with_data(data);
        let effect = infer_causal_effect(
            &g,
            None,
            &IdentificationConfig::default(),
            &EstimationConfig::default(),
        )
        .unwrap();
        assert_eq!(effect.estimates.path, PathKind::Algebraic);
        let ate = effect.effect().unwrap();
        assert!((ate - ROLE_MODEL_ATE).abs() < 0.3, "ate {}", ate);
    }

    #[test]
    fn test_propensity_weighting_method() {
        let roles = RoleSpec::stress_sleep();
        let data = roles.generate(4000, 21).unwrap();
        let g = CausalGraph::build(roles.to_graph_spec()).unwrap();
        let config = EstimationConfig::default()
            .with_backdoor_method("propensity_score_weighting")
            .with_criteria([Criterion::Backdoor]);
        let effect =
            infer_causal_effect(&g, Some(&data), &IdentificationConfig::default(), &config)
                .unwrap();
        let ate = effect.estimates.get(Criterion::Backdoor).unwrap();
        assert!((ate - ROLE_MODEL_ATE).abs() < 0.75, "ate {}", ate);
    }

    #[test]
    fn test_criterion_requested_off_path_is_none() {
        let config = EstimationConfig::default().with_criteria([Criterion::Arid]);
        let effect = infer_causal_effect(
            &stress_sleep(),
            None,
            &IdentificationConfig::default(),
            &config,
        )
        .unwrap();
        assert_eq!(effect.estimates.by_criterion.get(&Criterion::Arid), Some(&None));
        assert!(effect.effect().is_some());
    }

    #[test]
    fn test_config_from_json() {
        let config: EstimationConfig = serde_json::from_str(
            r#"{"criteria": ["backdoor", "instrumental_variable"], "seed": 7}"#,
        )
        .unwrap();
        assert_eq!(
            config.criteria,
            vec![Criterion::Backdoor, Criterion::InstrumentalVariable]
        );
        assert_eq!(config.seed, 7);
        assert_eq!(config.backdoor_method, "linear_regression");
    }
}
