//! # Identification Strategy
//!
//! Decides *how* the effect of the treatment on the outcome can be read off
//! observational data, trying three paths in order:
//!
//! 1. **Standard**: a non-empty backdoor or frontdoor set of observed
//!    variables. Backdoor wins ties unless the policy says otherwise.
//! 2. **Algebraic**: latent projection to an ADMG and one-line
//!    identification.
//! 3. **Arid**: maximal arid projection, to be fitted as a linear Gaussian
//!    SEM. Always available, never more than a degraded-confidence answer.
//!
//! Separation queries run on the full graph (latent nodes included) while
//! adjustment sets may only contain observed variables.

use causalq_core::{CausalGraph, CoreError, Skeleton, Variable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

use crate::admg::{Admg, OneLineId};

// ============================================================================
// Configuration
// ============================================================================

/// Which standard criterion wins when both sets are non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionPreference {
    #[default]
    BackdoorFirst,
    FrontdoorFirst,
}

/// Configuration for [`IdentificationStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationConfig {
    /// Tie-break between backdoor and frontdoor
    pub preference: CriterionPreference,
    /// Largest subset tried when the full candidate set is not admissible
    pub max_subset_size: usize,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            preference: CriterionPreference::BackdoorFirst,
            max_subset_size: 4,
        }
    }
}

impl IdentificationConfig {
    pub fn with_preference(mut self, preference: CriterionPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_max_subset_size(mut self, size: usize) -> Self {
        self.max_subset_size = size;
        self
    }
}

// ============================================================================
// Outcome types
// ============================================================================

/// Adjustment artifacts found on the graph. `None` means no admissible set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjustmentSets {
    pub backdoor: Option<Vec<Variable>>,
    pub frontdoor: Option<Vec<Variable>>,
    pub instruments: Option<Vec<Variable>>,
}

impl AdjustmentSets {
    fn non_empty(set: &Option<Vec<Variable>>) -> bool {
        set.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_backdoor(&self) -> bool {
        Self::non_empty(&self.backdoor)
    }

    pub fn has_frontdoor(&self) -> bool {
        Self::non_empty(&self.frontdoor)
    }
}

/// Which standard criterion identified the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifiedBy {
    Backdoor,
    Frontdoor,
}

/// Artifacts of a successful one-line identification.
#[derive(Debug, Clone)]
pub struct AlgebraicEstimand {
    pub admg: Admg,
    pub one_line: OneLineId,
    pub functional: String,
    /// Markov pillow of the treatment, when the treatment is fixable
    pub pillow: Option<Vec<Variable>>,
}

/// Artifacts of the arid fallback.
#[derive(Debug, Clone)]
pub struct AridEstimand {
    pub admg: Admg,
    pub arid: Admg,
}

/// The path that applies.
#[derive(Debug, Clone)]
pub enum IdentificationPath {
    Standard(IdentifiedBy),
    Algebraic(AlgebraicEstimand),
    Arid(AridEstimand),
}

/// Short tag for an [`IdentificationPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    Backdoor,
    Frontdoor,
    Algebraic,
    Arid,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PathKind::Backdoor => "backdoor",
            PathKind::Frontdoor => "frontdoor",
            PathKind::Algebraic => "algebraic",
            PathKind::Arid => "arid",
        };
        f.write_str(name)
    }
}

/// How much an estimate along a path can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// The effect is identified from the graph
    Identified,
    /// Only as good as the linear Gaussian assumption
    Degraded,
}

/// A tagged identification outcome.
#[derive(Debug, Clone)]
pub struct Identification {
    pub treatment: Variable,
    pub outcome: Variable,
    pub sets: AdjustmentSets,
    pub path: IdentificationPath,
}

impl Identification {
    pub fn kind(&self) -> PathKind {
        match &self.path {
            IdentificationPath::Standard(IdentifiedBy::Backdoor) => PathKind::Backdoor,
            IdentificationPath::Standard(IdentifiedBy::Frontdoor) => PathKind::Frontdoor,
            IdentificationPath::Algebraic(_) => PathKind::Algebraic,
            IdentificationPath::Arid(_) => PathKind::Arid,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match &self.path {
            IdentificationPath::Arid(_) => Confidence::Degraded,
            IdentificationPath::Algebraic(est) if est.pillow.is_none() => Confidence::Degraded,
            _ => Confidence::Identified,
        }
    }

    pub fn is_standard(&self) -> bool {
        matches!(self.path, IdentificationPath::Standard(_))
    }

    /// Identifying functional of the algebraic path.
    pub fn functional(&self) -> Option<&str> {
        match &self.path {
            IdentificationPath::Algebraic(est) => Some(&est.functional),
            _ => None,
        }
    }
}

// ============================================================================
// Strategy
// ============================================================================

/// Runs the three-path identification over a causal graph.
#[derive(Debug, Clone, Default)]
pub struct IdentificationStrategy {
    config: IdentificationConfig,
}

struct Query {
    sk: Skeleton,
    observed: Vec<bool>,
    x: usize,
    y: usize,
}

impl Query {
    fn new(graph: &CausalGraph) -> Result<Self, CoreError> {
        Ok(Self {
            sk: graph.skeleton(),
            observed: graph.nodes().map(|n| n.observed).collect(),
            x: graph.index_of(graph.treatment().as_str())?,
            y: graph.index_of(graph.outcome().as_str())?,
        })
    }

    fn observed_in(&self, set: &BTreeSet<usize>) -> Vec<usize> {
        set.iter()
            .copied()
            .filter(|&v| self.observed[v] && v != self.x && v != self.y)
            .collect()
    }
}

impl IdentificationStrategy {
    pub fn new(config: IdentificationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IdentificationConfig {
        &self.config
    }

    /// Identify the effect of the graph's treatment on its outcome.
    ///
    /// Fails with [`CoreError::CyclicGraph`] on a cyclic graph.
    pub fn identify(&self, graph: &CausalGraph) -> Result<Identification, CoreError> {
        graph.topological_order()?;
        let treatment = graph.treatment().clone();
        let outcome = graph.outcome().clone();

        let sets = AdjustmentSets {
            backdoor: self.backdoor_set(graph)?,
            frontdoor: self.frontdoor_set(graph)?,
            instruments: self.instruments(graph)?,
        };
        debug!(?sets, "adjustment sets");

        let standard = match self.config.preference {
            CriterionPreference::BackdoorFirst if sets.has_backdoor() => {
                Some(IdentifiedBy::Backdoor)
            }
            CriterionPreference::FrontdoorFirst if sets.has_frontdoor() => {
                Some(IdentifiedBy::Frontdoor)
            }
            _ if sets.has_backdoor() => Some(IdentifiedBy::Backdoor),
            _ if sets.has_frontdoor() => Some(IdentifiedBy::Frontdoor),
            _ => None,
        };

        let path = match standard {
            Some(by) => IdentificationPath::Standard(by),
            None => {
                let admg = Admg::latent_projection(graph);
                let one_line = admg.one_line_id(&treatment, &outcome)?;
                match one_line.functional() {
                    Some(functional) => {
                        let t = admg.index_of(treatment.as_str()).ok_or_else(|| {
                            CoreError::UnknownVariable {
                                name: treatment.to_string(),
                            }
                        })?;
                        let pillow: Option<Vec<Variable>> = admg.is_fixable(t).then(|| {
                            admg.markov_pillow(t)
                                .into_iter()
                                .map(|i| admg.vertex(i).clone())
                                .collect()
                        });
                        IdentificationPath::Algebraic(AlgebraicEstimand {
                            admg,
                            one_line,
                            functional,
                            pillow,
                        })
                    }
                    None => {
                        let arid = admg.maximal_arid_projection();
                        IdentificationPath::Arid(AridEstimand { admg, arid })
                    }
                }
            }
        };

        let id = Identification {
            treatment,
            outcome,
            sets,
            path,
        };
        info!(
            treatment = %id.treatment,
            outcome = %id.outcome,
            path = %id.kind(),
            "identification complete"
        );
        Ok(id)
    }

    /// The largest admissible backdoor set found.
    ///
    /// Candidates are observed non-descendants of the treatment. The full
    /// candidate set is tried first, then subsets by decreasing size down
    /// from `max_subset_size`. Outcome-only covariates therefore stay in the
    /// set and count toward [`AdjustmentSets::has_backdoor`].
    pub fn backdoor_set(&self, graph: &CausalGraph) -> Result<Option<Vec<Variable>>, CoreError> {
        let q = Query::new(graph)?;
        let (candidates, admissible) = backdoor_candidates(&q);
        let found = largest(&candidates, self.config.max_subset_size, &admissible);
        Ok(found.map(|z| names(graph, &z)))
    }

    /// An admissible backdoor set with no redundant member.
    ///
    /// Starts from [`Self::backdoor_set`] and greedily drops variables while
    /// the set stays admissible.
    pub fn minimal_backdoor_set(
        &self,
        graph: &CausalGraph,
    ) -> Result<Option<Vec<Variable>>, CoreError> {
        let q = Query::new(graph)?;
        let (candidates, admissible) = backdoor_candidates(&q);
        let found = largest(&candidates, self.config.max_subset_size, &admissible);
        Ok(found.map(|z| names(graph, &minimize(z, &admissible))))
    }

    /// A frontdoor set of observed mediators.
    pub fn frontdoor_set(&self, graph: &CausalGraph) -> Result<Option<Vec<Variable>>, CoreError> {
        let q = Query::new(graph)?;
        let (xs, ys) = (BTreeSet::from([q.x]), BTreeSet::from([q.y]));
        let de_x = q.sk.descendants(&xs);
        let an_y = q.sk.ancestors(&ys);
        let between: BTreeSet<usize> = de_x.intersection(&an_y).copied().collect();
        let candidates = q.observed_in(&between);

        let under_x = q.sk.without_outgoing(&xs);
        let admissible = |m: &BTreeSet<usize>| {
            !m.is_empty()
                && !q.sk.reachable_avoiding(&xs, m).contains(&q.y)
                && under_x.d_separated(&xs, m, &BTreeSet::new())
                && q.sk.without_outgoing(m).d_separated(m, &ys, &xs)
        };

        let found = search(&candidates, self.config.max_subset_size, 1, &admissible);
        Ok(found.map(|m| names(graph, &m)))
    }

    /// Observed instruments for the treatment.
    ///
    /// `z` qualifies when it is an ancestor of the treatment, not an
    /// ancestor of the outcome once edges into the treatment are cut, and
    /// d-separated from the outcome once edges out of the treatment are cut.
    pub fn instruments(&self, graph: &CausalGraph) -> Result<Option<Vec<Variable>>, CoreError> {
        let q = Query::new(graph)?;
        let (xs, ys) = (BTreeSet::from([q.x]), BTreeSet::from([q.y]));
        let an_x = q.sk.ancestors(&xs);
        let an_y_cut = q.sk.without_incoming(&xs).ancestors(&ys);
        let under_x = q.sk.without_outgoing(&xs);

        let found: BTreeSet<usize> = q
            .observed_in(&an_x)
            .into_iter()
            .filter(|z| !an_y_cut.contains(z))
            .filter(|&z| under_x.d_separated(&BTreeSet::from([z]), &ys, &BTreeSet::new()))
            .collect();
        Ok((!found.is_empty()).then(|| names(graph, &found)))
    }
}

fn names(graph: &CausalGraph, set: &BTreeSet<usize>) -> Vec<Variable> {
    set.iter()
        .filter_map(|&i| graph.variable_at(i).cloned())
        .collect()
}

/// Observed non-descendants of the treatment, and the backdoor test over them.
fn backdoor_candidates(q: &Query) -> (Vec<usize>, impl Fn(&BTreeSet<usize>) -> bool) {
    let xs = BTreeSet::from([q.x]);
    let de_x = q.sk.descendants(&xs);
    let candidates: BTreeSet<usize> = (0..q.sk.len()).filter(|v| !de_x.contains(v)).collect();
    let candidates = q.observed_in(&candidates);

    let under_x = q.sk.without_outgoing(&xs);
    let ys = BTreeSet::from([q.y]);
    let admissible = move |z: &BTreeSet<usize>| under_x.d_separated(&xs, &ys, z);
    (candidates, admissible)
}

/// Full candidate set first, then every subset of size `min_size..=max`.
fn search<F>(candidates: &[usize], max: usize, min_size: usize, ok: &F) -> Option<BTreeSet<usize>>
where
    F: Fn(&BTreeSet<usize>) -> bool,
{
    let full: BTreeSet<usize> = candidates.iter().copied().collect();
    if full.len() >= min_size && ok(&full) {
        return Some(full);
    }
    (min_size..=max.min(candidates.len())).find_map(|k| first_of_size(candidates, k, ok))
}

/// Full candidate set first, then every subset of size `max..=0`.
fn largest<F>(candidates: &[usize], max: usize, ok: &F) -> Option<BTreeSet<usize>>
where
    F: Fn(&BTreeSet<usize>) -> bool,
{
    let full: BTreeSet<usize> = candidates.iter().copied().collect();
    if ok(&full) {
        return Some(full);
    }
    (0..=max.min(candidates.len()))
        .rev()
        .find_map(|k| first_of_size(candidates, k, ok))
}

/// First `k`-subset of `candidates`, in lexicographic order, that passes `ok`.
fn first_of_size<F>(candidates: &[usize], k: usize, ok: &F) -> Option<BTreeSet<usize>>
where
    F: Fn(&BTreeSet<usize>) -> bool,
{
    let n = candidates.len();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        let subset: BTreeSet<usize> = idx.iter().map(|&i| candidates[i]).collect();
        if ok(&subset) {
            return Some(subset);
        }
        // Advance to the next k-combination of 0..n.
        let pos = (0..k).rev().find(|&i| idx[i] != i + n - k)?;
        idx[pos] += 1;
        for j in pos + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

fn minimize<F>(mut set: BTreeSet<usize>, ok: &F) -> BTreeSet<usize>
where
    F: Fn(&BTreeSet<usize>) -> bool,
{
    for v in set.clone() {
        let mut smaller = set.clone();
        smaller.remove(&v);
        if ok(&smaller) {
            set = smaller;
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use causalq_core::GraphSpec;

    fn v(name: &str) -> Variable {
        Variable::new(name)
    }

    fn build(spec: GraphSpec) -> CausalGraph {
        CausalGraph::build(spec).unwrap()
    }

    fn stress_sleep() -> CausalGraph {
        build(
            GraphSpec::new("stress", "sleep")
                .with_vars(["mediator", "confounder"])
                .with_edges([
                    ("stress", "mediator"),
                    ("mediator", "sleep"),
                    ("confounder", "stress"),
                    ("confounder", "sleep"),
                ]),
        )
    }

    fn latent_bow() -> CausalGraph {
        build(
            GraphSpec::new("t", "y")
                .with_edges([("t", "y")])
                .with_unobserved(["u"], Some([("u", "t"), ("u", "y")])),
        )
    }

    #[test]
    fn test_stress_sleep_prefers_backdoor() {
        let id = IdentificationStrategy::default()
            .identify(&stress_sleep())
            .unwrap();
        assert_eq!(id.kind(), PathKind::Backdoor);
        assert_eq!(id.sets.backdoor, Some(vec![v("confounder")]));
        assert_eq!(id.sets.frontdoor, Some(vec![v("mediator")]));
        assert_eq!(id.confidence(), Confidence::Identified);
    }

    #[test]
    fn test_frontdoor_first_policy() {
        let config = IdentificationConfig::default()
            .with_preference(CriterionPreference::FrontdoorFirst);
        let id = IdentificationStrategy::new(config)
            .identify(&stress_sleep())
            .unwrap();
        assert_eq!(id.kind(), PathKind::Frontdoor);
    }

    #[test]
    fn test_latent_frontdoor() {
        let g = build(
            GraphSpec::new("t", "y")
                .with_vars(["m"])
                .with_edges([("t", "m"), ("m", "y")])
                .with_unobserved(["u"], Some([("u", "t"), ("u", "y")])),
        );
        let id = IdentificationStrategy::default().identify(&g).unwrap();
        assert!(id.sets.backdoor.is_none());
        assert_eq!(id.kind(), PathKind::Frontdoor);
    }

    #[test]
    fn test_latent_bow_falls_through_to_arid() {
        let id = IdentificationStrategy::default()
            .identify(&latent_bow())
            .unwrap();
        assert!(!id.sets.has_backdoor());
        assert!(!id.sets.has_frontdoor());
        assert_eq!(id.kind(), PathKind::Arid);
        assert_eq!(id.confidence(), Confidence::Degraded);
        match &id.path {
            IdentificationPath::Arid(est) => {
                assert!(est.arid.has_bidirected("t", "y"));
                assert!(!est.arid.has_directed("t", "y"));
            }
            other => panic!("unexpected path {:?}", other),
        }
    }

    #[test]
    fn test_unconfounded_goes_algebraic() {
        let g = build(GraphSpec::new("t", "y").with_edges([("t", "y")]));
        let id = IdentificationStrategy::default().identify(&g).unwrap();
        assert_eq!(id.sets.backdoor, Some(vec![]));
        assert_eq!(id.kind(), PathKind::Algebraic);
        assert!(id.functional().is_some());
        match &id.path {
            IdentificationPath::Algebraic(est) => assert_eq!(est.pillow, Some(vec![])),
            other => panic!("unexpected path {:?}", other),
        }
    }

    #[test]
    fn test_instruments_found() {
        let g = build(
            GraphSpec::new("t", "y")
                .with_vars(["z"])
                .with_edges([("z", "t"), ("t", "y")])
                .with_unobserved(["u"], Some([("u", "t"), ("u", "y")])),
        );
        let strategy = IdentificationStrategy::default();
        assert_eq!(strategy.instruments(&g).unwrap(), Some(vec![v("z")]));
        let id = strategy.identify(&g).unwrap();
        assert_eq!(id.kind(), PathKind::Arid);
    }

    #[test]
    fn test_confounder_is_not_instrument() {
        let strategy = IdentificationStrategy::default();
        assert_eq!(strategy.instruments(&stress_sleep()).unwrap(), None);
    }

    #[test]
    fn test_backdoor_avoids_collider() {
        // t <- u1 -> m <- u2 -> y, t -> y
        let g = build(
            GraphSpec::new("t", "y")
                .with_vars(["m"])
                .with_edges([("t", "y")])
                .with_unobserved(
                    ["u1", "u2"],
                    Some([("u1", "t"), ("u1", "m"), ("u2", "m"), ("u2", "y")]),
                ),
        );
        let set = IdentificationStrategy::default()
            .backdoor_set(&g)
            .unwrap()
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_minimal_backdoor_drops_collider() {
        // t <- a -> m <- b -> y, t -> y
        let g = build(
            GraphSpec::new("t", "y")
                .with_vars(["a", "m", "b"])
                .with_edges([("a", "t"), ("a", "m"), ("b", "m"), ("b", "y"), ("t", "y")]),
        );
        let strategy = IdentificationStrategy::default();
        let mut maximal = strategy.backdoor_set(&g).unwrap().unwrap();
        maximal.sort();
        assert_eq!(maximal, vec![v("a"), v("b"), v("m")]);
        let minimal = strategy.minimal_backdoor_set(&g).unwrap().unwrap();
        assert!(!minimal.contains(&v("m")));
        assert!(minimal.len() < 3);
    }

    #[test]
    fn test_outcome_only_covariate_takes_backdoor() {
        let g = build(
            GraphSpec::new("stress", "sleep")
                .with_vars(["age"])
                .with_edges([("age", "sleep"), ("stress", "sleep")]),
        );
        let strategy = IdentificationStrategy::default();
        let id = strategy.identify(&g).unwrap();
        assert_eq!(id.sets.backdoor, Some(vec![v("age")]));
        assert_eq!(id.kind(), PathKind::Backdoor);
        assert_eq!(id.confidence(), Confidence::Identified);
        assert_eq!(strategy.minimal_backdoor_set(&g).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_napkin_is_algebraic_but_degraded() {
        let g = build(
            GraphSpec::new("x", "y")
                .with_vars(["w", "z"])
                .with_edges([("w", "z"), ("z", "x"), ("x", "y")])
                .with_unobserved(
                    ["u1", "u2"],
                    Some([("u1", "w"), ("u1", "x"), ("u2", "w"), ("u2", "y")]),
                ),
        );
        let id = IdentificationStrategy::default().identify(&g).unwrap();
        assert!(!id.sets.has_backdoor());
        assert!(!id.sets.has_frontdoor());
        assert_eq!(id.kind(), PathKind::Algebraic);
        assert!(id.functional().is_some());
        match &id.path {
            IdentificationPath::Algebraic(est) => assert!(est.pillow.is_none()),
            other => panic!("unexpected path {:?}", other),
        }
        assert_eq!(id.confidence(), Confidence::Degraded);
    }

    #[test]
    fn test_monotonicity() {
        let graphs = [
            stress_sleep(),
            build(
                GraphSpec::new("t", "y")
                    .with_vars(["c"])
                    .with_edges([("c", "t"), ("c", "y"), ("t", "y")])
                    .with_unobserved(["u"], Some([("u", "c"), ("u", "y")])),
            ),
        ];
        for g in &graphs {
            let id = IdentificationStrategy::default().identify(g).unwrap();
            if id.sets.has_backdoor() {
                assert!(id.is_standard());
            }
        }
    }

    #[test]
    fn test_cyclic_graph_rejected() {
        let g = build(GraphSpec::new("a", "c").with_edges([("a", "b"), ("b", "c"), ("c", "a")]));
        assert!(matches!(
            IdentificationStrategy::default().identify(&g),
            Err(CoreError::CyclicGraph { .. })
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config: IdentificationConfig =
            serde_json::from_str(r#"{"preference": "frontdoor_first"}"#).unwrap();
        assert_eq!(config.preference, CriterionPreference::FrontdoorFirst);
        assert_eq!(config.max_subset_size, 4);
    }
}
