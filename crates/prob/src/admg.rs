//! # Acyclic Directed Mixed Graphs
//!
//! An ADMG keeps only observed vertices. Directed arcs `a → b` are direct
//! causal links; bidirected arcs `a ↔ b` stand for hidden common causes.
//!
//! ## Latent projection
//!
//! [`Admg::latent_projection`] removes the unobserved nodes of a causal
//! graph:
//!
//! - `a → b` when a directed path from `a` to `b` has only latent
//!   intermediate nodes
//! - `a ↔ b` when some latent `u` reaches both through latent-only paths
//!
//! ## Fixing
//!
//! A random vertex `v` is *fixable* when `de(v) ∩ dis(v) = {v}`. Fixing it
//! removes every arc pointing into `v` (directed or bidirected) and turns
//! it into a fixed vertex of a conditional ADMG. The *reachable closure* of
//! a set `S` is what remains random after greedily fixing as much of
//! `V \ S` as possible.
//!
//! ## One-line identification
//!
//! With `Y* = an_{G \ A}(Y)`, the effect of `A` on `Y` is identified iff
//! every district of `G[Y*]` is its own reachable closure. The identifying
//! functional is
//!
//! ```text
//! Σ_{Y* \ Y}  Π_{D ∈ D(G[Y*])}  φ_{V \ D}(p(V); G)
//! ```

use causalq_core::{CausalGraph, CoreError, Skeleton, Variable};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

/// Observed vertices with directed and bidirected arcs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admg {
    vertices: Vec<Variable>,
    index: HashMap<Variable, usize>,
    directed: Skeleton,
    bidirected: Vec<BTreeSet<usize>>,
}

impl Admg {
    /// An ADMG with no arcs.
    pub fn new(vertices: Vec<Variable>) -> Self {
        let n = vertices.len();
        let index = vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        Self {
            vertices,
            index,
            directed: Skeleton::new(n),
            bidirected: vec![BTreeSet::new(); n],
        }
    }

    /// Build from named arcs. Unknown names are an error.
    pub fn from_arcs(
        vertices: &[&str],
        directed: &[(&str, &str)],
        bidirected: &[(&str, &str)],
    ) -> Result<Self, CoreError> {
        let mut g = Self::new(vertices.iter().map(|v| Variable::new(v)).collect());
        for (a, b) in directed {
            let (a, b) = (g.require(a)?, g.require(b)?);
            g.add_directed(a, b);
        }
        for (a, b) in bidirected {
            let (a, b) = (g.require(a)?, g.require(b)?);
            g.add_bidirected(a, b);
        }
        Ok(g)
    }

    /// Project the unobserved nodes out of a causal graph.
    pub fn latent_projection(graph: &CausalGraph) -> Self {
        let sk = graph.skeleton();
        let observed: Vec<bool> = graph.nodes().map(|n| n.observed).collect();

        let mut local = vec![None; observed.len()];
        let mut vertices = Vec::new();
        for (i, node) in graph.nodes().enumerate() {
            if node.observed {
                local[i] = Some(vertices.len());
                vertices.push(node.name.clone());
            }
        }
        let mut admg = Self::new(vertices);

        // Observed nodes reached from `start` through latent-only paths.
        let reach = |start: usize| -> BTreeSet<usize> {
            let mut hits = BTreeSet::new();
            let mut seen = BTreeSet::new();
            let mut stack: Vec<usize> = sk.children(start).iter().copied().collect();
            while let Some(v) = stack.pop() {
                if !seen.insert(v) {
                    continue;
                }
                if observed[v] {
                    hits.insert(v);
                } else {
                    stack.extend(sk.children(v).iter().copied());
                }
            }
            hits
        };

        for (i, &obs) in observed.iter().enumerate() {
            let targets = reach(i);
            if obs {
                for t in targets {
                    if let (Some(a), Some(b)) = (local[i], local[t]) {
                        admg.add_directed(a, b);
                    }
                }
            } else {
                let targets: Vec<usize> = targets.into_iter().filter_map(|t| local[t]).collect();
                for (k, &a) in targets.iter().enumerate() {
                    for &b in &targets[k + 1..] {
                        admg.add_bidirected(a, b);
                    }
                }
            }
        }
        debug!(
            vertices = admg.len(),
            directed = admg.directed.edges().count(),
            bidirected = admg.bidirected_arcs().len(),
            "latent projection"
        );
        admg
    }

    fn require(&self, name: &str) -> Result<usize, CoreError> {
        self.index_of(name).ok_or_else(|| CoreError::UnknownVariable {
            name: name.to_string(),
        })
    }

    pub fn add_directed(&mut self, a: usize, b: usize) {
        self.directed.add_edge(a, b);
    }

    pub fn add_bidirected(&mut self, a: usize, b: usize) {
        if a != b {
            self.bidirected[a].insert(b);
            self.bidirected[b].insert(a);
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Variable] {
        &self.vertices
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn vertex(&self, i: usize) -> &Variable {
        &self.vertices[i]
    }

    pub fn directed(&self) -> &Skeleton {
        &self.directed
    }

    pub fn has_directed(&self, a: &str, b: &str) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(a), Some(b)) => self.directed.has_edge(a, b),
            _ => false,
        }
    }

    pub fn has_bidirected(&self, a: &str, b: &str) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(a), Some(b)) => self.bidirected[a].contains(&b),
            _ => false,
        }
    }

    /// Bidirected arcs as `(a, b)` with `a < b`.
    pub fn bidirected_arcs(&self) -> Vec<(usize, usize)> {
        self.bidirected
            .iter()
            .enumerate()
            .flat_map(|(a, sp)| sp.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
            .collect()
    }

    /// Bidirected neighbours of a vertex.
    pub fn spouses(&self, v: usize) -> &BTreeSet<usize> {
        &self.bidirected[v]
    }

    /// Parents of a set, excluding the set itself.
    pub fn parents_of_set(&self, set: &BTreeSet<usize>) -> BTreeSet<usize> {
        set.iter()
            .flat_map(|&v| self.directed.parents(v).iter().copied())
            .filter(|p| !set.contains(p))
            .collect()
    }

    /// Vertices in a topological order of the directed arcs, lowest index
    /// first among ties.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut indegree: Vec<usize> = (0..self.len())
            .map(|v| self.directed.parents(v).len())
            .collect();
        let mut ready: BTreeSet<usize> = (0..self.len()).filter(|&v| indegree[v] == 0).collect();
        let mut order = Vec::with_capacity(self.len());
        while let Some(v) = ready.pop_first() {
            order.push(v);
            for &c in self.directed.children(v) {
                indegree[c] -= 1;
                if indegree[c] == 0 {
                    ready.insert(c);
                }
            }
        }
        order
    }

    /// Bidirected-connected components of `within`.
    pub fn districts(&self, within: &BTreeSet<usize>) -> Vec<BTreeSet<usize>> {
        let mut remaining = within.clone();
        let mut out = Vec::new();
        while let Some(start) = remaining.pop_first() {
            let district = self.district_of(start, within);
            for v in &district {
                remaining.remove(v);
            }
            out.push(district);
        }
        out
    }

    /// The district of `v` inside `within`.
    pub fn district_of(&self, v: usize, within: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut seen = BTreeSet::from([v]);
        let mut stack = vec![v];
        while let Some(x) = stack.pop() {
            for &s in &self.bidirected[x] {
                if within.contains(&s) && seen.insert(s) {
                    stack.push(s);
                }
            }
        }
        seen
    }

    /// Markov pillow of `v`: its district among `v` and its predecessors,
    /// plus that district's parents, minus `v`.
    pub fn markov_pillow(&self, v: usize) -> BTreeSet<usize> {
        let order = self.topological_order();
        let prefix: BTreeSet<usize> = order
            .iter()
            .copied()
            .take(order.iter().position(|&x| x == v).map_or(0, |p| p + 1))
            .collect();
        let district = self.district_of(v, &prefix);
        let mut pillow = self.parents_of_set(&district);
        pillow.extend(district);
        pillow.remove(&v);
        pillow
    }

    /// Reachable closure of `set` and the conditional ADMG it leaves.
    pub fn reachable_closure(&self, set: &BTreeSet<usize>) -> (BTreeSet<usize>, Cadmg) {
        let mut cadmg = Cadmg::new(self);
        let targets: BTreeSet<usize> = (0..self.len()).filter(|v| !set.contains(v)).collect();
        cadmg.fix_greedily(&targets);
        (cadmg.random.clone(), cadmg)
    }

    /// Whether `v` can be fixed in the unfixed graph.
    pub fn is_fixable(&self, v: usize) -> bool {
        Cadmg::new(self).is_fixable(v)
    }

    /// The maximal arid projection.
    ///
    /// `a → b` when `a` is a parent of the reachable closure of `{b}`;
    /// `a ↔ b` when the reachable closure of `{a, b}` is a single district.
    pub fn maximal_arid_projection(&self) -> Admg {
        let mut arid = Admg::new(self.vertices.clone());
        for b in 0..self.len() {
            let (closure, _) = self.reachable_closure(&BTreeSet::from([b]));
            for a in self.parents_of_set(&closure) {
                arid.add_directed(a, b);
            }
        }
        for a in 0..self.len() {
            for b in a + 1..self.len() {
                let (closure, cadmg) = self.reachable_closure(&BTreeSet::from([a, b]));
                if cadmg.graph.districts(&closure).len() == 1 {
                    arid.add_bidirected(a, b);
                }
            }
        }
        arid
    }

    /// Run one-line identification of the effect of `treatment` on `outcome`.
    pub fn one_line_id(
        &self,
        treatment: &Variable,
        outcome: &Variable,
    ) -> Result<OneLineId, CoreError> {
        let a = self.require(treatment.as_str())?;
        let y = self.require(outcome.as_str())?;

        let removed = BTreeSet::from([a]);
        let without_a = self
            .directed
            .without_incoming(&removed)
            .without_outgoing(&removed);
        let mut ystar = without_a.ancestors(&BTreeSet::from([y]));
        ystar.remove(&a);

        let districts = self.districts(&ystar);
        let unreachable: Vec<BTreeSet<usize>> = districts
            .iter()
            .filter(|d| self.reachable_closure(d).0 != **d)
            .cloned()
            .collect();

        let names = |set: &BTreeSet<usize>| -> Vec<Variable> {
            set.iter().map(|&i| self.vertices[i].clone()).collect()
        };
        let result = OneLineId {
            outcome: outcome.clone(),
            ystar: names(&ystar),
            districts: districts.iter().map(names).collect(),
            complements: districts
                .iter()
                .map(|d| (0..self.len()).filter(|v| !d.contains(v)).collect::<BTreeSet<_>>())
                .map(|c| names(&c))
                .collect(),
            identified: unreachable.is_empty(),
        };
        debug!(
            treatment = %treatment,
            outcome = %outcome,
            identified = result.identified,
            "one-line identification"
        );
        Ok(result)
    }
}

/// A conditional ADMG: some vertices fixed, the rest random.
#[derive(Debug, Clone)]
pub struct Cadmg {
    graph: Admg,
    random: BTreeSet<usize>,
}

impl Cadmg {
    fn new(g: &Admg) -> Self {
        Self {
            graph: g.clone(),
            random: (0..g.len()).collect(),
        }
    }

    pub fn random(&self) -> &BTreeSet<usize> {
        &self.random
    }

    pub fn graph(&self) -> &Admg {
        &self.graph
    }

    fn is_fixable(&self, v: usize) -> bool {
        if !self.random.contains(&v) {
            return false;
        }
        let de = self.graph.directed.descendants(&BTreeSet::from([v]));
        let dis = self.graph.district_of(v, &self.random);
        de.intersection(&dis).count() == 1
    }

    fn fix(&mut self, v: usize) {
        let parents: Vec<usize> = self.graph.directed.parents(v).iter().copied().collect();
        for p in parents {
            self.graph.directed.remove_edge(p, v);
        }
        let spouses: Vec<usize> = self.graph.bidirected[v].iter().copied().collect();
        for s in spouses {
            self.graph.bidirected[s].remove(&v);
        }
        self.graph.bidirected[v].clear();
        self.random.remove(&v);
    }

    fn fix_greedily(&mut self, targets: &BTreeSet<usize>) {
        while let Some(v) = targets.iter().copied().find(|&v| self.is_fixable(v)) {
            self.fix(v);
        }
    }
}

/// Result of one-line identification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneLineId {
    outcome: Variable,
    ystar: Vec<Variable>,
    districts: Vec<Vec<Variable>>,
    complements: Vec<Vec<Variable>>,
    identified: bool,
}

impl OneLineId {
    pub fn is_identified(&self) -> bool {
        self.identified
    }

    /// Ancestors of the outcome once the treatment is removed.
    pub fn ystar(&self) -> &[Variable] {
        &self.ystar
    }

    pub fn districts(&self) -> &[Vec<Variable>] {
        &self.districts
    }

    /// The identifying functional, or `None` when not identified.
    pub fn functional(&self) -> Option<String> {
        if !self.identified {
            return None;
        }
        let join = |vs: &[Variable]| {
            vs.iter()
                .map(Variable::as_str)
                .collect::<Vec<_>>()
                .join(",")
        };
        let summed: Vec<Variable> = self
            .ystar
            .iter()
            .filter(|v| **v != self.outcome)
            .cloned()
            .collect();

        let mut out = String::new();
        if !summed.is_empty() {
            out.push_str(&format!("Σ_{{{}}} ", join(&summed)));
        }
        let factors: Vec<String> = self
            .complements
            .iter()
            .map(|c| format!("φ_{{{}}}(p(V); G)", join(c)))
            .collect();
        out.push_str(&factors.join(" "));
        Some(out)
    }
}

impl fmt::Display for Admg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directed: Vec<String> = self
            .directed
            .edges()
            .map(|(a, b)| format!("{} -> {}", self.vertices[a], self.vertices[b]))
            .collect();
        let bidirected: Vec<String> = self
            .bidirected_arcs()
            .into_iter()
            .map(|(a, b)| format!("{} <-> {}", self.vertices[a], self.vertices[b]))
            .collect();
        write!(f, "ADMG[{}]", directed.into_iter().chain(bidirected).collect::<Vec<_>>().join(", "))
    }
}
