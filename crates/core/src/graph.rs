//! # Causal Graph - Annotated Directed Graph
//!
//! A causal graph is a directed graph over canonical [`Variable`]s where
//! every node carries `observed`, `is_treatment` and `is_outcome` tags and
//! every edge carries an `observed` tag.
//!
//! ## Construction order
//!
//! [`CausalGraph::build`] inserts, in order:
//!
//! 1. the treatment node, then the outcome node
//! 2. the remaining observed variables
//! 3. the observed edges
//! 4. unobserved variables (`observed = false`)
//! 5. unobserved edges (`observed = false`)
//!
//! Edge endpoints that were never declared are added as plain observed
//! nodes. An edge touching an unobserved node is always tagged unobserved.
//!
//! ## Invariant
//!
//! A structural causal model must be acyclic over *all* edges. Construction
//! does not enforce this: [`CausalGraph::has_cycle`] reports it and the
//! formalization loop discards cyclic candidates wholesale. There is no
//! mutation API after construction.

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::CoreError;
use crate::separation::Skeleton;
use crate::variable::Variable;

/// An ordered `(source, target)` pair.
pub type EdgePair = (Variable, Variable);

/// Unobserved variables and, optionally, the edges that involve them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnobservedSpec {
    pub variables: Vec<Variable>,
    pub edges: Option<Vec<EdgePair>>,
}

/// Everything needed to build a [`CausalGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub treatment: Variable,
    pub outcome: Variable,
    pub other_vars: Vec<Variable>,
    pub edges: Vec<EdgePair>,
    pub unobserved: Option<UnobservedSpec>,
}

impl GraphSpec {
    /// Start a spec with just the treatment and outcome.
    pub fn new(treatment: impl Into<Variable>, outcome: impl Into<Variable>) -> Self {
        Self {
            treatment: treatment.into(),
            outcome: outcome.into(),
            other_vars: Vec::new(),
            edges: Vec::new(),
            unobserved: None,
        }
    }

    /// Add observed covariates.
    pub fn with_vars<I, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Variable>,
    {
        self.other_vars.extend(vars.into_iter().map(Into::into));
        self
    }

    /// Add observed edges.
    pub fn with_edges<I, A, B>(mut self, edges: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<Variable>,
        B: Into<Variable>,
    {
        self.edges
            .extend(edges.into_iter().map(|(a, b)| (a.into(), b.into())));
        self
    }

    /// Declare unobserved variables and their edges.
    pub fn with_unobserved<I, V, E, A, B>(mut self, vars: I, edges: Option<E>) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Variable>,
        E: IntoIterator<Item = (A, B)>,
        A: Into<Variable>,
        B: Into<Variable>,
    {
        self.unobserved = Some(UnobservedSpec {
            variables: vars.into_iter().map(Into::into).collect(),
            edges: edges.map(|e| e.into_iter().map(|(a, b)| (a.into(), b.into())).collect()),
        });
        self
    }
}

/// Node annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttrs {
    pub name: Variable,
    pub observed: bool,
    pub is_treatment: bool,
    pub is_outcome: bool,
}

impl NodeAttrs {
    fn plain(name: Variable, observed: bool) -> Self {
        Self {
            name,
            observed,
            is_treatment: false,
            is_outcome: false,
        }
    }
}

/// Edge annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeAttrs {
    pub observed: bool,
}

/// An annotated causal graph with exactly one treatment and one outcome.
#[derive(Debug, Clone)]
pub struct CausalGraph {
    graph: DiGraph<NodeAttrs, EdgeAttrs>,
    index: HashMap<Variable, NodeIndex>,
    treatment: NodeIndex,
    outcome: NodeIndex,
    data: Option<Dataset>,
}

impl CausalGraph {
    /// Build a graph from a spec.
    ///
    /// Fails with [`CoreError::DuplicateNode`] when treatment and outcome
    /// coincide, [`CoreError::SelfLoop`] on an `a -> a` edge and
    /// [`CoreError::UnobservedQueryVariable`] when the treatment or outcome is
    /// declared unobserved. Cycles are *not* an error here.
    pub fn build(spec: GraphSpec) -> Result<Self, CoreError> {
        if spec.treatment == spec.outcome {
            return Err(CoreError::DuplicateNode {
                name: spec.treatment.to_string(),
            });
        }

        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        let treatment = graph.add_node(NodeAttrs {
            name: spec.treatment.clone(),
            observed: true,
            is_treatment: true,
            is_outcome: false,
        });
        index.insert(spec.treatment.clone(), treatment);

        let outcome = graph.add_node(NodeAttrs {
            name: spec.outcome.clone(),
            observed: true,
            is_treatment: false,
            is_outcome: true,
        });
        index.insert(spec.outcome.clone(), outcome);

        let mut this = Self {
            graph,
            index,
            treatment,
            outcome,
            data: None,
        };

        for var in &spec.other_vars {
            this.ensure_node(var, true);
        }
        for (a, b) in &spec.edges {
            this.insert_edge(a, b, true)?;
        }

        if let Some(unobserved) = &spec.unobserved {
            for var in &unobserved.variables {
                if var == &spec.treatment || var == &spec.outcome {
                    return Err(CoreError::UnobservedQueryVariable {
                        name: var.to_string(),
                    });
                }
                let idx = this.ensure_node(var, false);
                this.graph[idx].observed = false;
            }
            for (a, b) in unobserved.edges.iter().flatten() {
                this.insert_edge(a, b, false)?;
            }
        }

        // An edge into or out of a latent node is never observed, whichever
        // list it came from.
        let hidden: Vec<_> = this
            .graph
            .edge_references()
            .filter(|e| !this.graph[e.source()].observed || !this.graph[e.target()].observed)
            .map(|e| e.id())
            .collect();
        for id in hidden {
            this.graph[id].observed = false;
        }

        Ok(this)
    }

    /// Attach a dataset to the graph.
    pub fn with_data(mut self, data: Dataset) -> Self {
        self.data = Some(data);
        self
    }

    fn ensure_node(&mut self, var: &Variable, observed: bool) -> NodeIndex {
        if let Some(&idx) = self.index.get(var) {
            return idx;
        }
        debug!(variable = %var, observed, "adding node");
        let idx = self.graph.add_node(NodeAttrs::plain(var.clone(), observed));
        self.index.insert(var.clone(), idx);
        idx
    }

    fn insert_edge(&mut self, a: &Variable, b: &Variable, observed: bool) -> Result<(), CoreError> {
        if a == b {
            return Err(CoreError::SelfLoop {
                name: a.to_string(),
            });
        }
        let from = self.ensure_node(a, true);
        let to = self.ensure_node(b, true);
        self.graph.update_edge(from, to, EdgeAttrs { observed });
        Ok(())
    }

    /// The treatment variable.
    pub fn treatment(&self) -> &Variable {
        &self.graph[self.treatment].name
    }

    /// The outcome variable.
    pub fn outcome(&self) -> &Variable {
        &self.graph[self.outcome].name
    }

    /// The attached dataset, if any.
    pub fn data(&self) -> Option<&Dataset> {
        self.data.as_ref()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the variable is a node.
    pub fn contains(&self, var: &str) -> bool {
        self.index.contains_key(var)
    }

    /// Node annotations for a variable.
    pub fn node(&self, var: &str) -> Option<&NodeAttrs> {
        self.index.get(var).map(|&idx| &self.graph[idx])
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeAttrs> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// All edges as `(source, target, attrs)`.
    pub fn edges(&self) -> impl Iterator<Item = (&Variable, &Variable, EdgeAttrs)> {
        self.graph.edge_references().map(move |e| {
            (
                &self.graph[e.source()].name,
                &self.graph[e.target()].name,
                *e.weight(),
            )
        })
    }

    /// Whether `a -> b` is an edge.
    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&x), Some(&y)) => self.graph.contains_edge(x, y),
            _ => false,
        }
    }

    /// Direct parents of a variable.
    pub fn parents(&self, var: &str) -> Result<Vec<&Variable>, CoreError> {
        self.neighbors(var, Direction::Incoming)
    }

    /// Direct children of a variable.
    pub fn children(&self, var: &str) -> Result<Vec<&Variable>, CoreError> {
        self.neighbors(var, Direction::Outgoing)
    }

    fn neighbors(&self, var: &str, dir: Direction) -> Result<Vec<&Variable>, CoreError> {
        let idx = self.require(var)?;
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(idx, dir).collect();
        out.sort();
        Ok(out.into_iter().map(|i| &self.graph[i].name).collect())
    }

    fn require(&self, var: &str) -> Result<NodeIndex, CoreError> {
        self.index
            .get(var)
            .copied()
            .ok_or_else(|| CoreError::UnknownVariable {
                name: var.to_string(),
            })
    }

    /// Dense index of a variable, matching [`CausalGraph::skeleton`].
    pub fn index_of(&self, var: &str) -> Result<usize, CoreError> {
        self.require(var).map(NodeIndex::index)
    }

    /// Dense indices for a set of variables.
    pub fn indices_of<'a, I>(&self, vars: I) -> Result<BTreeSet<usize>, CoreError>
    where
        I: IntoIterator<Item = &'a Variable>,
    {
        vars.into_iter().map(|v| self.index_of(v.as_str())).collect()
    }

    /// Variable at a dense index.
    pub fn variable_at(&self, idx: usize) -> Option<&Variable> {
        self.graph.node_weight(NodeIndex::new(idx)).map(|n| &n.name)
    }

    /// Whether the graph has a directed cycle over all edges.
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Nodes in a topological order over all edges.
    pub fn topological_order(&self) -> Result<Vec<&Variable>, CoreError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|idx| &self.graph[idx].name).collect())
            .map_err(|cycle| CoreError::CyclicGraph {
                name: self.graph[cycle.node_id()].name.to_string(),
            })
    }

    /// Observed nodes and observed edges.
    pub fn observed_projection(&self) -> (Vec<Variable>, Vec<EdgePair>) {
        let nodes = self
            .nodes()
            .filter(|n| n.observed)
            .map(|n| n.name.clone())
            .collect();
        let edges = self
            .edges()
            .filter(|(_, _, attrs)| attrs.observed)
            .map(|(a, b, _)| (a.clone(), b.clone()))
            .collect();
        (nodes, edges)
    }

    /// Edges involving unobserved variables.
    pub fn confounding_projection(&self) -> Vec<EdgePair> {
        self.edges()
            .filter(|(_, _, attrs)| !attrs.observed)
            .map(|(a, b, _)| (a.clone(), b.clone()))
            .collect()
    }

    /// Variables tagged unobserved.
    pub fn unobserved_variables(&self) -> Vec<&Variable> {
        self.nodes()
            .filter(|n| !n.observed)
            .map(|n| &n.name)
            .collect()
    }

    /// Index-based adjacency over all edges, for separation queries.
    pub fn skeleton(&self) -> Skeleton {
        let edges = self
            .graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index()));
        Skeleton::from_edges(self.graph.node_count(), edges)
    }

    /// Render as a DOT digraph. Unobserved nodes are drawn dashed.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph {\n");
        for node in self.nodes().filter(|n| !n.observed) {
            out.push_str(&format!("  \"{}\" [style=dashed];\n", node.name));
        }
        for (a, b, attrs) in self.edges() {
            if attrs.observed {
                out.push_str(&format!("  \"{}\" -> \"{}\";\n", a, b));
            } else {
                out.push_str(&format!("  \"{}\" -> \"{}\" [style=dashed];\n", a, b));
            }
        }
        out.push('}');
        out
    }
}

impl fmt::Display for CausalGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "CausalGraph({} nodes, {} edges)",
            self.node_count(),
            self.edge_count()
        )?;
        writeln!(f, "  Treatment: {}", self.treatment())?;
        writeln!(f, "  Outcome: {}", self.outcome())?;
        let hidden = self.unobserved_variables();
        if !hidden.is_empty() {
            writeln!(f, "  Unobserved: {:?}", hidden)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stress_sleep() -> GraphSpec {
        GraphSpec::new("stress", "sleep")
            .with_vars(["mediator", "confounder"])
            .with_edges([
                ("stress", "mediator"),
                ("mediator", "sleep"),
                ("confounder", "stress"),
                ("confounder", "sleep"),
            ])
    }

    #[test]
    fn test_build_tags_treatment_and_outcome() {
        let g = CausalGraph::build(stress_sleep()).unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 4);
        assert_eq!(g.nodes().filter(|n| n.is_treatment).count(), 1);
        assert_eq!(g.nodes().filter(|n| n.is_outcome).count(), 1);
        assert_eq!(g.treatment().as_str(), "stress");
        assert_eq!(g.outcome().as_str(), "sleep");
        assert!(g.nodes().all(|n| n.observed));
    }

    #[test]
    fn test_treatment_equal_outcome_is_duplicate() {
        let spec = GraphSpec::new("Stress.", " Stress");
        assert!(matches!(
            CausalGraph::build(spec),
            Err(CoreError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn test_covariate_naming_treatment_keeps_tags() {
        let spec = GraphSpec::new("stress", "sleep").with_vars(["stress", "age"]);
        let g = CausalGraph::build(spec).unwrap();
        assert_eq!(g.node_count(), 3);
        assert!(g.node("stress").unwrap().is_treatment);
    }

    #[test]
    fn test_undeclared_endpoints_are_added() {
        let spec = GraphSpec::new("a", "b").with_edges([("c", "a"), ("a", "b")]);
        let g = CausalGraph::build(spec).unwrap();
        assert!(g.contains("c"));
        assert!(g.node("c").unwrap().observed);
    }

    #[test]
    fn test_self_loop_rejected() {
        let spec = GraphSpec::new("a", "b").with_edges([("c", "c")]);
        assert!(matches!(
            CausalGraph::build(spec),
            Err(CoreError::SelfLoop { .. })
        ));
    }

    #[test]
    fn test_cycle_detection() {
        let spec = GraphSpec::new("A", "C").with_edges([("A", "B"), ("B", "C"), ("C", "A")]);
        let g = CausalGraph::build(spec).unwrap();
        assert!(g.has_cycle());
        assert!(matches!(
            g.topological_order(),
            Err(CoreError::CyclicGraph { .. })
        ));
    }

    #[test]
    fn test_cycle_through_unobserved_edge() {
        let spec = GraphSpec::new("x", "y")
            .with_edges([("x", "y")])
            .with_unobserved(["u"], Some([("y", "u"), ("u", "x")]));
        let g = CausalGraph::build(spec).unwrap();
        assert!(g.has_cycle());
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let g = CausalGraph::build(stress_sleep()).unwrap();
        assert!(!g.has_cycle());
        let order = g.topological_order().unwrap();
        let pos = |name: &str| order.iter().position(|v| v.as_str() == name).unwrap();
        for (a, b, _) in g.edges() {
            assert!(pos(a.as_str()) < pos(b.as_str()));
        }
    }

    #[test]
    fn test_projections_split_observed_and_latent() {
        let spec = GraphSpec::new("x", "y")
            .with_edges([("x", "y")])
            .with_unobserved(["u"], Some([("u", "x"), ("u", "y")]));
        let g = CausalGraph::build(spec).unwrap();

        let (nodes, edges) = g.observed_projection();
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges, vec![(Variable::new("x"), Variable::new("y"))]);

        let latent = g.confounding_projection();
        assert_eq!(latent.len(), 2);
        assert!(!g.node("u").unwrap().observed);
    }

    #[test]
    fn test_unobserved_override_hides_edges() {
        let spec = GraphSpec::new("x", "y")
            .with_vars(["g"])
            .with_edges([("g", "x"), ("x", "y")])
            .with_unobserved(["g"], None::<Vec<(&str, &str)>>);
        let g = CausalGraph::build(spec).unwrap();
        assert!(!g.node("g").unwrap().observed);
        assert_eq!(g.confounding_projection().len(), 1);
    }

    #[test]
    fn test_unobserved_treatment_rejected() {
        let spec = GraphSpec::new("x", "y").with_unobserved(["x"], None::<Vec<(&str, &str)>>);
        assert!(matches!(
            CausalGraph::build(spec),
            Err(CoreError::UnobservedQueryVariable { .. })
        ));
    }

    #[test]
    fn test_parents_and_children() {
        let g = CausalGraph::build(stress_sleep()).unwrap();
        let parents: Vec<_> = g.parents("sleep").unwrap().iter().map(|v| v.as_str()).collect();
        assert_eq!(parents, vec!["mediator", "confounder"]);
        assert!(g.children("nope").is_err());
    }

    #[test]
    fn test_to_dot() {
        let g = CausalGraph::build(stress_sleep()).unwrap();
        let dot = g.to_dot();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("\"stress\" -> \"mediator\";"));
    }
}
