//! # Separation Queries
//!
//! Index-based adjacency for graphical queries on a [`CausalGraph`]:
//! ancestors, descendants, edge-removal views (`G_overline_X`,
//! `G_underline_X`) and d-separation.
//!
//! d-separation uses the reachability ("Bayes ball") traversal: a trail is
//! followed node by node, remembering whether it arrived from a child
//! (`Up`) or from a parent (`Down`). Colliders pass only when they are
//! ancestors of the conditioning set.
//!
//! [`CausalGraph`]: crate::graph::CausalGraph

use std::collections::{BTreeSet, HashSet};

/// Parent and child sets for each dense node index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    parents: Vec<BTreeSet<usize>>,
    children: Vec<BTreeSet<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Pass {
    Up,
    Down,
}

impl Skeleton {
    /// An edgeless skeleton over `n` nodes.
    pub fn new(n: usize) -> Self {
        Self {
            parents: vec![BTreeSet::new(); n],
            children: vec![BTreeSet::new(); n],
        }
    }

    /// Build from `(source, target)` index pairs.
    pub fn from_edges<I>(n: usize, edges: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut sk = Self::new(n);
        for (a, b) in edges {
            sk.add_edge(a, b);
        }
        sk
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// True if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn add_edge(&mut self, a: usize, b: usize) {
        self.children[a].insert(b);
        self.parents[b].insert(a);
    }

    pub fn remove_edge(&mut self, a: usize, b: usize) {
        self.children[a].remove(&b);
        self.parents[b].remove(&a);
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.children[a].contains(&b)
    }

    pub fn parents(&self, v: usize) -> &BTreeSet<usize> {
        &self.parents[v]
    }

    pub fn children(&self, v: usize) -> &BTreeSet<usize> {
        &self.children[v]
    }

    /// All `(source, target)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.children
            .iter()
            .enumerate()
            .flat_map(|(a, cs)| cs.iter().map(move |&b| (a, b)))
    }

    /// Copy with every edge *into* `set` removed (`G_overline_set`).
    pub fn without_incoming(&self, set: &BTreeSet<usize>) -> Self {
        let mut sk = self.clone();
        for &v in set {
            for p in self.parents[v].iter().copied() {
                sk.remove_edge(p, v);
            }
        }
        sk
    }

    /// Copy with every edge *out of* `set` removed (`G_underline_set`).
    pub fn without_outgoing(&self, set: &BTreeSet<usize>) -> Self {
        let mut sk = self.clone();
        for &v in set {
            for c in self.children[v].iter().copied() {
                sk.remove_edge(v, c);
            }
        }
        sk
    }

    /// `set` and everything with a directed path into it.
    pub fn ancestors(&self, set: &BTreeSet<usize>) -> BTreeSet<usize> {
        self.closure(set, |v| &self.parents[v], &BTreeSet::new())
    }

    /// `set` and everything reachable from it by directed paths.
    pub fn descendants(&self, set: &BTreeSet<usize>) -> BTreeSet<usize> {
        self.closure(set, |v| &self.children[v], &BTreeSet::new())
    }

    /// Nodes reachable from `from` by directed paths that never enter
    /// `blocked`. Start nodes are included.
    pub fn reachable_avoiding(
        &self,
        from: &BTreeSet<usize>,
        blocked: &BTreeSet<usize>,
    ) -> BTreeSet<usize> {
        self.closure(from, |v| &self.children[v], blocked)
    }

    fn closure<'a, F>(
        &'a self,
        start: &BTreeSet<usize>,
        next: F,
        blocked: &BTreeSet<usize>,
    ) -> BTreeSet<usize>
    where
        F: Fn(usize) -> &'a BTreeSet<usize>,
    {
        let mut seen = start.clone();
        let mut stack: Vec<usize> = start.iter().copied().collect();
        while let Some(v) = stack.pop() {
            for &w in next(v) {
                if !blocked.contains(&w) && seen.insert(w) {
                    stack.push(w);
                }
            }
        }
        seen
    }

    /// True when `x` and `y` are d-separated given `z`.
    ///
    /// Overlapping `x` and `y` are never separated. Members of `z` inside
    /// `x` are ignored.
    pub fn d_separated(
        &self,
        x: &BTreeSet<usize>,
        y: &BTreeSet<usize>,
        z: &BTreeSet<usize>,
    ) -> bool {
        if !x.is_disjoint(y) {
            return false;
        }
        let anc_z = self.ancestors(z);

        let mut visited: HashSet<(usize, Pass)> = HashSet::new();
        let mut stack: Vec<(usize, Pass)> = x
            .iter()
            .filter(|v| !z.contains(v))
            .map(|&v| (v, Pass::Up))
            .collect();

        while let Some((v, pass)) = stack.pop() {
            if !visited.insert((v, pass)) {
                continue;
            }
            let observed = z.contains(&v);
            if !observed && y.contains(&v) {
                return false;
            }
            match pass {
                Pass::Up => {
                    if !observed {
                        stack.extend(self.parents[v].iter().map(|&p| (p, Pass::Up)));
                        stack.extend(self.children[v].iter().map(|&c| (c, Pass::Down)));
                    }
                }
                Pass::Down => {
                    if !observed {
                        stack.extend(self.children[v].iter().map(|&c| (c, Pass::Down)));
                    }
                    if anc_z.contains(&v) {
                        stack.extend(self.parents[v].iter().map(|&p| (p, Pass::Up)));
                    }
                }
            }
        }
        true
    }
}
