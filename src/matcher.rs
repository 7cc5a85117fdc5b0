//! Subgraph search of [`Pattern`]s in [`MoleculeGraph`]s.
//!
//! The search is a VF2-style backtracking walk over the pattern nodes in a
//! connectivity-first order. Each pattern node after the first of its
//! component has an already-placed neighbour, and its candidates are the
//! neighbours of that neighbour's image, in insertion order. Results are
//! therefore deterministic for a given graph.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::atom::AtomId;
use crate::graph::MoleculeGraph;
use crate::pattern::{MatchContext, Pattern};

/// Image of each pattern node, indexed by pattern node index.
pub type AtomMapping = Vec<AtomId>;

/// Bounds on a single search, recursive sub-patterns included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Candidate atoms tried before giving up.
    pub max_steps: u64,
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    /// Keep only the first mapping of each distinct atom set.
    pub uniquify: bool,
    pub max_matches: Option<usize>,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            timeout: Duration::from_millis(2000),
            uniquify: true,
            max_matches: None,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchTimeoutError {
    #[error("search gave up after {limit} steps")]
    StepLimit { limit: u64 },
    #[error("search gave up after {}ms", limit.as_millis())]
    Deadline { limit: Duration },
}

pub fn find_matches(
    mol: &MoleculeGraph,
    pattern: &Pattern,
    limits: &SearchLimits,
) -> Result<Vec<AtomMapping>, SearchTimeoutError> {
    Matcher::new(mol).find_matches(pattern, limits)
}

pub fn match_exists(
    mol: &MoleculeGraph,
    pattern: &Pattern,
    limits: &SearchLimits,
) -> Result<bool, SearchTimeoutError> {
    Matcher::new(mol).match_exists(pattern, limits)
}

/// Checks that `mapping` is an injective embedding of `pattern` in `mol`.
pub fn verify_mapping(mol: &MoleculeGraph, pattern: &Pattern, mapping: &AtomMapping) -> bool {
    Matcher::new(mol).verify_mapping(pattern, mapping)
}

/// Searches one molecule for many patterns, sharing ring perception and
/// the Kekulé assignment between them.
pub struct Matcher<'a> {
    ctx: MatchContext<'a>,
}

impl<'a> Matcher<'a> {
    pub fn new(mol: &'a MoleculeGraph) -> Self {
        Self {
            ctx: MatchContext::new(mol),
        }
    }

    pub fn molecule(&self) -> &'a MoleculeGraph {
        self.ctx.mol
    }

    pub fn find_matches(
        &mut self,
        pattern: &Pattern,
        limits: &SearchLimits,
    ) -> Result<Vec<AtomMapping>, SearchTimeoutError> {
        let mut budget = Budget::new(limits);
        self.prepare(pattern, &mut budget)?;
        let found = Search::new(&self.ctx, pattern, &mut budget, Mode::All(limits)).run(None)?;
        trace!(pattern = pattern.source(), matches = found.len(), steps = budget.steps, "search done");
        let mol = self.ctx.mol;
        Ok(found
            .into_iter()
            .map(|nodes| nodes.into_iter().map(|n| mol.id_of(n)).collect())
            .collect())
    }

    pub fn match_exists(
        &mut self,
        pattern: &Pattern,
        limits: &SearchLimits,
    ) -> Result<bool, SearchTimeoutError> {
        let mut budget = Budget::new(limits);
        self.prepare(pattern, &mut budget)?;
        let found = Search::new(&self.ctx, pattern, &mut budget, Mode::First).run(None)?;
        Ok(!found.is_empty())
    }

    pub fn verify_mapping(&mut self, pattern: &Pattern, mapping: &AtomMapping) -> bool {
        let mol = self.ctx.mol;
        if mapping.len() != pattern.atom_count() {
            return false;
        }
        let Some(nodes) = mapping
            .iter()
            .map(|&id| mol.node_of(id))
            .collect::<Option<Vec<NodeIndex>>>()
        else {
            return false;
        };
        let distinct: HashSet<NodeIndex> = nodes.iter().copied().collect();
        if distinct.len() != nodes.len() {
            return false;
        }
        let mut budget = Budget::new(&SearchLimits::default());
        if self.prepare(pattern, &mut budget).is_err() {
            return false;
        }

        let graph = pattern.graph();
        let atoms_ok = graph
            .node_indices()
            .all(|p| graph[p].matches(&self.ctx, nodes[p.index()]));
        atoms_ok
            && graph.edge_indices().all(|e| {
                let Some((a, b)) = graph.edge_endpoints(e) else {
                    return false;
                };
                mol.bond_between(nodes[a.index()], nodes[b.index()])
                    .is_some_and(|bond| graph[e].matches(&self.ctx, bond))
            })
    }

    /// Evaluates every recursive sub-pattern once over all atoms, deepest
    /// first, and stores the hits in the context.
    fn prepare(&mut self, pattern: &Pattern, budget: &mut Budget) -> Result<(), SearchTimeoutError> {
        self.ctx.clear_recursive_hits();
        self.prepare_recursive(pattern, budget)
    }

    fn prepare_recursive(&mut self, pattern: &Pattern, budget: &mut Budget) -> Result<(), SearchTimeoutError> {
        let mol = self.ctx.mol;
        for recursive in pattern.recursive_patterns() {
            if self.ctx.has_recursive_hits(recursive.id) {
                continue;
            }
            self.prepare_recursive(&recursive.pattern, budget)?;
            let mut hits = Vec::with_capacity(mol.atom_count());
            for atom in mol.atoms() {
                let found = Search::new(&self.ctx, &recursive.pattern, budget, Mode::First).run(Some(atom))?;
                hits.push(!found.is_empty());
            }
            self.ctx.set_recursive_hits(recursive.id, hits);
        }
        Ok(())
    }
}

struct Budget {
    steps: u64,
    max_steps: u64,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Budget {
    fn new(limits: &SearchLimits) -> Self {
        Self {
            steps: 0,
            max_steps: limits.max_steps,
            timeout: limits.timeout,
            deadline: Instant::now().checked_add(limits.timeout),
        }
    }

    fn tick(&mut self) -> Result<(), SearchTimeoutError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(SearchTimeoutError::StepLimit {
                limit: self.max_steps,
            });
        }
        if self.steps % 64 == 1 && self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(SearchTimeoutError::Deadline {
                limit: self.timeout,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Mode<'l> {
    First,
    All(&'l SearchLimits),
}

struct Search<'s, 'a> {
    ctx: &'s MatchContext<'a>,
    pattern: &'s Pattern,
    budget: &'s mut Budget,
    mode: Mode<'s>,
    /// Pattern nodes in search order, each with its already-placed neighbour.
    order: Vec<(NodeIndex, Option<NodeIndex>)>,
    map: Vec<Option<NodeIndex>>,
    used: Vec<bool>,
    seen: HashSet<Vec<NodeIndex>>,
    results: Vec<Vec<NodeIndex>>,
}

impl<'s, 'a> Search<'s, 'a> {
    fn new(ctx: &'s MatchContext<'a>, pattern: &'s Pattern, budget: &'s mut Budget, mode: Mode<'s>) -> Self {
        Self {
            ctx,
            pattern,
            budget,
            mode,
            order: search_order(pattern),
            map: vec![None; pattern.atom_count()],
            used: vec![false; ctx.mol.atom_count()],
            seen: HashSet::new(),
            results: Vec::new(),
        }
    }

    /// Runs the search; `anchor` pins pattern node 0 to one atom.
    fn run(mut self, anchor: Option<NodeIndex>) -> Result<Vec<Vec<NodeIndex>>, SearchTimeoutError> {
        if self.order.is_empty() {
            return Ok(Vec::new());
        }
        self.extend(0, anchor)?;
        Ok(self.results)
    }

    /// Places pattern node `order[depth]`. Returns `true` once the search
    /// should stop.
    fn extend(&mut self, depth: usize, anchor: Option<NodeIndex>) -> Result<bool, SearchTimeoutError> {
        if depth == self.order.len() {
            return Ok(self.record());
        }
        let (node, placed) = self.order[depth];
        let candidates: Vec<NodeIndex> = match (depth, anchor, placed.and_then(|p| self.map[p.index()])) {
            (0, Some(a), _) => vec![a],
            (_, _, Some(image)) => {
                let mut nbrs: Vec<NodeIndex> = self.ctx.mol.neighbors(image).collect();
                nbrs.sort_unstable();
                nbrs
            }
            _ => self.ctx.mol.atoms().collect(),
        };

        for cand in candidates {
            self.budget.tick()?;
            if self.used[cand.index()] || !self.feasible(node, cand) {
                continue;
            }
            self.map[node.index()] = Some(cand);
            self.used[cand.index()] = true;
            let stop = self.extend(depth + 1, anchor)?;
            self.map[node.index()] = None;
            self.used[cand.index()] = false;
            if stop {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn feasible(&self, node: NodeIndex, cand: NodeIndex) -> bool {
        let graph = self.pattern.graph();
        if !graph[node].matches(self.ctx, cand) {
            return false;
        }
        graph.neighbors(node).all(|other| {
            let Some(image) = self.map[other.index()] else {
                return true;
            };
            let Some(pattern_bond) = graph.find_edge(node, other) else {
                return false;
            };
            self.ctx
                .mol
                .bond_between(cand, image)
                .is_some_and(|bond| graph[pattern_bond].matches(self.ctx, bond))
        })
    }

    fn record(&mut self) -> bool {
        let mapping: Vec<NodeIndex> = self.map.iter().flatten().copied().collect();
        let Mode::All(limits) = self.mode else {
            self.results.push(mapping);
            return true;
        };
        if limits.uniquify {
            let mut set = mapping.clone();
            set.sort_unstable();
            if !self.seen.insert(set) {
                return false;
            }
        }
        self.results.push(mapping);
        limits.max_matches.is_some_and(|max| self.results.len() >= max)
    }
}

/// Breadth-first order over each pattern component, starting each component
/// at its lowest node index.
fn search_order(pattern: &Pattern) -> Vec<(NodeIndex, Option<NodeIndex>)> {
    let graph = pattern.graph();
    let mut order = Vec::with_capacity(graph.node_count());
    let mut placed = vec![false; graph.node_count()];
    for root in graph.node_indices() {
        if placed[root.index()] {
            continue;
        }
        placed[root.index()] = true;
        let start = order.len();
        order.push((root, None));
        let mut cursor = start;
        while cursor < order.len() {
            let (current, _) = order[cursor];
            let mut nbrs: Vec<NodeIndex> = graph.neighbors(current).collect();
            nbrs.sort_unstable();
            for next in nbrs {
                if !placed[next.index()] {
                    placed[next.index()] = true;
                    order.push((next, Some(current)));
                }
            }
            cursor += 1;
        }
    }
    order
}
