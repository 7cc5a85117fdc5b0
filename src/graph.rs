use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use thiserror::Error;

use crate::atom::{Atom, AtomId};
use crate::bond::{Bond, BondOrder};

/// Structural defects detected while building or validating a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedGraphError {
    /// A bond names an atom id that is not in the graph.
    #[error("bond {from}-{to} references a missing atom")]
    DanglingBond { from: AtomId, to: AtomId },
    /// Two atoms were given the same id.
    #[error("duplicate atom id {0}")]
    DuplicateAtom(AtomId),
    /// The same unordered atom pair was bonded twice.
    #[error("duplicate bond between {0} and {1}")]
    DuplicateBond(AtomId, AtomId),
    /// A bond joins an atom to itself.
    #[error("self bond on {0}")]
    SelfBond(AtomId),
    /// The id index disagrees with the stored atoms.
    #[error("atom index is inconsistent at {0}")]
    InconsistentIndex(AtomId),
    /// A relabeling permutation is not a permutation of the atoms.
    #[error("permutation of length {len} does not cover {expected} atoms")]
    InvalidPermutation { len: usize, expected: usize },
}

/// An immutable molecular graph: atoms keyed by stable [`AtomId`]s, joined
/// by undirected bonds. Built only through [`MoleculeBuilder`].
#[derive(Debug, Clone)]
pub struct MoleculeGraph {
    graph: UnGraph<Atom, Bond>,
    index: HashMap<AtomId, NodeIndex>,
}

impl MoleculeGraph {
    pub fn graph(&self) -> &UnGraph<Atom, Bond> {
        &self.graph
    }

    pub fn atom(&self, idx: NodeIndex) -> &Atom {
        &self.graph[idx]
    }

    pub fn bond(&self, idx: EdgeIndex) -> &Bond {
        &self.graph[idx]
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in insertion order.
    pub fn atoms(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Bonds in insertion order.
    pub fn bonds(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    pub fn neighbors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors(idx)
    }

    pub fn bonds_of(&self, idx: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edges(idx).map(|e| e.id())
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges(idx).count()
    }

    pub fn bond_between(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    pub fn bond_endpoints(&self, idx: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(idx)
    }

    pub fn node_of(&self, id: AtomId) -> Option<NodeIndex> {
        self.index.get(&id).copied()
    }

    pub fn atom_by_id(&self, id: AtomId) -> Option<&Atom> {
        self.node_of(id).map(|idx| &self.graph[idx])
    }

    pub fn id_of(&self, idx: NodeIndex) -> AtomId {
        self.graph[idx].id
    }

    pub fn max_atom_id(&self) -> Option<AtomId> {
        self.graph.node_weights().map(|a| a.id).max()
    }

    /// Sum of bond valence contributions; aromatic bonds count as 1.
    pub fn bond_order_sum(&self, idx: NodeIndex) -> u8 {
        self.graph
            .edges(idx)
            .map(|e| e.weight().order.valence_contribution())
            .fold(0, u8::saturating_add)
    }

    /// Re-checks that the id index, the stored atoms and the adjacency agree.
    pub fn validate(&self) -> Result<(), MalformedGraphError> {
        if self.index.len() != self.graph.node_count() {
            let id = self
                .graph
                .node_weights()
                .map(|a| a.id)
                .find(|id| self.node_of(*id).is_none())
                .unwrap_or(AtomId(0));
            return Err(MalformedGraphError::InconsistentIndex(id));
        }
        for idx in self.graph.node_indices() {
            let id = self.graph[idx].id;
            if self.node_of(id) != Some(idx) {
                return Err(MalformedGraphError::InconsistentIndex(id));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for edge in self.graph.edge_references() {
            let (a, b) = (edge.source(), edge.target());
            let (ia, ib) = (self.graph[a].id, self.graph[b].id);
            if a == b {
                return Err(MalformedGraphError::SelfBond(ia));
            }
            if !seen.insert((a.min(b), a.max(b))) {
                return Err(MalformedGraphError::DuplicateBond(ia, ib));
            }
        }
        Ok(())
    }

    /// Rebuilds the graph with atoms inserted in the order given by
    /// `permutation` (new position `i` holds old node `permutation[i]`) and
    /// ids shifted by `id_offset`. Bonds are inserted in reverse order. The
    /// result is isomorphic to `self`.
    pub fn renumbered(
        &self,
        permutation: &[usize],
        id_offset: u32,
    ) -> Result<MoleculeGraph, MalformedGraphError> {
        let n = self.atom_count();
        let mut covered = vec![false; n];
        for &p in permutation {
            if p >= n || std::mem::replace(&mut covered[p], true) {
                return Err(MalformedGraphError::InvalidPermutation {
                    len: permutation.len(),
                    expected: n,
                });
            }
        }
        if permutation.len() != n {
            return Err(MalformedGraphError::InvalidPermutation {
                len: permutation.len(),
                expected: n,
            });
        }

        let shift = |id: AtomId| AtomId(id.0 + id_offset);
        let mut builder = MoleculeBuilder::new();
        for &old in permutation {
            let mut atom = self.graph[NodeIndex::new(old)].clone();
            atom.id = shift(atom.id);
            builder.add_atom(atom);
        }
        let edges: Vec<_> = self.graph.edge_references().collect();
        for edge in edges.into_iter().rev() {
            builder.add_bond(
                shift(self.graph[edge.target()].id),
                shift(self.graph[edge.source()].id),
                edge.weight().order,
            );
        }
        builder.build()
    }
}

/// Collects atoms and bonds, then validates them into a [`MoleculeGraph`].
#[derive(Debug, Default, Clone)]
pub struct MoleculeBuilder {
    atoms: Vec<Atom>,
    bonds: Vec<(AtomId, AtomId, BondOrder)>,
}

impl MoleculeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, atom: Atom) -> AtomId {
        let id = atom.id;
        self.atoms.push(atom);
        id
    }

    pub fn add_bond(&mut self, a: AtomId, b: AtomId, order: BondOrder) {
        self.bonds.push((a, b, order));
    }

    pub fn build(self) -> Result<MoleculeGraph, MalformedGraphError> {
        let mut graph = UnGraph::with_capacity(self.atoms.len(), self.bonds.len());
        let mut index = HashMap::with_capacity(self.atoms.len());
        for atom in self.atoms {
            let id = atom.id;
            let idx = graph.add_node(atom);
            if index.insert(id, idx).is_some() {
                return Err(MalformedGraphError::DuplicateAtom(id));
            }
        }
        for (a, b, order) in self.bonds {
            let (Some(&ia), Some(&ib)) = (index.get(&a), index.get(&b)) else {
                return Err(MalformedGraphError::DanglingBond { from: a, to: b });
            };
            if ia == ib {
                return Err(MalformedGraphError::SelfBond(a));
            }
            if graph.find_edge(ia, ib).is_some() {
                return Err(MalformedGraphError::DuplicateBond(a, b));
            }
            graph.add_edge(ia, ib, Bond::new(order));
        }
        Ok(MoleculeGraph { graph, index })
    }
}
