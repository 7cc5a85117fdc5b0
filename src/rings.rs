use std::collections::{BTreeSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::graph::MoleculeGraph;

/// Ring perception for query evaluation and structure checks.
///
/// For every bond the shortest cycle through it is found by a BFS that may not
/// use the bond itself; a bond with no such cycle is acyclic. The distinct
/// shortest cycles form the ring set used for membership counts. This equals
/// the SSSR for fused and spiro systems; for cage compounds it can miss rings
/// that are never the shortest cycle through any bond.
#[derive(Debug, Clone)]
pub struct RingInfo {
    ring_bond: Vec<bool>,
    rings: Vec<Vec<NodeIndex>>,
    smallest: Vec<Option<usize>>,
}

impl RingInfo {
    pub fn compute(mol: &MoleculeGraph) -> Self {
        let mut ring_bond = vec![false; mol.bond_count()];
        let mut smallest: Vec<Option<usize>> = vec![None; mol.atom_count()];
        let mut seen: BTreeSet<Vec<NodeIndex>> = BTreeSet::new();
        let mut rings = Vec::new();

        for edge in mol.bonds() {
            let Some((u, v)) = mol.bond_endpoints(edge) else {
                continue;
            };
            let Some(cycle) = shortest_cycle_through(mol, edge, u, v) else {
                continue;
            };
            ring_bond[edge.index()] = true;
            for &atom in &cycle {
                let slot = &mut smallest[atom.index()];
                *slot = Some(slot.map_or(cycle.len(), |s| s.min(cycle.len())));
            }
            let mut key = cycle.clone();
            key.sort();
            if seen.insert(key) {
                rings.push(cycle);
            }
        }

        Self {
            ring_bond,
            rings,
            smallest,
        }
    }

    pub fn rings(&self) -> &[Vec<NodeIndex>] {
        &self.rings
    }

    pub fn is_ring_bond(&self, edge: EdgeIndex) -> bool {
        self.ring_bond.get(edge.index()).copied().unwrap_or(false)
    }

    pub fn is_ring_atom(&self, atom: NodeIndex) -> bool {
        self.smallest_ring_size(atom).is_some()
    }

    pub fn smallest_ring_size(&self, atom: NodeIndex) -> Option<usize> {
        self.smallest.get(atom.index()).copied().flatten()
    }

    /// Number of rings in the ring set that contain `atom`.
    pub fn ring_count(&self, atom: NodeIndex) -> usize {
        self.rings.iter().filter(|r| r.contains(&atom)).count()
    }

    /// Number of ring bonds incident to `atom`.
    pub fn ring_connectivity(&self, mol: &MoleculeGraph, atom: NodeIndex) -> usize {
        mol.bonds_of(atom).filter(|&e| self.is_ring_bond(e)).count()
    }
}

fn shortest_cycle_through(
    mol: &MoleculeGraph,
    skip: EdgeIndex,
    from: NodeIndex,
    to: NodeIndex,
) -> Option<Vec<NodeIndex>> {
    let mut prev: Vec<Option<NodeIndex>> = vec![None; mol.atom_count()];
    let mut visited = vec![false; mol.atom_count()];
    let mut queue = VecDeque::new();
    visited[from.index()] = true;
    queue.push_back(from);

    while let Some(cur) = queue.pop_front() {
        if cur == to {
            let mut path = vec![to];
            let mut node = to;
            while let Some(p) = prev[node.index()] {
                path.push(p);
                node = p;
            }
            return Some(path);
        }
        for e in mol.bonds_of(cur) {
            if e == skip {
                continue;
            }
            let Some((a, b)) = mol.bond_endpoints(e) else {
                continue;
            };
            let next = if a == cur { b } else { a };
            if !visited[next.index()] {
                visited[next.index()] = true;
                prev[next.index()] = Some(cur);
                queue.push_back(next);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse;

    fn info(smiles: &str) -> (MoleculeGraph, RingInfo) {
        let mol = parse(smiles).unwrap_or_else(|e| panic!("bad SMILES {smiles:?}: {e}"));
        let rings = RingInfo::compute(&mol);
        (mol, rings)
    }

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn acyclic() {
        let (mol, ri) = info("CCCC");
        assert!(ri.rings().is_empty());
        assert!(mol.bonds().all(|e| !ri.is_ring_bond(e)));
        assert_eq!(ri.smallest_ring_size(n(1)), None);
    }

    #[test]
    fn cyclohexane() {
        let (mol, ri) = info("C1CCCCC1");
        assert_eq!(ri.rings().len(), 1);
        assert!(mol.bonds().all(|e| ri.is_ring_bond(e)));
        assert_eq!(ri.smallest_ring_size(n(3)), Some(6));
        assert_eq!(ri.ring_count(n(0)), 1);
    }

    #[test]
    fn toluene_methyl_not_in_ring() {
        let (mol, ri) = info("Cc1ccccc1");
        assert!(!ri.is_ring_atom(n(0)));
        assert!(ri.is_ring_atom(n(1)));
        let exo = mol.bond_between(n(0), n(1)).unwrap();
        assert!(!ri.is_ring_bond(exo));
        assert_eq!(ri.ring_connectivity(&mol, n(1)), 2);
    }

    #[test]
    fn naphthalene_fusion_atoms() {
        let (mol, ri) = info("c1ccc2ccccc2c1");
        assert_eq!(ri.rings().len(), 2);
        assert_eq!(ri.ring_count(n(3)), 2);
        assert_eq!(ri.ring_count(n(0)), 1);
        assert_eq!(ri.ring_connectivity(&mol, n(3)), 3);
    }

    #[test]
    fn spiro_center_in_two_rings() {
        let (_, ri) = info("C1CCC2(C1)CCCC2");
        assert_eq!(ri.rings().len(), 2);
        assert_eq!(ri.ring_count(n(3)), 2);
        assert_eq!(ri.smallest_ring_size(n(3)), Some(5));
    }

    #[test]
    fn smallest_ring_in_bicycle() {
        let (_, ri) = info("C1CC2CC1C2");
        assert_eq!(ri.smallest_ring_size(n(2)), Some(4));
        assert_eq!(ri.smallest_ring_size(n(0)), Some(5));
    }
}
