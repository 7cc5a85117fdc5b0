//! Kekulé assignment for aromatic systems.
//!
//! Aromatic atoms that still need a double bond to reach an allowed valence
//! are paired along aromatic bonds by augmenting-path matching. Each matched
//! bond becomes double, every other aromatic bond single. When some atom
//! cannot be paired the aromatic system has no Kekulé structure, which is how
//! rewritten products with an impossible aromatic ring are rejected.
//!
//! The graph itself is never modified; callers get the resolved order of
//! every bond and use it for valence checks.

use std::collections::VecDeque;

use petgraph::graph::{EdgeIndex, NodeIndex};
use thiserror::Error;

use crate::atom::AtomId;
use crate::bond::BondOrder;
use crate::graph::MoleculeGraph;
use crate::valence::allowed_valences;

/// No Kekulé structure exists for the aromatic system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KekulizeError {
    /// These aromatic atoms could not be given a double bond.
    #[error("cannot kekulize aromatic system: unmatched atoms {0:?}")]
    Unkekulizable(Vec<AtomId>),
}

/// Resolves every aromatic bond to single or double.
///
/// The returned vector is indexed by edge index. Non-aromatic bonds keep
/// their order. Molecules without aromatic atoms always succeed.
pub fn kekule_orders(mol: &MoleculeGraph) -> Result<Vec<BondOrder>, KekulizeError> {
    let mut orders: Vec<BondOrder> = mol.bonds().map(|e| mol.bond(e).order).collect();

    let mut pairing = Pairing::new(mol);
    let candidates: Vec<NodeIndex> = mol
        .atoms()
        .filter(|&idx| pairing.needs_double[idx.index()])
        .collect();
    if candidates.is_empty() && !orders.contains(&BondOrder::Aromatic) {
        return Ok(orders);
    }

    for &start in &candidates {
        if pairing.mate[start.index()].is_none() {
            pairing.augment(start);
        }
    }

    let unmatched: Vec<AtomId> = candidates
        .iter()
        .filter(|&&v| pairing.mate[v.index()].is_none())
        .map(|&v| mol.id_of(v))
        .collect();
    if !unmatched.is_empty() {
        return Err(KekulizeError::Unkekulizable(unmatched));
    }

    for order in orders.iter_mut() {
        if *order == BondOrder::Aromatic {
            *order = BondOrder::Single;
        }
    }
    for (_, edge) in pairing.mate.iter().flatten() {
        orders[edge.index()] = BondOrder::Double;
    }
    Ok(orders)
}

struct Pairing {
    adj: Vec<Vec<(NodeIndex, EdgeIndex)>>,
    needs_double: Vec<bool>,
    mate: Vec<Option<(NodeIndex, EdgeIndex)>>,
}

impl Pairing {
    fn new(mol: &MoleculeGraph) -> Self {
        let n = mol.atom_count();
        let mut adj = vec![Vec::new(); n];
        for edge in mol.bonds() {
            if !mol.bond(edge).is_aromatic() {
                continue;
            }
            if let Some((a, b)) = mol.bond_endpoints(edge) {
                adj[a.index()].push((b, edge));
                adj[b.index()].push((a, edge));
            }
        }

        let needs_double = mol
            .atoms()
            .map(|idx| {
                let atom = mol.atom(idx);
                if !atom.aromatic {
                    return false;
                }
                let used = mol.bond_order_sum(idx).saturating_add(atom.hydrogens);
                let Some(target) = allowed_valences(atom.element, atom.charge)
                    .into_iter()
                    .find(|&v| v >= used)
                else {
                    return false;
                };
                let gap = target - used;
                gap == 1 || (gap == 2 && atom.hydrogens == 0 && atom.charge != 0)
            })
            .collect();

        Self {
            adj,
            needs_double,
            mate: vec![None; n],
        }
    }

    /// Grows an alternating BFS tree from the unpaired `start` and flips the
    /// first path that ends at another unpaired atom.
    fn augment(&mut self, start: NodeIndex) -> bool {
        let n = self.adj.len();
        let mut parent: Vec<Option<(NodeIndex, EdgeIndex)>> = vec![None; n];
        let mut reached = vec![false; n];
        let mut queue = VecDeque::from([start]);
        reached[start.index()] = true;

        while let Some(u) = queue.pop_front() {
            for &(v, edge) in &self.adj[u.index()] {
                if reached[v.index()] || !self.needs_double[v.index()] {
                    continue;
                }
                reached[v.index()] = true;
                parent[v.index()] = Some((u, edge));
                match self.mate[v.index()] {
                    None => {
                        self.flip(&parent, v);
                        return true;
                    }
                    Some((w, _)) if !reached[w.index()] => {
                        reached[w.index()] = true;
                        queue.push_back(w);
                    }
                    Some(_) => {}
                }
            }
        }
        false
    }

    fn flip(&mut self, parent: &[Option<(NodeIndex, EdgeIndex)>], end: NodeIndex) {
        let mut v = end;
        while let Some((u, edge)) = parent[v.index()] {
            let previous = self.mate[u.index()];
            self.mate[v.index()] = Some((u, edge));
            self.mate[u.index()] = Some((v, edge));
            match previous {
                Some((next, _)) => v = next,
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse;

    fn orders(smiles: &str) -> Result<Vec<BondOrder>, KekulizeError> {
        let mol = parse(smiles).unwrap_or_else(|e| panic!("bad SMILES {smiles:?}: {e}"));
        kekule_orders(&mol)
    }

    fn doubles(orders: &[BondOrder]) -> usize {
        orders.iter().filter(|&&o| o == BondOrder::Double).count()
    }

    #[test]
    fn aliphatic_untouched() {
        let o = orders("CC=CC#N").unwrap();
        assert_eq!(
            o,
            vec![
                BondOrder::Single,
                BondOrder::Double,
                BondOrder::Single,
                BondOrder::Triple
            ]
        );
    }

    #[test]
    fn benzene_three_doubles() {
        let o = orders("c1ccccc1").unwrap();
        assert_eq!(doubles(&o), 3);
        assert!(!o.contains(&BondOrder::Aromatic));
    }

    #[test]
    fn naphthalene_five_doubles() {
        assert_eq!(doubles(&orders("c1ccc2ccccc2c1").unwrap()), 5);
    }

    #[test]
    fn pyrrole_and_furan() {
        assert_eq!(doubles(&orders("c1cc[nH]c1").unwrap()), 2);
        assert_eq!(doubles(&orders("c1ccoc1").unwrap()), 2);
        assert_eq!(doubles(&orders("c1ccsc1").unwrap()), 2);
    }

    #[test]
    fn pyridine_and_pyridinium() {
        assert_eq!(doubles(&orders("c1ccncc1").unwrap()), 3);
        assert_eq!(doubles(&orders("c1cc[nH+]cc1").unwrap()), 3);
    }

    #[test]
    fn pyridone_exocyclic_double() {
        let o = orders("O=c1cccc[nH]1").unwrap();
        assert_eq!(doubles(&o), 3);
    }

    #[test]
    fn five_aromatic_carbons_fail() {
        match orders("c1cccc1") {
            Err(KekulizeError::Unkekulizable(atoms)) => assert!(!atoms.is_empty()),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn substituted_cyclopentadienyl_fails() {
        assert!(orders("Cc1cccc1").is_err());
    }
}
