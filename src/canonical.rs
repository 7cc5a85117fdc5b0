use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use petgraph::graph::NodeIndex;

use crate::bond::BondOrder;
use crate::graph::{MalformedGraphError, MoleculeGraph};
use crate::smiles::writer::write_ranked;

struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for Fnv1a {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= u64::from(b);
            self.0 = self.0.wrapping_mul(0x0100_0000_01b3);
        }
    }
}

fn fnv<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut h = Fnv1a::new();
    value.hash(&mut h);
    h.finish()
}

#[derive(Hash)]
struct AtomInvariant {
    atomic_num: u8,
    degree: usize,
    hydrogens: u8,
    charge: i8,
    aromatic: bool,
    isotope: u16,
    singles: u8,
    doubles: u8,
    triples: u8,
    aromatic_bonds: u8,
}

/// The canonical key of a molecule: its SMILES written in canonical atom
/// order. Two graphs get the same key exactly when they are isomorphic
/// (ignoring atom ids and insertion order).
pub fn canonical_key(mol: &MoleculeGraph) -> Result<String, MalformedGraphError> {
    mol.validate()?;
    Ok(write_ranked(mol, &canonical_ranks(mol)))
}

/// Canonical rank of every atom, indexed by node index. Ranks are a
/// permutation of `0..atom_count`.
pub fn canonical_ranks(mol: &MoleculeGraph) -> Vec<usize> {
    let n = mol.atom_count();
    if n == 0 {
        return Vec::new();
    }

    let ranker = Ranker::new(mol);
    let mut ranks = ranks_from_values(&ranker.invariant_hashes);
    ranker.refine(&mut ranks);
    ranker.break_ties(&mut ranks);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| ranks[i]);
    let mut dense = vec![0usize; n];
    for (rank, &i) in order.iter().enumerate() {
        dense[i] = rank;
    }
    dense
}

struct Ranker {
    adjacency: Vec<Vec<(usize, BondOrder)>>,
    invariant_hashes: Vec<u64>,
}

impl Ranker {
    fn new(mol: &MoleculeGraph) -> Self {
        let adjacency: Vec<Vec<(usize, BondOrder)>> = mol
            .atoms()
            .map(|idx| {
                mol.bonds_of(idx)
                    .filter_map(|e| {
                        let (a, b) = mol.bond_endpoints(e)?;
                        let other = if a == idx { b } else { a };
                        Some((other.index(), mol.bond(e).order))
                    })
                    .collect()
            })
            .collect();

        let invariant_hashes = mol
            .atoms()
            .map(|idx| fnv(&atom_invariant(mol, idx, &adjacency[idx.index()])))
            .collect();

        Self {
            adjacency,
            invariant_hashes,
        }
    }

    /// Morgan refinement: rehash each atom's rank together with the sorted
    /// ranks of its neighbours until the number of classes stops growing.
    fn refine(&self, ranks: &mut Vec<usize>) {
        let mut classes = count_distinct(ranks);
        loop {
            let values: Vec<u64> = self
                .adjacency
                .iter()
                .enumerate()
                .map(|(i, nbrs)| {
                    let mut around: Vec<(usize, BondOrder)> =
                        nbrs.iter().map(|&(j, order)| (ranks[j], order)).collect();
                    around.sort_unstable();
                    fnv(&(ranks[i], around))
                })
                .collect();
            let next = ranks_from_values(&values);
            let next_classes = count_distinct(&next);
            if next_classes <= classes {
                return;
            }
            *ranks = next;
            classes = next_classes;
        }
    }

    /// Splits remaining symmetry classes. Each member of the lowest tied
    /// class is tried as the promoted atom; the trial whose invariant trace
    /// is lexicographically smallest wins. Automorphic choices give equal
    /// traces, so the result does not depend on input numbering.
    fn break_ties(&self, ranks: &mut Vec<usize>) {
        let n = ranks.len();
        while count_distinct(ranks) < n {
            let Some(tied) = lowest_tied_rank(ranks) else {
                return;
            };
            let top = ranks.iter().copied().max().unwrap_or(0);

            let mut best: Option<(Vec<u64>, Vec<usize>)> = None;
            for candidate in (0..n).filter(|&i| ranks[i] == tied) {
                let mut trial = ranks.clone();
                trial[candidate] = top + 1;
                self.refine(&mut trial);
                let trace = self.trace(&trial);
                if best.as_ref().map_or(true, |(t, _)| trace < *t) {
                    best = Some((trace, trial));
                }
            }
            match best {
                Some((_, trial)) => *ranks = trial,
                None => return,
            }
        }
    }

    fn trace(&self, ranks: &[usize]) -> Vec<u64> {
        let mut order: Vec<usize> = (0..ranks.len()).collect();
        order.sort_by_key(|&i| ranks[i]);
        order
            .into_iter()
            .map(|i| {
                let mut around: Vec<(usize, BondOrder)> = self.adjacency[i]
                    .iter()
                    .map(|&(j, bo)| (ranks[j], bo))
                    .collect();
                around.sort_unstable();
                fnv(&(self.invariant_hashes[i], around))
            })
            .collect()
    }
}

fn atom_invariant(
    mol: &MoleculeGraph,
    idx: NodeIndex,
    neighbors: &[(usize, BondOrder)],
) -> AtomInvariant {
    let atom = mol.atom(idx);
    let count = |order: BondOrder| neighbors.iter().filter(|&&(_, o)| o == order).count() as u8;
    AtomInvariant {
        atomic_num: atom.element.atomic_num(),
        degree: neighbors.len(),
        hydrogens: atom.hydrogens,
        charge: atom.charge,
        aromatic: atom.aromatic,
        isotope: atom.isotope,
        singles: count(BondOrder::Single),
        doubles: count(BondOrder::Double),
        triples: count(BondOrder::Triple),
        aromatic_bonds: count(BondOrder::Aromatic),
    }
}

fn ranks_from_values(values: &[u64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by_key(|&i| values[i]);
    let mut ranks = vec![0usize; values.len()];
    for w in 1..order.len() {
        let (prev, cur) = (order[w - 1], order[w]);
        ranks[cur] = if values[cur] == values[prev] { ranks[prev] } else { w };
    }
    ranks
}

fn count_distinct(ranks: &[usize]) -> usize {
    let mut sorted = ranks.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

fn lowest_tied_rank(ranks: &[usize]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &r in ranks {
        *counts.entry(r).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|&(_, c)| c > 1)
        .map(|(r, _)| r)
        .min()
}
