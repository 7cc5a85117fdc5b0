use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::bond::BondOrder;
use crate::graph::MoleculeGraph;
use crate::valence::default_hydrogens;

/// Writes SMILES following insertion order.
pub fn write(mol: &MoleculeGraph) -> String {
    let ranks: Vec<usize> = (0..mol.atom_count()).collect();
    write_ranked(mol, &ranks)
}

/// Writes SMILES in canonical atom order; equal to the canonical key.
pub fn write_canonical(mol: &MoleculeGraph) -> String {
    write_ranked(mol, &crate::canonical::canonical_ranks(mol))
}

/// Depth-first writer driven by `ranks`: each fragment starts at its lowest
/// ranked atom, neighbours are visited in rank order and fragments are
/// emitted in order of their lowest rank.
pub(crate) fn write_ranked(mol: &MoleculeGraph, ranks: &[usize]) -> String {
    let mut starts: Vec<NodeIndex> = mol.atoms().collect();
    starts.sort_by_key(|idx| ranks[idx.index()]);

    let mut visited = vec![false; mol.atom_count()];
    let mut parts = Vec::new();
    for start in starts {
        if visited[start.index()] {
            continue;
        }
        let tree = SpanningTree::grow(mol, ranks, start, &mut visited);
        let mut writer = FragmentWriter {
            mol,
            tree: &tree,
            free_digits: (1..=99).collect(),
            open_digits: Vec::new(),
            out: String::new(),
        };
        writer.node(start);
        parts.push(writer.out);
    }
    parts.join(".")
}

struct SpanningTree {
    children: Vec<Vec<NodeIndex>>,
    ring_opens: Vec<Vec<(EdgeIndex, NodeIndex)>>,
    ring_closes: Vec<Vec<EdgeIndex>>,
}

impl SpanningTree {
    fn grow(
        mol: &MoleculeGraph,
        ranks: &[usize],
        start: NodeIndex,
        visited: &mut [bool],
    ) -> Self {
        let n = mol.atom_count();
        let mut tree = Self {
            children: vec![Vec::new(); n],
            ring_opens: vec![Vec::new(); n],
            ring_closes: vec![Vec::new(); n],
        };
        let mut used: HashSet<EdgeIndex> = HashSet::new();
        let sorted_neighbors = |idx: NodeIndex| {
            let mut nbrs: Vec<NodeIndex> = mol.neighbors(idx).collect();
            nbrs.sort_by_key(|nb| ranks[nb.index()]);
            nbrs
        };

        visited[start.index()] = true;
        let mut stack = vec![(start, sorted_neighbors(start), 0usize)];
        while let Some((node, nbrs, cursor)) = stack.last_mut() {
            let node = *node;
            let Some(&next) = nbrs.get(*cursor) else {
                stack.pop();
                continue;
            };
            *cursor += 1;
            let Some(edge) = mol.bond_between(node, next) else {
                continue;
            };
            if !used.insert(edge) {
                continue;
            }
            if visited[next.index()] {
                tree.ring_opens[next.index()].push((edge, node));
                tree.ring_closes[node.index()].push(edge);
            } else {
                visited[next.index()] = true;
                tree.children[node.index()].push(next);
                stack.push((next, sorted_neighbors(next), 0));
            }
        }
        tree
    }
}

struct FragmentWriter<'a> {
    mol: &'a MoleculeGraph,
    tree: &'a SpanningTree,
    free_digits: BTreeSet<u16>,
    open_digits: Vec<(EdgeIndex, u16)>,
    out: String,
}

impl FragmentWriter<'_> {
    fn node(&mut self, idx: NodeIndex) {
        let tree = self.tree;
        self.atom(idx);

        let mut released = Vec::new();
        for &edge in &tree.ring_closes[idx.index()] {
            if let Some(pos) = self.open_digits.iter().position(|&(e, _)| e == edge) {
                let (_, digit) = self.open_digits.remove(pos);
                push_ring_digit(&mut self.out, digit);
                released.push(digit);
            }
        }
        for &(edge, other) in &tree.ring_opens[idx.index()] {
            let digit = self.allocate_digit();
            self.bond(edge, idx, other);
            push_ring_digit(&mut self.out, digit);
            self.open_digits.push((edge, digit));
        }
        self.free_digits.extend(released);

        let children = &tree.children[idx.index()];
        for (i, &child) in children.iter().enumerate() {
            let branch = i + 1 < children.len();
            if branch {
                self.out.push('(');
            }
            if let Some(edge) = self.mol.bond_between(idx, child) {
                self.bond(edge, idx, child);
            }
            self.node(child);
            if branch {
                self.out.push(')');
            }
        }
    }

    fn allocate_digit(&mut self) -> u16 {
        match self.free_digits.pop_first() {
            Some(d) => d,
            None => {
                let highest = self.open_digits.iter().map(|&(_, d)| d).max().unwrap_or(99);
                highest + 1
            }
        }
    }

    fn bond(&mut self, edge: EdgeIndex, from: NodeIndex, to: NodeIndex) {
        let both_aromatic = self.mol.atom(from).aromatic && self.mol.atom(to).aromatic;
        let symbol = match self.mol.bond(edge).order {
            BondOrder::Single if both_aromatic => Some('-'),
            BondOrder::Single => None,
            BondOrder::Double => Some('='),
            BondOrder::Triple => Some('#'),
            BondOrder::Aromatic if both_aromatic => None,
            BondOrder::Aromatic => Some(':'),
        };
        if let Some(c) = symbol {
            self.out.push(c);
        }
    }

    fn atom(&mut self, idx: NodeIndex) {
        let atom = self.mol.atom(idx);
        let symbol = atom.element.symbol();
        let bare_h = default_hydrogens(atom.element, atom.aromatic, 0, self.mol.bond_order_sum(idx));
        let bare = atom.element.is_organic_subset()
            && atom.charge == 0
            && atom.isotope == 0
            && atom.hydrogens == bare_h
            && (!atom.aromatic || matches!(symbol, "B" | "C" | "N" | "O" | "P" | "S"));

        if !bare {
            self.out.push('[');
            if atom.isotope != 0 {
                let _ = write!(self.out, "{}", atom.isotope);
            }
        }
        if atom.aromatic {
            self.out.push_str(&symbol.to_ascii_lowercase());
        } else {
            self.out.push_str(symbol);
        }
        if bare {
            return;
        }
        match atom.hydrogens {
            0 => {}
            1 => self.out.push('H'),
            h => {
                let _ = write!(self.out, "H{h}");
            }
        }
        match atom.charge {
            0 => {}
            1 => self.out.push('+'),
            -1 => self.out.push('-'),
            c if c > 0 => {
                let _ = write!(self.out, "+{c}");
            }
            c => {
                let _ = write!(self.out, "-{}", -(c as i16));
            }
        }
        self.out.push(']');
    }
}

fn push_ring_digit(out: &mut String, digit: u16) {
    let _ = match digit {
        0..=9 => write!(out, "{digit}"),
        10..=99 => write!(out, "%{digit}"),
        _ => write!(out, "%({digit})"),
    };
}
