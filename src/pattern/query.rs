//! Predicate trees for pattern atoms and bonds.
//!
//! An [`AtomExpr`] or [`BondExpr`] is evaluated against one atom or bond of
//! a [`MoleculeGraph`] through a [`MatchContext`], which carries the derived
//! data some predicates need: ring perception, a Kekulé bond assignment for
//! valence queries, and the precomputed hits of recursive sub-patterns.

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::bond::BondOrder;
use crate::element::Element;
use crate::graph::MoleculeGraph;
use crate::kekulize::kekule_orders;
use crate::rings::RingInfo;
use crate::valence::total_valence;

use super::Pattern;

/// Numeric atom property tested by `D`, `X`, `H`, `h`, `v`, `R`, `r`, `x` and
/// the charge ranges `+{..}` / `-{..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    /// Explicit neighbour count (`D`).
    Degree,
    /// Neighbours plus hydrogens (`X`).
    Connectivity,
    /// Total hydrogen count (`H`).
    TotalHydrogens,
    /// Implicit hydrogen count (`h`).
    ImplicitHydrogens,
    /// Bond orders plus hydrogens, aromatic bonds resolved to Kekulé form (`v`).
    Valence,
    /// Number of rings containing the atom (`R<n>`).
    RingCount,
    /// Size of the smallest ring containing the atom, 0 if acyclic (`r<n>`).
    RingSize,
    /// Number of ring bonds on the atom (`x`).
    RingBonds,
    /// Positive formal charge, 0 for neutral or negative atoms.
    PositiveCharge,
    /// Magnitude of a negative formal charge.
    NegativeCharge,
}

/// A recursive sub-pattern `$(...)`. Its first atom is the one tested; `id`
/// is unique within the enclosing pattern and keys the precomputed hits.
#[derive(Debug, Clone)]
pub struct Recursive {
    pub id: usize,
    pub pattern: Box<Pattern>,
}

impl PartialEq for Recursive {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.pattern.source() == other.pattern.source()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomExpr {
    /// Wildcard `*`.
    Any,
    /// Element, optionally restricted to aromatic (`c`) or aliphatic (`C`).
    /// `#n` leaves aromaticity open.
    Element {
        element: Element,
        aromatic: Option<bool>,
    },
    /// Any aromatic atom (`a`).
    Aromatic,
    /// Any aliphatic atom (`A`).
    Aliphatic,
    Isotope(u16),
    Charge(i8),
    /// Property within `low..=high`. A plain `D2` has `low == high`.
    Property {
        property: Property,
        low: u8,
        high: u8,
    },
    /// Member of at least one ring (`R`, `r` without a number).
    InRing,
    Recursive(Recursive),
    /// Atom-map class `:n`. Always true; consumed by rewrites.
    MapClass(u16),
    And(Vec<AtomExpr>),
    Or(Vec<AtomExpr>),
    Not(Box<AtomExpr>),
}

/// Bond predicates. An unmarked bond in a pattern is [`BondExpr::SingleOrAromatic`].
#[derive(Debug, Clone, PartialEq)]
pub enum BondExpr {
    /// `~`
    Any,
    Single,
    Double,
    Triple,
    Aromatic,
    /// `@`
    Ring,
    SingleOrAromatic,
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
    Not(Box<BondExpr>),
}

/// Per-molecule data shared by every predicate evaluation of one search.
pub struct MatchContext<'a> {
    pub mol: &'a MoleculeGraph,
    pub rings: RingInfo,
    kekule: Option<Vec<BondOrder>>,
    recursive: HashMap<usize, Vec<bool>>,
}

impl<'a> MatchContext<'a> {
    pub fn new(mol: &'a MoleculeGraph) -> Self {
        Self {
            mol,
            rings: RingInfo::compute(mol),
            kekule: kekule_orders(mol).ok(),
            recursive: HashMap::new(),
        }
    }

    /// Records which atoms are hit by the recursive sub-pattern `id`.
    pub fn set_recursive_hits(&mut self, id: usize, hits: Vec<bool>) {
        self.recursive.insert(id, hits);
    }

    pub fn has_recursive_hits(&self, id: usize) -> bool {
        self.recursive.contains_key(&id)
    }

    /// Forgets recursive hits. Ids are only unique within one pattern, so
    /// this runs before each top-level search.
    pub fn clear_recursive_hits(&mut self) {
        self.recursive.clear();
    }

    fn property(&self, property: Property, idx: NodeIndex) -> u8 {
        let atom = self.mol.atom(idx);
        let degree = u8::try_from(self.mol.degree(idx)).unwrap_or(u8::MAX);
        match property {
            Property::Degree => degree,
            Property::Connectivity => degree.saturating_add(atom.hydrogens),
            Property::TotalHydrogens | Property::ImplicitHydrogens => atom.hydrogens,
            Property::Valence => match &self.kekule {
                Some(orders) => total_valence(self.mol, idx, orders),
                None => self
                    .mol
                    .bond_order_sum(idx)
                    .saturating_add(atom.hydrogens)
                    .saturating_add(u8::from(atom.aromatic)),
            },
            Property::RingCount => self.rings.ring_count(idx) as u8,
            Property::RingSize => self.rings.smallest_ring_size(idx).unwrap_or(0) as u8,
            Property::RingBonds => self.rings.ring_connectivity(self.mol, idx) as u8,
            Property::PositiveCharge => atom.charge.max(0) as u8,
            Property::NegativeCharge => atom.charge.min(0).unsigned_abs(),
        }
    }
}

impl AtomExpr {
    pub fn matches(&self, ctx: &MatchContext, idx: NodeIndex) -> bool {
        let atom = ctx.mol.atom(idx);
        match self {
            AtomExpr::Any | AtomExpr::MapClass(_) => true,
            AtomExpr::Element { element, aromatic } => {
                atom.element == *element && aromatic.map_or(true, |a| atom.aromatic == a)
            }
            AtomExpr::Aromatic => atom.aromatic,
            AtomExpr::Aliphatic => !atom.aromatic,
            AtomExpr::Isotope(iso) => atom.isotope == *iso,
            AtomExpr::Charge(c) => atom.charge == *c,
            AtomExpr::Property {
                property,
                low,
                high,
            } => (*low..=*high).contains(&ctx.property(*property, idx)),
            AtomExpr::InRing => ctx.rings.is_ring_atom(idx),
            AtomExpr::Recursive(r) => ctx
                .recursive
                .get(&r.id)
                .and_then(|hits| hits.get(idx.index()).copied())
                .unwrap_or(false),
            AtomExpr::And(parts) => parts.iter().all(|p| p.matches(ctx, idx)),
            AtomExpr::Or(parts) => parts.iter().any(|p| p.matches(ctx, idx)),
            AtomExpr::Not(inner) => !inner.matches(ctx, idx),
        }
    }

    /// The atom-map class, looked up through conjunctions only.
    pub fn map_class(&self) -> Option<u16> {
        match self {
            AtomExpr::MapClass(n) => Some(*n),
            AtomExpr::And(parts) => parts.iter().find_map(|p| p.map_class()),
            _ => None,
        }
    }

    /// Visits every recursive sub-pattern in this expression.
    pub fn for_each_recursive<'e>(&'e self, f: &mut impl FnMut(&'e Recursive)) {
        match self {
            AtomExpr::Recursive(r) => f(r),
            AtomExpr::And(parts) | AtomExpr::Or(parts) => {
                for p in parts {
                    p.for_each_recursive(f);
                }
            }
            AtomExpr::Not(inner) => inner.for_each_recursive(f),
            _ => {}
        }
    }
}

impl BondExpr {
    pub fn matches(&self, ctx: &MatchContext, edge: EdgeIndex) -> bool {
        let order = ctx.mol.bond(edge).order;
        match self {
            BondExpr::Any => true,
            BondExpr::Single => order == BondOrder::Single,
            BondExpr::Double => order == BondOrder::Double,
            BondExpr::Triple => order == BondOrder::Triple,
            BondExpr::Aromatic => order == BondOrder::Aromatic,
            BondExpr::SingleOrAromatic => {
                matches!(order, BondOrder::Single | BondOrder::Aromatic)
            }
            BondExpr::Ring => ctx.rings.is_ring_bond(edge),
            BondExpr::And(parts) => parts.iter().all(|p| p.matches(ctx, edge)),
            BondExpr::Or(parts) => parts.iter().any(|p| p.matches(ctx, edge)),
            BondExpr::Not(inner) => !inner.matches(ctx, edge),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn prop(property: Property, v: u8) -> AtomExpr {
        AtomExpr::Property {
            property,
            low: v,
            high: v,
        }
    }

    #[test]
    fn element_and_aromaticity() {
        let mol = parse("Cc1ccccc1").unwrap();
        let ctx = MatchContext::new(&mol);
        let aliphatic_c = AtomExpr::Element {
            element: Element::C,
            aromatic: Some(false),
        };
        let any_c = AtomExpr::Element {
            element: Element::C,
            aromatic: None,
        };
        assert!(aliphatic_c.matches(&ctx, n(0)));
        assert!(!aliphatic_c.matches(&ctx, n(1)));
        assert!(any_c.matches(&ctx, n(1)));
        assert!(AtomExpr::Aromatic.matches(&ctx, n(3)));
        assert!(AtomExpr::Aliphatic.matches(&ctx, n(0)));
    }

    #[test]
    fn counting_properties() {
        let mol = parse("CC(C)(O)c1ccccc1").unwrap();
        let ctx = MatchContext::new(&mol);
        assert!(prop(Property::Degree, 4).matches(&ctx, n(1)));
        assert!(prop(Property::TotalHydrogens, 3).matches(&ctx, n(0)));
        assert!(prop(Property::Connectivity, 2).matches(&ctx, n(3)));
        assert!(prop(Property::Valence, 4).matches(&ctx, n(5)));
        assert!(prop(Property::RingSize, 6).matches(&ctx, n(4)));
        assert!(prop(Property::RingSize, 0).matches(&ctx, n(1)));
        assert!(prop(Property::RingBonds, 2).matches(&ctx, n(4)));
        assert!(prop(Property::RingCount, 1).matches(&ctx, n(6)));
        assert!(AtomExpr::InRing.matches(&ctx, n(6)));
        assert!(!AtomExpr::InRing.matches(&ctx, n(1)));
    }

    #[test]
    fn charge_ranges() {
        let mol = parse("C[N+](C)(C)C.[O-]").unwrap();
        let ctx = MatchContext::new(&mol);
        let positive = AtomExpr::Property {
            property: Property::PositiveCharge,
            low: 1,
            high: 2,
        };
        assert!(positive.matches(&ctx, n(1)));
        assert!(!positive.matches(&ctx, n(0)));
        assert!(AtomExpr::Charge(-1).matches(&ctx, n(5)));
        assert!(prop(Property::NegativeCharge, 1).matches(&ctx, n(5)));
    }

    #[test]
    fn logic() {
        let mol = parse("CO").unwrap();
        let ctx = MatchContext::new(&mol);
        let c = AtomExpr::Element {
            element: Element::C,
            aromatic: None,
        };
        let o = AtomExpr::Element {
            element: Element::O,
            aromatic: None,
        };
        let c_or_o = AtomExpr::Or(vec![c.clone(), o.clone()]);
        assert!(c_or_o.matches(&ctx, n(0)) && c_or_o.matches(&ctx, n(1)));
        let not_c = AtomExpr::Not(Box::new(c.clone()));
        assert!(!not_c.matches(&ctx, n(0)) && not_c.matches(&ctx, n(1)));
        let both = AtomExpr::And(vec![c, AtomExpr::MapClass(3)]);
        assert!(both.matches(&ctx, n(0)));
        assert_eq!(both.map_class(), Some(3));
    }

    #[test]
    fn bond_predicates() {
        let mol = parse("C=Cc1ccccc1").unwrap();
        let ctx = MatchContext::new(&mol);
        let double = mol.bond_between(n(0), n(1)).unwrap();
        let link = mol.bond_between(n(1), n(2)).unwrap();
        let ring = mol.bond_between(n(2), n(3)).unwrap();
        assert!(BondExpr::Double.matches(&ctx, double));
        assert!(!BondExpr::SingleOrAromatic.matches(&ctx, double));
        assert!(BondExpr::SingleOrAromatic.matches(&ctx, link));
        assert!(BondExpr::SingleOrAromatic.matches(&ctx, ring));
        assert!(BondExpr::Aromatic.matches(&ctx, ring));
        assert!(!BondExpr::Single.matches(&ctx, ring));
        assert!(BondExpr::Ring.matches(&ctx, ring));
        assert!(BondExpr::Not(Box::new(BondExpr::Ring)).matches(&ctx, link));
        assert!(BondExpr::Any.matches(&ctx, double));
    }

    #[test]
    fn large_hydrogen_counts_clamp() {
        let mol = parse("[CH255]C").unwrap();
        let ctx = MatchContext::new(&mol);
        assert!(prop(Property::Connectivity, u8::MAX).matches(&ctx, n(0)));
        assert!(prop(Property::Valence, u8::MAX).matches(&ctx, n(0)));
        assert_eq!(mol.bond_order_sum(n(0)), 1);
    }
}
