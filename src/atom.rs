use std::fmt;

use crate::element::Element;

/// Stable identifier of an atom within one [`MoleculeGraph`](crate::MoleculeGraph).
///
/// Ids survive rewriting: atoms carried into a product keep the id they had in
/// the input, so a match expressed in ids can be traced through a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(pub u32);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of a molecular graph.
///
/// `hydrogens` is the count of implicit hydrogens; hydrogens are never graph
/// nodes. `isotope` of `0` means natural abundance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub id: AtomId,
    pub element: Element,
    pub aromatic: bool,
    pub charge: i8,
    pub hydrogens: u8,
    pub isotope: u16,
}

impl Atom {
    pub fn new(id: AtomId, element: Element) -> Self {
        Self {
            id,
            element,
            aromatic: false,
            charge: 0,
            hydrogens: 0,
            isotope: 0,
        }
    }

    pub fn aromatic(mut self, aromatic: bool) -> Self {
        self.aromatic = aromatic;
        self
    }

    pub fn with_charge(mut self, charge: i8) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_hydrogens(mut self, hydrogens: u8) -> Self {
        self.hydrogens = hydrogens;
        self
    }

    pub fn with_isotope(mut self, isotope: u16) -> Self {
        self.isotope = isotope;
        self
    }
}
