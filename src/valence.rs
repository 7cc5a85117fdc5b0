use petgraph::graph::NodeIndex;
use thiserror::Error;

use crate::atom::AtomId;
use crate::bond::BondOrder;
use crate::element::Element;
use crate::graph::MoleculeGraph;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("atom {atom} ({element}): valence {valence} not in {allowed:?}")]
pub struct ValenceError {
    pub atom: AtomId,
    pub element: Element,
    pub valence: u8,
    pub allowed: Vec<u8>,
}

/// Allowed valences of `element` carrying `charge`.
///
/// Boron gains a bond per negative charge, group 14 loses one per charge of
/// either sign, everything else follows the isoelectronic shift `v + charge`
/// (N+ is tetravalent, O- monovalent).
pub fn allowed_valences(element: Element, charge: i8) -> Vec<u8> {
    let charge = charge as i16;
    element
        .default_valences()
        .iter()
        .filter_map(|&v| {
            let v = v as i16;
            let adjusted = match element.atomic_num() {
                5 => v - charge,
                6 | 14 | 32 => v - charge.abs(),
                _ => v + charge,
            };
            u8::try_from(adjusted).ok().filter(|&a| a > 0)
        })
        .collect()
}

/// Implicit hydrogen count that fills the lowest allowed valence not below
/// `bond_sum`. Aromatic atoms give one valence to the π system. Elements
/// without default valences get no hydrogens.
///
/// Charged atoms are only filled up to their lowest charge-adjusted valence;
/// a bond sum above it gets no hydrogens.
pub fn default_hydrogens(element: Element, aromatic: bool, charge: i8, bond_sum: u8) -> u8 {
    let allowed = allowed_valences(element, charge);
    let target = if charge == 0 {
        allowed.into_iter().find(|&v| v >= bond_sum)
    } else {
        allowed.first().copied().filter(|&v| v >= bond_sum)
    };
    let Some(target) = target else {
        return 0;
    };
    let h = target - bond_sum;
    if aromatic && h > 0 {
        h - 1
    } else {
        h
    }
}

/// Explicit valence of `atom` under a concrete bond assignment (one order per
/// edge, aromatic bonds already resolved to single or double) plus its
/// hydrogens.
pub fn total_valence(mol: &MoleculeGraph, atom: NodeIndex, orders: &[BondOrder]) -> u8 {
    mol.bonds_of(atom)
        .map(|e| orders[e.index()].valence_contribution())
        .fold(mol.atom(atom).hydrogens, u8::saturating_add)
}

/// Checks every atom whose element has default valences against the
/// valences allowed for its charge. A charged atom with no positive allowed
/// valence (a halide anion) must carry no bonds or hydrogens.
pub fn check_valence(mol: &MoleculeGraph, orders: &[BondOrder]) -> Result<(), Vec<ValenceError>> {
    let errors: Vec<ValenceError> = mol
        .atoms()
        .filter_map(|idx| {
            let atom = mol.atom(idx);
            if atom.element.default_valences().is_empty() {
                return None;
            }
            let mut allowed = allowed_valences(atom.element, atom.charge);
            if allowed.is_empty() {
                allowed.push(0);
            }
            let valence = total_valence(mol, idx, orders);
            if allowed.contains(&valence) {
                return None;
            }
            Some(ValenceError {
                atom: atom.id,
                element: atom.element,
                valence,
                allowed,
            })
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
