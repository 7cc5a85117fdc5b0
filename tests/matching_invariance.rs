use std::collections::BTreeSet;

use proptest::prelude::*;

use isostere::{canonical_key, find_matches, smiles, AtomId, MoleculeGraph, Pattern, SearchLimits};

const MOLECULES: &[&str] = &[
    "CNS(=O)(=O)c1ccc(C)c(C(F)(F)F)c1",
    "CC(=O)Nc1ccc(O)cc1",
    "OC(=O)C1CCN(C)CC1",
    "c1ccc2[nH]ccc2c1",
    "NC(=O)c1cccnc1",
];

const PATTERNS: &[&str] = &[
    "[CH3]",
    "c[CH3,NH2,OH]",
    "C(=O)[N,O]",
    "[R]~[!R]",
    "[$(c~n),$(C=O)]",
    "c1ccccc1",
    "[#6;X3]=[#8]",
];

fn atom_sets(mol: &MoleculeGraph, pattern: &Pattern) -> BTreeSet<BTreeSet<AtomId>> {
    find_matches(mol, pattern, &SearchLimits::default())
        .unwrap()
        .into_iter()
        .map(|m| m.into_iter().collect())
        .collect()
}

/// A molecule from the fixed set with its atoms in a random order.
fn shuffled() -> impl Strategy<Value = (usize, Vec<usize>)> {
    (0..MOLECULES.len()).prop_flat_map(|i| {
        let n = smiles::parse(MOLECULES[i]).unwrap().atom_count();
        (Just(i), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    })
}

proptest! {
    #[test]
    fn matches_follow_relabeling((i, order) in shuffled(), offset in 0u32..1000) {
        let mol = smiles::parse(MOLECULES[i]).unwrap();
        let relabeled = mol.renumbered(&order, offset).unwrap();
        for text in PATTERNS {
            let pattern = Pattern::parse(text).unwrap();
            let expected: BTreeSet<BTreeSet<AtomId>> = atom_sets(&mol, &pattern)
                .into_iter()
                .map(|set| set.into_iter().map(|id| AtomId(id.0 + offset)).collect())
                .collect();
            prop_assert_eq!(atom_sets(&relabeled, &pattern), expected, "pattern {}", text);
        }
    }

    #[test]
    fn key_ignores_relabeling((i, order) in shuffled(), offset in 0u32..1000) {
        let mol = smiles::parse(MOLECULES[i]).unwrap();
        let relabeled = mol.renumbered(&order, offset).unwrap();
        prop_assert_eq!(canonical_key(&mol).unwrap(), canonical_key(&relabeled).unwrap());
    }

    #[test]
    fn uniquified_count_is_stable((i, order) in shuffled()) {
        let mol = smiles::parse(MOLECULES[i]).unwrap();
        let relabeled = mol.renumbered(&order, 0).unwrap();
        for text in PATTERNS {
            let pattern = Pattern::parse(text).unwrap();
            let limits = SearchLimits::default();
            prop_assert_eq!(
                find_matches(&mol, &pattern, &limits).unwrap().len(),
                find_matches(&relabeled, &pattern, &limits).unwrap().len()
            );
        }
    }
}
