use isostere::{canonical_key, smiles, MoleculeGraph};

fn parse(text: &str) -> MoleculeGraph {
    smiles::parse(text).unwrap_or_else(|e| panic!("bad SMILES {text:?}: {e}"))
}

fn canonical(text: &str) -> String {
    canonical_key(&parse(text)).unwrap()
}

fn reversed(mol: &MoleculeGraph) -> MoleculeGraph {
    let order: Vec<usize> = (0..mol.atom_count()).rev().collect();
    mol.renumbered(&order, 0).unwrap()
}

#[test]
fn fragment_ordering_two() {
    let a = canonical("CCO.Cl");
    let b = canonical("Cl.CCO");
    assert_eq!(a, b, "fragment ordering: '{a}' vs '{b}'");
}

#[test]
fn fragment_ordering_three() {
    let a = canonical("[NH4+].[Cl-].O");
    let b = canonical("O.[NH4+].[Cl-]");
    assert_eq!(a, b, "fragment ordering: '{a}' vs '{b}'");
}

// Stereo marks are read and dropped, so both writings name one graph.
#[test]
fn tetrahedral_marks_ignored() {
    let a = canonical("[C@@H](F)(Cl)Br");
    let b = canonical("F[C@H](Cl)Br");
    assert_eq!(a, b, "tetrahedral: '{a}' vs '{b}'");
    assert!(!a.contains('@'));
}

#[test]
fn double_bond_marks_ignored() {
    let a = canonical("F/C=C/F");
    let b = canonical(r"F/C=C\F");
    assert_eq!(a, b, "E/Z: '{a}' vs '{b}'");
    assert_eq!(a, canonical("FC=CF"));
}

#[test]
fn renumber_reversed() {
    for text in [
        "CNS(=O)(=O)c1ccc(C)c(C(F)(F)F)c1",
        "CC(=O)Nc1ccc(O)cc1",
        "c1ccc2ccccc2c1",
        "OC(=O)C1CC1",
    ] {
        let mol = parse(text);
        let s1 = canonical_key(&mol).unwrap();
        let s2 = canonical_key(&reversed(&mol)).unwrap();
        assert_eq!(s1, s2, "renumber {text}: '{s1}' vs '{s2}'");
    }
}

#[test]
fn renumber_shifted_ids() {
    let mol = parse("FC=CF");
    let renum = mol.renumbered(&[1, 2, 3, 0], 40).unwrap();
    let s1 = canonical_key(&mol).unwrap();
    let s2 = canonical_key(&renum).unwrap();
    assert_eq!(s1, s2, "renumber shifted: '{s1}' vs '{s2}'");
}

#[test]
fn bad_permutation_rejected() {
    let mol = parse("CCO");
    assert!(mol.renumbered(&[0, 0, 1], 0).is_err());
    assert!(mol.renumbered(&[0, 1], 0).is_err());
}

#[test]
fn idempotence() {
    for text in [
        "OCC1OC(O)C(O)C(O)C1O",
        "Cn1cnc2c1c(=O)n(C)c(=O)n2C",
        "O=C(O)c1ccccc1O",
        "[13CH3]C#N",
    ] {
        let first = canonical(text);
        let second = canonical(&first);
        assert_eq!(first, second, "idempotence {text}: '{first}' vs '{second}'");
    }
}

#[test]
fn distinct_graphs_distinct_keys() {
    let keys = [
        canonical("Cc1ccccc1C"),
        canonical("Cc1cccc(C)c1"),
        canonical("Cc1ccc(C)cc1"),
    ];
    assert_ne!(keys[0], keys[1]);
    assert_ne!(keys[1], keys[2]);
    assert_ne!(keys[0], keys[2]);
}
