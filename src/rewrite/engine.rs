use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atom::{Atom, AtomId};
use crate::bond::BondOrder;
use crate::canonical::canonical_key;
use crate::graph::{MoleculeBuilder, MoleculeGraph};
use crate::kekulize::kekule_orders;
use crate::matcher::{find_matches, verify_mapping, SearchLimits};
use crate::pattern::BondExpr;
use crate::rings::RingInfo;
use crate::rules::{Match, Rule, RuleId};
use crate::valence::{allowed_valences, check_valence, default_hydrogens};

use super::{RewriteSpec, TemplateAtom, TransformError};

/// Which matches of a rule are rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SitePolicy {
    /// One product from the first match.
    #[default]
    FirstMatch,
    /// One product per match whose atoms are disjoint from every site
    /// already rewritten.
    AllSites,
}

/// A rewritten molecule and the rule that produced it.
#[derive(Debug, Clone)]
pub struct Product {
    pub graph: MoleculeGraph,
    pub origin: RuleId,
    /// Canonical key of `graph`; also its canonical SMILES.
    pub key: String,
}

/// Applies `rule` to `mol` at `site` and returns the sanitized product.
pub fn apply(
    mol: &MoleculeGraph,
    rule: &Rule,
    site: &Match,
    limits: &SearchLimits,
) -> Result<Product, TransformError> {
    if !verify_mapping(mol, &rule.pattern, &site.mapping) {
        return Err(TransformError::NoMatch);
    }
    let placement = place_reactant(mol, rule, site, limits)?;
    let graph = Rewriter::new(mol, &rule.rewrite, &placement).build()?;
    check_structure(&graph)?;
    let key = canonical_key(&graph).map_err(|e| TransformError::InvalidStructure(e.to_string()))?;
    debug!(rule = %rule.id, %key, "rewrite applied");
    Ok(Product {
        graph,
        origin: rule.id,
        key,
    })
}

/// Applies `rule` at the sites chosen by `policy`. Fails only when no
/// product could be made, with the first error seen.
pub fn apply_sites(
    mol: &MoleculeGraph,
    rule: &Rule,
    matches: &[Match],
    policy: SitePolicy,
    limits: &SearchLimits,
) -> Result<Vec<Product>, TransformError> {
    match policy {
        SitePolicy::FirstMatch => {
            let first = matches.first().ok_or(TransformError::NoMatch)?;
            Ok(vec![apply(mol, rule, first, limits)?])
        }
        SitePolicy::AllSites => {
            let mut used: BTreeSet<AtomId> = BTreeSet::new();
            let mut products = Vec::new();
            let mut first_error = None;
            for site in matches {
                let atoms = site.atom_set();
                if !used.is_disjoint(&atoms) {
                    continue;
                }
                match apply(mol, rule, site, limits) {
                    Ok(product) => {
                        used.extend(atoms);
                        products.push(product);
                    }
                    Err(e) => {
                        debug!(rule = %rule.id, error = %e, "site skipped");
                        first_error.get_or_insert(e);
                    }
                }
            }
            if products.is_empty() {
                Err(first_error.unwrap_or(TransformError::NoMatch))
            } else {
                Ok(products)
            }
        }
    }
}

/// Atoms a rewrite at `site` replaces: the deleted reactant atoms plus the
/// retained ones whose properties the product side overrides. Unchanged
/// anchor atoms are left out. Falls back to the matched atoms when the
/// reactant side cannot be placed or the rewrite only touches bonds.
pub fn replaced_atoms(
    mol: &MoleculeGraph,
    rule: &Rule,
    site: &Match,
    limits: &SearchLimits,
) -> BTreeSet<AtomId> {
    let Ok(placement) = place_reactant(mol, rule, site, limits) else {
        return site.atom_set();
    };
    let rewrite = &rule.rewrite;
    let deleted = rewrite.deleted().iter().map(|r| placement[r.index()]);
    let changed = rewrite.retained().iter().filter_map(|&(r, p)| {
        let node = placement[r.index()];
        TemplateAtom::from_expr(rewrite.product().atom(p))
            .changes(mol.atom(node))
            .then_some(node)
    });
    let atoms: BTreeSet<AtomId> = deleted.chain(changed).map(|n| mol.atom(n).id).collect();
    if atoms.is_empty() {
        site.atom_set()
    } else {
        atoms
    }
}

/// Image of each reactant-template node. The search match is reused when the
/// reactant side is the search pattern itself; otherwise the first reactant
/// mapping touching the matched atoms is taken.
fn place_reactant(
    mol: &MoleculeGraph,
    rule: &Rule,
    site: &Match,
    limits: &SearchLimits,
) -> Result<Vec<NodeIndex>, TransformError> {
    let reactant = rule.rewrite.reactant();
    let mapping = if reactant.source() == rule.pattern.source() {
        site.mapping.clone()
    } else {
        let atoms = site.atom_set();
        find_matches(mol, reactant, limits)?
            .into_iter()
            .find(|candidate| candidate.iter().any(|id| atoms.contains(id)))
            .ok_or(TransformError::NoMatch)?
    };
    mapping
        .iter()
        .map(|&id| mol.node_of(id))
        .collect::<Option<Vec<_>>>()
        .ok_or(TransformError::NoMatch)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Carried,
    Retained,
    Created,
}

struct Draft {
    atom: Atom,
    origin: Origin,
    /// Input node, for carried and retained atoms.
    source: Option<NodeIndex>,
    template: TemplateAtom,
}

struct Rewriter<'a> {
    mol: &'a MoleculeGraph,
    rewrite: &'a RewriteSpec,
    placement: &'a [NodeIndex],
    drafts: Vec<Draft>,
    bonds: Vec<(usize, usize, BondOrder)>,
    bond_slot: HashMap<(usize, usize), usize>,
}

impl<'a> Rewriter<'a> {
    fn new(mol: &'a MoleculeGraph, rewrite: &'a RewriteSpec, placement: &'a [NodeIndex]) -> Self {
        Self {
            mol,
            rewrite,
            placement,
            drafts: Vec::new(),
            bonds: Vec::new(),
            bond_slot: HashMap::new(),
        }
    }

    fn build(mut self) -> Result<MoleculeGraph, TransformError> {
        let (mol, rewrite, placement) = (self.mol, self.rewrite, self.placement);
        let reactant = rewrite.reactant().graph();
        let product = rewrite.product();

        let image: HashMap<NodeIndex, NodeIndex> = placement
            .iter()
            .enumerate()
            .map(|(r, &atom)| (atom, NodeIndex::new(r)))
            .collect();
        let retained: HashMap<NodeIndex, NodeIndex> = rewrite
            .retained()
            .iter()
            .map(|&(r, p)| (placement[r.index()], p))
            .collect();
        let deleted: HashSet<NodeIndex> = rewrite
            .deleted()
            .iter()
            .map(|r| placement[r.index()])
            .collect();

        let mut slot_of_input: HashMap<NodeIndex, usize> = HashMap::new();
        let mut slot_of_product: HashMap<NodeIndex, usize> = HashMap::new();

        for idx in mol.atoms() {
            if deleted.contains(&idx) {
                continue;
            }
            let mut atom = mol.atom(idx).clone();
            let (origin, template) = match retained.get(&idx) {
                Some(&p) => {
                    let template = TemplateAtom::from_expr(product.atom(p));
                    if let Some(element) = template.element {
                        atom.element = element;
                    }
                    if let Some(aromatic) = template.aromatic {
                        atom.aromatic = aromatic;
                    }
                    if let Some(charge) = template.charge {
                        atom.charge = charge;
                    }
                    if let Some(isotope) = template.isotope {
                        atom.isotope = isotope;
                    }
                    slot_of_product.insert(p, self.drafts.len());
                    (Origin::Retained, template)
                }
                None => (Origin::Carried, TemplateAtom::default()),
            };
            slot_of_input.insert(idx, self.drafts.len());
            self.drafts.push(Draft {
                atom,
                origin,
                source: Some(idx),
                template,
            });
        }

        let mut next_id = mol.max_atom_id().map_or(0, |id| id.0 + 1);
        for &p in rewrite.created() {
            let template = TemplateAtom::from_expr(product.atom(p));
            let Some(element) = template.element else {
                return Err(TransformError::InvalidStructure(format!(
                    "created atom {} has no element",
                    p.index()
                )));
            };
            let atom = Atom::new(AtomId(next_id), element)
                .aromatic(template.aromatic.unwrap_or(false))
                .with_charge(template.charge.unwrap_or(0))
                .with_isotope(template.isotope.unwrap_or(0));
            next_id += 1;
            slot_of_product.insert(p, self.drafts.len());
            self.drafts.push(Draft {
                atom,
                origin: Origin::Created,
                source: None,
                template,
            });
        }

        for edge in mol.bonds() {
            let Some((a, b)) = mol.bond_endpoints(edge) else {
                continue;
            };
            let (Some(&sa), Some(&sb)) = (slot_of_input.get(&a), slot_of_input.get(&b)) else {
                continue;
            };
            let covered = match (image.get(&a), image.get(&b)) {
                (Some(&ra), Some(&rb)) => reactant.find_edge(ra, rb).is_some(),
                _ => false,
            };
            if !covered {
                self.set_bond(sa, sb, mol.bond(edge).order);
            }
        }

        let template_graph = product.graph();
        for edge in template_graph.edge_indices() {
            let Some((p, q)) = template_graph.edge_endpoints(edge) else {
                continue;
            };
            let (Some(&sp), Some(&sq)) = (slot_of_product.get(&p), slot_of_product.get(&q)) else {
                continue;
            };
            let both_aromatic = self.drafts[sp].atom.aromatic && self.drafts[sq].atom.aromatic;
            let order = match &template_graph[edge] {
                BondExpr::Single => BondOrder::Single,
                BondExpr::Double => BondOrder::Double,
                BondExpr::Triple => BondOrder::Triple,
                BondExpr::Aromatic => BondOrder::Aromatic,
                _ if both_aromatic => BondOrder::Aromatic,
                _ => BondOrder::Single,
            };
            self.set_bond(sp, sq, order);
        }

        self.assign_hydrogens()?;
        let keep = self.reachable_slots(&image);

        let mut builder = MoleculeBuilder::new();
        for (slot, draft) in self.drafts.iter().enumerate() {
            if keep[slot] {
                builder.add_atom(draft.atom.clone());
            }
        }
        for &(a, b, order) in &self.bonds {
            if keep[a] && keep[b] {
                builder.add_bond(self.drafts[a].atom.id, self.drafts[b].atom.id, order);
            }
        }
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            debug!(dropped, "severed fragment removed");
        }
        builder
            .build()
            .map_err(|e| TransformError::InvalidStructure(e.to_string()))
    }

    fn set_bond(&mut self, a: usize, b: usize, order: BondOrder) {
        let key = (a.min(b), a.max(b));
        match self.bond_slot.get(&key) {
            Some(&i) => self.bonds[i].2 = order,
            None => {
                self.bond_slot.insert(key, self.bonds.len());
                self.bonds.push((a, b, order));
            }
        }
    }

    /// Fills hydrogen counts. Atoms that take default hydrogens while charged
    /// may not exceed their lowest charge-adjusted valence.
    fn assign_hydrogens(&mut self) -> Result<(), TransformError> {
        let mut sums = vec![0u8; self.drafts.len()];
        for &(a, b, order) in &self.bonds {
            let v = order.valence_contribution();
            sums[a] = sums[a].saturating_add(v);
            sums[b] = sums[b].saturating_add(v);
        }

        let mol = self.mol;
        for (draft, &new_sum) in self.drafts.iter_mut().zip(&sums) {
            let atom = &draft.atom;
            let defaults = || {
                if atom.charge != 0 {
                    let lowest = allowed_valences(atom.element, atom.charge).first().copied();
                    let used = new_sum.saturating_add(u8::from(atom.aromatic));
                    if let Some(lowest) = lowest.filter(|&v| used > v) {
                        return Err(TransformError::InvalidStructure(format!(
                            "atom {} ({}{:+}): bond sum {used} above valence {lowest}",
                            atom.id, atom.element, atom.charge
                        )));
                    }
                }
                Ok(default_hydrogens(atom.element, atom.aromatic, atom.charge, new_sum))
            };
            let kept_valence = |source: NodeIndex| {
                let old_sum = i16::from(mol.bond_order_sum(source));
                let h = i16::from(mol.atom(source).hydrogens) + old_sum - i16::from(new_sum);
                u8::try_from(h.max(0)).unwrap_or(u8::MAX)
            };
            let hydrogens = match (draft.origin, draft.template.hydrogens, draft.source) {
                (_, Some(h), _) => h,
                (Origin::Created, None, _) | (_, None, None) => defaults()?,
                (Origin::Retained, None, Some(source)) => {
                    let before = mol.atom(source);
                    let changed = before.element != atom.element
                        || before.charge != atom.charge
                        || before.aromatic != atom.aromatic;
                    if changed {
                        defaults()?
                    } else {
                        kept_valence(source)
                    }
                }
                (Origin::Carried, None, Some(source)) => kept_valence(source),
            };
            draft.atom.hydrogens = hydrogens;
        }
        Ok(())
    }

    /// Marks the slots to keep. A product component is dropped when it holds
    /// no retained or created atom and came from an input component that the
    /// rewrite touched.
    fn reachable_slots(&self, image: &HashMap<NodeIndex, NodeIndex>) -> Vec<bool> {
        let input_component = components(
            self.mol.atom_count(),
            self.mol
                .bonds()
                .filter_map(|e| self.mol.bond_endpoints(e))
                .map(|(a, b)| (a.index(), b.index())),
        );
        let touched: HashSet<usize> = image.keys().map(|n| input_component[n.index()]).collect();

        let product_component = components(self.drafts.len(), self.bonds.iter().map(|&(a, b, _)| (a, b)));
        let mut anchored: HashSet<usize> = HashSet::new();
        for (slot, draft) in self.drafts.iter().enumerate() {
            let untouched = draft
                .source
                .is_some_and(|s| !touched.contains(&input_component[s.index()]));
            if draft.origin != Origin::Carried || untouched {
                anchored.insert(product_component[slot]);
            }
        }
        product_component
            .iter()
            .map(|c| anchored.contains(c))
            .collect()
    }
}

/// Component label of each of `n` nodes.
fn components(n: usize, edges: impl Iterator<Item = (usize, usize)>) -> Vec<usize> {
    let mut adjacency = vec![Vec::new(); n];
    for (a, b) in edges {
        adjacency[a].push(b);
        adjacency[b].push(a);
    }
    let mut label = vec![usize::MAX; n];
    for start in 0..n {
        if label[start] != usize::MAX {
            continue;
        }
        label[start] = start;
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            for &w in &adjacency[v] {
                if label[w] == usize::MAX {
                    label[w] = start;
                    stack.push(w);
                }
            }
        }
    }
    label
}

fn check_structure(graph: &MoleculeGraph) -> Result<(), TransformError> {
    if graph.atom_count() == 0 {
        return Err(TransformError::InvalidStructure("empty product".into()));
    }
    let rings = RingInfo::compute(graph);
    if let Some(idx) = graph
        .atoms()
        .find(|&idx| graph.atom(idx).aromatic && !rings.is_ring_atom(idx))
    {
        return Err(TransformError::InvalidStructure(format!(
            "aromatic atom {} outside a ring",
            graph.id_of(idx)
        )));
    }
    if graph
        .bonds()
        .any(|e| graph.bond(e).is_aromatic() && !rings.is_ring_bond(e))
    {
        return Err(TransformError::InvalidStructure("aromatic bond outside a ring".into()));
    }
    let orders = kekule_orders(graph).map_err(|e| TransformError::InvalidStructure(e.to_string()))?;
    check_valence(graph, &orders).map_err(|errors| {
        let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
        TransformError::InvalidStructure(reasons.join("; "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse;

    fn rule(query: &str, transformation: &str) -> Rule {
        Rule::new(RuleId(0), "test", "test", query, transformation, 1).unwrap()
    }

    fn key(smiles: &str) -> String {
        canonical_key(&parse(smiles).unwrap()).unwrap()
    }

    fn first_match(mol: &MoleculeGraph, rule: &Rule) -> Match {
        let mapping = find_matches(mol, &rule.pattern, &SearchLimits::default())
            .unwrap()
            .into_iter()
            .next()
            .expect("rule should match");
        Match {
            rule_id: rule.id,
            mapping,
        }
    }

    fn run(smiles: &str, rule: &Rule) -> Result<Product, TransformError> {
        let mol = parse(smiles).unwrap();
        let site = first_match(&mol, rule);
        apply(&mol, rule, &site, &SearchLimits::default())
    }

    #[test]
    fn trifluoromethyl_to_nitrile() {
        let r = rule("C(F)(F)F", "[c:1]C(F)(F)F>>[c:1]C#N");
        let product = run("Cc1ccc(C(F)(F)F)cc1", &r).unwrap();
        assert_eq!(product.key, key("Cc1ccc(C#N)cc1"));
        assert_eq!(product.origin, RuleId(0));
    }

    #[test]
    fn reuses_match_when_reactant_is_the_pattern() {
        let r = rule("[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl");
        let product = run("Cc1ccccc1", &r).unwrap();
        assert_eq!(product.key, key("Clc1ccccc1"));
    }

    #[test]
    fn ids_are_kept_and_created_atoms_numbered_above() {
        let r = rule("[c:1][CH3]", "[c:1][CH3]>>[c:1]C#N");
        let mol = parse("Cc1ccccc1").unwrap();
        let site = first_match(&mol, &r);
        let product = apply(&mol, &r, &site, &SearchLimits::default()).unwrap();
        let ids: BTreeSet<u32> = product.graph.atoms().map(|i| product.graph.id_of(i).0).collect();
        assert_eq!(ids, (1..=8).collect());
    }

    #[test]
    fn wrong_site_is_no_match() {
        let r = rule("[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl");
        let mol = parse("Cc1ccccc1").unwrap();
        let site = Match {
            rule_id: r.id,
            mapping: vec![AtomId(0), AtomId(1)],
        };
        assert_eq!(
            apply(&mol, &r, &site, &SearchLimits::default()).unwrap_err(),
            TransformError::NoMatch
        );
    }

    #[test]
    fn unkekulizable_ring_is_invalid() {
        let r = rule("[cH:1]", "[cH:1]>>[o:1]");
        assert!(matches!(run("c1ccccc1", &r), Err(TransformError::InvalidStructure(_))));
    }

    #[test]
    fn aromatic_atom_outside_ring_is_invalid() {
        let r = rule("[CH3:1]", "[CH3:1]>>[c:1]");
        assert!(matches!(run("CC(=O)O", &r), Err(TransformError::InvalidStructure(_))));
    }

    #[test]
    fn created_atom_needs_element() {
        let r = rule("[c:1][CH3]", "[c:1][CH3]>>[c:1]*");
        assert!(matches!(run("Cc1ccccc1", &r), Err(TransformError::InvalidStructure(_))));
    }

    #[test]
    fn severed_fragment_dropped() {
        let r = rule("S(=O)(=O)N", "[c:1]S(=O)(=O)N>>[c:1]C(=O)N");
        let product = run("CNS(=O)(=O)c1ccccc1", &r).unwrap();
        assert_eq!(product.key, key("NC(=O)c1ccccc1"));
    }

    #[test]
    fn untouched_fragment_kept() {
        let r = rule("[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl");
        let product = run("Cc1ccccc1.Cl", &r).unwrap();
        assert_eq!(product.key, key("Clc1ccccc1.Cl"));
    }

    #[test]
    fn retained_atoms_keep_valence() {
        let r = rule("[C:1]=[C:2]", "[C:1]=[C:2]>>[C:1][C:2]");
        let product = run("C=C", &r).unwrap();
        assert_eq!(product.key, key("CC"));
    }

    #[test]
    fn overbonded_cation_is_invalid() {
        let r = rule("[c:1][CH3]", "[c:1][CH3]>>[c:1][N+](C)(C)(C)C");
        assert!(matches!(run("Cc1ccccc1", &r), Err(TransformError::InvalidStructure(_))));
        let r = rule("[c:1][CH3]", "[c:1][CH3]>>[c:1][N+](C)(C)(C)(C)C");
        assert!(matches!(run("Cc1ccccc1", &r), Err(TransformError::InvalidStructure(_))));
    }

    #[test]
    fn quaternary_cation_is_valid() {
        let r = rule("[c:1][CH3]", "[c:1][CH3]>>[c:1][N+](C)(C)C");
        let product = run("Cc1ccccc1", &r).unwrap();
        assert_eq!(product.key, key("C[N+](C)(C)c1ccccc1"));
    }

    #[test]
    fn replaced_atoms_skip_anchors() {
        let mol = parse("Cc1ccc(C(F)(F)F)cc1").unwrap();
        let methyl = rule("[CH3]", "[c:1][CH3]>>[c:1]Cl");
        let site = first_match(&mol, &methyl);
        let limits = SearchLimits::default();
        assert_eq!(replaced_atoms(&mol, &methyl, &site, &limits), BTreeSet::from([AtomId(0)]));

        let nitrile = rule("[c:1]C(F)(F)F", "[c:1]C(F)(F)F>>[c:1]C#N");
        let site = first_match(&mol, &nitrile);
        let expected: BTreeSet<AtomId> = (5..9).map(AtomId).collect();
        assert_eq!(replaced_atoms(&mol, &nitrile, &site, &limits), expected);

        let ring = rule("[cH:1]", "[cH:1]>>[n:1]");
        let site = first_match(&mol, &ring);
        assert_eq!(replaced_atoms(&mol, &ring, &site, &limits), site.atom_set());

        let saturate = rule("[C:1]=[C:2]", "[C:1]=[C:2]>>[C:1][C:2]");
        let mol = parse("C=C").unwrap();
        let site = first_match(&mol, &saturate);
        assert_eq!(replaced_atoms(&mol, &saturate, &site, &limits), site.atom_set());
    }

    #[test]
    fn all_sites_policy() {
        let r = rule("[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl");
        let mol = parse("Cc1ccc(C)cc1").unwrap();
        let matches: Vec<Match> = find_matches(&mol, &r.pattern, &SearchLimits::default())
            .unwrap()
            .into_iter()
            .map(|mapping| Match {
                rule_id: r.id,
                mapping,
            })
            .collect();
        assert_eq!(matches.len(), 2);
        let limits = SearchLimits::default();
        let all = apply_sites(&mol, &r, &matches, SitePolicy::AllSites, &limits).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].key, all[1].key);
        let first = apply_sites(&mol, &r, &matches, SitePolicy::FirstMatch, &limits).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(
            apply_sites(&mol, &r, &[], SitePolicy::FirstMatch, &limits).unwrap_err(),
            TransformError::NoMatch
        );
    }
}
