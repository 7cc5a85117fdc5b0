//! Rewrites of the form `reactant>>product`.
//!
//! Both sides are [`Pattern`]s. Atoms carrying the same map class on both
//! sides are *retained*: they keep their identity and take the product
//! side's properties. Unmapped reactant atoms are *deleted* and unmapped
//! product atoms are *created*. Applying a rewrite is done by
//! [`engine::apply`].

pub mod engine;
pub mod error;

use std::collections::HashMap;

use petgraph::graph::NodeIndex;

use crate::atom::Atom;
use crate::element::Element;
use crate::pattern::{AtomExpr, Pattern, PatternSyntaxError, Property};

pub use engine::{apply, apply_sites, replaced_atoms, Product, SitePolicy};
pub use error::TransformError;

#[derive(Debug, Clone)]
pub struct RewriteSpec {
    source: String,
    reactant: Pattern,
    product: Pattern,
    /// (reactant node, product node) pairs sharing a map class.
    retained: Vec<(NodeIndex, NodeIndex)>,
    deleted: Vec<NodeIndex>,
    created: Vec<NodeIndex>,
}

impl RewriteSpec {
    pub fn parse(text: &str) -> Result<RewriteSpec, PatternSyntaxError> {
        let trimmed = text.trim();
        let (reactant_text, product_text) = split_rewrite(trimmed)?;
        let reactant = Pattern::parse(reactant_text)?;
        let product = Pattern::parse(product_text)?;

        let reactant_classes = map_classes(&reactant, "reactant")?;
        let product_classes = map_classes(&product, "product")?;

        let mut retained = Vec::new();
        let mut deleted = Vec::new();
        for node in reactant.graph().node_indices() {
            match reactant
                .map_class(node)
                .and_then(|class| product_classes.get(&class))
            {
                Some(&p) => retained.push((node, p)),
                None => deleted.push(node),
            }
        }
        let created = product
            .graph()
            .node_indices()
            .filter(|&n| {
                product
                    .map_class(n)
                    .map_or(true, |class| !reactant_classes.contains_key(&class))
            })
            .collect();

        Ok(RewriteSpec {
            source: trimmed.to_string(),
            reactant,
            product,
            retained,
            deleted,
            created,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn reactant(&self) -> &Pattern {
        &self.reactant
    }

    pub fn product(&self) -> &Pattern {
        &self.product
    }

    pub fn retained(&self) -> &[(NodeIndex, NodeIndex)] {
        &self.retained
    }

    pub fn deleted(&self) -> &[NodeIndex] {
        &self.deleted
    }

    pub fn created(&self) -> &[NodeIndex] {
        &self.created
    }
}

/// Splits at the single `>>` outside bracket atoms.
fn split_rewrite(text: &str) -> Result<(&str, &str), PatternSyntaxError> {
    let mut depth = 0usize;
    let mut arrows = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b'>' if depth == 0 => {
                if bytes.get(i + 1) == Some(&b'>') {
                    arrows.push(i);
                    i += 1;
                } else {
                    return Err(PatternSyntaxError::InvalidRewrite(format!(
                        "stray '>' at position {i}"
                    )));
                }
            }
            _ => {}
        }
        i += 1;
    }
    match arrows.as_slice() {
        [at] => Ok((&text[..*at], &text[at + 2..])),
        [] => Err(PatternSyntaxError::InvalidRewrite("missing '>>'".into())),
        _ => Err(PatternSyntaxError::InvalidRewrite("more than one '>>'".into())),
    }
}

fn map_classes(pattern: &Pattern, side: &str) -> Result<HashMap<u16, NodeIndex>, PatternSyntaxError> {
    let mut classes = HashMap::new();
    for node in pattern.graph().node_indices() {
        if let Some(class) = pattern.map_class(node) {
            if classes.insert(class, node).is_some() {
                return Err(PatternSyntaxError::InvalidRewrite(format!(
                    "map class {class} appears twice in the {side}"
                )));
            }
        }
    }
    Ok(classes)
}

/// Concrete atom properties stated by a product-side expression. Only
/// conjunctions are looked into; anything under `Or` or `Not` states nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateAtom {
    pub element: Option<Element>,
    pub aromatic: Option<bool>,
    pub charge: Option<i8>,
    pub hydrogens: Option<u8>,
    pub isotope: Option<u16>,
}

impl TemplateAtom {
    pub fn from_expr(expr: &AtomExpr) -> TemplateAtom {
        let mut atom = TemplateAtom::default();
        atom.absorb(expr);
        atom
    }

    /// Whether applying this template to `atom` alters any of its properties.
    pub fn changes(&self, atom: &Atom) -> bool {
        self.element.is_some_and(|e| e != atom.element)
            || self.aromatic.is_some_and(|a| a != atom.aromatic)
            || self.charge.is_some_and(|c| c != atom.charge)
            || self.hydrogens.is_some_and(|h| h != atom.hydrogens)
            || self.isotope.is_some_and(|i| i != atom.isotope)
    }

    fn absorb(&mut self, expr: &AtomExpr) {
        match expr {
            AtomExpr::Element { element, aromatic } => {
                self.element = Some(*element);
                if aromatic.is_some() {
                    self.aromatic = *aromatic;
                }
            }
            AtomExpr::Aromatic => self.aromatic = Some(true),
            AtomExpr::Aliphatic => self.aromatic = Some(false),
            AtomExpr::Charge(c) => self.charge = Some(*c),
            AtomExpr::Isotope(i) => self.isotope = Some(*i),
            AtomExpr::Property {
                property: Property::TotalHydrogens,
                low,
                high,
            } if low == high => self.hydrogens = Some(*low),
            AtomExpr::And(parts) => {
                for part in parts {
                    self.absorb(part);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_atoms() {
        let spec = RewriteSpec::parse("[c:1]C(F)(F)F>>[c:1]C#N").unwrap();
        assert_eq!(spec.retained(), &[(NodeIndex::new(0), NodeIndex::new(0))]);
        assert_eq!(spec.deleted().len(), 4);
        assert_eq!(spec.created(), &[NodeIndex::new(1), NodeIndex::new(2)]);
    }

    #[test]
    fn product_only_map_class_is_created() {
        let spec = RewriteSpec::parse("[C:1]O>>[C:1][N:2]").unwrap();
        assert_eq!(spec.created(), &[NodeIndex::new(1)]);
    }

    #[test]
    fn malformed_arrows() {
        assert!(matches!(
            RewriteSpec::parse("[C:1]>[N:1]"),
            Err(PatternSyntaxError::InvalidRewrite(_))
        ));
        assert!(matches!(
            RewriteSpec::parse("CC"),
            Err(PatternSyntaxError::InvalidRewrite(_))
        ));
        assert!(matches!(
            RewriteSpec::parse("C>>C>>C"),
            Err(PatternSyntaxError::InvalidRewrite(_))
        ));
        assert!(matches!(
            RewriteSpec::parse("[C:1][C:1]>>[C:1]"),
            Err(PatternSyntaxError::InvalidRewrite(_))
        ));
    }

    #[test]
    fn side_errors_propagate() {
        assert!(matches!(
            RewriteSpec::parse("[C:1]>>[N"),
            Err(PatternSyntaxError::UnclosedBracket { .. })
        ));
        assert_eq!(RewriteSpec::parse(">>C").unwrap_err(), PatternSyntaxError::EmptyInput);
    }

    #[test]
    fn template_atom_properties() {
        let spec = RewriteSpec::parse("[C:1]>>[nH+:1]").unwrap();
        let t = TemplateAtom::from_expr(spec.product().atom(NodeIndex::new(0)));
        assert_eq!(t.element, Some(Element::N));
        assert_eq!(t.aromatic, Some(true));
        assert_eq!(t.charge, Some(1));
        assert_eq!(t.hydrogens, Some(1));
        assert_eq!(t.isotope, None);

        let vague = TemplateAtom::from_expr(&AtomExpr::Or(vec![AtomExpr::Aromatic]));
        assert_eq!(vague, TemplateAtom::default());
    }
}
