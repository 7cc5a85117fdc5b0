//! Substructure query patterns.
//!
//! A [`Pattern`] is parsed from a SMARTS-style string into a graph whose
//! nodes are [`AtomExpr`] predicates and whose edges are [`BondExpr`]
//! predicates. Matching a pattern against a molecule lives in
//! [`crate::matcher`].
//!
//! ```
//! use isostere::pattern::Pattern;
//!
//! let amide = Pattern::parse("[CX3](=O)[NX3;H1,H2]").unwrap();
//! assert_eq!(amide.atom_count(), 3);
//! ```

pub mod error;
mod parser;
pub mod query;

use std::fmt;
use std::str::FromStr;

use petgraph::graph::{NodeIndex, UnGraph};

pub use error::PatternSyntaxError;
pub use query::{AtomExpr, BondExpr, MatchContext, Property, Recursive};

#[derive(Debug, Clone)]
pub struct Pattern {
    graph: UnGraph<AtomExpr, BondExpr>,
    source: String,
}

impl Pattern {
    pub fn parse(text: &str) -> Result<Pattern, PatternSyntaxError> {
        parser::parse_pattern(text)
    }

    /// The trimmed text this pattern was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn graph(&self) -> &UnGraph<AtomExpr, BondExpr> {
        &self.graph
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn atom(&self, node: NodeIndex) -> &AtomExpr {
        &self.graph[node]
    }

    pub fn map_class(&self, node: NodeIndex) -> Option<u16> {
        self.graph[node].map_class()
    }

    /// First node carrying atom-map class `class`.
    pub fn node_with_map_class(&self, class: u16) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&n| self.map_class(n) == Some(class))
    }

    /// Recursive sub-patterns referenced directly by this pattern's atoms,
    /// in node order. Sub-patterns nested inside them are not included.
    pub fn recursive_patterns(&self) -> Vec<&Recursive> {
        let mut found = Vec::new();
        for node in self.graph.node_indices() {
            self.graph[node].for_each_recursive(&mut |r| found.push(r));
        }
        found
    }
}

impl FromStr for Pattern {
    type Err = PatternSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
