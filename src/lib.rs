//! Isosteric replacement enumeration over molecular graphs.
//!
//! ```
//! use isostere::{EnumerationConfig, EnumerationPipeline, RuleId, RuleTable};
//!
//! let table = RuleTable::from_rows([[
//!     "halogen",
//!     "methyl to chloro",
//!     "[c:1][CH3]",
//!     "[c:1][CH3]>>[c:1]Cl",
//! ]]);
//! let pipeline = EnumerationPipeline::new(table, EnumerationConfig::default());
//! let report = pipeline.enumerate_smiles("Cc1ccccc1", &[RuleId(0)]).unwrap();
//! assert_eq!(report.products.len(), 1);
//! ```

pub mod atom;
pub mod bond;
pub mod canonical;
pub mod config;
pub mod element;
pub mod error;
pub mod graph;
pub mod kekulize;
pub mod matcher;
pub mod pattern;
pub mod pipeline;
pub mod rewrite;
pub mod rings;
pub mod rules;
pub mod smiles;
pub mod valence;

pub use atom::{Atom, AtomId};
pub use bond::{Bond, BondOrder};
pub use canonical::{canonical_key, canonical_ranks};
pub use config::{ConfigError, EnumerationConfig};
pub use element::Element;
pub use error::EnumerationError;
pub use graph::{MalformedGraphError, MoleculeBuilder, MoleculeGraph};
pub use kekulize::{kekule_orders, KekulizeError};
pub use matcher::{
    find_matches, match_exists, verify_mapping, AtomMapping, Matcher, SearchLimits,
    SearchTimeoutError,
};
pub use pattern::{Pattern, PatternSyntaxError};
pub use pipeline::{
    export_products, write_products, CancelToken, EnumerationPipeline, EnumerationReport,
    ErrorKind, RuleFailure, Stage,
};
pub use rewrite::{replaced_atoms, Product, RewriteSpec, SitePolicy, TransformError};
pub use rings::RingInfo;
pub use rules::{
    ApplicableRules, Candidate, DroppedRuleWarning, Match, Rule, RuleId, RuleTable, TableFormat,
};
pub use smiles::ParseError;
pub use valence::ValenceError;
