//! Replacement rule libraries.
//!
//! A library is a delimiter-separated text file with one rule per line and
//! the columns `group`, `display`, `query`, `transformation`. Rows that do
//! not parse are skipped with a [`DroppedRuleWarning`]; only I/O failures
//! stop a load.
//!
//! ```
//! use isostere::rules::{RuleTable, TableFormat};
//!
//! let text = "# group\tname\tquery\trewrite\n\
//!             halogen\tCF3 to Cl\tC(F)(F)F\t[c:1]C(F)(F)F>>[c:1]Cl\n";
//! let table = RuleTable::from_reader(text.as_bytes(), &TableFormat::default()).unwrap();
//! assert_eq!(table.len(), 1);
//! ```

pub mod subsumption;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::atom::AtomId;
use crate::graph::MoleculeGraph;
use crate::matcher::{AtomMapping, Matcher, SearchLimits, SearchTimeoutError};
use crate::pattern::{Pattern, PatternSyntaxError};
use crate::rewrite::{replaced_atoms, RewriteSpec};

pub use subsumption::subsumed_indices;

/// Position of a rule in its table, assigned in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: RuleId,
    pub group: String,
    pub display: String,
    pub pattern: Pattern,
    pub rewrite: RewriteSpec,
    /// 1-based line number in the source file.
    pub source_row: usize,
}

impl Rule {
    pub fn new(
        id: RuleId,
        group: &str,
        display: &str,
        query: &str,
        transformation: &str,
        source_row: usize,
    ) -> Result<Rule, PatternSyntaxError> {
        Ok(Rule {
            id,
            group: group.to_string(),
            display: display.to_string(),
            pattern: Pattern::parse(query)?,
            rewrite: RewriteSpec::parse(transformation)?,
            source_row,
        })
    }
}

/// One embedding of a rule's pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub rule_id: RuleId,
    pub mapping: AtomMapping,
}

impl Match {
    pub fn atom_set(&self) -> BTreeSet<AtomId> {
        self.mapping.iter().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableFormat {
    pub delimiter: char,
    /// Lines starting with this character are skipped.
    pub comment: char,
    pub has_header: bool,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            comment: '#',
            has_header: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule row {row} dropped: {reason}")]
pub struct DroppedRuleWarning {
    pub row: usize,
    pub reason: String,
}

const COLUMNS: [&str; 4] = ["group", "display", "query", "transformation"];

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
    warnings: Vec<DroppedRuleWarning>,
}

impl RuleTable {
    pub fn load(path: impl AsRef<Path>, format: &TableFormat) -> io::Result<RuleTable> {
        let file = File::open(path.as_ref())?;
        let table = Self::from_reader(BufReader::new(file), format)?;
        debug!(path = %path.as_ref().display(), rules = table.len(), dropped = table.warnings.len(), "rule table loaded");
        Ok(table)
    }

    pub fn from_reader<R: BufRead>(reader: R, format: &TableFormat) -> io::Result<RuleTable> {
        let mut table = RuleTable::default();
        let mut header_pending = format.has_header;
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(format.comment) {
                continue;
            }
            if header_pending {
                header_pending = false;
                continue;
            }
            let fields: Vec<&str> = line.split(format.delimiter).map(str::trim).collect();
            table.push_row(&fields, i + 1);
        }
        Ok(table)
    }

    /// Builds a table from in-memory rows; row `i` is reported as line `i + 1`.
    pub fn from_rows<I, S>(rows: I) -> RuleTable
    where
        I: IntoIterator<Item = [S; 4]>,
        S: AsRef<str>,
    {
        let mut table = RuleTable::default();
        for (i, row) in rows.into_iter().enumerate() {
            let fields: Vec<&str> = row.iter().map(|f| f.as_ref().trim()).collect();
            table.push_row(&fields, i + 1);
        }
        table
    }

    fn push_row(&mut self, fields: &[&str], row: usize) {
        match self.parse_row(fields, row) {
            Ok(rule) => self.rules.push(rule),
            Err(reason) => {
                let warning = DroppedRuleWarning { row, reason };
                warn!("{warning}");
                self.warnings.push(warning);
            }
        }
    }

    fn parse_row(&self, fields: &[&str], row: usize) -> Result<Rule, String> {
        let &[group, display, query, transformation] = fields else {
            return Err(format!("expected {} columns, found {}", COLUMNS.len(), fields.len()));
        };
        if let Some((name, _)) = COLUMNS.iter().zip(fields).find(|(_, f)| f.is_empty()) {
            return Err(format!("empty {name} column"));
        }
        let id = RuleId(self.rules.len() as u32);
        let pattern = Pattern::parse(query).map_err(|e| format!("query: {e}"))?;
        let rewrite = RewriteSpec::parse(transformation).map_err(|e| format!("transformation: {e}"))?;
        Ok(Rule {
            id,
            group: group.to_string(),
            display: display.to_string(),
            pattern,
            rewrite,
            source_row: row,
        })
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn warnings(&self) -> &[DroppedRuleWarning] {
        &self.warnings
    }

    /// Matches every rule against `mol`. Rules sharing a query text are
    /// searched once.
    pub fn find_applicable(&self, mol: &MoleculeGraph, limits: &SearchLimits) -> ApplicableRules {
        let mut matcher = Matcher::new(mol);
        let mut by_query: HashMap<&str, Result<Vec<AtomMapping>, SearchTimeoutError>> = HashMap::new();
        let mut applicable = ApplicableRules::default();

        for rule in &self.rules {
            let found = by_query
                .entry(rule.pattern.source())
                .or_insert_with(|| matcher.find_matches(&rule.pattern, limits));
            match found {
                Ok(mappings) if !mappings.is_empty() => {
                    let matches: Vec<Match> = mappings
                        .iter()
                        .map(|mapping| Match {
                            rule_id: rule.id,
                            mapping: mapping.clone(),
                        })
                        .collect();
                    let replaced = matches
                        .iter()
                        .map(|site| replaced_atoms(mol, rule, site, limits))
                        .collect();
                    applicable.rules.push(RuleMatches {
                        rule_id: rule.id,
                        matches,
                        replaced,
                    });
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(rule = %rule.id, %error, "rule search abandoned");
                    applicable.failures.push(SearchFailure {
                        rule_id: rule.id,
                        error: error.clone(),
                    });
                }
            }
        }
        applicable
    }
}

impl<'a> IntoIterator for &'a RuleTable {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Every match of one applicable rule, in search order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatches {
    pub rule_id: RuleId,
    pub matches: Vec<Match>,
    /// Atoms the rewrite replaces at each match; see [`replaced_atoms`].
    pub replaced: Vec<BTreeSet<AtomId>>,
}

/// A rule suggested by the subsumption filter, with the match that keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub rule_id: RuleId,
    pub representative: Match,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFailure {
    pub rule_id: RuleId,
    pub error: SearchTimeoutError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicableRules {
    rules: Vec<RuleMatches>,
    failures: Vec<SearchFailure>,
}

impl ApplicableRules {
    /// Every applicable rule with all of its matches.
    pub fn all(&self) -> &[RuleMatches] {
        &self.rules
    }

    /// Rules with at least one match whose replaced atoms are not a strict
    /// subset of another match's replaced atoms, of any rule, on the same
    /// molecule. Anchor atoms that a rewrite keeps unchanged do not count.
    pub fn distinct(&self) -> Vec<Candidate> {
        let flat: Vec<&Match> = self.rules.iter().flat_map(|r| &r.matches).collect();
        let sets: Vec<BTreeSet<AtomId>> = self
            .rules
            .iter()
            .flat_map(|r| r.replaced.iter().cloned())
            .collect();
        let subsumed = subsumed_indices(&sets);

        let mut offset = 0;
        let mut candidates = Vec::new();
        for rule in &self.rules {
            let survivor = (offset..offset + rule.matches.len()).find(|i| !subsumed.contains(i));
            if let Some(i) = survivor {
                candidates.push(Candidate {
                    rule_id: rule.rule_id,
                    representative: flat[i].clone(),
                });
            }
            offset += rule.matches.len();
        }
        candidates
    }

    pub fn failures(&self) -> &[SearchFailure] {
        &self.failures
    }

    pub fn matches_for(&self, id: RuleId) -> Option<&[Match]> {
        self.rules
            .iter()
            .find(|r| r.rule_id == id)
            .map(|r| r.matches.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
