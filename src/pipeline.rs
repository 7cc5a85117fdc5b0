//! Enumeration runs: match the selected rules, rewrite, deduplicate.
//!
//! A run moves through the stages `Idle → RulesLoaded → MatchesFound →
//! ProductsGenerated → Deduplicated → Done`. Failures of individual rules
//! are collected in the [`EnumerationReport`]; only a bad input molecule
//! aborts a run.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::EnumerationConfig;
use crate::error::EnumerationError;
use crate::graph::MoleculeGraph;
use crate::matcher::Matcher;
use crate::rewrite::{apply_sites, Product, TransformError};
use crate::rules::{ApplicableRules, Match, RuleId, RuleTable};
use crate::smiles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    RulesLoaded,
    MatchesFound,
    ProductsGenerated,
    Deduplicated,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::RulesLoaded => "rules-loaded",
            Stage::MatchesFound => "matches-found",
            Stage::ProductsGenerated => "products-generated",
            Stage::Deduplicated => "deduplicated",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug_assert!(next > *stage, "stage {next} after {stage}");
    debug!(from = %stage, to = %next, "stage");
    *stage = next;
}

/// Shared flag that stops a run between rule evaluations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears a cancellation so the token can stop a later run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Recoverable per-rule failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoMatch,
    InvalidStructure,
    SearchTimeout,
    UnknownRule,
}

impl From<&TransformError> for ErrorKind {
    fn from(e: &TransformError) -> Self {
        match e {
            TransformError::NoMatch => ErrorKind::NoMatch,
            TransformError::InvalidStructure(_) => ErrorKind::InvalidStructure,
            TransformError::SearchTimeout(_) => ErrorKind::SearchTimeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule_id: RuleId,
    pub kind: ErrorKind,
    pub reason: String,
}

impl RuleFailure {
    fn new(rule_id: RuleId, kind: ErrorKind, reason: impl Into<String>) -> Self {
        let failure = Self {
            rule_id,
            kind,
            reason: reason.into(),
        };
        match kind {
            ErrorKind::NoMatch => debug!(rule = %rule_id, "rule skipped: {}", failure.reason),
            _ => warn!(rule = %rule_id, ?kind, "rule skipped: {}", failure.reason),
        }
        failure
    }

    fn from_transform(rule_id: RuleId, e: &TransformError) -> Self {
        Self::new(rule_id, ErrorKind::from(e), e.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnumerationReport {
    /// Unique products in selected-rule order.
    pub products: Vec<Product>,
    pub failures: Vec<RuleFailure>,
    /// Products dropped because an earlier product had the same key.
    pub duplicates: usize,
    pub cancelled: bool,
}

impl EnumerationReport {
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.products.iter().map(|p| p.key.as_str())
    }
}

pub struct EnumerationPipeline {
    table: RuleTable,
    config: EnumerationConfig,
    cancel: CancelToken,
}

impl EnumerationPipeline {
    pub fn new(table: RuleTable, config: EnumerationConfig) -> Self {
        let mut stage = Stage::Idle;
        advance(&mut stage, Stage::RulesLoaded);
        info!(rules = table.len(), dropped = table.warnings().len(), "pipeline ready");
        Self {
            table,
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn config(&self) -> &EnumerationConfig {
        &self.config
    }

    /// Token that cancels runs of this pipeline from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Rules that match `mol`. Use [`ApplicableRules::distinct`] for the
    /// suggested set and [`ApplicableRules::all`] for manual selection.
    #[instrument(skip_all, fields(atoms = mol.atom_count()))]
    pub fn find_candidate_rules(&self, mol: &MoleculeGraph) -> Result<ApplicableRules, EnumerationError> {
        mol.validate()?;
        let found = self.table.find_applicable(mol, &self.config.limits);
        info!(
            applicable = found.all().len(),
            distinct = found.distinct().len(),
            timeouts = found.failures().len(),
            "candidate rules"
        );
        Ok(found)
    }

    pub fn enumerate_smiles(&self, text: &str, ids: &[RuleId]) -> Result<EnumerationReport, EnumerationError> {
        let mol = smiles::parse(text)?;
        self.enumerate(&mol, ids)
    }

    /// Runs the selected rules, stopping early once [`Self::cancel_token`]
    /// is cancelled.
    pub fn enumerate(&self, mol: &MoleculeGraph, ids: &[RuleId]) -> Result<EnumerationReport, EnumerationError> {
        self.enumerate_with(mol, ids, &self.cancel, |_| {})
    }

    /// Runs the selected rules under a caller-owned token. `on_rule` is
    /// called with each rule id once its rewrite step has finished; it runs
    /// on the worker thread when rules are evaluated in parallel.
    #[instrument(skip_all, fields(atoms = mol.atom_count(), rules = ids.len()))]
    pub fn enumerate_with<F>(
        &self,
        mol: &MoleculeGraph,
        ids: &[RuleId],
        cancel: &CancelToken,
        on_rule: F,
    ) -> Result<EnumerationReport, EnumerationError>
    where
        F: Fn(RuleId) + Sync,
    {
        mol.validate()?;
        let mut stage = Stage::RulesLoaded;
        let mut report = EnumerationReport::default();

        let searched = self.map_rules(ids, |&id| self.find_rule_matches(mol, id, cancel));
        advance(&mut stage, Stage::MatchesFound);

        let mut matched = Vec::new();
        for (id, outcome) in ids.iter().zip(searched) {
            match outcome {
                Some(Ok(matches)) => matched.push((*id, matches)),
                Some(Err(failure)) => report.failures.push(failure),
                None => report.cancelled = true,
            }
        }

        let generated = self.map_rules(&matched, |(id, matches)| {
            let outcome = self.rewrite_rule(mol, *id, matches, cancel);
            if outcome.is_some() {
                on_rule(*id);
            }
            outcome
        });
        advance(&mut stage, Stage::ProductsGenerated);

        let mut seen: HashSet<String> = HashSet::new();
        for outcome in generated {
            match outcome {
                Some(Ok(products)) => {
                    for product in products {
                        if seen.insert(product.key.clone()) {
                            report.products.push(product);
                        } else {
                            report.duplicates += 1;
                        }
                    }
                }
                Some(Err(failure)) => report.failures.push(failure),
                None => report.cancelled = true,
            }
        }
        report.failures.sort_by_key(|f| ids.iter().position(|id| *id == f.rule_id));
        advance(&mut stage, Stage::Deduplicated);

        info!(
            products = report.products.len(),
            failures = report.failures.len(),
            duplicates = report.duplicates,
            cancelled = report.cancelled,
            "enumeration finished"
        );
        advance(&mut stage, Stage::Done);
        Ok(report)
    }

    fn find_rule_matches(
        &self,
        mol: &MoleculeGraph,
        id: RuleId,
        cancel: &CancelToken,
    ) -> Option<Result<Vec<Match>, RuleFailure>> {
        if cancel.is_cancelled() {
            return None;
        }
        let Some(rule) = self.table.get(id) else {
            return Some(Err(RuleFailure::new(id, ErrorKind::UnknownRule, format!("no rule {id}"))));
        };
        let found = match Matcher::new(mol).find_matches(&rule.pattern, &self.config.limits) {
            Ok(found) => found,
            Err(e) => return Some(Err(RuleFailure::from_transform(id, &TransformError::from(e)))),
        };
        if found.is_empty() {
            return Some(Err(RuleFailure::from_transform(id, &TransformError::NoMatch)));
        }
        Some(Ok(found
            .into_iter()
            .map(|mapping| Match { rule_id: id, mapping })
            .collect()))
    }

    fn rewrite_rule(
        &self,
        mol: &MoleculeGraph,
        id: RuleId,
        matches: &[Match],
        cancel: &CancelToken,
    ) -> Option<Result<Vec<Product>, RuleFailure>> {
        if cancel.is_cancelled() {
            return None;
        }
        let rule = self.table.get(id)?;
        Some(
            apply_sites(mol, rule, matches, self.config.site_policy, &self.config.limits)
                .map_err(|e| RuleFailure::from_transform(id, &e)),
        )
    }

    /// Maps `f` over `items` in order, on the rayon pool when enabled.
    fn map_rules<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            if self.config.parallel {
                use rayon::prelude::*;
                return items.par_iter().map(f).collect();
            }
        }
        items.iter().map(f).collect()
    }
}

/// Writes one canonical SMILES per product, in report order.
pub fn write_products<W: Write>(report: &EnumerationReport, mut writer: W) -> io::Result<()> {
    for key in report.keys() {
        writeln!(writer, "{key}")?;
    }
    writer.flush()
}

pub fn export_products(report: &EnumerationReport, path: impl AsRef<Path>) -> Result<(), EnumerationError> {
    let file = File::create(path.as_ref())?;
    write_products(report, BufWriter::new(file))?;
    debug!(path = %path.as_ref().display(), products = report.products.len(), "products exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonical_key;
    use crate::matcher::SearchLimits;
    use crate::smiles::parse;

    fn pipeline(rows: &[[&str; 4]]) -> EnumerationPipeline {
        EnumerationPipeline::new(RuleTable::from_rows(rows.iter().copied()), EnumerationConfig::default())
    }

    fn key(s: &str) -> String {
        canonical_key(&parse(s).unwrap()).unwrap()
    }

    #[test]
    fn products_and_failures() {
        let p = pipeline(&[
            ["methyl", "Me to Cl", "[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl"],
            ["amine", "NH2 to OH", "[NH2]", "[c:1][NH2]>>[c:1]O"],
            ["ring", "c to o", "[cH:1]", "[cH:1]>>[o:1]"],
        ]);
        let report = p
            .enumerate_smiles("Cc1ccccc1", &[RuleId(0), RuleId(1), RuleId(2), RuleId(9)])
            .unwrap();
        assert_eq!(report.keys().collect::<Vec<_>>(), vec![key("Clc1ccccc1")]);
        let kinds: Vec<(RuleId, ErrorKind)> = report.failures.iter().map(|f| (f.rule_id, f.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (RuleId(1), ErrorKind::NoMatch),
                (RuleId(2), ErrorKind::InvalidStructure),
                (RuleId(9), ErrorKind::UnknownRule),
            ]
        );
        assert!(!report.cancelled);
    }

    #[test]
    fn duplicates_are_counted() {
        let p = pipeline(&[
            ["a", "Me to Cl", "[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl"],
            ["b", "Me to Cl again", "c[CH3]", "[c:1][CH3]>>[c:1]Cl"],
        ]);
        let report = p.enumerate_smiles("Cc1ccccc1", &[RuleId(0), RuleId(1)]).unwrap();
        assert_eq!(report.products.len(), 1);
        assert_eq!(report.products[0].origin, RuleId(0));
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn parse_errors_are_fatal() {
        let p = pipeline(&[]);
        assert!(matches!(
            p.enumerate_smiles("C1CC", &[]),
            Err(EnumerationError::Parse(_))
        ));
    }

    #[test]
    fn cancelled_run_keeps_nothing_new() {
        let p = pipeline(&[["a", "Me to Cl", "[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl"]]);
        p.cancel_token().cancel();
        let report = p.enumerate_smiles("Cc1ccccc1", &[RuleId(0)]).unwrap();
        assert!(report.cancelled);
        assert!(report.products.is_empty());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn cancelling_mid_run_keeps_earlier_products() {
        let p = pipeline(&[
            ["a", "Me to Cl", "[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl"],
            ["b", "Me to F", "[c:1][CH3]", "[c:1][CH3]>>[c:1]F"],
        ]);
        let mol = parse("Cc1ccccc1").unwrap();
        let token = CancelToken::new();
        let report = p
            .enumerate_with(&mol, &[RuleId(0), RuleId(1)], &token, |id| {
                if id == RuleId(0) {
                    token.cancel();
                }
            })
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.keys().collect::<Vec<_>>(), vec![key("Clc1ccccc1")]);
        assert!(report.failures.is_empty());
        assert!(!p.cancel_token().is_cancelled());
    }

    #[test]
    fn reset_token_runs_again() {
        let p = pipeline(&[["a", "Me to Cl", "[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl"]]);
        let token = p.cancel_token();
        token.cancel();
        assert!(p.enumerate_smiles("Cc1ccccc1", &[RuleId(0)]).unwrap().cancelled);
        token.reset();
        let report = p.enumerate_smiles("Cc1ccccc1", &[RuleId(0)]).unwrap();
        assert!(!report.cancelled);
        assert_eq!(report.products.len(), 1);
    }

    #[test]
    fn timed_out_rule_does_not_stop_others() {
        let table = RuleTable::from_rows([
            ["ring", "benzene to pyridine", "c1ccccc1", "[c:1]>>[n:1]"],
            ["methyl", "Me to Cl", "[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl"],
        ]);
        let config = EnumerationConfig {
            limits: SearchLimits {
                max_steps: 50,
                ..SearchLimits::default()
            },
            ..EnumerationConfig::default()
        };
        let p = EnumerationPipeline::new(table, config);
        let report = p.enumerate_smiles("Cc1ccccc1", &[RuleId(0), RuleId(1)]).unwrap();
        assert_eq!(report.keys().collect::<Vec<_>>(), vec![key("Clc1ccccc1")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].rule_id, RuleId(0));
        assert_eq!(report.failures[0].kind, ErrorKind::SearchTimeout);
        assert!(!report.cancelled);
    }

    #[test]
    fn writes_one_key_per_line() {
        let p = pipeline(&[
            ["a", "Me to Cl", "[c:1][CH3]", "[c:1][CH3]>>[c:1]Cl"],
            ["b", "Me to F", "[c:1][CH3]", "[c:1][CH3]>>[c:1]F"],
        ]);
        let report = p.enumerate_smiles("Cc1ccccc1", &[RuleId(0), RuleId(1)]).unwrap();
        let mut out = Vec::new();
        write_products(&report, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, format!("{}\n{}\n", key("Clc1ccccc1"), key("Fc1ccccc1")));
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Idle < Stage::RulesLoaded);
        assert!(Stage::Deduplicated < Stage::Done);
        assert_eq!(Stage::MatchesFound.to_string(), "matches-found");
    }
}
