//! Command-line front end: list candidate rules for a molecule, or
//! enumerate the products of selected rules.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use isostere::{
    export_products, smiles, write_products, EnumerationConfig, EnumerationPipeline, RuleId,
    RuleTable, SitePolicy, TableFormat,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Enumerate isosteric replacements for a molecule")]
struct Args {
    /// Rule table: group, display name, query and rewrite per line
    #[arg(long, global = true, default_value = "rules.tsv")]
    rules: PathBuf,
    /// JSON run configuration (search limits, site policy)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Skip the first line of the rule table
    #[arg(long, global = true)]
    header: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the rules that apply to a molecule
    Candidates {
        #[arg(long)]
        smiles: String,
        /// Include rules whose every match lies inside another rule's match
        #[arg(long)]
        all: bool,
    },
    /// Apply rules and print one canonical SMILES per unique product
    Enumerate {
        #[arg(long)]
        smiles: String,
        /// Rule id to apply (repeatable). Defaults to the distinct candidates.
        #[arg(long = "rule")]
        rules: Vec<u32>,
        /// Rewrite every matching site instead of the first
        #[arg(long)]
        all_sites: bool,
        /// Evaluate rules in parallel (needs the `parallel` feature)
        #[arg(long)]
        parallel: bool,
        /// Write products here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => EnumerationConfig::from_json_file(path)?,
        None => EnumerationConfig::default(),
    };
    let format = TableFormat {
        has_header: args.header,
        ..TableFormat::default()
    };
    let table = RuleTable::load(&args.rules, &format)
        .with_context(|| format!("load rule table {}", args.rules.display()))?;
    for dropped in table.warnings() {
        warn!("{dropped}");
    }

    match args.cmd {
        Command::Candidates { smiles: text, all } => {
            let mol = smiles::parse(&text).with_context(|| format!("parse {text:?}"))?;
            let pipeline = EnumerationPipeline::new(table, config);
            let found = pipeline.find_candidate_rules(&mol)?;
            let rows: Vec<(RuleId, usize)> = if all {
                found.all().iter().map(|r| (r.rule_id, r.matches.len())).collect()
            } else {
                found
                    .distinct()
                    .iter()
                    .map(|c| (c.rule_id, found.matches_for(c.rule_id).map_or(0, <[_]>::len)))
                    .collect()
            };
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for (id, count) in rows {
                if let Some(rule) = pipeline.table().get(id) {
                    writeln!(out, "{id}\t{}\t{}\t{count}", rule.group, rule.display)?;
                }
            }
            for failure in found.failures() {
                warn!(rule = %failure.rule_id, "search abandoned: {}", failure.error);
            }
        }
        Command::Enumerate {
            smiles: text,
            rules,
            all_sites,
            parallel,
            out,
        } => {
            if all_sites {
                config.site_policy = SitePolicy::AllSites;
            }
            config.parallel |= parallel;
            let mol = smiles::parse(&text).with_context(|| format!("parse {text:?}"))?;
            let pipeline = EnumerationPipeline::new(table, config);
            let ids: Vec<RuleId> = if rules.is_empty() {
                let found = pipeline.find_candidate_rules(&mol)?;
                found.distinct().iter().map(|c| c.rule_id).collect()
            } else {
                rules.into_iter().map(RuleId).collect()
            };
            let report = pipeline.enumerate(&mol, &ids)?;
            for failure in &report.failures {
                info!(rule = %failure.rule_id, kind = ?failure.kind, "{}", failure.reason);
            }
            match out {
                Some(path) => export_products(&report, &path)
                    .with_context(|| format!("write {}", path.display()))?,
                None => write_products(&report, io::stdout().lock())?,
            }
        }
    }
    Ok(())
}
