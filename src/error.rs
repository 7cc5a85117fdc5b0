use thiserror::Error;

use crate::config::ConfigError;
use crate::graph::MalformedGraphError;
use crate::smiles::ParseError;

/// Failures that stop an enumeration run. Per-rule problems are not errors;
/// they are collected in the report.
#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("input molecule is malformed: {0}")]
    Malformed(#[from] MalformedGraphError),
    #[error("cannot parse input molecule: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
