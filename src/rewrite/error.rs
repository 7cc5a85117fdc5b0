use thiserror::Error;

use crate::matcher::SearchTimeoutError;

/// Why a rule could not be applied to a molecule. None of these are fatal
/// to an enumeration run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// The match does not satisfy the rule pattern, or the rewrite's
    /// reactant side cannot be placed on it.
    #[error("rule does not match at the given site")]
    NoMatch,
    /// The rewritten graph is not a chemically valid structure.
    #[error("invalid product: {0}")]
    InvalidStructure(String),
    #[error(transparent)]
    SearchTimeout(#[from] SearchTimeoutError),
}
