use thiserror::Error;

use crate::graph::MalformedGraphError;

/// Errors produced when reading a SMILES string into a [`MoleculeGraph`](crate::MoleculeGraph).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input string was empty or contained only whitespace.
    #[error("empty SMILES string")]
    EmptyInput,
    /// Input ended while a bond or atom was still expected.
    #[error("unexpected end of SMILES")]
    UnexpectedEnd,
    /// An unexpected character was encountered at the given position.
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    /// An unrecognized or unsupported element symbol.
    #[error("invalid element '{text}' at position {pos}")]
    InvalidElement { pos: usize, text: String },
    /// A bracket atom `[` was opened but never closed with `]`.
    #[error("unclosed bracket atom starting at position {pos}")]
    UnclosedBracket { pos: usize },
    /// A ring-opening digit was never matched by a ring-closing digit.
    #[error("unclosed ring {digit}")]
    UnclosedRing { digit: u16 },
    /// A parenthesis was opened without a matching close, or vice versa.
    #[error("unmatched parenthesis at position {pos}")]
    UnmatchedParen { pos: usize },
    /// A charge specifier inside a bracket atom could not be parsed.
    #[error("invalid charge at position {pos}")]
    InvalidCharge { pos: usize },
    /// An isotope or hydrogen count overflowed.
    #[error("number out of range at position {pos}")]
    NumberOverflow { pos: usize },
    /// Both ends of a ring closure specify different bond orders.
    #[error("conflicting bond types on ring closure {digit}")]
    RingBondConflict { digit: u16 },
    /// The parsed atoms and bonds do not form a valid graph.
    #[error(transparent)]
    Graph(#[from] MalformedGraphError),
}
