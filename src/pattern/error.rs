use thiserror::Error;

/// Errors produced when parsing a query pattern or a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternSyntaxError {
    /// The input string was empty.
    #[error("empty pattern")]
    EmptyInput,
    /// An unexpected character was encountered at the given position.
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    /// Input ended in the middle of an atom, bond or group.
    #[error("unexpected end of pattern at position {pos}")]
    UnexpectedEnd { pos: usize },
    /// A bracket atom `[` was opened but never closed with `]`.
    #[error("unclosed bracket starting at position {pos}")]
    UnclosedBracket { pos: usize },
    /// A ring-opening digit was never matched by a ring-closing digit.
    #[error("unclosed ring {digit}")]
    UnclosedRing { digit: u16 },
    /// A parenthesis was opened without a matching close, or vice versa.
    #[error("unmatched parenthesis at position {pos}")]
    UnmatchedParen { pos: usize },
    /// An `#n` atomic number or element symbol is not a known element.
    #[error("unknown element at position {pos}")]
    UnknownElement { pos: usize },
    /// A `{lo-hi}` range is malformed or empty.
    #[error("invalid range at position {pos}")]
    InvalidRange { pos: usize },
    /// A recursive pattern `$( ... )` was opened but never closed.
    #[error("unclosed recursive pattern at position {pos}")]
    UnclosedRecursive { pos: usize },
    /// Two bonds join the same pair of pattern atoms, or an atom to itself.
    #[error("invalid ring closure {digit}")]
    InvalidRingClosure { digit: u16 },
    /// A rewrite is not of the form `reactant>>product`.
    #[error("invalid rewrite: {0}")]
    InvalidRewrite(String),
}
