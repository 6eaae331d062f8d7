use std::fmt;

/// Failure modes of the core model.
///
/// `NotFound` and `NoPath` are recoverable — generation discards the
/// offending seed and retries. `Empty` and `NoCandidates` propagate to the
/// caller, which owns the user-facing fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A token id or trailing-context lookup missed.
    NotFound(String),
    /// The token table has never seen a token.
    Empty,
    /// No graph node matches the requested seed token.
    NoPath(String),
    /// The generation search exhausted its time/count budget with nothing.
    NoCandidates,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::NotFound(what) => write!(f, "not found: {what}"),
            CoreError::Empty => write!(f, "token table is empty"),
            CoreError::NoPath(name) => write!(f, "no path through the graph for '{name}'"),
            CoreError::NoCandidates => write!(f, "generation produced no candidates"),
        }
    }
}

impl std::error::Error for CoreError {}

pub type Result<T> = std::result::Result<T, CoreError>;
