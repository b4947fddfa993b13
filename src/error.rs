//! Failure taxonomy shared by the scanner, the oracles and the compiler.
//!
//! The first four kinds are the expected, binary outcome of a compile
//! attempt: the command cannot be proven safe to rewrite and should be left
//! unexpanded. [`Error::Io`] is different: the interpreter process broke and
//! the owning session is no longer usable.

use thiserror::Error;

/// Convenience result alias for expansion operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A structural precondition failed before any expansion was attempted.
    #[error("early error: {0}")]
    EarlyError(String),

    /// The construct may have a side effect or depend on mutable shell state.
    #[error("impure expansion: {0}")]
    ImpureExpansion(String),

    /// The construct is recognized but intentionally unsupported.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// The oracle transcript could not be parsed as expected.
    #[error("stuck expansion: {0}")]
    StuckExpansion(String),

    /// Talking to the interpreter failed at the OS level.
    #[error("oracle I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the kinds a caller treats as "leave the command unexpanded".
    pub fn is_expected(&self) -> bool {
        !matches!(self, Error::Io(_))
    }

    /// Short stable name of the failure kind, used in driver output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::EarlyError(_) => "early_error",
            Error::ImpureExpansion(_) => "impure_expansion",
            Error::Unimplemented(_) => "unimplemented",
            Error::StuckExpansion(_) => "stuck_expansion",
            Error::Io(_) => "io",
        }
    }

    pub(crate) fn impure(msg: impl Into<String>) -> Self {
        Error::ImpureExpansion(msg.into())
    }

    pub(crate) fn unimplemented(msg: impl Into<String>) -> Self {
        Error::Unimplemented(msg.into())
    }

    pub(crate) fn stuck(msg: impl Into<String>) -> Self {
        Error::StuckExpansion(msg.into())
    }

    pub(crate) fn early(msg: impl Into<String>) -> Self {
        Error::EarlyError(msg.into())
    }
}
