//! Expansion oracles: components that answer "what does the shell expand
//! this word to?"
//!
//! Two interchangeable backends implement [`Oracle`]:
//!
//! - **[`bash`]**: drives a live interactive bash over a sentinel-delimited
//!   line protocol. Ground truth, but every query is a process round trip.
//! - **[`builtin`]**: a pure in-process expander over a variable table, for
//!   the POSIX subset used by simpler dialects.
//!
//! Callers never talk to an oracle directly; they go through a
//! [`Session`](session::Session), which owns the oracle together with the
//! variable mirror and guarantees cleanup.

/// Live interactive bash backend.
pub mod bash;
/// Pure in-process backend.
pub mod builtin;
/// Snapshot environment types.
pub mod env;
/// Buffered assignment statements flushed into the oracle.
pub mod mirror;
/// Session lifecycle and scoped sub-sessions.
pub mod session;

use std::path::Path;

use crate::error::Result;

pub use env::{Environment, VarTable, Variable};
pub use session::Session;

/// How an expansion result may be shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Field splitting applies; zero or many words may result.
    Split,
    /// Exactly one word results and no splitting or globbing happens (case
    /// words and patterns, `[[ ]]` and arithmetic operands, assignment
    /// values).
    NoSplit,
    /// Redirection target: expanded as an argument would be, then required
    /// to be exactly one word. Shells that do not split targets treat this
    /// as `NoSplit`.
    Target,
    /// Exactly one word, with here-document quoting: quote characters are
    /// literal and only `$`, `` ` ``, `\` and newline can be escaped.
    Heredoc,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Split => "split",
            Mode::NoSplit => "no-split",
            Mode::Target => "target",
            Mode::Heredoc => "heredoc",
        }
    }
}

/// A backend able to expand literal shell words.
///
/// Calls are blocking round trips; an oracle is never used from two call
/// sites at once.
pub trait Oracle {
    /// Expand shell source text. Every mode but `Split` returns one string.
    fn expand(&mut self, word: &str, mode: Mode) -> Result<Vec<String>>;

    /// Apply a file of assignment statements.
    fn source(&mut self, path: &Path) -> Result<()>;

    /// Replace the positional parameters.
    fn set_positional(&mut self, args: &[String]) -> Result<()>;

    /// Current option flags, as `$-` reports them.
    fn shell_options(&mut self) -> Result<String>;

    /// Start a nested context whose state changes are discarded on exit.
    fn enter_scope(&mut self) -> Result<()>;

    /// Discard the innermost nested context.
    fn leave_scope(&mut self) -> Result<()>;

    /// Whether command assignments can be mirrored into this backend.
    fn accepts_assignments(&self) -> bool {
        false
    }

    /// Release the backend's resources. Must be safe to call repeatedly.
    fn close(&mut self) -> Result<()>;
}
