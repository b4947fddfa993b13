//! sh-expand: a partial evaluator for parsed shell command trees.
//!
//! Given a syntax tree from an external parser, this crate finds the dynamic
//! fragments of each word (variable references, quoting, tilde and brace
//! forms) that can be resolved to fixed literals without any observable side
//! effect, resolves them through an expansion oracle, and rewrites the tree
//! in place. Anything that cannot be proven pure is rejected with a typed
//! [`Error`] and the caller falls back to running the command unexpanded.
//!
//! # Architecture
//!
//! - **[`ast`]**: Tree types: nodes, words, fragments, redirections.
//! - **[`safety`]**: Per-word scanner and the whole-tree `safe_command` pre-filter.
//! - **[`oracle`]**: Expansion backends (live bash, in-process), variable mirror, sessions.
//! - **[`compile`]**: Exhaustive node dispatcher and argument/redirection resolution.
//! - **[`config`]**: Configuration loading: embedded defaults + user overlay merge.
//! - **[`logging`]**: Logger setup for the driver binary.

/// Syntax tree types shared with the external parser and printer.
pub mod ast;
/// Node dispatcher that rewrites resolvable words.
pub mod compile;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Failure taxonomy.
pub mod error;
/// `simplelog` initialisation.
pub mod logging;
/// Expansion oracles and the session that owns them.
pub mod oracle;
/// Side-effect analysis of words and trees.
pub mod safety;

use log::info;

pub use ast::Node;
pub use error::{Error, Result};
pub use oracle::{Environment, Session};
pub use safety::safe_command;

/// Result of one compile attempt that did not break the session.
#[derive(Debug)]
pub enum Outcome {
    /// Every resolvable word was rewritten.
    Expanded(Node),
    /// The command could not be proven safe; `node` is the untouched input.
    Unexpanded { node: Node, reason: Error },
}

impl Outcome {
    pub fn is_expanded(&self) -> bool {
        matches!(self, Outcome::Expanded(_))
    }

    pub fn node(&self) -> &Node {
        match self {
            Outcome::Expanded(node) | Outcome::Unexpanded { node, .. } => node,
        }
    }
}

/// Compile `node` in place. On error the node is partially rewritten and
/// must be discarded.
pub fn expand_command(node: &mut Node, session: &mut Session) -> Result<()> {
    compile::compile(node, session)
}

/// Compile a copy of `node`, keeping the original when the command cannot be
/// proven safe. Only I/O failures of the oracle are returned as `Err`.
///
/// A failed attempt may have left recorded assignments in the session;
/// reopen it before compiling an unrelated command.
pub fn expand_or_keep(node: Node, session: &mut Session) -> Result<Outcome> {
    let mut candidate = node.clone();
    match compile::compile(&mut candidate, session) {
        Ok(()) => Ok(Outcome::Expanded(candidate)),
        Err(reason) if reason.is_expected() => {
            info!("leaving {} unexpanded: {reason}", node.kind().as_str());
            Ok(Outcome::Unexpanded { node, reason })
        }
        Err(e) => Err(e),
    }
}
