//! Typed shell syntax tree consumed and rewritten by the compiler.

pub mod node;
pub mod redir;
pub mod word;

pub use node::{Assignment, CaseItem, CommandNode, CondNode, CondOperand, Node, NodeKind};
pub use redir::{DupRedirKind, Fd, FileRedirKind, HeredocKind, Redirection};
pub use word::{Fragment, Word};
