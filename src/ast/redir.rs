use serde::{Deserialize, Serialize};

use super::Word;

/// File-descriptor operand of a redirection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fd {
    Fixed(i32),
    /// `{name}>file` style descriptor chosen at run time. Always unsafe.
    Runtime(Word),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRedirKind {
    /// `<`
    From,
    /// `>`
    To,
    /// `>|`
    Clobber,
    /// `>>`
    Append,
    /// `<>`
    FromTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DupRedirKind {
    /// `<&`
    FromFd,
    /// `>&`
    ToFd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeredocKind {
    /// Delimiter was quoted: the body is taken literally.
    Literal,
    /// Unquoted delimiter: the body undergoes parameter expansion.
    Expanding,
}

/// A redirection attached to a command or compound node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Redirection {
    File {
        op: FileRedirKind,
        fd: Fd,
        target: Word,
    },
    Dup {
        op: DupRedirKind,
        fd: Fd,
        target: Word,
    },
    Heredoc {
        op: HeredocKind,
        fd: Fd,
        body: Word,
    },
    /// Operator with a descriptor and no word, e.g. `<&-`.
    SingleArg { fd: Fd },
}

impl Redirection {
    pub fn fd(&self) -> &Fd {
        match self {
            Redirection::File { fd, .. }
            | Redirection::Dup { fd, .. }
            | Redirection::Heredoc { fd, .. }
            | Redirection::SingleArg { fd } => fd,
        }
    }
}
