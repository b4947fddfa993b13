//! Command tree node kinds.
//!
//! The tree is produced by an external parser. Every node owns its children
//! exclusively; there is no sharing and no cycles.

use serde::{Deserialize, Serialize};

use super::{Redirection, Word};

/// A shell syntax tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Pipe {
        items: Vec<Node>,
        #[serde(default)]
        background: bool,
    },
    Command(CommandNode),
    Subshell {
        body: Box<Node>,
        #[serde(default)]
        redirections: Vec<Redirection>,
    },
    And {
        left: Box<Node>,
        right: Box<Node>,
    },
    Or {
        left: Box<Node>,
        right: Box<Node>,
    },
    Semi {
        left: Box<Node>,
        right: Box<Node>,
    },
    Not {
        body: Box<Node>,
    },
    Redir {
        node: Box<Node>,
        redirections: Vec<Redirection>,
    },
    Background {
        node: Box<Node>,
        #[serde(default)]
        redirections: Vec<Redirection>,
    },
    Defun {
        name: Word,
        body: Box<Node>,
    },
    For {
        variable: Word,
        items: Vec<Word>,
        body: Box<Node>,
    },
    While {
        test: Box<Node>,
        body: Box<Node>,
    },
    If {
        cond: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    Case {
        argument: Word,
        cases: Vec<CaseItem>,
    },
    Select {
        variable: Word,
        items: Vec<Word>,
        body: Box<Node>,
    },
    Arith {
        body: Vec<Word>,
    },
    Cond(CondNode),
    ArithFor {
        init: Vec<Word>,
        cond: Vec<Word>,
        step: Vec<Word>,
        action: Box<Node>,
    },
    Coproc {
        name: Word,
        body: Box<Node>,
    },
    Time {
        #[serde(default)]
        posix: bool,
        command: Box<Node>,
    },
    Group {
        body: Box<Node>,
        #[serde(default)]
        redirections: Vec<Redirection>,
    },
}

/// Discriminant of [`Node`], for logs and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Pipe,
    Command,
    Subshell,
    And,
    Or,
    Semi,
    Not,
    Redir,
    Background,
    Defun,
    For,
    While,
    If,
    Case,
    Select,
    Arith,
    Cond,
    ArithFor,
    Coproc,
    Time,
    Group,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Pipe => "pipe",
            NodeKind::Command => "command",
            NodeKind::Subshell => "subshell",
            NodeKind::And => "and",
            NodeKind::Or => "or",
            NodeKind::Semi => "semi",
            NodeKind::Not => "not",
            NodeKind::Redir => "redir",
            NodeKind::Background => "background",
            NodeKind::Defun => "defun",
            NodeKind::For => "for",
            NodeKind::While => "while",
            NodeKind::If => "if",
            NodeKind::Case => "case",
            NodeKind::Select => "select",
            NodeKind::Arith => "arith",
            NodeKind::Cond => "cond",
            NodeKind::ArithFor => "arith_for",
            NodeKind::Coproc => "coproc",
            NodeKind::Time => "time",
            NodeKind::Group => "group",
        }
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Pipe { .. } => NodeKind::Pipe,
            Node::Command(_) => NodeKind::Command,
            Node::Subshell { .. } => NodeKind::Subshell,
            Node::And { .. } => NodeKind::And,
            Node::Or { .. } => NodeKind::Or,
            Node::Semi { .. } => NodeKind::Semi,
            Node::Not { .. } => NodeKind::Not,
            Node::Redir { .. } => NodeKind::Redir,
            Node::Background { .. } => NodeKind::Background,
            Node::Defun { .. } => NodeKind::Defun,
            Node::For { .. } => NodeKind::For,
            Node::While { .. } => NodeKind::While,
            Node::If { .. } => NodeKind::If,
            Node::Case { .. } => NodeKind::Case,
            Node::Select { .. } => NodeKind::Select,
            Node::Arith { .. } => NodeKind::Arith,
            Node::Cond(_) => NodeKind::Cond,
            Node::ArithFor { .. } => NodeKind::ArithFor,
            Node::Coproc { .. } => NodeKind::Coproc,
            Node::Time { .. } => NodeKind::Time,
            Node::Group { .. } => NodeKind::Group,
        }
    }

    /// A simple command of raw words and nothing else.
    pub fn command(words: &[&str]) -> Self {
        Node::Command(CommandNode {
            arguments: words.iter().map(|w| Word::raw(w)).collect(),
            ..CommandNode::default()
        })
    }
}

/// A simple command: assignments, argument words and redirections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandNode {
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub arguments: Vec<Word>,
    #[serde(default)]
    pub redirections: Vec<Redirection>,
}

/// `NAME=value` preceding a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    pub value: Word,
}

/// One `pattern) body ;;` arm of a case statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseItem {
    /// Alternatives separated by `|` in the source.
    pub patterns: Vec<Word>,
    pub body: Option<Node>,
}

/// A `[[ ... ]]` conditional expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondNode {
    #[serde(default)]
    pub op: Option<Word>,
    #[serde(default)]
    pub left: Option<CondOperand>,
    #[serde(default)]
    pub right: Option<CondOperand>,
    #[serde(default)]
    pub invert: bool,
}

/// Operand of a conditional: a term word or a nested expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CondOperand {
    Word(Word),
    Nested(Box<CondNode>),
}
