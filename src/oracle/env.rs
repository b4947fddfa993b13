//! Snapshot environment handed to a session before compiling.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One variable from an externally parsed variable dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub value: String,
    #[serde(default)]
    pub exported: bool,
    #[serde(default)]
    pub readonly: bool,
}

impl Variable {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

pub type VarTable = BTreeMap<String, Variable>;

/// Everything a session needs to reproduce the caller's shell state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    /// Variables to define before the first probe.
    #[serde(default)]
    pub variables: VarTable,
    /// A variable-dump file to source into the oracle, applied before
    /// `variables`.
    #[serde(default)]
    pub dump_file: Option<PathBuf>,
    /// Positional parameters `$1`, `$2`, ...
    #[serde(default)]
    pub positional: Vec<String>,
    /// Option flags of the original shell, as `$-` would report them.
    #[serde(default)]
    pub options: String,
}

impl Environment {
    /// Builder-style helper for tests and simple callers.
    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.variables.insert(name.to_string(), Variable::new(value));
        self
    }
}
