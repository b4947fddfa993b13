//! Variable mirror: pending assignment statements, flushed into the oracle
//! through a temp file before the next dependent query.

use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;
use tempfile::NamedTempFile;

use super::Oracle;
use crate::ast::word::quote;
use crate::error::{Error, Result};

/// One line of the mirror file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Assign { name: String, value: String },
    Export(String),
    Readonly(String),
}

impl Statement {
    pub fn assign(name: impl Into<String>, value: impl Into<String>) -> Self {
        Statement::Assign {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Shell source for this statement.
    pub fn render(&self) -> Result<String> {
        match self {
            Statement::Assign { name, value } => {
                check_name(name)?;
                Ok(format!("{name}={}", quote(value)?))
            }
            Statement::Export(name) => {
                check_name(name)?;
                Ok(format!("export {name}"))
            }
            Statement::Readonly(name) => {
                check_name(name)?;
                Ok(format!("readonly {name}"))
            }
        }
    }
}

/// Valid shell variable name: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_name(name: &str) -> Result<()> {
    if is_name(name) {
        Ok(())
    } else {
        Err(Error::early(format!("invalid variable name {name:?}")))
    }
}

/// Append-only buffer of rendered statements backed by one temp file.
///
/// A flush writes the buffer, sources it into the oracle and truncates both,
/// so a statement is applied at most once.
pub struct VariableMirror {
    pending: Vec<String>,
    file: NamedTempFile,
}

impl VariableMirror {
    pub fn new(temp_dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sh_expand_vars");
        let file = match temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(Self {
            pending: Vec::new(),
            file,
        })
    }

    pub fn push(&mut self, statement: &Statement) -> Result<()> {
        self.pending.push(statement.render()?);
        Ok(())
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Drop pending statements without applying them.
    pub fn discard(&mut self) {
        if !self.pending.is_empty() {
            debug!("discarding {} scoped statement(s)", self.pending.len());
        }
        self.pending.clear();
    }

    /// Write pending statements, source them into `oracle`, then truncate.
    pub fn flush(&mut self, oracle: &mut dyn Oracle) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        self.rewrite(&pending)?;
        debug!("flushing {} statement(s) into oracle", pending.len());
        let sourced = oracle.source(self.file.path());
        self.rewrite(&[])?;
        sourced
    }

    fn rewrite(&mut self, lines: &[String]) -> Result<()> {
        let file = self.file.as_file_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        file.flush()?;
        Ok(())
    }
}
