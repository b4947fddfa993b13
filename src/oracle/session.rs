//! One compile attempt's view of an oracle.
//!
//! A [`Session`] owns the backend and the variable mirror. It is opened once
//! per attempt, may be re-opened, and is closed exactly once on every exit
//! path: explicitly through [`Session::close`] or implicitly on drop.

use std::path::Path;

use log::{debug, info, warn};

use super::bash::BashOracle;
use super::builtin::BuiltinOracle;
use super::mirror::{Statement, VariableMirror};
use super::{Environment, Mode, Oracle};
use crate::ast::Word;
use crate::config::{Backend, OracleConfig};
use crate::error::{Error, Result};

pub struct Session {
    oracle: Option<Box<dyn Oracle>>,
    mirror: Option<VariableMirror>,
    config: OracleConfig,
    env: Environment,
}

impl Session {
    /// Start the configured backend and load `env` into it.
    pub fn open(config: &OracleConfig, env: &Environment) -> Result<Self> {
        let mut session = Self {
            oracle: None,
            mirror: None,
            config: config.clone(),
            env: env.clone(),
        };
        session.start()?;
        Ok(session)
    }

    /// Force-close the current backend and start a fresh one with the same
    /// configuration and environment.
    pub fn reopen(&mut self) -> Result<()> {
        if let Err(e) = self.close() {
            warn!("closing previous session failed: {e}");
        }
        self.start()
    }

    pub fn is_open(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn backend(&self) -> Backend {
        self.config.backend
    }

    /// Whether command assignments can be recorded into this session.
    pub fn accepts_assignments(&self) -> bool {
        self.oracle
            .as_ref()
            .is_some_and(|oracle| oracle.accepts_assignments())
    }

    /// Expand a word. The mirror is flushed first so the probe observes every
    /// recorded assignment.
    pub fn expand(&mut self, word: &Word, mode: Mode) -> Result<Vec<String>> {
        let text = match mode {
            Mode::Heredoc => word.heredoc_text(),
            Mode::Split | Mode::NoSplit | Mode::Target => word.source_text()?,
        };
        self.expand_text(&text, mode)
    }

    /// Expand shell source text directly.
    pub fn expand_text(&mut self, text: &str, mode: Mode) -> Result<Vec<String>> {
        let (oracle, mirror) = self.parts()?;
        mirror.flush(&mut *oracle)?;
        let fields = oracle.expand(text, mode)?;
        if mode != Mode::Split && fields.len() != 1 {
            return Err(Error::stuck(format!(
                "{} expansion of {text:?} produced {} results",
                mode.as_str(),
                fields.len()
            )));
        }
        Ok(fields)
    }

    /// Queue `name=value` for the next flush.
    pub fn record_assignment(&mut self, name: &str, value: &str) -> Result<()> {
        if !self.accepts_assignments() {
            return Err(Error::impure(format!(
                "assignment to {name} cannot be mirrored into this backend"
            )));
        }
        let (_, mirror) = self.parts()?;
        mirror.push(&Statement::assign(name, value))
    }

    /// Statements recorded but not yet applied.
    pub fn pending_statements(&self) -> &[String] {
        match &self.mirror {
            Some(mirror) => mirror.pending(),
            None => &[],
        }
    }

    pub fn mirror_path(&self) -> Option<&Path> {
        self.mirror.as_ref().map(|m| m.path())
    }

    /// Run `f` inside a nested context. Whatever `f` changes in the oracle
    /// or records into the mirror is discarded when it returns, whether it
    /// succeeded or not. An error from `f` takes precedence over an error
    /// leaving the scope.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        {
            let (oracle, mirror) = self.parts()?;
            mirror.flush(&mut *oracle)?;
            oracle.enter_scope()?;
        }
        let result = f(self);
        let left = match self.parts() {
            Ok((oracle, mirror)) => {
                mirror.discard();
                oracle.leave_scope()
            }
            Err(e) => Err(e),
        };
        match (result, left) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    /// Release the backend and the mirror file. Safe to call repeatedly.
    pub fn close(&mut self) -> Result<()> {
        let mirror = self.mirror.take();
        let result = match self.oracle.take() {
            Some(mut oracle) => {
                info!("closing {:?} session", self.config.backend);
                oracle.close()
            }
            None => Ok(()),
        };
        drop(mirror);
        result
    }

    fn start(&mut self) -> Result<()> {
        check_options(&self.env.options)?;
        let mirror = VariableMirror::new(self.config.temp_dir().as_deref())?;
        let oracle: Box<dyn Oracle> = match self.config.backend {
            Backend::Bash => Box::new(BashOracle::spawn(&self.config)?),
            Backend::Builtin => Box::new(BuiltinOracle::new(&self.env.options)),
        };
        info!(
            "opened {:?} session with {} variable(s)",
            self.config.backend,
            self.env.variables.len()
        );
        self.oracle = Some(oracle);
        self.mirror = Some(mirror);

        if let Err(e) = self.load_environment() {
            if let Err(close_err) = self.close() {
                warn!("closing half-open session failed: {close_err}");
            }
            return Err(e);
        }
        Ok(())
    }

    fn load_environment(&mut self) -> Result<()> {
        let Self {
            oracle: Some(oracle),
            mirror: Some(mirror),
            env,
            ..
        } = self
        else {
            return Err(Error::early("session is closed"));
        };

        if let Some(dump) = &env.dump_file {
            debug!("sourcing variable dump {}", dump.display());
            oracle.source(dump)?;
        }
        for (name, var) in &env.variables {
            mirror.push(&Statement::assign(name.as_str(), var.value.as_str()))?;
            if var.exported {
                mirror.push(&Statement::Export(name.clone()))?;
            }
            if var.readonly {
                mirror.push(&Statement::Readonly(name.clone()))?;
            }
        }
        mirror.flush(&mut **oracle)?;
        oracle.set_positional(&env.positional)?;

        let options = oracle.shell_options()?;
        debug!("ambient shell options: {options:?}");
        check_options(&options)
    }

    fn parts(&mut self) -> Result<(&mut dyn Oracle, &mut VariableMirror)> {
        match (self.oracle.as_mut(), self.mirror.as_mut()) {
            (Some(oracle), Some(mirror)) => Ok((&mut **oracle, mirror)),
            _ => Err(Error::early("session is closed")),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close session: {e}");
        }
    }
}

/// errexit and nounset turn an expansion probe into control flow.
fn check_options(options: &str) -> Result<()> {
    for flag in ['e', 'u'] {
        if options.contains(flag) {
            return Err(Error::early(format!("shell option -{flag} is enabled")));
        }
    }
    Ok(())
}
