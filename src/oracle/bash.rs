//! Live-interpreter oracle: an interactive bash driven over a pseudo-terminal.
//!
//! The interpreter's prompt is set to a fixed sentinel and made readonly.
//! Every command is one line (or one here-document) followed by a blocking
//! `expect` until the sentinel reappears in the transcript; whatever preceded
//! the sentinel is the reply. The terminal is switched to raw mode without
//! echo right after the first prompt, so replies carry program output only.

use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use expectrl::Expect;
use log::{debug, info, warn};

use super::{Mode, Oracle};
use crate::ast::word::quote;
use crate::config::OracleConfig;
use crate::error::{Error, Result};

/// First field of every probe reply; lets zero-field expansions be told
/// apart from a lost reply.
const MARKER: &str = "_";

const HEREDOC_DELIMITER: &str = "__SH_EXPAND_EOF__";

/// Scratch variable for the single-word probe. The right-hand side of an
/// assignment is neither split nor globbed.
const PROBE_VAR: &str = "__sh_expand_v";

/// Read-eval loop run inside a `( ... )` subshell. Lines arrive with
/// backslashes and newlines escaped for `%b`; the loop prints the sentinel
/// after each command just as the top-level prompt would.
const SCOPE_LOOP: &str = concat!(
    r#"( printf '%s' "$PS1"; "#,
    r#"while IFS= read -r __sh_expand_line; do "#,
    r#"printf -v __sh_expand_line '%b' "$__sh_expand_line"; "#,
    r#"eval "$__sh_expand_line"; printf '%s' "$PS1"; done )"#,
);

/// Oracle backed by a real bash process.
pub struct BashOracle {
    pty: Option<expectrl::session::OsSession>,
    sentinel: String,
    timeout: Duration,
    depth: usize,
    poisoned: bool,
}

impl BashOracle {
    /// Spawn the interpreter and synchronize on its first prompt.
    pub fn spawn(config: &OracleConfig) -> Result<Self> {
        validate_sentinel(&config.sentinel)?;

        let mut command = Command::new(&config.shell);
        command
            .args(&config.shell_args)
            .env("PS1", &config.sentinel)
            .env("PS2", "")
            .env("HISTFILE", "")
            .env("TERM", "dumb")
            .env_remove("PROMPT_COMMAND")
            .env_remove("BASH_ENV");
        let mut pty = expectrl::Session::spawn(command).map_err(protocol_error)?;
        pty.set_expect_timeout(Some(config.timeout()));
        info!("spawned {} on a pseudo-terminal", config.shell);

        let mut oracle = Self {
            pty: Some(pty),
            sentinel: config.sentinel.clone(),
            timeout: config.timeout(),
            depth: 0,
            poisoned: false,
        };

        oracle.wait_prompt().map_err(|e| match e {
            Error::StuckExpansion(msg) => {
                Error::early(format!("interpreter never showed the sentinel prompt: {msg}"))
            }
            other => other,
        })?;
        // Raw mode keeps control characters in probed words away from the
        // line discipline.
        oracle.run_command("stty raw -echo; readonly PS1 PS2; set +H")?;
        Ok(oracle)
    }

    /// Depth of nested scopes currently open.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Send one command and return everything printed before the next prompt.
    pub fn run_command(&mut self, command: &str) -> Result<String> {
        if self.poisoned {
            return Err(Error::stuck("session desynchronized by an earlier failure"));
        }
        let line = if self.depth == 0 {
            command.to_string()
        } else {
            escape_for_scope(command)
        };
        debug!("bash <- {}", visible(&line));

        let pty = self
            .pty
            .as_mut()
            .ok_or_else(|| Error::early("oracle session is closed"))?;
        pty.write_all(line.as_bytes())?;
        pty.write_all(b"\n")?;
        pty.flush()?;

        let reply = self.wait_prompt()?;
        debug!("bash -> {}", visible(&reply));
        Ok(reply)
    }

    /// Splitting probe: NUL-separated fields survive embedded whitespace.
    pub fn expand_word(&mut self, word: &str) -> Result<Vec<String>> {
        let reply = self.run_command(&format!("printf '%s\\0' {MARKER} {word}"))?;
        parse_fields(&reply)
    }

    /// Single-word probe for case words, `[[ ]]` operands and arithmetic:
    /// the word is evaluated as an assignment value, so it is never split
    /// or globbed.
    pub fn expand_no_split(&mut self, word: &str) -> Result<String> {
        check_single_token(word)?;
        let reply = self.run_command(&format!(
            "{PROBE_VAR}={word} && printf '{MARKER}%s' \"${PROBE_VAR}\"; unset {PROBE_VAR}"
        ))?;
        match reply.strip_prefix(MARKER) {
            Some(value) => Ok(value.to_string()),
            None => Err(Error::stuck(format!("malformed probe reply {}", visible(&reply)))),
        }
    }

    /// Redirection target probe: split and globbed as bash does, then
    /// required to be exactly one field.
    pub fn expand_target(&mut self, word: &str) -> Result<String> {
        let mut fields = self.expand_word(word)?;
        match (fields.pop(), fields.is_empty()) {
            (Some(target), true) => Ok(target),
            _ => Err(Error::stuck(format!("ambiguous redirect {word}"))),
        }
    }

    /// Expand a here-document body with an unquoted delimiter.
    pub fn expand_heredoc(&mut self, body: &str) -> Result<String> {
        if body.lines().any(|l| l == HEREDOC_DELIMITER) {
            return Err(Error::early("here-document body contains the probe delimiter"));
        }
        let padded = !body.is_empty() && !body.ends_with('\n');
        let text = if padded {
            format!("{body}\n")
        } else {
            body.to_string()
        };
        let reply = self.run_command(&format!(
            "cat <<{HEREDOC_DELIMITER}\n{text}{HEREDOC_DELIMITER}"
        ))?;
        if padded && let Some(trimmed) = reply.strip_suffix('\n') {
            return Ok(trimmed.to_string());
        }
        Ok(reply)
    }

    fn wait_prompt(&mut self) -> Result<String> {
        let pty = self
            .pty
            .as_mut()
            .ok_or_else(|| Error::early("oracle session is closed"))?;
        match pty.expect(self.sentinel.as_str()) {
            Ok(found) => decode(found.before().to_vec()),
            Err(expectrl::Error::ExpectTimeout) => {
                self.poisoned = true;
                Err(Error::stuck(format!("no prompt within {:?}", self.timeout)))
            }
            Err(expectrl::Error::Eof) => {
                self.poisoned = true;
                Err(io::Error::new(ErrorKind::UnexpectedEof, "interpreter closed its terminal").into())
            }
            Err(e) => Err(protocol_error(e)),
        }
    }
}

impl Oracle for BashOracle {
    fn expand(&mut self, word: &str, mode: Mode) -> Result<Vec<String>> {
        match mode {
            Mode::Split => self.expand_word(word),
            Mode::NoSplit => self.expand_no_split(word).map(|s| vec![s]),
            Mode::Target => self.expand_target(word).map(|s| vec![s]),
            Mode::Heredoc => self.expand_heredoc(word).map(|s| vec![s]),
        }
    }

    fn source(&mut self, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        let reply = self.run_command(&format!("source {}", quote(&path)?))?;
        if !reply.is_empty() {
            debug!("sourcing {path} printed: {}", visible(&reply));
        }
        Ok(())
    }

    fn set_positional(&mut self, args: &[String]) -> Result<()> {
        let quoted = args.iter().map(|a| quote(a)).collect::<Result<Vec<_>>>()?;
        self.run_command(&format!("set -- {}", quoted.join(" ")))
            .map(|_| ())
    }

    fn shell_options(&mut self) -> Result<String> {
        self.run_command(r#"printf '%s' "$-""#)
    }

    fn enter_scope(&mut self) -> Result<()> {
        self.run_command(SCOPE_LOOP)?;
        self.depth += 1;
        Ok(())
    }

    fn leave_scope(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::stuck("leave_scope without a matching enter_scope"));
        }
        let result = self.run_command("exit");
        self.depth -= 1;
        result.map(|_| ())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut pty) = self.pty.take() else {
            return Ok(());
        };
        info!("closing bash oracle");
        if !self.poisoned {
            // Dropping the terminal hangs up on the interpreter either way;
            // a clean `exit` just spares it the signals.
            if let Err(e) = pty.write_all(b"exit\n").and_then(|()| pty.flush()) {
                debug!("exit: {e}");
            }
        }
        drop(pty);
        Ok(())
    }
}

impl Drop for BashOracle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close bash oracle: {e}");
        }
    }
}

fn protocol_error(e: expectrl::Error) -> Error {
    match e {
        expectrl::Error::IO(e) => Error::Io(e),
        other => Error::stuck(other.to_string()),
    }
}

fn decode(bytes: Vec<u8>) -> Result<String> {
    let text = String::from_utf8(bytes).map_err(|_| Error::stuck("non-UTF-8 interpreter output"))?;
    Ok(text.replace("\r\n", "\n"))
}

/// Split a `printf '%s\0' _ WORD` reply into its fields.
fn parse_fields(reply: &str) -> Result<Vec<String>> {
    let Some(body) = reply.strip_suffix('\0') else {
        return Err(Error::stuck(format!("unterminated probe reply {}", visible(reply))));
    };
    let mut fields = body.split('\0');
    if fields.next() != Some(MARKER) {
        return Err(Error::stuck(format!("probe reply missing marker: {}", visible(reply))));
    }
    Ok(fields.map(String::from).collect())
}

/// Reject text that bash would read as more than one token after `name=`.
/// Whitespace and operators are allowed only inside quotes, `${...}` and
/// `$((...))`.
fn check_single_token(text: &str) -> Result<()> {
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('\''), _) => {}
            (_, '\\') => {
                chars.next();
            }
            (Some(_), '"') => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (_, '$') if matches!(chars.peek(), Some('{' | '(')) => {
                chars.next();
                depth += 1;
            }
            (_, '{' | '(') if depth > 0 => depth += 1,
            (_, '}' | ')') if depth > 0 => depth -= 1,
            (None, c) if depth == 0 && (c.is_whitespace() || ";&|<>()".contains(c)) => {
                return Err(Error::early(format!("{text:?} is not a single shell word")));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Escape a command for the scope loop's `printf %b` decoding.
fn escape_for_scope(command: &str) -> String {
    let mut out = String::with_capacity(command.len());
    for c in command.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// The sentinel is printed through prompt expansion, so it must be free of
/// anything prompt expansion would rewrite.
fn validate_sentinel(sentinel: &str) -> Result<()> {
    if sentinel.is_empty() || sentinel.contains(['\n', '\\', '`', '\0']) {
        return Err(Error::early(format!("unusable sentinel {sentinel:?}")));
    }
    let chars: Vec<char> = sentinel.chars().collect();
    for pair in chars.windows(2) {
        let expands = pair[0] == '$'
            && (pair[1].is_ascii_alphanumeric()
                || matches!(pair[1], '_' | '{' | '(' | '\'' | '"' | '@' | '*' | '#' | '?' | '-' | '$' | '!'));
        if expands {
            return Err(Error::early(format!("sentinel {sentinel:?} would be expanded")));
        }
    }
    Ok(())
}

fn visible(text: &str) -> String {
    text.replace('\0', "<NUL>")
}
