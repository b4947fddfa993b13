//! Per-word side-effect scanner.
//!
//! A single left-to-right pass over the raw characters of one word. The only
//! state carried between characters is the two-character window (what the
//! previous character was), a latch recording whether a `$` has been seen,
//! and whether the scan is inside a `${...}` parameter expansion.

use crate::ast::Word;
use crate::error::{Error, Result};

/// Outcome of scanning a word that raised no failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing in the word is subject to expansion; leave it as is.
    Untouched,
    /// The word is side-effect free but must be resolved through the oracle.
    Expand,
}

impl Verdict {
    pub fn needs_expansion(self) -> bool {
        self == Verdict::Expand
    }
}

/// What the previous character was, as far as the two-character rules care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Other,
    Dollar,
    Angle,
    Tilde,
    Open,
}

#[derive(Debug)]
struct Scanner {
    window: Window,
    seen_dollar: bool,
    in_braces: bool,
    needs_expansion: bool,
}

impl Scanner {
    fn new() -> Self {
        Self {
            window: Window::Other,
            seen_dollar: false,
            in_braces: false,
            needs_expansion: false,
        }
    }

    fn step(&mut self, c: char) -> Result<()> {
        match c {
            '\x7f' => return Err(Error::stuck("DEL character in word")),
            '*' | '?' | '!' => {
                return Err(Error::unimplemented(format!("possible glob character '{c}'")));
            }
            '`' => return Err(Error::impure("backtick command substitution")),
            '(' => {
                return Err(Error::impure(match self.window {
                    Window::Dollar => "command substitution $(",
                    Window::Angle => "process substitution",
                    Window::Other | Window::Tilde | Window::Open => "array syntax",
                }));
            }
            '=' if self.seen_dollar => {
                return Err(Error::impure("assignment inside expansion"));
            }
            // `${x@P}` runs prompt expansion on the value; `$@`, `${@}` and
            // `${a[@]}` are plain parameters.
            '@' if self.in_braces && self.window != Window::Open => {
                return Err(Error::impure("parameter transformation ${...@...}"));
            }
            '+' | '-' if self.window == Window::Tilde => {
                return Err(Error::impure(format!("directory stack tilde ~{c}")));
            }
            _ => {}
        }

        if matches!(c, '{' | '$' | '~' | '[' | '"' | '\'') {
            self.needs_expansion = true;
        }
        if c == '$' {
            self.seen_dollar = true;
        }
        match c {
            '{' if self.window == Window::Dollar => self.in_braces = true,
            '}' => self.in_braces = false,
            _ => {}
        }
        self.window = match c {
            '$' => Window::Dollar,
            '<' | '>' => Window::Angle,
            '~' => Window::Tilde,
            '{' | '[' => Window::Open,
            _ => Window::Other,
        };
        Ok(())
    }

    fn finish(self) -> Verdict {
        if self.needs_expansion {
            Verdict::Expand
        } else {
            Verdict::Untouched
        }
    }
}

/// Classify one argument word.
pub fn scan_word(word: &Word) -> Result<Verdict> {
    let text: String = word.raw_chars().collect();
    scan_text(&text)
}

/// Classify raw word text.
pub fn scan_text(text: &str) -> Result<Verdict> {
    // Arithmetic expansion never globs; only an embedded assignment is a risk.
    if text.starts_with("$((") && !text.contains('=') {
        return Ok(Verdict::Expand);
    }

    let mut scanner = Scanner::new();
    for c in text.chars() {
        scanner.step(c)?;
    }
    Ok(scanner.finish())
}
