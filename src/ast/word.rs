//! Argument words: ordered sequences of raw and quoted-literal fragments.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One piece of an argument word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fragment {
    /// An unexpanded source character.
    Raw(char),
    /// A literal produced by the oracle; the printer must emit it verbatim,
    /// re-quoting as needed.
    Quoted(String),
}

/// An argument word, the scanner's unit of analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Word {
    pub fragments: Vec<Fragment>,
}

impl Word {
    /// Build a word of raw source characters.
    pub fn raw(text: &str) -> Self {
        Self {
            fragments: text.chars().map(Fragment::Raw).collect(),
        }
    }

    /// Build a resolved word holding a single quoted literal.
    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![Fragment::Quoted(text.into())],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Raw characters only, in order. Quoted fragments are already literal
    /// and take no part in safety analysis.
    pub fn raw_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Raw(c) => Some(*c),
            Fragment::Quoted(_) => None,
        })
    }

    /// True when every fragment is a quoted literal.
    pub fn is_literal(&self) -> bool {
        self.fragments
            .iter()
            .all(|f| matches!(f, Fragment::Quoted(_)))
    }

    /// Shell source text for this word, suitable for sending to an oracle.
    ///
    /// Quoted literals are re-quoted with POSIX rules so they expand back to
    /// themselves.
    pub fn source_text(&self) -> Result<String> {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Raw(c) => out.push(*c),
                Fragment::Quoted(s) => out.push_str(&quote(s)?),
            }
        }
        Ok(out)
    }

    /// Source text for an unquoted-delimiter here-document body. Quotes are
    /// literal there, so quoted literals only need `\`, `$` and `` ` ``
    /// escaped.
    pub fn heredoc_text(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Raw(c) => out.push(*c),
                Fragment::Quoted(s) => {
                    for c in s.chars() {
                        if matches!(c, '\\' | '$' | '`') {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                }
            }
        }
        out
    }
}

/// Quote a literal for the shell, rejecting the one byte shells cannot carry.
pub(crate) fn quote(text: &str) -> Result<String> {
    shlex::try_quote(text)
        .map(|q| q.into_owned())
        .map_err(|e| Error::early(format!("cannot quote literal {text:?}: {e}")))
}
