//! Resolution of argument lists, single words and redirections.

use log::debug;

use crate::ast::{Fd, Fragment, HeredocKind, Redirection, Word};
use crate::error::{Error, Result};
use crate::oracle::{Mode, Session};
use crate::safety::{Verdict, scan_word};

/// Expand a command's argument list in splitting mode. Each result becomes
/// its own quoted-literal word, spliced flat in place of the source word.
pub(crate) fn expand_arguments(words: &mut Vec<Word>, session: &mut Session) -> Result<()> {
    let mut resolved = Vec::with_capacity(words.len());
    for word in words.drain(..) {
        match scan_word(&word)? {
            Verdict::Untouched => resolved.push(word),
            Verdict::Expand => {
                let fields = session.expand(&word, Mode::Split)?;
                debug!("argument expanded to {} word(s)", fields.len());
                resolved.extend(fields.into_iter().map(Word::quoted));
            }
        }
    }
    *words = resolved;
    Ok(())
}

/// Expand one word in a single-result mode, replacing it in place.
pub(crate) fn expand_single(word: &mut Word, mode: Mode, session: &mut Session) -> Result<()> {
    if scan_word(word)? == Verdict::Untouched {
        return Ok(());
    }
    let value = only(session.expand(word, mode)?)?;
    *word = Word::quoted(value);
    Ok(())
}

pub(crate) fn expand_each(words: &mut [Word], mode: Mode, session: &mut Session) -> Result<()> {
    for word in words {
        expand_single(word, mode, session)?;
    }
    Ok(())
}

/// Resolve an assignment value to the literal string the shell would store,
/// rewriting the word to that literal.
pub(crate) fn resolve_value(word: &mut Word, session: &mut Session) -> Result<String> {
    let verdict = scan_word(word)?;
    // A backslash in an untouched word still changes its value.
    let plain = verdict == Verdict::Untouched && !word.raw_chars().any(|c| c == '\\');
    if plain {
        return Ok(literal_value(word));
    }
    let value = only(session.expand(word, Mode::NoSplit)?)?;
    *word = Word::quoted(value.clone());
    Ok(value)
}

pub(crate) fn expand_redirections(
    redirections: &mut [Redirection],
    session: &mut Session,
) -> Result<()> {
    for redirection in redirections {
        if let Fd::Runtime(name) = redirection.fd() {
            let name: String = name.raw_chars().collect();
            return Err(Error::impure(format!(
                "redirection through run-time descriptor {{{name}}}"
            )));
        }
        match redirection {
            Redirection::File { target, .. } => expand_single(target, Mode::Target, session)?,
            Redirection::Heredoc {
                op: HeredocKind::Expanding,
                body,
                ..
            } => expand_single(body, Mode::Heredoc, session)?,
            Redirection::Heredoc {
                op: HeredocKind::Literal,
                ..
            } => {}
            Redirection::Dup { .. } => {
                return Err(Error::impure("descriptor duplication depends on open descriptors"));
            }
            Redirection::SingleArg { .. } => {
                return Err(Error::impure("descriptor close depends on open descriptors"));
            }
        }
    }
    Ok(())
}

fn only(mut fields: Vec<String>) -> Result<String> {
    match (fields.pop(), fields.is_empty()) {
        (Some(value), true) => Ok(value),
        _ => Err(Error::stuck("single-word expansion did not yield one word")),
    }
}

/// Value of a word with nothing left to expand: raw characters and quoted
/// literals, concatenated.
fn literal_value(word: &Word) -> String {
    let mut value = String::new();
    for fragment in &word.fragments {
        match fragment {
            Fragment::Raw(c) => value.push(*c),
            Fragment::Quoted(s) => value.push_str(s),
        }
    }
    value
}
