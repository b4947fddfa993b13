//! In-process expansion oracle.
//!
//! Resolves parameter references, quoting and leading tildes against a
//! variable table, without spawning anything. Covers the POSIX subset the
//! simpler dialect needs; anything outside it is reported as `Unimplemented`
//! rather than guessed.

use std::path::Path;

use log::debug;

use super::env::{VarTable, Variable};
use super::mirror::is_name;
use super::{Mode, Oracle};
use crate::error::{Error, Result};

const DEFAULT_IFS: &str = " \t\n";

#[derive(Debug, Clone, Default)]
struct State {
    vars: VarTable,
    positional: Vec<String>,
}

/// Pure oracle over a variable table.
#[derive(Debug, Default)]
pub struct BuiltinOracle {
    state: State,
    saved: Vec<State>,
    options: String,
}

impl BuiltinOracle {
    pub fn new(options: &str) -> Self {
        Self {
            options: options.to_string(),
            ..Self::default()
        }
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.state.vars.get(name).map(|v| v.value.as_str())
    }

    fn assign(&mut self, name: &str, value: &str) -> Result<()> {
        if !is_name(name) {
            return Err(Error::early(format!("invalid variable name {name:?}")));
        }
        let entry = self.state.vars.entry(name.to_string()).or_default();
        if entry.readonly {
            return Err(Error::impure(format!("assignment to readonly variable {name}")));
        }
        entry.value = value.to_string();
        Ok(())
    }

    fn apply_statement(&mut self, line: &str) -> Result<()> {
        let tokens = shlex::split(line)
            .ok_or_else(|| Error::early(format!("unparsable statement {line:?}")))?;
        match tokens.split_first() {
            Some((head, names)) if head == "export" || head == "readonly" => {
                for item in names {
                    let name = match item.split_once('=') {
                        Some((name, value)) => {
                            self.assign(name, value)?;
                            name
                        }
                        None => item.as_str(),
                    };
                    if !is_name(name) {
                        return Err(Error::early(format!("invalid variable name {name:?}")));
                    }
                    let entry: &mut Variable = self.state.vars.entry(name.to_string()).or_default();
                    if head == "export" {
                        entry.exported = true;
                    } else {
                        entry.readonly = true;
                    }
                }
                Ok(())
            }
            Some((single, [])) => match single.split_once('=') {
                Some((name, value)) => self.assign(name, value),
                None => Err(Error::early(format!("unsupported statement {line:?}"))),
            },
            _ => Err(Error::early(format!("unsupported statement {line:?}"))),
        }
    }

    fn ifs(&self) -> Result<Vec<char>> {
        let ifs = self.var("IFS").unwrap_or(DEFAULT_IFS);
        if ifs.chars().all(|c| DEFAULT_IFS.contains(c)) {
            Ok(ifs.chars().collect())
        } else {
            Err(Error::unimplemented("non-whitespace IFS"))
        }
    }

    /// Unquoted text outside any double quotes.
    fn plain(&self, chars: &[char], mode: Mode, fields: &mut Fields) -> Result<()> {
        let heredoc = mode == Mode::Heredoc;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            match c {
                '\'' if !heredoc => {
                    let end = find(chars, i + 1, '\'')
                        .ok_or_else(|| Error::early("unterminated single quote"))?;
                    fields.literal(&chars[i + 1..end].iter().collect::<String>());
                    i = end + 1;
                }
                '"' if !heredoc => {
                    i = self.double(chars, i + 1, true, fields)?;
                }
                '\\' => {
                    match chars.get(i + 1) {
                        Some('\n') => {}
                        Some(&next) if !heredoc || matches!(next, '$' | '`' | '\\') => {
                            fields.literal_char(next);
                        }
                        Some(&next) => {
                            fields.literal_char('\\');
                            fields.literal_char(next);
                        }
                        None => fields.literal_char('\\'),
                    }
                    i += 2;
                }
                '$' => {
                    i = self.dollar(chars, i, heredoc, fields)?;
                }
                '`' => return Err(Error::impure("backtick command substitution")),
                '[' if !heredoc => return Err(Error::unimplemented("bracket glob")),
                _ => {
                    fields.literal_char(c);
                    i += 1;
                }
            }
        }
        Ok(())
    }

    /// Double-quoted text starting at `start`. With `closing`, stops after the
    /// matching `"` and returns the index past it.
    fn double(&self, chars: &[char], start: usize, closing: bool, fields: &mut Fields) -> Result<usize> {
        let mut i = start;
        let mut saw_at = false;
        loop {
            let Some(&c) = chars.get(i) else {
                if closing {
                    return Err(Error::early("unterminated double quote"));
                }
                break;
            };
            match c {
                '"' if closing => {
                    i += 1;
                    break;
                }
                '\\' => {
                    match chars.get(i + 1) {
                        Some('\n') => {}
                        Some(&next) if matches!(next, '$' | '`' | '"' | '\\') => {
                            fields.literal_char(next)
                        }
                        Some(&next) => {
                            fields.literal_char('\\');
                            fields.literal_char(next);
                        }
                        None => fields.literal_char('\\'),
                    }
                    i += 2;
                }
                '$' => {
                    saw_at |= matches!(chars.get(i + 1), Some('@'))
                        || chars.get(i + 1..i + 3) == Some(&['{', '@'][..]);
                    i = self.dollar(chars, i, true, fields)?;
                }
                '`' => return Err(Error::impure("backtick command substitution")),
                _ => {
                    fields.literal_char(c);
                    i += 1;
                }
            }
        }
        // "" is an empty field; "$@" with no parameters is none.
        if !saw_at {
            fields.mark();
        }
        Ok(i)
    }

    /// Expansion starting at the `$` at index `at`; returns the index past it.
    fn dollar(&self, chars: &[char], at: usize, quoted: bool, fields: &mut Fields) -> Result<usize> {
        let Some(&next) = chars.get(at + 1) else {
            fields.literal_char('$');
            return Ok(at + 1);
        };
        match next {
            '{' => {
                let end = matching_brace(chars, at + 2)
                    .ok_or_else(|| Error::early("unterminated ${"))?;
                self.braced(&chars[at + 2..end], quoted, fields)?;
                Ok(end + 1)
            }
            '(' => {
                if chars.get(at + 2) == Some(&'(') {
                    Err(Error::unimplemented("arithmetic expansion"))
                } else {
                    Err(Error::impure("command substitution $("))
                }
            }
            '\'' | '"' if !quoted => Err(Error::unimplemented(format!("${next}...{next} quoting"))),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let end = (at + 1..chars.len())
                    .find(|&j| !(chars[j].is_ascii_alphanumeric() || chars[j] == '_'))
                    .unwrap_or(chars.len());
                let name: String = chars[at + 1..end].iter().collect();
                self.emit(self.var(&name), quoted, fields)?;
                Ok(end)
            }
            c if c.is_ascii_digit() || matches!(c, '@' | '*' | '#' | '-' | '?' | '$' | '!') => {
                self.special(c.to_string().as_str(), quoted, fields)?;
                Ok(at + 2)
            }
            _ => {
                fields.literal_char('$');
                Ok(at + 1)
            }
        }
    }

    /// Body of `${...}`.
    fn braced(&self, inner: &[char], quoted: bool, fields: &mut Fields) -> Result<()> {
        let text: String = inner.iter().collect();

        if let Some(rest) = text.strip_prefix('#')
            && !rest.is_empty()
        {
            let len = match self.param_value(rest)? {
                Param::Scalar(v) => v.map_or(0, |v| v.chars().count()),
                Param::List(_) => return Err(Error::unimplemented("length of $@")),
            };
            return self.emit(Some(&len.to_string()), quoted, fields);
        }

        let name_len = param_name_len(&text);
        if name_len == 0 {
            return Err(Error::unimplemented(format!("parameter expansion ${{{text}}}")));
        }
        let (name, op) = text.split_at(name_len);
        if op.is_empty() {
            return self.special_or_named(name, quoted, fields);
        }

        let (colon, op) = match op.strip_prefix(':') {
            Some(rest) => (true, rest),
            None => (false, op),
        };
        let Some(kind) = op.chars().next() else {
            return Err(Error::unimplemented(format!("substring expansion ${{{text}}}")));
        };
        let word: Vec<char> = op.chars().skip(1).collect();
        let value = match self.param_value(name)? {
            Param::Scalar(v) => v,
            Param::List(_) => {
                return Err(Error::unimplemented(format!("operator on ${name}")));
            }
        };
        let set = value.is_some();
        let non_empty = value.is_some_and(|v| !v.is_empty());
        match kind {
            '-' => {
                let use_default = if colon { !non_empty } else { !set };
                if use_default {
                    self.nested_word(&word, quoted, fields)
                } else {
                    self.emit(value, quoted, fields)
                }
            }
            '+' => {
                let use_alt = if colon { non_empty } else { set };
                if use_alt {
                    self.nested_word(&word, quoted, fields)
                } else {
                    Ok(())
                }
            }
            '=' => Err(Error::impure("assignment inside expansion")),
            _ => Err(Error::unimplemented(format!("parameter expansion ${{{text}}}"))),
        }
    }

    fn nested_word(&self, word: &[char], quoted: bool, fields: &mut Fields) -> Result<()> {
        if quoted {
            self.double(word, 0, false, fields).map(|_| ())
        } else {
            self.plain(word, Mode::Split, fields)
        }
    }

    fn special_or_named(&self, name: &str, quoted: bool, fields: &mut Fields) -> Result<()> {
        if is_name(name) {
            self.emit(self.var(name), quoted, fields)
        } else {
            self.special(name, quoted, fields)
        }
    }

    fn param_value(&self, name: &str) -> Result<Param<'_>> {
        if is_name(name) {
            return Ok(Param::Scalar(self.var(name)));
        }
        match name {
            "@" | "*" => Ok(Param::List(&self.state.positional)),
            "?" | "$" | "!" => Err(Error::impure(format!("${name} depends on process state"))),
            "0" => Err(Error::unimplemented("$0")),
            n if n.chars().all(|c| c.is_ascii_digit()) => {
                let index: usize = n
                    .parse()
                    .map_err(|_| Error::unimplemented(format!("positional ${n}")))?;
                Ok(Param::Scalar(
                    index
                        .checked_sub(1)
                        .and_then(|i| self.state.positional.get(i))
                        .map(String::as_str),
                ))
            }
            "-" => Ok(Param::Scalar(Some(self.options.as_str()))),
            _ => Err(Error::unimplemented(format!("parameter ${name}"))),
        }
    }

    fn special(&self, name: &str, quoted: bool, fields: &mut Fields) -> Result<()> {
        match name {
            "#" => {
                let count = self.state.positional.len().to_string();
                self.emit(Some(&count), quoted, fields)
            }
            "@" | "*" => {
                let params = &self.state.positional;
                if quoted && name == "*" {
                    let sep = self.ifs()?.first().map(|c| c.to_string()).unwrap_or_default();
                    return self.emit(Some(&params.join(&sep)), true, fields);
                }
                for (k, param) in params.iter().enumerate() {
                    if k > 0 {
                        fields.separate(quoted);
                    }
                    self.emit(Some(param), quoted, fields)?;
                }
                Ok(())
            }
            _ => match self.param_value(name)? {
                Param::Scalar(v) => self.emit(v, quoted, fields),
                Param::List(_) => Err(Error::unimplemented(format!("parameter ${name}"))),
            },
        }
    }

    fn emit(&self, value: Option<&str>, quoted: bool, fields: &mut Fields) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        if quoted {
            fields.literal(value);
            return Ok(());
        }
        if value.contains(['*', '?', '[']) {
            return Err(Error::unimplemented("glob characters in unquoted expansion"));
        }
        fields.unquoted(value, &self.ifs()?);
        Ok(())
    }

    /// Leading `~` or `~/...`: returns the index where ordinary scanning resumes.
    fn tilde(&self, chars: &[char], fields: &mut Fields) -> Result<usize> {
        let end = find(chars, 0, '/').unwrap_or(chars.len());
        let prefix: String = chars[..end].iter().collect();
        if prefix.contains(['\'', '"', '\\', '$']) {
            return Ok(0);
        }
        match prefix.as_str() {
            "~" => {
                let home = self
                    .var("HOME")
                    .ok_or_else(|| Error::unimplemented("tilde expansion with HOME unset"))?;
                let expanded = shellexpand::tilde_with_context(&prefix, || Some(home));
                fields.literal(&expanded);
                Ok(end)
            }
            "~+" | "~-" => Err(Error::impure("directory stack tilde")),
            _ => Err(Error::unimplemented(format!("user tilde {prefix}"))),
        }
    }
}

enum Param<'a> {
    Scalar(Option<&'a str>),
    List(&'a [String]),
}

impl Oracle for BuiltinOracle {
    fn expand(&mut self, word: &str, mode: Mode) -> Result<Vec<String>> {
        debug!("builtin expand ({}): {word}", mode.as_str());
        let chars: Vec<char> = word.chars().collect();
        let mut fields = Fields::new(mode == Mode::Split);
        let start = if mode != Mode::Heredoc && chars.first() == Some(&'~') {
            self.tilde(&chars, &mut fields)?
        } else {
            0
        };
        self.plain(&chars[start..], mode, &mut fields)?;
        let result = fields.finish();
        debug!("builtin result: {result:?}");
        Ok(result)
    }

    fn source(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        for statement in statements(&content) {
            let statement = statement.trim();
            if statement.is_empty() || statement.starts_with('#') {
                continue;
            }
            self.apply_statement(statement)?;
        }
        Ok(())
    }

    fn set_positional(&mut self, args: &[String]) -> Result<()> {
        self.state.positional = args.to_vec();
        Ok(())
    }

    fn shell_options(&mut self) -> Result<String> {
        Ok(self.options.clone())
    }

    fn enter_scope(&mut self) -> Result<()> {
        self.saved.push(self.state.clone());
        Ok(())
    }

    fn leave_scope(&mut self) -> Result<()> {
        self.state = self
            .saved
            .pop()
            .ok_or_else(|| Error::stuck("leave_scope without a matching enter_scope"))?;
        Ok(())
    }

    fn accepts_assignments(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Split sourced text into statements at newlines outside quotes, so a
/// quoted value may span several physical lines.
fn statements(content: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in content.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('\''), _) => {}
            (_, '\\') => escaped = true,
            (Some(q), _) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (None, '\n') => {
                out.push(&content[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&content[start..]);
    out
}

/// Field accumulator implementing IFS splitting.
#[derive(Debug)]
struct Fields {
    split: bool,
    done: Vec<String>,
    current: String,
    has_content: bool,
}

impl Fields {
    fn new(split: bool) -> Self {
        Self {
            split,
            done: Vec::new(),
            current: String::new(),
            has_content: false,
        }
    }

    fn mark(&mut self) {
        self.has_content = true;
    }

    fn literal(&mut self, text: &str) {
        self.current.push_str(text);
        self.has_content = true;
    }

    fn literal_char(&mut self, c: char) {
        self.current.push(c);
        self.has_content = true;
    }

    fn unquoted(&mut self, value: &str, ifs: &[char]) {
        if !self.split {
            self.literal(value);
            return;
        }
        for c in value.chars() {
            if ifs.contains(&c) {
                self.break_field();
            } else {
                self.literal_char(c);
            }
        }
    }

    fn break_field(&mut self) {
        if self.has_content {
            self.done.push(std::mem::take(&mut self.current));
            self.has_content = false;
        }
    }

    /// Boundary between positional parameters in `$@`.
    fn separate(&mut self, quoted: bool) {
        if !self.split {
            self.current.push(' ');
        } else if quoted {
            self.done.push(std::mem::take(&mut self.current));
            self.has_content = false;
        } else {
            self.break_field();
        }
    }

    fn finish(mut self) -> Vec<String> {
        if !self.split {
            return vec![self.current];
        }
        self.break_field();
        self.done
    }
}

fn find(chars: &[char], from: usize, target: char) -> Option<usize> {
    (from..chars.len()).find(|&j| chars[j] == target)
}

/// Index of the `}` closing a `${` whose body starts at `from`.
fn matching_brace(chars: &[char], from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Length of the parameter name at the start of a `${...}` body.
fn param_name_len(text: &str) -> usize {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            1 + chars
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .count()
        }
        Some(c) if c.is_ascii_digit() => 1 + chars.take_while(|c| c.is_ascii_digit()).count(),
        Some('@' | '*' | '#' | '-' | '?' | '$' | '!') => 1,
        _ => 0,
    }
}
