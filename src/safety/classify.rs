//! Whole-tree pre-filter: may this command be expanded with no side effect?

use crate::ast::{CondNode, CondOperand, Fd, HeredocKind, Node, Redirection, Word};
use crate::error::Result;

use super::scan::scan_word;

/// True iff every word in `node` is side-effect free and the tree contains no
/// construct the compiler would reject outright.
///
/// Never fails: any scanner failure is reported as `false`.
pub fn safe_command(node: &Node) -> bool {
    check_node(node).unwrap_or(false)
}

fn check_node(node: &Node) -> Result<bool> {
    Ok(match node {
        Node::Command(cmd) => {
            all_words(cmd.assignments.iter().map(|a| &a.value))?
                && all_words(&cmd.arguments)?
                && all_redirs(&cmd.redirections)?
        }
        Node::Pipe { items, .. } => {
            for item in items {
                if !check_node(item)? {
                    return Ok(false);
                }
            }
            true
        }
        Node::Subshell { body, redirections }
        | Node::Redir {
            node: body,
            redirections,
        }
        | Node::Background {
            node: body,
            redirections,
        }
        | Node::Group { body, redirections } => check_node(body)? && all_redirs(redirections)?,
        Node::And { left, right } | Node::Or { left, right } | Node::Semi { left, right } => {
            check_node(left)? && check_node(right)?
        }
        Node::Not { body } => check_node(body)?,
        Node::Time { command, .. } => check_node(command)?,
        Node::While { test, body } => check_node(test)? && check_node(body)?,
        Node::If {
            cond,
            then_branch,
            else_branch,
        } => {
            check_node(cond)?
                && check_node(then_branch)?
                && match else_branch {
                    Some(e) => check_node(e)?,
                    None => true,
                }
        }
        Node::Case { argument, cases } => {
            if !word_ok(argument)? {
                return Ok(false);
            }
            for case in cases {
                if !all_words(&case.patterns)? {
                    return Ok(false);
                }
                if let Some(body) = &case.body
                    && !check_node(body)?
                {
                    return Ok(false);
                }
            }
            true
        }
        Node::Arith { body } => all_words(body)?,
        Node::Cond(cond) => cond_ok(cond)?,
        Node::Defun { .. }
        | Node::For { .. }
        | Node::Select { .. }
        | Node::ArithFor { .. }
        | Node::Coproc { .. } => false,
    })
}

fn word_ok(word: &Word) -> Result<bool> {
    scan_word(word).map(|_| true)
}

fn all_words<'a>(words: impl IntoIterator<Item = &'a Word>) -> Result<bool> {
    for word in words {
        word_ok(word)?;
    }
    Ok(true)
}

fn all_redirs(redirs: &[Redirection]) -> Result<bool> {
    for redir in redirs {
        if matches!(redir.fd(), Fd::Runtime(_)) {
            return Ok(false);
        }
        match redir {
            Redirection::File { target, .. } => word_ok(target)?,
            Redirection::Heredoc {
                op: HeredocKind::Expanding,
                body,
                ..
            } => word_ok(body)?,
            Redirection::Heredoc { .. } => true,
            Redirection::Dup { .. } | Redirection::SingleArg { .. } => return Ok(false),
        };
    }
    Ok(true)
}

fn cond_ok(cond: &CondNode) -> Result<bool> {
    if let Some(op) = &cond.op {
        word_ok(op)?;
    }
    for operand in [&cond.left, &cond.right].into_iter().flatten() {
        let ok = match operand {
            CondOperand::Word(w) => word_ok(w)?,
            CondOperand::Nested(inner) => cond_ok(inner)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}
