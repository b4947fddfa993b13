//! Tree compiler: rewrites every resolvable word of a node in place.
//!
//! Dispatch is an exhaustive match over [`Node`]; a new node kind will not
//! compile until it is handled here. Regions that run in their own process
//! in a real shell (pipe stages, subshell bodies, background jobs) are
//! compiled inside a scoped sub-session so their state changes cannot leak.
//!
//! On failure the node is left partially rewritten and must be discarded.

mod args;

use log::trace;

use crate::ast::{CommandNode, CondNode, CondOperand, Node};
use crate::error::{Error, Result};
use crate::oracle::{Mode, Session};

use args::{expand_arguments, expand_each, expand_redirections, expand_single, resolve_value};

/// Whether the code being compiled runs on every path through its parent.
#[derive(Debug, Clone, Copy, Default)]
struct Flow {
    conditional: bool,
}

impl Flow {
    fn conditional() -> Self {
        Self { conditional: true }
    }
}

/// Compile `node` against `session`, replacing resolved words with
/// quoted literals.
pub fn compile(node: &mut Node, session: &mut Session) -> Result<()> {
    compile_node(node, session, Flow::default())
}

fn compile_node(node: &mut Node, session: &mut Session, flow: Flow) -> Result<()> {
    let kind = node.kind();
    trace!("compiling {} node", kind.as_str());
    match node {
        Node::Command(cmd) => compile_command(cmd, session, flow),

        Node::Pipe { items, .. } => {
            for item in items {
                session.scoped(|s| compile_node(item, s, flow))?;
            }
            Ok(())
        }
        Node::Subshell { body, redirections }
        | Node::Background {
            node: body,
            redirections,
        } => {
            session.scoped(|s| compile_node(body, s, flow))?;
            expand_redirections(redirections, session)
        }

        Node::And { left, right } | Node::Or { left, right } => {
            compile_node(left, session, flow)?;
            compile_node(right, session, Flow::conditional())
        }
        Node::Semi { left, right } => {
            compile_node(left, session, flow)?;
            compile_node(right, session, flow)
        }
        Node::Not { body } => compile_node(body, session, Flow::conditional()),
        Node::Redir {
            node: body,
            redirections,
        }
        | Node::Group { body, redirections } => {
            compile_node(body, session, flow)?;
            expand_redirections(redirections, session)
        }
        Node::Time { command, .. } => compile_node(command, session, flow),
        Node::While { test, body } => {
            compile_node(test, session, Flow::conditional())?;
            compile_node(body, session, Flow::conditional())
        }
        Node::If {
            cond,
            then_branch,
            else_branch,
        } => {
            compile_node(cond, session, flow)?;
            compile_node(then_branch, session, Flow::conditional())?;
            match else_branch {
                Some(branch) => compile_node(branch, session, Flow::conditional()),
                None => Ok(()),
            }
        }
        Node::Case { argument, cases } => {
            expand_single(argument, Mode::NoSplit, session)?;
            for case in cases {
                expand_each(&mut case.patterns, Mode::NoSplit, session)?;
                if let Some(body) = &mut case.body {
                    compile_node(body, session, Flow::conditional())?;
                }
            }
            Ok(())
        }
        Node::Arith { body } => expand_each(body, Mode::NoSplit, session),
        Node::Cond(cond) => compile_cond(cond, session),

        Node::Defun { .. }
        | Node::For { .. }
        | Node::Select { .. }
        | Node::ArithFor { .. }
        | Node::Coproc { .. } => Err(Error::unimplemented(format!(
            "{} introduces a binding the oracle cannot track",
            kind.as_str()
        ))),
    }
}

fn compile_command(cmd: &mut CommandNode, session: &mut Session, flow: Flow) -> Result<()> {
    if !cmd.assignments.is_empty() {
        record_assignments(cmd, session, flow)?;
    }
    expand_arguments(&mut cmd.arguments, session)?;
    expand_redirections(&mut cmd.redirections, session)
}

fn record_assignments(cmd: &mut CommandNode, session: &mut Session, flow: Flow) -> Result<()> {
    if !session.accepts_assignments() {
        return Err(Error::impure(
            "command assignments cannot be separated from argument evaluation",
        ));
    }
    if !cmd.arguments.is_empty() {
        return Err(Error::impure("prefix assignment applies to one command only"));
    }
    if flow.conditional {
        return Err(Error::impure("assignment under conditional control flow"));
    }
    for assignment in &mut cmd.assignments {
        let value = resolve_value(&mut assignment.value, session)?;
        session.record_assignment(&assignment.name, &value)?;
    }
    Ok(())
}

fn compile_cond(cond: &mut CondNode, session: &mut Session) -> Result<()> {
    if let Some(op) = &mut cond.op {
        expand_single(op, Mode::NoSplit, session)?;
    }
    for operand in [&mut cond.left, &mut cond.right].into_iter().flatten() {
        match operand {
            CondOperand::Word(word) => expand_single(word, Mode::NoSplit, session)?,
            CondOperand::Nested(inner) => compile_cond(inner, session)?,
        }
    }
    Ok(())
}
