//! Scenarios against a real interpreter. Each test returns early when bash
//! is not installed.

use std::io::Write;
use std::process::Command;

use sh_expand::ast::{
    Assignment, CaseItem, CommandNode, CondNode, CondOperand, Fd, FileRedirKind, Redirection,
    Word,
};
use sh_expand::config::{Config, OracleConfig};
use sh_expand::oracle::Mode;
use sh_expand::oracle::bash::BashOracle;
use sh_expand::oracle::Oracle;
use sh_expand::{Environment, Error, Node, Session, expand_command};

fn live_config() -> OracleConfig {
    Config::default_config().oracle
}

fn bash_available() -> bool {
    let found = Command::new("bash").arg("--version").output().is_ok();
    if !found {
        eprintln!("bash not available, skipping");
    }
    found
}

fn open(env: &Environment) -> Option<Session> {
    if !bash_available() {
        return None;
    }
    match Session::open(&live_config(), env) {
        Ok(session) => Some(session),
        Err(e) => panic!("failed to open live session: {e}"),
    }
}

fn spawn() -> Option<BashOracle> {
    if !bash_available() {
        return None;
    }
    match BashOracle::spawn(&live_config()) {
        Ok(oracle) => Some(oracle),
        Err(e) => panic!("failed to spawn bash: {e}"),
    }
}

fn redirect_to(target: Word) -> Node {
    Node::Command(CommandNode {
        arguments: vec![Word::raw("date")],
        redirections: vec![Redirection::File {
            op: FileRedirKind::To,
            fd: Fd::Fixed(1),
            target,
        }],
        ..CommandNode::default()
    })
}

#[test]
fn home_bin_expands_to_one_word() {
    let Some(mut session) = open(&Environment::default().with_var("HOME", "/home/u")) else {
        return;
    };
    let fields = session
        .expand(&Word::raw("\"$HOME/bin\""), Mode::Split)
        .unwrap();
    assert_eq!(fields, vec!["/home/u/bin".to_string()]);
    session.close().unwrap();
}

#[test]
fn splitting_preserves_embedded_whitespace_and_zero_fields() {
    let Some(mut session) = open(&Environment::default().with_var("x", "a  b")) else {
        return;
    };
    assert_eq!(
        session.expand(&Word::raw("$x"), Mode::Split).unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
    assert_eq!(
        session.expand(&Word::raw("\"$x\""), Mode::Split).unwrap(),
        vec!["a  b".to_string()]
    );
    assert!(session.expand(&Word::raw("$unset"), Mode::Split).unwrap().is_empty());
    assert_eq!(
        session.expand(&Word::raw("$x"), Mode::NoSplit).unwrap(),
        vec!["a  b".to_string()]
    );
}

#[test]
fn single_word_expansion_neither_splits_nor_globs() {
    let Some(mut oracle) = spawn() else {
        return;
    };
    oracle.run_command("x='a  b'; g='*'").unwrap();
    assert_eq!(oracle.expand_no_split("$x").unwrap(), "a  b");
    assert_eq!(oracle.expand_no_split("$g").unwrap(), "*");
    assert_eq!(oracle.expand_no_split("-n").unwrap(), "-n");
    assert_eq!(oracle.expand_no_split("$unset").unwrap(), "");
    assert!(matches!(
        oracle.expand_no_split("a b"),
        Err(Error::EarlyError(_))
    ));
}

#[test]
fn case_word_and_patterns_keep_whitespace() {
    let Some(mut session) = open(&Environment::default().with_var("x", "a  b")) else {
        return;
    };
    let mut node = Node::Case {
        argument: Word::raw("$x"),
        cases: vec![CaseItem {
            patterns: vec![Word::raw("$x"), Word::raw("other")],
            body: None,
        }],
    };
    expand_command(&mut node, &mut session).unwrap();
    let Node::Case { argument, cases } = &node else {
        unreachable!()
    };
    assert_eq!(*argument, Word::quoted("a  b"));
    assert_eq!(cases[0].patterns, vec![Word::quoted("a  b"), Word::raw("other")]);
}

#[test]
fn cond_operands_keep_whitespace() {
    let Some(mut session) = open(&Environment::default().with_var("x", "a  b")) else {
        return;
    };
    let mut node = Node::Cond(CondNode {
        op: Some(Word::raw("==")),
        left: Some(CondOperand::Word(Word::raw("$x"))),
        right: Some(CondOperand::Word(Word::raw("\"$x\""))),
        invert: false,
    });
    expand_command(&mut node, &mut session).unwrap();
    let Node::Cond(cond) = &node else {
        unreachable!()
    };
    assert_eq!(cond.left, Some(CondOperand::Word(Word::quoted("a  b"))));
    assert_eq!(cond.right, Some(CondOperand::Word(Word::quoted("a  b"))));
}

#[test]
fn arith_operand_keeps_whitespace() {
    let Some(mut session) = open(&Environment::default().with_var("n", "1  +  2")) else {
        return;
    };
    let mut node = Node::Arith {
        body: vec![Word::raw("$n")],
    };
    expand_command(&mut node, &mut session).unwrap();
    assert_eq!(
        node,
        Node::Arith {
            body: vec![Word::quoted("1  +  2")],
        }
    );
}

#[test]
fn redirect_target_must_be_one_field() {
    let Some(mut session) = open(&Environment::default().with_var("x", "a  b")) else {
        return;
    };
    let mut ambiguous = redirect_to(Word::raw("$x"));
    let err = expand_command(&mut ambiguous, &mut session).unwrap_err();
    assert!(matches!(err, Error::StuckExpansion(_)), "{err}");

    let mut quoted = redirect_to(Word::raw("\"$x\""));
    expand_command(&mut quoted, &mut session).unwrap();
    assert_eq!(quoted, redirect_to(Word::quoted("a  b")));
}

#[test]
fn multiline_value_reaches_bash() {
    let Some(mut session) = open(&Environment::default().with_var("msg", "line1\nline2")) else {
        return;
    };
    assert_eq!(
        session.expand(&Word::raw("\"$msg\""), Mode::Split).unwrap(),
        vec!["line1\nline2".to_string()]
    );
}

#[test]
fn command_assignment_is_impure_under_live_backend() {
    let Some(mut session) = open(&Environment::default()) else {
        return;
    };
    let mut node = Node::Command(CommandNode {
        assignments: vec![Assignment {
            name: "x".into(),
            value: Word::raw("1"),
        }],
        ..CommandNode::default()
    });
    let err = expand_command(&mut node, &mut session).unwrap_err();
    assert!(matches!(err, Error::ImpureExpansion(_)), "{err}");
}

#[test]
fn scope_discards_interpreter_state() {
    let Some(mut oracle) = spawn() else {
        return;
    };
    oracle.run_command("x=outer").unwrap();
    oracle.enter_scope().unwrap();
    oracle.run_command("x=inner; cd /").unwrap();
    assert_eq!(oracle.expand_no_split("$x").unwrap(), "inner");
    oracle.enter_scope().unwrap();
    assert_eq!(oracle.expand_word("\"$x\"").unwrap(), vec!["inner".to_string()]);
    oracle.leave_scope().unwrap();
    oracle.leave_scope().unwrap();
    assert_eq!(oracle.depth(), 0);
    assert_eq!(oracle.expand_no_split("$x").unwrap(), "outer");
    oracle.close().unwrap();
}

#[test]
fn heredoc_expansion_keeps_quotes_literal() {
    let Some(mut oracle) = spawn() else {
        return;
    };
    oracle.run_command("who=world").unwrap();
    assert_eq!(
        oracle.expand_heredoc("say 'hi' \"$who\"\n").unwrap(),
        "say 'hi' \"world\"\n"
    );
    assert_eq!(oracle.expand_heredoc("no newline $who").unwrap(), "no newline world");
}

#[test]
fn sentinel_is_readonly() {
    let Some(mut oracle) = spawn() else {
        return;
    };
    // The assignment fails; the protocol keeps working.
    oracle.run_command("PS1='hijacked> '").unwrap();
    assert_eq!(oracle.expand_no_split("ok").unwrap(), "ok");
}

#[test]
fn dump_file_is_sourced_at_open() {
    let mut dump = tempfile::NamedTempFile::new().unwrap();
    writeln!(dump, "declare -x FROM_DUMP=\"dumped value\"").unwrap();
    let env = Environment {
        dump_file: Some(dump.path().to_path_buf()),
        positional: vec!["first arg".into()],
        ..Environment::default()
    };
    let Some(mut session) = open(&env) else {
        return;
    };
    assert_eq!(
        session.expand(&Word::raw("\"$FROM_DUMP\""), Mode::Split).unwrap(),
        vec!["dumped value".to_string()]
    );
    assert_eq!(
        session.expand(&Word::raw("\"$1\""), Mode::Split).unwrap(),
        vec!["first arg".to_string()]
    );
}

#[test]
fn errexit_in_dump_is_rejected() {
    let mut dump = tempfile::NamedTempFile::new().unwrap();
    writeln!(dump, "set -u").unwrap();
    let env = Environment {
        dump_file: Some(dump.path().to_path_buf()),
        ..Environment::default()
    };
    if !bash_available() {
        return;
    }
    match Session::open(&live_config(), &env) {
        Err(Error::EarlyError(_)) => {}
        Err(e) => panic!("unexpected failure: {e}"),
        Ok(_) => panic!("nounset must be rejected"),
    }
}

#[test]
fn timeout_poisons_the_oracle() {
    if !bash_available() {
        return;
    }
    let mut config = live_config();
    config.timeout_ms = 200;
    let mut oracle = BashOracle::spawn(&config).unwrap();
    let err = oracle.run_command("sleep 2").unwrap_err();
    assert!(matches!(err, Error::StuckExpansion(_)), "{err}");
    let err = oracle.expand_no_split("ok").unwrap_err();
    assert!(matches!(err, Error::StuckExpansion(_)), "{err}");
    oracle.close().unwrap();
}
