use sh_expand::ast::{
    Assignment, CommandNode, DupRedirKind, Fd, FileRedirKind, Fragment, Redirection, Word,
};
use sh_expand::config::{Backend, Config};
use sh_expand::safety::{Verdict, scan_text, scan_word};
use sh_expand::{Environment, Error, Node, Outcome, Session, expand_command, expand_or_keep};

#[derive(Debug, PartialEq, Eq)]
enum Expect {
    Untouched,
    Expand,
    Impure,
    Unimplemented,
    Stuck,
}

fn verdict_for(word: &str) -> Expect {
    match scan_text(word) {
        Ok(Verdict::Untouched) => Expect::Untouched,
        Ok(Verdict::Expand) => Expect::Expand,
        Err(Error::ImpureExpansion(_)) => Expect::Impure,
        Err(Error::Unimplemented(_)) => Expect::Unimplemented,
        Err(Error::StuckExpansion(_)) => Expect::Stuck,
        Err(e) => panic!("unexpected scanner failure for {word:?}: {e}"),
    }
}

macro_rules! verdict_test {
    ($name:ident, $word:expr, $verdict:ident) => {
        #[test]
        fn $name() {
            assert_eq!(verdict_for($word), Expect::$verdict, "word: {}", $word,);
        }
    };
}

fn builtin_session(env: Environment) -> Session {
    let mut config = Config::default_config().oracle;
    config.backend = Backend::Builtin;
    Session::open(&config, &env).unwrap()
}

fn home_env() -> Environment {
    Environment::default()
        .with_var("HOME", "/home/u")
        .with_var("name", "two words")
}

fn arguments(node: &Node) -> Vec<Word> {
    match node {
        Node::Command(cmd) => cmd.arguments.clone(),
        other => panic!("not a command: {other:?}"),
    }
}

// ── UNTOUCHED: nothing to expand ──

verdict_test!(untouched_plain, "hello", Untouched);
verdict_test!(untouched_flag, "--color=auto", Untouched);
verdict_test!(untouched_path, "/usr/local/bin", Untouched);
verdict_test!(untouched_empty, "", Untouched);
verdict_test!(untouched_closing_brace, "a}", Untouched);
verdict_test!(untouched_redirect_chars, "a<b", Untouched);

// ── EXPAND: side-effect free, needs the oracle ──

verdict_test!(expand_variable, "$HOME", Expand);
verdict_test!(expand_quoted_variable, "\"$HOME/bin\"", Expand);
verdict_test!(expand_braced, "${HOME}", Expand);
verdict_test!(expand_default, "${x:-fallback}", Expand);
verdict_test!(expand_tilde, "~/src", Expand);
verdict_test!(expand_single_quotes, "'a b'", Expand);
verdict_test!(expand_bracket, "[abc]", Expand);
verdict_test!(expand_brace_list, "{a,b}", Expand);
verdict_test!(expand_arith_short_circuit, "$((1+2))", Expand);
verdict_test!(expand_arith_with_glob_chars, "$((3*4))", Expand);

// ── IMPURE: side effects or mutable-state dependence ──

verdict_test!(impure_backtick, "`date`", Impure);
verdict_test!(impure_backtick_inside, "a`b`c", Impure);
verdict_test!(impure_command_subst, "$(date)", Impure);
verdict_test!(impure_process_subst_in, "<(ls)", Impure);
verdict_test!(impure_process_subst_out, ">(cat)", Impure);
verdict_test!(impure_array, "(1 2)", Impure);
verdict_test!(impure_assign_default, "${x=1}", Impure);
verdict_test!(impure_assign_colon, "${x:=1}", Impure);
verdict_test!(impure_arith_assign, "$((x=1))", Impure);
verdict_test!(impure_dirstack_plus, "~+", Impure);
verdict_test!(impure_dirstack_minus, "~-/x", Impure);

// ── UNIMPLEMENTED: possible globbing ──

verdict_test!(unimplemented_star, "*.rs", Unimplemented);
verdict_test!(unimplemented_question, "file?.txt", Unimplemented);
verdict_test!(unimplemented_bang, "!x", Unimplemented);
verdict_test!(unimplemented_star_in_quotes, "\"$x*\"", Unimplemented);

// ── STUCK: framing bytes ──

verdict_test!(stuck_del, "a\x7fb", Stuck);

// ── Properties ──

#[test]
fn scanner_is_a_pure_function_of_the_word() {
    for word in ["hello", "$x", "`x`", "*", "~+", "a\x7f", "${a=b}", "$((1))"] {
        let first = scan_text(word).map_err(|e| e.kind());
        let second = scan_text(word).map_err(|e| e.kind());
        assert_eq!(first, second, "word: {word}");
    }
}

#[test]
fn quoted_fragments_take_no_part_in_scanning() {
    let word = Word {
        fragments: vec![Fragment::Quoted("`rm -rf`*".into()), Fragment::Raw('x')],
    };
    assert_eq!(scan_word(&word).unwrap(), Verdict::Untouched);
}

#[test]
fn plain_words_are_byte_identical_after_compile() {
    let words = ["ls", "-la", "/tmp/a.b", "key:value", "a,b", "100%", "x.y-z_w", "@host", "a#b"];
    let mut session = builtin_session(Environment::default());
    let mut node = Node::command(&words);
    let before = node.clone();
    expand_command(&mut node, &mut session).unwrap();
    assert_eq!(node, before);
}

#[test]
fn literal_trees_are_unchanged_for_every_structural_kind() {
    let leaf = || Box::new(Node::command(&["true"]));
    let nodes = vec![
        Node::Pipe {
            items: vec![Node::command(&["a"]), Node::command(&["b"])],
            background: false,
        },
        Node::Subshell {
            body: leaf(),
            redirections: vec![],
        },
        Node::And {
            left: leaf(),
            right: leaf(),
        },
        Node::Or {
            left: leaf(),
            right: leaf(),
        },
        Node::Semi {
            left: leaf(),
            right: leaf(),
        },
        Node::Not { body: leaf() },
        Node::Background {
            node: leaf(),
            redirections: vec![],
        },
        Node::While {
            test: leaf(),
            body: leaf(),
        },
        Node::If {
            cond: leaf(),
            then_branch: leaf(),
            else_branch: Some(leaf()),
        },
        Node::Time {
            posix: false,
            command: leaf(),
        },
        Node::Group {
            body: leaf(),
            redirections: vec![Redirection::File {
                op: FileRedirKind::To,
                fd: Fd::Fixed(1),
                target: Word::quoted("out file"),
            }],
        },
        Node::Arith {
            body: vec![Word::raw("1")],
        },
    ];
    let mut session = builtin_session(Environment::default());
    for mut node in nodes {
        let before = node.clone();
        expand_command(&mut node, &mut session).unwrap();
        assert_eq!(node, before, "kind: {}", before.kind().as_str());
    }
}

// ── Concrete scenarios (in-process backend) ──

#[test]
fn home_bin_expands_to_one_word() {
    let mut session = builtin_session(home_env());
    let mut node = Node::command(&["ls", "\"$HOME/bin\""]);
    expand_command(&mut node, &mut session).unwrap();
    assert_eq!(
        arguments(&node),
        vec![Word::raw("ls"), Word::quoted("/home/u/bin")]
    );
}

#[test]
fn hello_is_returned_unchanged() {
    assert_eq!(scan_text("hello").unwrap(), Verdict::Untouched);
    let mut session = builtin_session(home_env());
    let mut node = Node::command(&["echo", "hello"]);
    expand_command(&mut node, &mut session).unwrap();
    assert_eq!(arguments(&node), vec![Word::raw("echo"), Word::raw("hello")]);
}

#[test]
fn backtick_anywhere_is_impure() {
    let mut session = builtin_session(home_env());
    let mut node = Node::command(&["echo", "safe", "pre`id`post"]);
    let err = expand_command(&mut node, &mut session).unwrap_err();
    assert!(matches!(err, Error::ImpureExpansion(_)), "{err}");
}

#[test]
fn for_loop_is_unimplemented_regardless_of_body() {
    let mut session = builtin_session(home_env());
    for body in [Node::command(&["true"]), Node::command(&["echo", "$HOME"])] {
        let mut node = Node::For {
            variable: Word::raw("i"),
            items: vec![],
            body: Box::new(body),
        };
        let err = expand_command(&mut node, &mut session).unwrap_err();
        assert!(matches!(err, Error::Unimplemented(_)), "{err}");
    }
}

#[test]
fn runtime_descriptor_dup_is_impure() {
    let mut session = builtin_session(home_env().with_var("fd", "3"));
    let mut node = Node::Command(CommandNode {
        arguments: vec![Word::raw("echo"), Word::raw("hi")],
        redirections: vec![Redirection::Dup {
            op: DupRedirKind::ToFd,
            fd: Fd::Fixed(1),
            target: Word::raw("$fd"),
        }],
        ..CommandNode::default()
    });
    let err = expand_command(&mut node, &mut session).unwrap_err();
    assert!(matches!(err, Error::ImpureExpansion(_)), "{err}");
}

#[test]
fn mirror_flush_follows_assignment_order() {
    let assign = |name: &str, value: &str| {
        Box::new(Node::Command(CommandNode {
            assignments: vec![Assignment {
                name: name.into(),
                value: Word::raw(value),
            }],
            ..CommandNode::default()
        }))
    };
    let mut session = builtin_session(Environment::default());
    // a=first; echo $a; a=second; echo $a
    let mut node = Node::Semi {
        left: Box::new(Node::Semi {
            left: assign("a", "first"),
            right: Box::new(Node::command(&["echo", "$a"])),
        }),
        right: Box::new(Node::Semi {
            left: assign("a", "second"),
            right: Box::new(Node::command(&["echo", "$a"])),
        }),
    };
    expand_command(&mut node, &mut session).unwrap();
    let Node::Semi { left, right } = &node else { unreachable!() };
    let (Node::Semi { right: first, .. }, Node::Semi { right: second, .. }) =
        (left.as_ref(), right.as_ref())
    else {
        unreachable!()
    };
    assert_eq!(arguments(first)[1], Word::quoted("first"));
    assert_eq!(arguments(second)[1], Word::quoted("second"));
}

#[test]
fn pipe_stage_assignment_invisible_to_next_stage() {
    let mut session = builtin_session(Environment::default());
    let mut node = Node::Pipe {
        items: vec![
            Node::Command(CommandNode {
                assignments: vec![Assignment {
                    name: "leak".into(),
                    value: Word::raw("yes"),
                }],
                ..CommandNode::default()
            }),
            Node::command(&["echo", "\"$leak\""]),
        ],
        background: false,
    };
    expand_command(&mut node, &mut session).unwrap();
    let Node::Pipe { items, .. } = &node else { unreachable!() };
    assert_eq!(arguments(&items[1])[1], Word::quoted(""));
}

// ── expand_or_keep ──

#[test]
fn expand_or_keep_returns_original_on_expected_failure() {
    let mut session = builtin_session(home_env());
    let node = Node::command(&["echo", "$HOME", "$(id)"]);
    match expand_or_keep(node.clone(), &mut session).unwrap() {
        Outcome::Unexpanded { node: kept, reason } => {
            assert_eq!(kept, node);
            assert_eq!(reason.kind(), "impure_expansion");
        }
        Outcome::Expanded(_) => panic!("command substitution must not expand"),
    }
}

#[test]
fn expand_or_keep_expands_safe_commands() {
    let mut session = builtin_session(home_env());
    let outcome = expand_or_keep(Node::command(&["cd", "~"]), &mut session).unwrap();
    assert!(outcome.is_expanded());
    assert_eq!(
        arguments(outcome.node()),
        vec![Word::raw("cd"), Word::quoted("/home/u")]
    );
}

// ── Classifier ──

#[test]
fn safe_command_agrees_with_scanner() {
    assert!(sh_expand::safe_command(&Node::command(&["ls", "$HOME", "'x'"])));
    assert!(!sh_expand::safe_command(&Node::command(&["ls", "*.rs"])));
    assert!(!sh_expand::safe_command(&Node::For {
        variable: Word::raw("i"),
        items: vec![],
        body: Box::new(Node::command(&["true"])),
    }));
}

// ── Tree interchange ──

#[test]
fn tree_round_trips_through_json() {
    let json = r#"{
        "kind": "command",
        "arguments": [
            [{"raw": "e"}, {"raw": "c"}, {"raw": "h"}, {"raw": "o"}],
            [{"raw": "$"}, {"raw": "n"}, {"raw": "a"}, {"raw": "m"}, {"raw": "e"}]
        ]
    }"#;
    let mut node: Node = serde_json::from_str(json).unwrap();
    let mut session = builtin_session(home_env());
    expand_command(&mut node, &mut session).unwrap();
    let out = serde_json::to_value(&node).unwrap();
    assert_eq!(out["kind"], "command");
    assert_eq!(out["arguments"][1], serde_json::json!([{"quoted": "two"}]));
    assert_eq!(out["arguments"][2], serde_json::json!([{"quoted": "words"}]));
}
