//! sh-expand: expand one parsed shell tree.
//!
//! Reads `{"tree": ..., "environment": ...}` from stdin and writes the
//! rewritten tree, or the untouched tree with the reason it was kept, to
//! stdout. Exits 1 when the input is malformed or the oracle breaks.

use std::io::Read;

use serde::{Deserialize, Serialize};

use sh_expand::config::Config;
use sh_expand::{Environment, Node, Outcome, Session, expand_or_keep, logging};

#[derive(Deserialize)]
struct Request {
    tree: Node,
    #[serde(default)]
    environment: Environment,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Expanded,
    Unexpanded,
}

#[derive(Serialize)]
struct Response {
    status: Status,
    tree: Node,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

impl From<Outcome> for Response {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Expanded(tree) => Response {
                status: Status::Expanded,
                tree,
                reason: None,
                kind: None,
            },
            Outcome::Unexpanded { node, reason } => Response {
                status: Status::Unexpanded,
                tree: node,
                kind: Some(reason.kind()),
                reason: Some(reason.to_string()),
            },
        }
    }
}

fn main() {
    let config = Config::load();
    logging::init(&config.settings);

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        eprintln!("failed to read stdin");
        std::process::exit(1);
    }

    let request: Request = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("JSON parse error: {e}");
            std::process::exit(1);
        }
    };

    let outcome = Session::open(&config.oracle, &request.environment).and_then(|mut session| {
        let outcome = expand_or_keep(request.tree.clone(), &mut session)?;
        session.close()?;
        Ok(outcome)
    });
    let response = match outcome {
        Ok(outcome) => Response::from(outcome),
        // The session could not even be loaded: nothing was rewritten.
        Err(reason) if reason.is_expected() => Response::from(Outcome::Unexpanded {
            node: request.tree,
            reason,
        }),
        Err(e) => {
            eprintln!("sh-expand: {e}");
            std::process::exit(1);
        }
    };

    match serde_json::to_string(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("JSON encode error: {e}");
            std::process::exit(1);
        }
    }
}
