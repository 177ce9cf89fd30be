//! Surface syntax: two dialects reducing to the same [`crate::ast::Protocol`]
//! set, selected by [`crate::config::Syntax`].

mod mpst;
mod scribble;

use crate::action::Payload;
use crate::ast::{GlobalType, Protocol};
use crate::error::{AnalysisError, Result};
use std::path::Path;

/// Parse every `protocol`/`global protocol` block in `source` into a list of
/// [`Protocol`]s, in the dialect named by [`crate::config::Syntax`].
pub fn parse(path: &Path, source: &str, syntax: crate::config::Syntax) -> Result<Vec<Protocol>> {
    match syntax {
        crate::config::Syntax::Mpst => mpst::parse(path, source),
        crate::config::Syntax::Scribble => scribble::parse(path, source),
    }
}

fn parse_error<R: pest::RuleType>(path: &Path, e: pest::error::Error<R>) -> AnalysisError {
    let (line, col) = match e.line_col {
        pest::error::LineColLocation::Pos((l, c)) => (l, c),
        pest::error::LineColLocation::Span((l, c), _) => (l, c),
    };
    AnalysisError::Parse {
        path: path.to_path_buf(),
        line,
        col,
        message: e.variant.message().to_string(),
    }
}

/// A payload name straight from source may be `PascalCase` or `UPPER`; code
/// generation needs a valid lowercase-leading Rust binding. A missing name
/// gets a positional placeholder.
fn normalize_payload_name(raw: Option<&str>, index: usize) -> String {
    match raw {
        Some(raw) => {
            let mut chars = raw.chars();
            match chars.next() {
                Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
                None => format!("p_{index}"),
            }
        }
        None => format!("p_{index}"),
    }
}

fn make_payload(name: Option<&str>, ty: &str, index: usize) -> Payload {
    Payload {
        name: normalize_payload_name(name, index),
        ty: ty.to_string(),
    }
}

/// Splice `tail` onto the end of every terminal `End` reachable from `g` —
/// used when a `choice`/`rec` block is followed by more statements in the
/// same sequence, since every branch/loop-exit converges on what follows.
fn append(g: GlobalType, tail: &GlobalType) -> GlobalType {
    match g {
        GlobalType::End => tail.clone(),
        GlobalType::Msg(m, cont) => {
            GlobalType::Msg(m, std::rc::Rc::new(append((*cont).clone(), tail)))
        }
        GlobalType::Choice(branches) => {
            GlobalType::Choice(branches.into_iter().map(|b| append(b, tail)).collect())
        }
        GlobalType::Rec(t, body) => GlobalType::rec(t, append((*body).clone(), tail)),
        var @ GlobalType::Var(_) => var,
    }
}
