//! The single error type returned by every analysis phase.

use std::path::PathBuf;
use thiserror::Error;

/// Every way a protocol can fail to parse, project, or generate code, tagged
/// with enough context (protocol name, role, excerpt) to print a useful
/// diagnostic without a backtrace.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{path}:{line}:{col}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        col: usize,
        message: String,
    },

    #[error("protocol `{protocol}`: role `{role}` cannot tell branches apart: {detail}")]
    InconsistentChoice {
        protocol: String,
        role: String,
        detail: String,
    },

    #[error(
        "protocol `{protocol}`: label `{label}` is used with different payload shapes across branches of the same choice"
    )]
    InconsistentChoiceLabel { protocol: String, label: String },

    #[error(
        "protocol `{protocol}`: role `{role}`'s projection is not trace-equivalent to the merged choice branches"
    )]
    NotTraceEquivalent { protocol: String, role: String },

    #[error("protocol `{protocol}`: no projectable partition of the choice exists ({reason})")]
    NotProjectable { protocol: String, reason: String },

    #[error("protocol `{protocol}` mentions undeclared role `{role}`")]
    UndeclaredRole { protocol: String, role: String },

    #[error("protocol `{protocol}` references undefined recursion variable `{tvar}`")]
    UnboundRecursionVariable { protocol: String, tvar: String },

    #[error("protocol `{protocol}`: internal invariant broken: {detail}")]
    Violation { protocol: String, detail: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("askama template error: {0}")]
    Template(#[from] askama::Error),
}

impl AnalysisError {
    pub fn violation(protocol: impl Into<String>, detail: impl Into<String>) -> Self {
        AnalysisError::Violation {
            protocol: protocol.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
