//! CLI-facing configuration shared between [`crate::bin`] and [`crate::driver`].

use std::path::PathBuf;

/// Which surface grammar a source file is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Syntax {
    Scribble,
    Mpst,
}

impl Default for Syntax {
    fn default() -> Self {
        Syntax::Mpst
    }
}

/// Resolved options for one driver run, independent of how they were
/// gathered (CLI flags, in the common case).
#[derive(Debug, Clone)]
pub struct Options {
    pub input: PathBuf,
    pub syntax: Syntax,
    /// If set, only this protocol name is processed; otherwise every
    /// protocol in the file is.
    pub project_only: Option<String>,
    pub emit_only: Option<String>,
    pub out_dir: PathBuf,
    pub root_pkg: String,
    pub verbose: bool,
    pub assume_yes: bool,
}
