//! Command-line entry point: parse a protocol source file and either print
//! local-type text or generate `tokio`-backed role code for it.

use clap::Parser;
use mixchor::config::{Options, Syntax};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "mixchor")]
#[command(about = "Projection, normalisation and code generation for multiparty session types")]
struct Cli {
    /// Protocol source file.
    file: PathBuf,

    /// Surface syntax the source file is written in.
    #[arg(long, value_enum, default_value = "mpst")]
    syntax: Syntax,

    /// Process only this protocol, skipping any others declared in the file.
    #[arg(long)]
    project: Option<String>,

    /// Print this protocol's minimised local-type text instead of generating code for it.
    #[arg(long)]
    emit: Option<String>,

    /// Directory generated code is written under.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Root package name generated output is nested under.
    #[arg(long, default_value = "generated")]
    root_pkg: String,

    /// Print progress as each protocol is processed.
    #[arg(short, long)]
    verbose: bool,

    /// Overwrite existing generated output without prompting.
    #[arg(short, long)]
    yes: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let opts = Options {
        input: cli.file,
        syntax: cli.syntax,
        project_only: cli.project,
        emit_only: cli.emit,
        out_dir: cli.out_dir,
        root_pkg: cli.root_pkg,
        verbose: cli.verbose,
        assume_yes: cli.yes,
    };

    match mixchor::driver::run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
