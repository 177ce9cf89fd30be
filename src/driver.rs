//! Top-level pipeline: parse a source file, then for each protocol run
//! normalise → project → resolve projectability → minimise → generate,
//! writing output under `--out-dir` and gating overwrites behind an
//! interactive confirmation.

use crate::ast::Protocol;
use crate::config::Options;
use crate::error::{AnalysisError, Result};
use crate::{codegen, dfa, normalize, parser, projectability, projection};
use std::io::{self, Write as _};

/// Run the full pipeline for every protocol named by `opts`.
///
/// A parse failure aborts the whole file (there is nothing left to
/// recover per-protocol boundaries from). Once parsed, each protocol is
/// processed independently: one protocol's failure is logged to stderr
/// and does not stop the others, but within a single protocol any error
/// is fatal and no partial output is written for it.
pub fn run(opts: &Options) -> Result<()> {
    let source = std::fs::read_to_string(&opts.input).map_err(|source| AnalysisError::Io {
        path: opts.input.clone(),
        source,
    })?;
    let protocols = parser::parse(&opts.input, &source, opts.syntax)?;

    let mut had_failure = false;
    for protocol in &protocols {
        if let Some(only) = &opts.project_only {
            if &protocol.name != only {
                continue;
            }
        }
        if let Err(e) = process_one(opts, protocol) {
            had_failure = true;
            eprintln!("error: {e}");
        }
    }

    if had_failure {
        Err(AnalysisError::violation(
            "<driver>",
            "one or more protocols failed; see stderr for details",
        ))
    } else {
        Ok(())
    }
}

fn process_one(opts: &Options, protocol: &Protocol) -> Result<()> {
    validate_roles(protocol)?;

    let normalised = normalize::normalize(&protocol.body);
    let normalised_protocol = Protocol::new(protocol.name.clone(), protocol.roles.clone(), normalised);

    tracing::info!(protocol = %protocol.name, "projecting");
    let raw_projections = projection::project(&normalised_protocol);
    let resolved = projectability::resolve_all(&protocol.name, &protocol.roles, &raw_projections)?;

    let mut minimised = projection::Projections::new();
    for role in &protocol.roles {
        minimised.insert(role.clone(), dfa::minimise(role, &resolved[role])?);
    }

    // `--emit NAME` prints the named protocol's local-type text instead of
    // generating code for it; every other processed protocol still gets
    // code generated as usual.
    if opts.emit_only.as_deref() == Some(protocol.name.as_str()) {
        for role in &protocol.roles {
            println!("-- {} / {} --\n{}", protocol.name, role, minimised[role]);
        }
        return Ok(());
    }

    let files = codegen::generate(&protocol.name, &minimised)?;
    if codegen::protocol_dir_exists(&opts.out_dir, &opts.root_pkg, &protocol.name)
        && !opts.assume_yes
        && !confirm_overwrite(&protocol.name)?
    {
        tracing::info!(protocol = %protocol.name, "skipped, overwrite declined");
        return Ok(());
    }
    codegen::write_to_disk(&opts.out_dir, &opts.root_pkg, &protocol.name, &files)?;
    if opts.verbose {
        println!("wrote {} file(s) for protocol `{}`", files.len(), protocol.name);
    }

    Ok(())
}

fn validate_roles(protocol: &Protocol) -> Result<()> {
    for role in &protocol.roles {
        if !protocol.body.mentions_role(role) && protocol.roles.len() > 1 {
            tracing::warn!(protocol = %protocol.name, %role, "role is declared but never appears in the protocol body");
        }
    }
    Ok(())
}

fn confirm_overwrite(protocol: &str) -> Result<bool> {
    loop {
        print!("protocol `{protocol}` already has generated output; overwrite? [y/N] ");
        io::stdout().flush().ok();
        let mut line = String::new();
        io::stdin().read_line(&mut line).map_err(|source| AnalysisError::Io {
            path: "<stdin>".into(),
            source,
        })?;
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" | "" => return Ok(false),
            _ => println!("please answer y/yes or n/no"),
        }
    }
}
