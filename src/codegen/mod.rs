//! Render a fully-projected, minimised protocol into a small Rust module
//! tree: one file per role under each of `roles/`, `messages/`,
//! `callbacks/`, `results/`, a single `channels/mod.rs`, and a single entry
//! point at the protocol root wiring `tokio::sync::mpsc` channels between
//! roles and spawning every role's `run()` task behind a
//! host-configurable [`Host`](templates) object.

pub mod context;

use crate::error::Result;
use crate::projection::Projections;
use askama::Template;
use heck::{ToPascalCase, ToSnakeCase};
use std::path::Path;

struct RoleInfo {
    name: String,
    snake: String,
    pascal: String,
    messages: Vec<context::MessageVariant>,
    args: Vec<String>,
}

struct ChannelDecl {
    tx: String,
    rx: String,
}

#[derive(Template)]
#[template(path = "role.rs.askama", escape = "none")]
struct RoleTemplate<'a> {
    protocol: &'a str,
    role: &'a str,
    role_snake: &'a str,
    role_pascal: &'a str,
    peers_snake: &'a [String],
    body: &'a str,
}

#[derive(Template)]
#[template(path = "messages.rs.askama", escape = "none")]
struct MessagesTemplate<'a> {
    protocol: &'a str,
    role: &'a str,
    messages: &'a [context::MessageVariant],
}

#[derive(Template)]
#[template(path = "callbacks.rs.askama", escape = "none")]
struct CallbacksTemplate<'a> {
    protocol: &'a str,
    role: &'a str,
    role_snake: &'a str,
    role_pascal: &'a str,
}

#[derive(Template)]
#[template(path = "results.rs.askama", escape = "none")]
struct ResultsTemplate<'a> {
    protocol: &'a str,
    role: &'a str,
    role_pascal: &'a str,
}

#[derive(Template)]
#[template(path = "channels.rs.askama", escape = "none")]
struct ChannelsTemplate<'a> {
    protocol: &'a str,
}

#[derive(Template)]
#[template(path = "entry_point.rs.askama", escape = "none")]
struct EntryPointTemplate<'a> {
    protocol: &'a str,
    roles: &'a [RoleInfo],
    channels: Vec<ChannelDecl>,
}

/// One generated file, relative to the protocol's output directory.
pub struct GeneratedFile {
    pub relative_path: String,
    pub contents: String,
}

/// Render every role's module, the shared message/callback/result types,
/// and the entry point that wires them together.
///
/// `projections` must already be minimised, canonical `LocalType` trees (no
/// `UnmergedChoice` left) — the output of [`crate::projectability::resolve_all`]
/// followed by [`crate::dfa::minimise`] for each role.
pub fn generate(protocol: &str, projections: &Projections) -> Result<Vec<GeneratedFile>> {
    let mut files = Vec::new();
    let mut roles = Vec::new();
    let mut channel_set: Vec<(String, String)> = Vec::new();

    for (role, lt) in projections {
        let ctx = context::build(protocol, role, lt)?;
        let rendered = RoleTemplate {
            protocol,
            role: &ctx.role,
            role_snake: &ctx.role_snake,
            role_pascal: &ctx.role_pascal,
            peers_snake: &ctx.peers_snake,
            body: &ctx.body,
        }
        .render()?;
        files.push(GeneratedFile {
            relative_path: format!("roles/{}.rs", ctx.role_snake),
            contents: rendered,
        });
        files.push(GeneratedFile {
            relative_path: format!("messages/{}.rs", ctx.role_snake),
            contents: MessagesTemplate {
                protocol,
                role: &ctx.role,
                messages: &ctx.messages,
            }
            .render()?,
        });
        files.push(GeneratedFile {
            relative_path: format!("callbacks/{}.rs", ctx.role_snake),
            contents: CallbacksTemplate {
                protocol,
                role: &ctx.role,
                role_snake: &ctx.role_snake,
                role_pascal: &ctx.role_pascal,
            }
            .render()?,
        });
        files.push(GeneratedFile {
            relative_path: format!("results/{}.rs", ctx.role_snake),
            contents: ResultsTemplate {
                protocol,
                role: &ctx.role,
                role_pascal: &ctx.role_pascal,
            }
            .render()?,
        });

        let mut role_channels = Vec::new();
        context::collect_channels(role, lt, &mut role_channels);
        for pair in role_channels {
            if !channel_set.contains(&pair) {
                channel_set.push(pair);
            }
        }

        let mut args = Vec::new();
        for peer in &ctx.peers {
            args.push(channel_var(role, peer, "tx"));
            args.push(channel_var(peer, role, "rx"));
        }
        roles.push(RoleInfo {
            name: role.clone(),
            snake: role.to_snake_case(),
            pascal: role.to_pascal_case(),
            messages: ctx.messages,
            args,
        });
    }

    let mod_rs = |dir: &str| GeneratedFile {
        relative_path: format!("{dir}/mod.rs"),
        contents: roles.iter().map(|r| format!("pub mod {};\n", r.snake)).collect(),
    };
    files.push(mod_rs("roles"));
    files.push(mod_rs("messages"));
    files.push(mod_rs("callbacks"));
    files.push(mod_rs("results"));
    files.push(GeneratedFile {
        relative_path: "channels/mod.rs".to_string(),
        contents: ChannelsTemplate { protocol }.render()?,
    });

    let channels = channel_set
        .iter()
        .map(|(from, to)| ChannelDecl {
            tx: channel_var(from, to, "tx"),
            rx: channel_var(from, to, "rx"),
        })
        .collect();
    files.push(GeneratedFile {
        relative_path: "mod.rs".to_string(),
        contents: EntryPointTemplate { protocol, roles: &roles, channels }.render()?,
    });

    Ok(files)
}

/// The shared variable name for one directed channel's sending or receiving
/// half, as declared by `mpsc::channel()` in the entry point and passed
/// positionally into each role's `run()` call.
fn channel_var(from: &str, to: &str, half: &str) -> String {
    format!("{}_to_{}_{half}", from.to_snake_case(), to.to_snake_case())
}

/// Write a protocol's generated files under `out_dir/<root_pkg>/<protocol_snake>/`.
pub fn write_to_disk(out_dir: &Path, root_pkg: &str, protocol: &str, files: &[GeneratedFile]) -> Result<()> {
    let dir = out_dir.join(root_pkg).join(protocol.to_snake_case());
    for file in files {
        let path = dir.join(&file.relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| crate::error::AnalysisError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, &file.contents).map_err(|source| crate::error::AnalysisError::Io { path, source })?;
    }
    Ok(())
}

/// Whether `out_dir/<root_pkg>/<protocol_snake>/` already exists, so the
/// driver can gate it behind an overwrite confirmation.
pub fn protocol_dir_exists(out_dir: &Path, root_pkg: &str, protocol: &str) -> bool {
    out_dir.join(root_pkg).join(protocol.to_snake_case()).exists()
}
