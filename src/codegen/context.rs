//! Walk a minimised canonical local type and build the per-role template
//! context: message structs, peer channel names, and a pre-rendered Rust
//! body implementing the role's control flow over `tokio::sync::mpsc`
//! channels, with `tokio::select!` standing in for "whichever offered
//! action's peer is ready first".

use crate::action::{Action, Polarity};
use crate::ast::LocalType;
use crate::error::{AnalysisError, Result};
use crate::namegen::NameGen;
use heck::{ToPascalCase, ToSnakeCase};
use indexmap::IndexMap;
use std::fmt::Write as _;

/// One label's payload shape, shared by every role that mentions it.
#[derive(Debug, Clone)]
pub struct MessageVariant {
    pub label: String,
    pub variant_name: String,
    pub fields: Vec<(String, String)>,
}

/// Everything `templates/role.rs.askama` needs to render one role's file.
pub struct RoleContext {
    pub protocol: String,
    pub role: String,
    pub role_snake: String,
    pub role_pascal: String,
    pub peers: Vec<String>,
    pub peers_snake: Vec<String>,
    pub messages: Vec<MessageVariant>,
    pub body: String,
}

/// Build the context for `role`'s minimised local type.
pub fn build(protocol: &str, role: &str, lt: &LocalType) -> Result<RoleContext> {
    let mut messages: IndexMap<String, MessageVariant> = IndexMap::new();
    let mut peers: Vec<String> = Vec::new();
    collect(lt, &mut messages, &mut peers);
    peers.sort();
    peers.dedup();

    let mut namegen = NameGen::new();
    let body = render(protocol, lt, &mut namegen, 1)?;
    let peers_snake: Vec<String> = peers.iter().map(|p| p.to_snake_case()).collect();

    Ok(RoleContext {
        protocol: protocol.to_string(),
        role: role.to_string(),
        role_snake: role.to_snake_case(),
        role_pascal: role.to_pascal_case(),
        peers,
        peers_snake,
        messages: messages.into_values().collect(),
        body,
    })
}

/// Every `(from, to)` directed channel this role's tree needs, derived from
/// each action's polarity: a send from `owner` needs an `(owner, peer)`
/// channel, a receive needs the mirrored `(peer, owner)` one.
pub fn collect_channels(owner: &str, lt: &LocalType, out: &mut Vec<(String, String)>) {
    match lt {
        LocalType::End | LocalType::Var(_) => {}
        LocalType::Msg(a, cont) => {
            push_channel(owner, a, out);
            collect_channels(owner, cont, out);
        }
        LocalType::Rec(_, body) => collect_channels(owner, body, out),
        LocalType::MChoice(branches) => {
            for (a, cont) in branches {
                push_channel(owner, a, out);
                collect_channels(owner, cont, out);
            }
        }
        LocalType::UnmergedChoice(..) => {}
    }
}

fn push_channel(owner: &str, a: &Action, out: &mut Vec<(String, String)>) {
    let pair = match a.polarity {
        Polarity::Send => (owner.to_string(), a.peer.clone()),
        Polarity::Recv => (a.peer.clone(), owner.to_string()),
    };
    out.push(pair);
}

fn collect(lt: &LocalType, messages: &mut IndexMap<String, MessageVariant>, peers: &mut Vec<String>) {
    match lt {
        LocalType::End | LocalType::Var(_) => {}
        LocalType::Msg(a, cont) => {
            record_action(a, messages, peers);
            collect(cont, messages, peers);
        }
        LocalType::Rec(_, body) => collect(body, messages, peers),
        LocalType::MChoice(branches) => {
            for (a, cont) in branches {
                record_action(a, messages, peers);
                collect(cont, messages, peers);
            }
        }
        LocalType::UnmergedChoice(..) => {}
    }
}

fn record_action(a: &Action, messages: &mut IndexMap<String, MessageVariant>, peers: &mut Vec<String>) {
    peers.push(a.peer.clone());
    messages.entry(a.label.clone()).or_insert_with(|| MessageVariant {
        label: a.label.clone(),
        variant_name: a.label.to_pascal_case(),
        fields: a.payloads.iter().map(|p| (p.name.clone(), p.ty.clone())).collect(),
    });
}

/// Render the async control-flow body for `lt`, at `indent` levels of
/// 4-space indentation.
fn render(protocol: &str, lt: &LocalType, namegen: &mut NameGen, indent: usize) -> Result<String> {
    let pad = "    ".repeat(indent);
    match lt {
        LocalType::End => Ok(format!("{pad}return Ok(callbacks.on_done());\n")),
        LocalType::Var(t) => Ok(format!("{pad}continue '{t};\n")),
        LocalType::Msg(a, cont) => {
            let mut out = String::new();
            out.push_str(&pad_lines(&render_action(a), &pad));
            out.push_str(&render(protocol, cont, namegen, indent)?);
            Ok(out)
        }
        LocalType::Rec(t, body) => {
            let mut out = String::new();
            writeln!(out, "{pad}'{t}: loop {{").unwrap();
            out.push_str(&render(protocol, body, namegen, indent + 1)?);
            writeln!(out, "{pad}}}").unwrap();
            Ok(out)
        }
        LocalType::MChoice(branches) => render_choice(protocol, branches, namegen, indent),
        LocalType::UnmergedChoice(..) => Err(AnalysisError::violation(
            protocol,
            "code generation reached an unresolved choice",
        )),
    }
}

/// Prefix every line of a (possibly multi-line) rendered snippet with `pad`.
fn pad_lines(text: &str, pad: &str) -> String {
    text.lines().map(|l| format!("{pad}{l}\n")).collect()
}

fn render_action(a: &Action) -> String {
    let peer = a.peer.to_snake_case();
    let variant = a.label.to_pascal_case();
    let fields: Vec<String> = a.payloads.iter().map(|p| p.name.clone()).collect();
    let hook = format!("callbacks.on_action({:?});\n", a.label);
    match a.polarity {
        Polarity::Send => format!(
            "{hook}tx_{peer}.send(Msg::{variant} {{ {} }}).await.map_err(|_| RunError::ChannelClosed)?;\n",
            fields.iter().map(|f| format!("{f}: {f}.clone()")).collect::<Vec<_>>().join(", ")
        ),
        Polarity::Recv => format!(
            "let Msg::{variant} {{ {} }} = rx_{peer}.recv().await.ok_or(RunError::ChannelClosed)? else {{ return Err(RunError::UnexpectedMessage); }};\n{hook}",
            fields.join(", ")
        ),
    }
}

/// Render one `MChoice` as a `tokio::select!` block: one arm per send
/// branch (`Sender::send` takes `&self`, so several arms borrowing the same
/// `tx_{peer}` never conflict), and one arm *per peer* for receives — a peer
/// offering more than one branch in this choice shares a single
/// `rx_{peer}.recv()` future, since `select!` evaluates and holds every
/// arm's future before polling and two arms both borrowing `&mut rx_{peer}`
/// would not compile. The merged arm then dispatches on the received
/// message's variant, mirroring `projectability::resolve`'s own same-peer
/// branch merge.
fn render_choice(
    protocol: &str,
    branches: &[(Action, std::rc::Rc<LocalType>)],
    namegen: &mut NameGen,
    indent: usize,
) -> Result<String> {
    let pad = "    ".repeat(indent);
    let mut out = String::new();
    writeln!(out, "{pad}tokio::select! {{").unwrap();

    for (a, cont) in branches.iter().filter(|(a, _)| a.polarity == Polarity::Send) {
        let peer = a.peer.to_snake_case();
        let variant = a.label.to_pascal_case();
        let fields: Vec<String> = a.payloads.iter().map(|p| p.name.clone()).collect();
        writeln!(
            out,
            "{pad}    _ = tx_{peer}.send(Msg::{variant} {{ {} }}) => {{",
            fields.iter().map(|f| format!("{f}: {f}.clone()")).collect::<Vec<_>>().join(", ")
        )
        .unwrap();
        writeln!(out, "{pad}        callbacks.on_action({:?});", a.label).unwrap();
        out.push_str(&render(protocol, cont, namegen, indent + 2)?);
        writeln!(out, "{pad}    }}").unwrap();
    }

    let mut recv_peers: Vec<String> = Vec::new();
    for (a, _) in branches.iter().filter(|(a, _)| a.polarity == Polarity::Recv) {
        let peer = a.peer.to_snake_case();
        if !recv_peers.contains(&peer) {
            recv_peers.push(peer);
        }
    }
    for peer in recv_peers {
        let recv_branches: Vec<&(Action, std::rc::Rc<LocalType>)> = branches
            .iter()
            .filter(|(a, _)| a.polarity == Polarity::Recv && a.peer.to_snake_case() == peer)
            .collect();
        writeln!(out, "{pad}    Some(msg) = rx_{peer}.recv() => {{").unwrap();
        if recv_branches.len() == 1 {
            let (a, cont) = recv_branches[0];
            let variant = a.label.to_pascal_case();
            let fields: Vec<String> = a.payloads.iter().map(|p| p.name.clone()).collect();
            writeln!(out, "{pad}        let Msg::{variant} {{ {} }} = msg else {{ return Err(RunError::UnexpectedMessage); }};", fields.join(", ")).unwrap();
            writeln!(out, "{pad}        callbacks.on_action({:?});", a.label).unwrap();
            out.push_str(&render(protocol, cont, namegen, indent + 2)?);
        } else {
            writeln!(out, "{pad}        match msg {{").unwrap();
            for (a, cont) in recv_branches {
                let variant = a.label.to_pascal_case();
                let fields: Vec<String> = a.payloads.iter().map(|p| p.name.clone()).collect();
                writeln!(out, "{pad}            Msg::{variant} {{ {} }} => {{", fields.join(", ")).unwrap();
                writeln!(out, "{pad}                callbacks.on_action({:?});", a.label).unwrap();
                out.push_str(&render(protocol, cont, namegen, indent + 4)?);
                writeln!(out, "{pad}            }}").unwrap();
            }
            writeln!(out, "{pad}        }}").unwrap();
        }
        writeln!(out, "{pad}    }}").unwrap();
    }

    writeln!(out, "{pad}    else => return Err(RunError::ChannelClosed),").unwrap();
    writeln!(out, "{pad}}}").unwrap();
    Ok(out)
}
