use super::{append, make_payload, parse_error};
use crate::action::Payload;
use crate::ast::{GlobalType, Protocol};
use crate::error::Result;
use pest::iterators::Pair;
use pest::Parser as _;
use pest_derive::Parser;
use std::path::Path;

#[derive(Parser)]
#[grammar = "parser/mpst.pest"]
struct Parser;

pub fn parse(path: &Path, source: &str) -> Result<Vec<Protocol>> {
    let file = Parser::parse(Rule::file, source).map_err(|e| parse_error(path, e))?;
    let mut protocols = Vec::new();
    for pair in file {
        if pair.as_rule() == Rule::protocol {
            protocols.push(build_protocol(pair));
        }
    }
    Ok(protocols)
}

fn build_protocol(pair: Pair<Rule>) -> Protocol {
    let mut inner = pair.into_inner();
    let name = inner.next().unwrap().as_str().to_string();
    let role_list = inner.next().unwrap();
    let roles: Vec<String> = role_list.into_inner().map(|r| r.as_str().to_string()).collect();
    let stmts: Vec<Pair<Rule>> = inner.collect();
    Protocol::new(name, roles, build_block(&stmts))
}

fn build_block(stmts: &[Pair<Rule>]) -> GlobalType {
    let Some((first, rest)) = stmts.split_first() else {
        return GlobalType::End;
    };
    match first.as_rule() {
        Rule::msg_stmt => {
            let mut inner = first.clone().into_inner();
            let from = inner.next().unwrap().as_str().to_string();
            let to = inner.next().unwrap().as_str().to_string();
            let label = inner.next().unwrap().as_str().to_string();
            let payloads = inner.next().map(build_payload_list).unwrap_or_default();
            GlobalType::msg(from, to, label, payloads, build_block(rest))
        }
        Rule::choice_stmt => {
            let branches: Vec<GlobalType> = first
                .clone()
                .into_inner()
                .map(|branch| build_block(&branch.into_inner().collect::<Vec<_>>()))
                .collect();
            let choice = GlobalType::Choice(branches);
            append(choice, &build_block(rest))
        }
        Rule::rec_stmt => {
            let mut inner = first.clone().into_inner();
            let tvar = inner.next().unwrap().as_str().to_string();
            let body = build_block(&inner.collect::<Vec<_>>());
            append(GlobalType::rec(tvar, body), &build_block(rest))
        }
        Rule::continue_stmt => GlobalType::Var(first.clone().into_inner().next().unwrap().as_str().to_string()),
        Rule::end_stmt => GlobalType::End,
        other => unreachable!("unexpected statement rule {other:?}"),
    }
}

fn build_payload_list(pair: Pair<Rule>) -> Vec<Payload> {
    pair.into_inner()
        .enumerate()
        .map(|(i, p)| {
            let parts: Vec<Pair<Rule>> = p.into_inner().collect();
            match parts.len() {
                2 => make_payload(Some(parts[0].as_str()), parts[1].as_str(), i),
                1 => make_payload(None, parts[0].as_str(), i),
                _ => unreachable!("payload must carry a type"),
            }
        })
        .collect()
}
