//! Structural clean-up of the global type before projection: flattening
//! single-branch choices, dropping unused `rec` binders, and renaming every
//! binder to a protocol-wide unique name so projection and the fixpoint
//! machinery never have to worry about shadowing.

use crate::ast::GlobalType;
use std::collections::HashMap;

/// Rename every `rec`/`continue` pair to a fresh, protocol-unique name and
/// drop single-branch choices and unused binders.
pub fn normalize(g: &GlobalType) -> GlobalType {
    let mut renamer = Renamer::default();
    let renamed = renamer.rename(g, &HashMap::new());
    simplify(&renamed)
}

#[derive(Default)]
struct Renamer {
    next: usize,
}

impl Renamer {
    fn fresh(&mut self) -> String {
        let name = format!("t{}", self.next);
        self.next += 1;
        name
    }

    fn rename(&mut self, g: &GlobalType, env: &HashMap<String, String>) -> GlobalType {
        match g {
            GlobalType::End => GlobalType::End,
            GlobalType::Var(t) => GlobalType::Var(env.get(t).cloned().unwrap_or_else(|| t.clone())),
            GlobalType::Msg(m, cont) => GlobalType::msg(
                m.from.clone(),
                m.to.clone(),
                m.label.clone(),
                m.payloads.clone(),
                self.rename(cont, env),
            ),
            GlobalType::Choice(branches) => {
                GlobalType::Choice(branches.iter().map(|b| self.rename(b, env)).collect())
            }
            GlobalType::Rec(t, body) => {
                let fresh = self.fresh();
                let mut env2 = env.clone();
                env2.insert(t.clone(), fresh.clone());
                GlobalType::rec(fresh, self.rename(body, &env2))
            }
        }
    }
}

/// Flatten a single-branch `choice`, and drop a `rec` binder whose variable
/// is never referenced in its own body.
fn simplify(g: &GlobalType) -> GlobalType {
    match g {
        GlobalType::End | GlobalType::Var(_) => g.clone(),
        GlobalType::Msg(m, cont) => GlobalType::msg(
            m.from.clone(),
            m.to.clone(),
            m.label.clone(),
            m.payloads.clone(),
            simplify(cont),
        ),
        GlobalType::Choice(branches) => {
            let simplified: Vec<GlobalType> = branches.iter().map(simplify).collect();
            if simplified.len() == 1 {
                simplified.into_iter().next().unwrap()
            } else {
                GlobalType::Choice(simplified)
            }
        }
        GlobalType::Rec(t, body) => {
            let body = simplify(body);
            if body.mentions_var(t) {
                GlobalType::rec(t.clone(), body)
            } else {
                body
            }
        }
    }
}
