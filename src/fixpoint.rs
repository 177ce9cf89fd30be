//! `first`/`step` over a local type, including through recursion.
//!
//! Computing `first(Var(t))` needs `first` of `t`'s own binder body, which
//! may itself mention `t` (or another variable that mentions `t`) before
//! reaching a concrete action. We resolve this with the classic two-pass
//! dataflow-style fixpoint: a dependency pass records, for every bound
//! variable, its direct action set and the *other* variables it depends on
//! without passing through an action first; a closure pass then saturates
//! those action sets along the dependency edges until nothing changes.

use crate::action::Action;
use crate::ast::LocalType;
use crate::error::{AnalysisError, Result};
use std::collections::{HashMap, HashSet, VecDeque};

/// A role's fully-closed `first` table, keyed by recursion variable.
pub struct FixpointTables {
    first: HashMap<String, HashSet<Action>>,
}

fn collect_rec_env<'a>(owner: &str, lt: &'a LocalType, env: &mut HashMap<String, &'a LocalType>) {
    match lt {
        LocalType::End | LocalType::Var(_) => {}
        LocalType::Msg(_, cont) => collect_rec_env(owner, cont, env),
        LocalType::Rec(t, body) => {
            env.insert(t.clone(), body);
            collect_rec_env(owner, body, env);
        }
        LocalType::MChoice(branches) => {
            for (_, cont) in branches {
                collect_rec_env(owner, cont, env);
            }
        }
        LocalType::UnmergedChoice(role, branches) => {
            debug_assert_eq!(role, owner);
            for branch in branches.iter() {
                if let Some(own) = branch.get(owner) {
                    collect_rec_env(owner, own, env);
                }
            }
        }
    }
}

/// The direct action set of `lt` and the set of recursion variables it
/// depends on without first passing through a concrete action.
fn shallow(owner: &str, lt: &LocalType, deps: &mut HashSet<String>) -> HashSet<Action> {
    match lt {
        LocalType::End => HashSet::new(),
        LocalType::Var(t) => {
            deps.insert(t.clone());
            HashSet::new()
        }
        LocalType::Msg(a, _) => HashSet::from([a.clone()]),
        LocalType::Rec(_, body) => shallow(owner, body, deps),
        LocalType::MChoice(branches) => branches.iter().map(|(a, _)| a.clone()).collect(),
        LocalType::UnmergedChoice(role, branches) => {
            debug_assert_eq!(role, owner);
            let mut acc = HashSet::new();
            for branch in branches.iter() {
                if let Some(own) = branch.get(owner) {
                    acc.extend(shallow(owner, own, deps));
                }
            }
            acc
        }
    }
}

impl FixpointTables {
    /// Build the closed `first` table for `owner`'s full raw (possibly
    /// still-`UnmergedChoice`-bearing) projected tree.
    pub fn build(owner: &str, root: &LocalType) -> Self {
        let mut env = HashMap::new();
        collect_rec_env(owner, root, &mut env);

        let mut direct: HashMap<String, HashSet<Action>> = HashMap::new();
        let mut deps: HashMap<String, HashSet<String>> = HashMap::new();
        for (t, body) in &env {
            let mut d = HashSet::new();
            let acts = shallow(owner, body, &mut d);
            direct.insert(t.clone(), acts);
            deps.insert(t.clone(), d);
        }

        // reverse edges: who depends on t
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for (t, ds) in &deps {
            for d in ds {
                dependents.entry(d.clone()).or_default().push(t.clone());
            }
        }

        let mut first = direct.clone();
        let mut queue: VecDeque<String> = env.keys().cloned().collect();
        while let Some(t) = queue.pop_front() {
            let mut combined = first.get(&t).cloned().unwrap_or_default();
            if let Some(ds) = deps.get(&t) {
                for d in ds {
                    if let Some(fd) = first.get(d) {
                        combined.extend(fd.iter().cloned());
                    }
                }
            }
            let changed = first.get(&t).map(|cur| cur != &combined).unwrap_or(true);
            if changed {
                first.insert(t.clone(), combined);
                if let Some(ds) = dependents.get(&t) {
                    for d in ds {
                        queue.push_back(d.clone());
                    }
                }
            }
        }

        FixpointTables { first }
    }

    /// `first(L)`: the set of leading actions `L` may offer.
    pub fn first(&self, owner: &str, lt: &LocalType) -> Result<HashSet<Action>> {
        match lt {
            LocalType::End => Ok(HashSet::new()),
            LocalType::Var(t) => Ok(self.first.get(t).cloned().unwrap_or_default()),
            LocalType::Msg(a, _) => Ok(HashSet::from([a.clone()])),
            LocalType::Rec(_, body) => self.first(owner, body),
            LocalType::MChoice(branches) => Ok(branches.iter().map(|(a, _)| a.clone()).collect()),
            LocalType::UnmergedChoice(role, branches) => {
                let mut acc = HashSet::new();
                for branch in branches.iter() {
                    if let Some(own) = branch.get(role) {
                        acc.extend(self.first(owner, own)?);
                    }
                }
                Ok(acc)
            }
        }
    }
}

/// Every `rec t { body }` binder in a fully canonical (no `UnmergedChoice`)
/// local type, keyed by `t`. Used by DFA construction to resolve `Var`
/// states back to the body they loop into.
pub fn canonical_rec_env(root: &LocalType) -> HashMap<String, &LocalType> {
    let mut env = HashMap::new();
    fn walk<'a>(lt: &'a LocalType, env: &mut HashMap<String, &'a LocalType>) {
        match lt {
            LocalType::End | LocalType::Var(_) => {}
            LocalType::Msg(_, cont) => walk(cont, env),
            LocalType::Rec(t, body) => {
                env.insert(t.clone(), body.as_ref());
                walk(body, env);
            }
            LocalType::MChoice(branches) => {
                for (_, cont) in branches {
                    walk(cont, env);
                }
            }
            LocalType::UnmergedChoice(..) => {}
        }
    }
    walk(root, &mut env);
    env
}

/// Follow `Var` indirection to the state it actually denotes.
pub fn resolve<'a>(env: &HashMap<String, &'a LocalType>, lt: &'a LocalType) -> &'a LocalType {
    match lt {
        LocalType::Var(t) => match env.get(t) {
            Some(body) => resolve(env, body),
            None => lt,
        },
        _ => lt,
    }
}

/// `step(L, a)`: the local type reached after offering action `a`, for a
/// local type that is already fully canonical (no `UnmergedChoice`). Used by
/// DFA construction, which only ever runs after projectability has resolved
/// every choice.
pub fn step<'a>(
    owner: &str,
    env: &HashMap<String, &'a LocalType>,
    lt: &'a LocalType,
    action: &Action,
) -> Result<Option<&'a LocalType>> {
    match resolve(env, lt) {
        LocalType::End => Ok(None),
        LocalType::Msg(a, cont) => Ok(if a == action { Some(cont) } else { None }),
        LocalType::MChoice(branches) => Ok(branches
            .iter()
            .find(|(a, _)| a == action)
            .map(|(_, cont)| cont.as_ref())),
        LocalType::Rec(_, body) => step(owner, env, body, action),
        LocalType::Var(_) => Ok(None),
        LocalType::UnmergedChoice(..) => Err(AnalysisError::violation(
            owner,
            "step() reached an unresolved choice",
        )),
    }
}
