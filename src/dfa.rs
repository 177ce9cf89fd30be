//! Collapse a canonical local type into its minimal transition-equivalent
//! form, then back-convert the result into a tree with fresh recursion
//! variables.
//!
//! A local type fresh out of projection can carry more states than
//! behaviourally necessary — unrolled `rec` bodies duplicate tails that are
//! actually the same continuation. We explore the reachable state graph,
//! merge states by (Moore-style) partition refinement on their outgoing
//! action/target structure, and re-emit a tree sized to the number of
//! distinct behaviours rather than the number of syntactic nodes.

use crate::action::Action;
use crate::ast::LocalType;
use crate::error::Result;
use crate::fixpoint::{canonical_rec_env, resolve, step};
use crate::namegen::NameGen;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// The immediate action set of an already-`Var`-resolved node, without
/// consulting the recursion fixpoint closure (a resolved node's leading
/// actions are always syntactically present).
pub(crate) fn first_shallow(node: &LocalType) -> Vec<Action> {
    match node {
        LocalType::End | LocalType::Var(_) => Vec::new(),
        LocalType::Msg(a, _) => vec![a.clone()],
        LocalType::Rec(_, body) => first_shallow(body),
        LocalType::MChoice(branches) => branches.iter().map(|(a, _)| a.clone()).collect(),
        LocalType::UnmergedChoice(..) => Vec::new(),
    }
}

fn peel(node: &LocalType) -> &LocalType {
    match node {
        LocalType::Rec(_, body) => peel(body),
        other => other,
    }
}

/// Minimise `root` (a canonical, fully-projectability-resolved local type
/// for one role) and re-emit it with fresh `rec`/`continue` names.
pub fn minimise(owner: &str, root: &LocalType) -> Result<LocalType> {
    let env = canonical_rec_env(root);

    // Phase 1: explore the reachable raw state graph by pointer identity,
    // recording it as a `petgraph` digraph whose edges carry the offered
    // action and whose nodes we visit in BFS order via a worklist.
    let mut id_of: HashMap<*const LocalType, NodeIndex> = HashMap::new();
    let mut raw: Vec<&LocalType> = Vec::new();
    let mut graph: DiGraph<(), Action> = DiGraph::new();
    let mut worklist: VecDeque<NodeIndex> = VecDeque::new();

    fn intern<'a>(
        node: &'a LocalType,
        id_of: &mut HashMap<*const LocalType, NodeIndex>,
        raw: &mut Vec<&'a LocalType>,
        graph: &mut DiGraph<(), Action>,
        worklist: &mut VecDeque<NodeIndex>,
    ) -> NodeIndex {
        let peeled = peel(node);
        let key = peeled as *const LocalType;
        if let Some(&id) = id_of.get(&key) {
            return id;
        }
        let id = graph.add_node(());
        raw.push(peeled);
        id_of.insert(key, id);
        worklist.push_back(id);
        id
    }

    let start_node = resolve(&env, root);
    let start = intern(start_node, &mut id_of, &mut raw, &mut graph, &mut worklist);

    while let Some(id) = worklist.pop_front() {
        let node = raw[id.index()];
        for a in first_shallow(node) {
            if let Some(next) = step(owner, &env, node, &a)? {
                let next = resolve(&env, next);
                let nid = intern(next, &mut id_of, &mut raw, &mut graph, &mut worklist);
                graph.add_edge(id, nid, a);
            }
        }
    }

    let n = raw.len();
    let transitions: Vec<Vec<(Action, usize)>> = (0..n)
        .map(|i| {
            graph
                .edges(NodeIndex::new(i))
                .map(|e| (e.weight().clone(), e.target().index()))
                .collect()
        })
        .collect();
    let is_end: Vec<bool> = raw.iter().map(|n| matches!(n, LocalType::End)).collect();

    // Phase 2: Moore-style partition refinement, successive approximation.
    let mut class_of: Vec<usize> = vec![0; n];
    loop {
        let mut signature: HashMap<(bool, Vec<(String, usize)>), usize> = HashMap::new();
        let mut next_class = vec![0usize; n];
        for i in 0..n {
            let mut sig: Vec<(String, usize)> = transitions[i]
                .iter()
                .map(|(a, tgt)| (a.to_string(), class_of[*tgt]))
                .collect();
            sig.sort();
            let key = (is_end[i], sig);
            let next_id = signature.len();
            let class = *signature.entry(key).or_insert(next_id);
            next_class[i] = class;
        }
        if next_class == class_of {
            break;
        }
        class_of = next_class;
    }

    let num_classes = class_of.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    let mut class_is_end = vec![false; num_classes];
    let mut class_trans: Vec<Vec<(Action, usize)>> = vec![Vec::new(); num_classes];
    let mut seen_class: HashSet<usize> = HashSet::new();
    for i in 0..n {
        let c = class_of[i];
        if seen_class.insert(c) {
            class_is_end[c] = is_end[i];
            class_trans[c] = transitions[i]
                .iter()
                .map(|(a, tgt)| (a.clone(), class_of[*tgt]))
                .collect();
        }
    }

    // Phase 3: back-convert the minimised transition table to a tree,
    // introducing a fresh `rec` binder exactly where a cycle closes.
    let mut namegen = NameGen::new();
    let mut on_stack: HashMap<usize, String> = HashMap::new();
    let mut done: HashMap<usize, Rc<LocalType>> = HashMap::new();
    Ok(back_convert(
        class_of[start.index()],
        &class_trans,
        &class_is_end,
        &mut on_stack,
        &mut done,
        &mut namegen,
    )
    .as_ref()
    .clone())
}

fn back_convert(
    class: usize,
    trans: &[Vec<(Action, usize)>],
    is_end: &[bool],
    on_stack: &mut HashMap<usize, String>,
    done: &mut HashMap<usize, Rc<LocalType>>,
    namegen: &mut NameGen,
) -> Rc<LocalType> {
    if let Some(tvar) = on_stack.get(&class) {
        return Rc::new(LocalType::Var(tvar.clone()));
    }
    if let Some(cached) = done.get(&class) {
        return Rc::clone(cached);
    }

    let tvar = namegen.fresh("t");
    on_stack.insert(class, tvar.clone());

    let outs = &trans[class];
    let body = if outs.is_empty() {
        debug_assert!(is_end[class]);
        LocalType::End
    } else if outs.len() == 1 {
        let (a, tgt) = &outs[0];
        LocalType::Msg(
            a.clone(),
            back_convert(*tgt, trans, is_end, on_stack, done, namegen),
        )
    } else {
        LocalType::MChoice(
            outs.iter()
                .map(|(a, tgt)| (a.clone(), back_convert(*tgt, trans, is_end, on_stack, done, namegen)))
                .collect(),
        )
    };

    on_stack.remove(&class);
    let result = if body.mentions_var(&tvar) {
        Rc::new(LocalType::rec(tvar, body))
    } else {
        Rc::new(body)
    };
    done.insert(class, Rc::clone(&result));
    result
}

/// Whether `class` can reach itself in the minimised transition table —
/// used only for diagnostics (code generation derives recursion directly
/// from the `Rec`/`Var` shape `minimise` already produced).
pub fn is_recursive(class: usize, trans: &[Vec<(Action, usize)>]) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![class];
    while let Some(c) = stack.pop() {
        for (_, tgt) in &trans[c] {
            if *tgt == class {
                return true;
            }
            if seen.insert(*tgt) {
                stack.push(*tgt);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Polarity;

    #[test]
    fn duplicated_tail_states_collapse_to_one() {
        // `rec t { A!go; rec s { A!go; continue t } }` unrolls to two
        // syntactically distinct `A!go; ...` states that behave identically
        // (both loop forever on `A!go`); minimisation must collapse them.
        let inner = LocalType::rec(
            "s",
            LocalType::msg(
                Action::new("B", "A", Polarity::Recv, "go", vec![]),
                LocalType::Var("t".into()),
            ),
        );
        let outer = LocalType::rec(
            "t",
            LocalType::msg(Action::new("B", "A", Polarity::Recv, "go", vec![]), inner),
        );
        let minimised = minimise("B", &outer).unwrap();
        // A single self-loop state: Rec(t, Msg(a, Var(t))).
        match minimised {
            LocalType::Rec(_, body) => match body.as_ref() {
                LocalType::Msg(_, cont) => assert!(matches!(cont.as_ref(), LocalType::Var(_))),
                other => panic!("expected Msg, got {other:?}"),
            },
            other => panic!("expected Rec, got {other:?}"),
        }
    }

    #[test]
    fn terminating_chain_has_no_binder() {
        let lt = LocalType::msg(
            Action::new("A", "B", Polarity::Send, "go", vec![]),
            LocalType::End,
        );
        let minimised = minimise("A", &lt).unwrap();
        assert!(matches!(minimised, LocalType::Msg(_, _)));
    }
}
