//! The projectability decision: is a mixed choice one a single role
//! (or a communicating pair) can actually steer, possibly after splitting
//! its branches into independently-projectable partitions?

use crate::action::{Action, Role};
use crate::ast::LocalType;
use crate::error::{AnalysisError, Result};
use crate::fixpoint::FixpointTables;
use crate::projection::Projections;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Resolve every `UnmergedChoice` in every role's raw projection into the
/// canonical `MChoice` form, or fail with the first violated law found.
pub fn resolve_all(protocol_name: &str, roles: &[Role], raw: &Projections) -> Result<Projections> {
    let tables: HashMap<Role, FixpointTables> = roles
        .iter()
        .map(|r| (r.clone(), FixpointTables::build(r, &raw[r])))
        .collect();

    // Keyed by the address of the shared branch-map slice, so the same
    // logical choice node (seen once per role) is only decided once.
    let mut cache: HashMap<usize, std::result::Result<(), String>> = HashMap::new();
    let mut out = Projections::new();
    for r in roles {
        let resolved = resolve(protocol_name, r, &raw[r], roles, &tables, &mut cache)?;
        out.insert(r.clone(), resolved);
    }
    Ok(out)
}

fn resolve(
    protocol: &str,
    owner: &Role,
    lt: &LocalType,
    roles: &[Role],
    tables: &HashMap<Role, FixpointTables>,
    cache: &mut HashMap<usize, std::result::Result<(), String>>,
) -> Result<LocalType> {
    match lt {
        LocalType::End => Ok(LocalType::End),
        LocalType::Var(t) => Ok(LocalType::Var(t.clone())),
        LocalType::Msg(a, cont) => Ok(LocalType::msg(
            a.clone(),
            resolve(protocol, owner, cont, roles, tables, cache)?,
        )),
        LocalType::Rec(t, body) => Ok(LocalType::rec(
            t.clone(),
            resolve(protocol, owner, body, roles, tables, cache)?,
        )),
        LocalType::MChoice(branches) => {
            let mut out = Vec::with_capacity(branches.len());
            for (a, cont) in branches {
                out.push((
                    a.clone(),
                    Rc::new(resolve(protocol, owner, cont, roles, tables, cache)?),
                ));
            }
            Ok(LocalType::MChoice(out))
        }
        LocalType::UnmergedChoice(role, branches) => {
            debug_assert_eq!(role, owner);
            let ptr = branches.as_ptr() as usize;
            let decision = cache.entry(ptr).or_insert_with(|| {
                let all: Vec<usize> = (0..branches.len()).collect();
                check_partition(protocol, &all, branches, roles, tables, &mut HashMap::new())
                    .map_err(|e| e.to_string())
            });
            if let Err(reason) = decision {
                return Err(AnalysisError::NotProjectable {
                    protocol: protocol.to_string(),
                    reason: reason.clone(),
                });
            }

            let mut raw: Vec<(Action, Rc<LocalType>)> = Vec::new();
            for branch in branches.iter() {
                let own = branch
                    .get(owner)
                    .ok_or_else(|| AnalysisError::violation(protocol, "branch missing own role"))?;
                match resolve(protocol, owner, own, roles, tables, cache)? {
                    LocalType::MChoice(sub) => raw.extend(sub),
                    LocalType::Msg(a, cont) => raw.push((a, cont)),
                    LocalType::End => {}
                    LocalType::Rec(..) | LocalType::Var(..) => {
                        return Err(AnalysisError::InconsistentChoice {
                            protocol: protocol.to_string(),
                            role: owner.clone(),
                            detail: "a choice branch must start with a concrete action, not a bare recursion step".into(),
                        });
                    }
                    LocalType::UnmergedChoice(..) => {
                        return Err(AnalysisError::violation(protocol, "unresolved choice survived resolution"));
                    }
                }
            }

            // Two branches agreeing on the exact same leading action are a
            // single state from `owner`'s point of view, not a conflict,
            // provided the payload shape and the continuation's own first
            // actions agree too. A payload mismatch is `InconsistentChoiceLabel`;
            // a continuation that actually diverges is `NotTraceEquivalent`.
            let mut leading: Vec<(Action, Rc<LocalType>)> = Vec::new();
            'raw: for (a, cont) in raw {
                for (merged_a, merged_cont) in leading.iter() {
                    if merged_a != &a {
                        continue;
                    }
                    if merged_a.payloads != a.payloads {
                        return Err(AnalysisError::InconsistentChoiceLabel {
                            protocol: protocol.to_string(),
                            label: a.label.clone(),
                        });
                    }
                    if !same_first_actions(merged_cont, &cont) {
                        return Err(AnalysisError::NotTraceEquivalent {
                            protocol: protocol.to_string(),
                            role: owner.clone(),
                        });
                    }
                    continue 'raw;
                }
                leading.push((a, cont));
            }
            Ok(LocalType::MChoice(leading))
        }
    }
}

/// The decision for one bag of branch indices.
fn check_partition(
    protocol: &str,
    branch_idxs: &[usize],
    branches: &[IndexMap<Role, LocalType>],
    roles: &[Role],
    tables: &HashMap<Role, FixpointTables>,
    memo: &mut HashMap<Vec<usize>, std::result::Result<(), AnalysisError>>,
) -> std::result::Result<(), AnalysisError> {
    let mut key = branch_idxs.to_vec();
    key.sort_unstable();
    if let Some(cached) = memo.get(&key) {
        return cached.clone_err();
    }

    let leaders = match compute_leaders(protocol, branch_idxs, branches, roles, tables) {
        Ok(l) => l,
        Err(e) => return Err(e),
    };

    let accept = match leaders.len() {
        0 | 1 => true,
        2 => {
            let (r1, r2) = (&leaders[0], &leaders[1]);
            only_talk_to_each_other(branch_idxs, branches, r1, r2)
                || is_partial_behaviour_sound(branch_idxs, branches, tables, r1, r2)
        }
        _ => false,
    };

    let result = if accept {
        Ok(())
    } else {
        split(protocol, branch_idxs, branches, roles, tables, memo).map_err(|_| {
            AnalysisError::NotProjectable {
                protocol: protocol.to_string(),
                reason: format!(
                    "{} leaders ({}) and no admissible split of branches {:?}",
                    leaders.len(),
                    leaders.join(", "),
                    branch_idxs
                ),
            }
        })
    };
    memo.insert(key, result.clone_err());
    result
}

/// `AnalysisError` is not `Clone` (it wraps `io::Error`); the memo table
/// stores a string-flattened copy and re-wraps it as `NotProjectable` on a
/// cache hit, since the original diagnostic has already been reported once.
trait CloneErr {
    fn clone_err(&self) -> std::result::Result<(), AnalysisError>;
}
impl CloneErr for std::result::Result<(), AnalysisError> {
    fn clone_err(&self) -> std::result::Result<(), AnalysisError> {
        match self {
            Ok(()) => Ok(()),
            Err(e) => Err(AnalysisError::NotProjectable {
                protocol: String::new(),
                reason: e.to_string(),
            }),
        }
    }
}

/// `r`'s aggregated first-action set across every branch in `branch_idxs`.
fn partition_first(
    protocol: &str,
    branch_idxs: &[usize],
    branches: &[IndexMap<Role, LocalType>],
    tables: &HashMap<Role, FixpointTables>,
    r: &Role,
) -> Result<HashSet<Action>> {
    let mut acc = HashSet::new();
    for &i in branch_idxs {
        let lt = branches[i]
            .get(r)
            .ok_or_else(|| AnalysisError::violation(protocol, "branch missing role"))?;
        acc.extend(tables[r].first(r, lt)?);
    }
    Ok(acc)
}

/// The leaders of `branch_idxs`: roles whose first-action set differs
/// between at least two branches in the bag.
fn compute_leaders(
    protocol: &str,
    branch_idxs: &[usize],
    branches: &[IndexMap<Role, LocalType>],
    roles: &[Role],
    tables: &HashMap<Role, FixpointTables>,
) -> Result<Vec<Role>> {
    let mut leaders = Vec::new();
    for r in roles {
        let bag = partition_first(protocol, branch_idxs, branches, tables, r)?;
        let mut is_leader = false;
        for &i in branch_idxs {
            let lt = branches[i]
                .get(r)
                .ok_or_else(|| AnalysisError::violation(protocol, "branch missing role"))?;
            if tables[r].first(r, lt)? != bag {
                is_leader = true;
                break;
            }
        }
        if is_leader {
            leaders.push(r.clone());
        }
    }
    Ok(leaders)
}

/// The admissibility bound: a split is only a candidate worth trying when at
/// most one role's aggregated first-action set actually differs between the
/// two halves. A split that disagrees on two or more roles splits apart
/// roles that still need to coordinate through the choice, which no
/// recursive partitioning can repair.
fn admissible_split(
    protocol: &str,
    p1: &[usize],
    p2: &[usize],
    branches: &[IndexMap<Role, LocalType>],
    roles: &[Role],
    tables: &HashMap<Role, FixpointTables>,
) -> bool {
    roles
        .iter()
        .filter(|r| {
            let f1 = partition_first(protocol, p1, branches, tables, r).unwrap_or_default();
            let f2 = partition_first(protocol, p2, branches, tables, r).unwrap_or_default();
            f1 != f2
        })
        .count()
        <= 1
}

/// Whether two merged-candidate continuations offer the same first actions —
/// the DFA-merge check: two branches an owner cannot tell
/// apart must behave identically going forward, or no deterministic
/// automaton exists for that owner.
fn same_first_actions(a: &LocalType, b: &LocalType) -> bool {
    let fa: HashSet<Action> = crate::dfa::first_shallow(a).into_iter().collect();
    let fb: HashSet<Action> = crate::dfa::first_shallow(b).into_iter().collect();
    fa == fb
}

fn only_talk_to_each_other(
    branch_idxs: &[usize],
    branches: &[IndexMap<Role, LocalType>],
    r1: &Role,
    r2: &Role,
) -> bool {
    branch_idxs.iter().all(|&i| {
        let peer_ok = |role: &Role| -> bool {
            let other = if role == r1 { r2 } else { r1 };
            match branches[i].get(role) {
                Some(LocalType::Msg(a, _)) => &a.peer == other,
                Some(LocalType::MChoice(sub)) => sub.iter().all(|(a, _)| &a.peer == other),
                _ => true,
            }
        };
        peer_ok(r1) && peer_ok(r2)
    })
}

/// Gate for the two-leader "partial behaviour" admissibility condition:
/// a leader pair is still sound if one of the two
/// roles offers the *same* first-action set in every branch of the bag —
/// i.e. only one of the two roles actually discriminates between branches,
/// so the other can be driven by whichever branch is eventually taken.
fn is_partial_behaviour_sound(
    branch_idxs: &[usize],
    branches: &[IndexMap<Role, LocalType>],
    tables: &HashMap<Role, FixpointTables>,
    r1: &Role,
    r2: &Role,
) -> bool {
    let stable = |r: &Role| -> bool {
        let mut seen: Option<HashSet<Action>> = None;
        for &i in branch_idxs {
            let Some(lt) = branches[i].get(r) else {
                return false;
            };
            let Ok(f) = tables[r].first(r, lt) else {
                return false;
            };
            match &seen {
                None => seen = Some(f),
                Some(prev) if prev == &f => {}
                Some(_) => return false,
            }
        }
        true
    };
    stable(r1) || stable(r2)
}

/// Try to split `branch_idxs` into two admissible partitions and recurse.
/// Candidates come from a union-find grouping of branches by the pair of
/// roles whose first action actually changes between them, plus an
/// exhaustive bipartition search over the (small, in practice) remaining
/// space; both sources are filtered down to splits that satisfy
/// [`admissible_split`]'s bound and then tried in order of how many roles
/// each side would leave as leaders, smallest total first.
fn split(
    protocol: &str,
    branch_idxs: &[usize],
    branches: &[IndexMap<Role, LocalType>],
    roles: &[Role],
    tables: &HashMap<Role, FixpointTables>,
    memo: &mut HashMap<Vec<usize>, std::result::Result<(), AnalysisError>>,
) -> std::result::Result<(), AnalysisError> {
    if branch_idxs.len() < 2 {
        return Err(AnalysisError::NotProjectable {
            protocol: protocol.to_string(),
            reason: "single branch is not splittable".into(),
        });
    }

    for (p1, p2) in candidate_splits(protocol, branch_idxs, branches, roles, tables) {
        if check_partition(protocol, &p1, branches, roles, tables, memo).is_ok()
            && check_partition(protocol, &p2, branches, roles, tables, memo).is_ok()
        {
            return Ok(());
        }
    }
    Err(AnalysisError::NotProjectable {
        protocol: protocol.to_string(),
        reason: "no admissible split found".into(),
    })
}

/// Union-find over branch positions, used to group branches that share the
/// same distinguishing role pair.
struct UnionFind {
    parent: RefCell<Vec<usize>>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: RefCell::new((0..n).collect()),
        }
    }

    fn find(&self, x: usize) -> usize {
        let p = self.parent.borrow()[x];
        if p == x {
            x
        } else {
            let root = self.find(p);
            self.parent.borrow_mut()[x] = root;
            root
        }
    }

    fn union(&self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent.borrow_mut()[ra] = rb;
        }
    }
}

fn candidate_splits(
    protocol: &str,
    branch_idxs: &[usize],
    branches: &[IndexMap<Role, LocalType>],
    roles: &[Role],
    tables: &HashMap<Role, FixpointTables>,
) -> Vec<(Vec<usize>, Vec<usize>)> {
    let n = branch_idxs.len();
    let uf = UnionFind::new(n);
    let pos_of: HashMap<usize, usize> = branch_idxs.iter().enumerate().map(|(p, &b)| (b, p)).collect();

    let bag_first = |r: &Role| -> HashSet<Action> {
        let mut acc = HashSet::new();
        for &i in branch_idxs {
            if let Some(lt) = branches[i].get(r) {
                acc.extend(tables[r].first(r, lt).unwrap_or_default());
            }
        }
        acc
    };
    let bags: HashMap<Role, HashSet<Action>> = roles.iter().map(|r| (r.clone(), bag_first(r))).collect();

    for r in roles {
        // Branches that agree on `r`'s first-action set, where that set
        // differs from the whole bag's, share a distinguishing role and so
        // are unioned into the same candidate group.
        let mut by_fi: HashMap<Vec<Action>, Vec<usize>> = HashMap::new();
        for &i in branch_idxs {
            let Some(lt) = branches[i].get(r) else { continue };
            let Ok(fi) = tables[r].first(r, lt) else { continue };
            if fi != bags[r] {
                let mut key: Vec<Action> = fi.into_iter().collect();
                key.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
                by_fi.entry(key).or_default().push(i);
            }
        }
        for group in by_fi.values() {
            for w in group.windows(2) {
                uf.union(pos_of[&w[0]], pos_of[&w[1]]);
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for &i in branch_idxs {
        groups.entry(uf.find(pos_of[&i])).or_default().push(i);
    }
    let components: Vec<Vec<usize>> = groups.into_values().collect();

    let mut out = Vec::new();
    if components.len() >= 2 {
        let k = components.len();
        for mask in 1..(1u32 << k) - 1 {
            let mut p1 = Vec::new();
            let mut p2 = Vec::new();
            for (idx, comp) in components.iter().enumerate() {
                if mask & (1 << idx) != 0 {
                    p1.extend(comp.iter().copied());
                } else {
                    p2.extend(comp.iter().copied());
                }
            }
            out.push((p1, p2));
        }
    }

    if n <= 12 {
        for mask in 1..(1u32 << n) - 1 {
            let mut p1 = Vec::new();
            let mut p2 = Vec::new();
            for (pos, &b) in branch_idxs.iter().enumerate() {
                if mask & (1 << pos) != 0 {
                    p1.push(b);
                } else {
                    p2.push(b);
                }
            }
            out.push((p1, p2));
        }
    }

    // A singleton group is trivially "projectable" in isolation (there is no
    // choice left to make), but that alone never gives any role a way to
    // tell it apart from its sibling group — so a split is only a real
    // admissible partition, not a rejection in disguise, when both halves
    // still contain an actual choice. Beyond that, keep only splits that
    // satisfy the admissibility bound, and try the ones that would leave the
    // fewest roles as leaders first.
    let mut scored: Vec<(usize, (Vec<usize>, Vec<usize>))> = out
        .into_iter()
        .filter(|(p1, p2)| p1.len() >= 2 && p2.len() >= 2)
        .filter(|(p1, p2)| admissible_split(protocol, p1, p2, branches, roles, tables))
        .filter_map(|(p1, p2)| {
            let l1 = compute_leaders(protocol, &p1, branches, roles, tables).ok()?.len();
            let l2 = compute_leaders(protocol, &p2, branches, roles, tables).ok()?.len();
            Some((l1 + l2, (p1, p2)))
        })
        .collect();
    scored.sort_by_key(|(score, _)| *score);

    let mut seen: HashSet<(Vec<usize>, Vec<usize>)> = HashSet::new();
    scored
        .into_iter()
        .filter(|(_, (p1, p2))| {
            let mut a = p1.clone();
            a.sort_unstable();
            let mut b = p2.clone();
            b.sort_unstable();
            let key = if a <= b { (a, b) } else { (b, a) };
            seen.insert(key)
        })
        .map(|(_, pair)| pair)
        .collect()
}
