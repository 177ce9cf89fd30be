//! Project a global type onto every role at once.
//!
//! Choice nodes need every role's view of every branch simultaneously (the
//! projectability check in [`crate::projectability`] compares them), so
//! projection is a single traversal producing the whole `Map<role,
//! LocalType>` rather than one independent call per role.

use crate::action::{Action, Polarity, Role};
use crate::ast::{GlobalType, LocalType, Protocol};
use indexmap::IndexMap;
use std::rc::Rc;

pub type Projections = IndexMap<Role, LocalType>;

/// `project(G, roles)`. The result still contains `LocalType::UnmergedChoice`
/// at every choice node — resolving those into canonical `MChoice` is
/// [`crate::projectability`]'s job.
pub fn project(protocol: &Protocol) -> Projections {
    project_type(&protocol.body, &protocol.roles)
}

fn project_type(g: &GlobalType, roles: &[Role]) -> Projections {
    match g {
        GlobalType::End => roles.iter().map(|r| (r.clone(), LocalType::End)).collect(),

        GlobalType::Var(t) => roles
            .iter()
            .map(|r| (r.clone(), LocalType::Var(t.clone())))
            .collect(),

        GlobalType::Msg(transfer, cont) => {
            let cont_map = project_type(cont, roles);
            let participants = transfer.participants();
            roles
                .iter()
                .map(|r| {
                    let cont_for_r = cont_map.get(r).cloned().unwrap_or(LocalType::End);
                    let lt = if *r == transfer.from {
                        let action = Action::new(
                            r.clone(),
                            transfer.to.clone(),
                            Polarity::Send,
                            transfer.label.clone(),
                            transfer.payloads.clone(),
                        );
                        LocalType::msg(action, cont_for_r)
                    } else if *r == transfer.to {
                        let action = Action::new(
                            r.clone(),
                            transfer.from.clone(),
                            Polarity::Recv,
                            transfer.label.clone(),
                            transfer.payloads.clone(),
                        );
                        LocalType::msg(action, cont_for_r)
                    } else {
                        debug_assert!(!participants.contains(r));
                        cont_for_r
                    };
                    (r.clone(), lt)
                })
                .collect()
        }

        GlobalType::Choice(branches) => {
            let branch_maps: Rc<Vec<Projections>> =
                Rc::new(branches.iter().map(|b| project_type(b, roles)).collect());
            roles
                .iter()
                .map(|r| {
                    (
                        r.clone(),
                        LocalType::UnmergedChoice(r.clone(), Rc::clone(&branch_maps)),
                    )
                })
                .collect()
        }

        GlobalType::Rec(t, body) => {
            let body_map = project_type(body, roles);
            roles
                .iter()
                .map(|r| {
                    let b = body_map.get(r).cloned().unwrap_or(LocalType::End);
                    let lt = if b.mentions_var(t) {
                        LocalType::rec(t.clone(), b)
                    } else {
                        b
                    };
                    (r.clone(), lt)
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Payload;

    fn ping_pong() -> Protocol {
        Protocol::new(
            "PingPong",
            vec!["A".into(), "B".into()],
            GlobalType::msg("A", "B", "ping", vec![], GlobalType::End),
        )
    }

    #[test]
    fn uninvolved_roles_are_projected_as_end() {
        let p = Protocol::new(
            "Relay",
            vec!["A".into(), "B".into(), "C".into()],
            GlobalType::msg("A", "B", "ping", vec![], GlobalType::End),
        );
        let proj = project(&p);
        assert!(proj["C"].is_end());
    }

    #[test]
    fn sender_and_receiver_get_dual_actions() {
        let proj = project(&ping_pong());
        match &proj["A"] {
            LocalType::Msg(a, _) => {
                assert_eq!(a.polarity, Polarity::Send);
                assert_eq!(a.peer, "B");
            }
            other => panic!("expected Msg, got {other:?}"),
        }
        match &proj["B"] {
            LocalType::Msg(a, _) => {
                assert_eq!(a.polarity, Polarity::Recv);
                assert_eq!(a.peer, "A");
            }
            other => panic!("expected Msg, got {other:?}"),
        }
    }

    #[test]
    fn payloads_are_carried_through() {
        let p = Protocol::new(
            "Transfer",
            vec!["A".into(), "B".into()],
            GlobalType::msg(
                "A",
                "B",
                "amount",
                vec![Payload {
                    name: "n".into(),
                    ty: "u64".into(),
                }],
                GlobalType::End,
            ),
        );
        let proj = project(&p);
        match &proj["B"] {
            LocalType::Msg(a, _) => assert_eq!(a.payloads[0].ty, "u64"),
            other => panic!("expected Msg, got {other:?}"),
        }
    }
}
