//! The global protocol tree (`GlobalType`), mentioning every role.

use crate::action::{GlobalParticipants, Label, Payload, Role};
use std::rc::Rc;

/// A named global protocol: its role list plus a `GlobalType` body.
#[derive(Debug, Clone)]
pub struct Protocol {
    pub name: String,
    pub roles: Vec<Role>,
    pub body: GlobalType,
}

impl Protocol {
    pub fn new(name: impl Into<String>, roles: Vec<Role>, body: GlobalType) -> Self {
        Protocol {
            name: name.into(),
            roles,
            body,
        }
    }
}

/// A two-party message transfer: sender, receiver, label and payload shape,
/// prior to being split into a polarity-carrying [`crate::action::Action`]
/// at projection time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTransfer {
    pub from: Role,
    pub to: Role,
    pub label: Label,
    pub payloads: Vec<Payload>,
}

impl MessageTransfer {
    pub fn participants(&self) -> GlobalParticipants {
        GlobalParticipants::new(self.from.clone(), self.to.clone())
    }
}

/// The global protocol tree.
#[derive(Debug, Clone)]
pub enum GlobalType {
    /// `end`
    End,
    /// `p -> q : label(...); cont`
    Msg(MessageTransfer, Rc<GlobalType>),
    /// `choice { g1 } or { g2 } or ...`, `n >= 1` branches.
    Choice(Vec<GlobalType>),
    /// `rec t { body }`
    Rec(String, Rc<GlobalType>),
    /// `continue t;`
    Var(String),
}

impl GlobalType {
    pub fn msg(from: impl Into<Role>, to: impl Into<Role>, label: impl Into<Label>, payloads: Vec<Payload>, cont: GlobalType) -> Self {
        GlobalType::Msg(
            MessageTransfer {
                from: from.into(),
                to: to.into(),
                label: label.into(),
                payloads,
            },
            Rc::new(cont),
        )
    }

    pub fn rec(tvar: impl Into<String>, body: GlobalType) -> Self {
        GlobalType::Rec(tvar.into(), Rc::new(body))
    }

    /// Every role mentioned anywhere in this type, participant or not.
    pub fn mentions_role(&self, role: &str) -> bool {
        match self {
            GlobalType::End | GlobalType::Var(_) => false,
            GlobalType::Msg(m, cont) => m.from == role || m.to == role || cont.mentions_role(role),
            GlobalType::Choice(branches) => branches.iter().any(|b| b.mentions_role(role)),
            GlobalType::Rec(_, body) => body.mentions_role(role),
        }
    }

    /// Whether `tvar` occurs free (i.e. unguarded by a shadowing binder) in
    /// this type — used by normalisation to drop unused `rec` binders.
    pub fn mentions_var(&self, tvar: &str) -> bool {
        match self {
            GlobalType::End => false,
            GlobalType::Var(t) => t == tvar,
            GlobalType::Msg(_, cont) => cont.mentions_var(tvar),
            GlobalType::Choice(branches) => branches.iter().any(|b| b.mentions_var(tvar)),
            GlobalType::Rec(t, body) => t != tvar && body.mentions_var(tvar),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_role_sees_through_choice_and_rec() {
        let g = GlobalType::rec(
            "t",
            GlobalType::Choice(vec![
                GlobalType::msg("A", "B", "go", vec![], GlobalType::Var("t".into())),
                GlobalType::msg("A", "C", "go", vec![], GlobalType::End),
            ]),
        );
        assert!(g.mentions_role("B"));
        assert!(g.mentions_role("C"));
        assert!(!g.mentions_role("D"));
    }

    #[test]
    fn mentions_var_respects_shadowing() {
        // `rec t. t` (inner) shadows the outer `t`, so the outer binder's
        // body never mentions the outer `t` free.
        let inner_shadowing_body = GlobalType::rec("t", GlobalType::Var("t".into()));
        assert!(!inner_shadowing_body.mentions_var("t"));

        // Without the inner binder, `t` is free in the body.
        let unshadowed_body = GlobalType::Var("t".into());
        assert!(unshadowed_body.mentions_var("t"));
    }
}
