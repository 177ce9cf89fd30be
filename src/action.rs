//! The action model: a single send/receive event at one projected role.

use std::fmt;
use std::hash::{Hash, Hasher};

pub type Role = String;
pub type Label = String;

/// Whether an [`Action`] sends or receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Send,
    Recv,
}

impl Polarity {
    pub fn dual(self) -> Self {
        match self {
            Polarity::Send => Polarity::Recv,
            Polarity::Recv => Polarity::Send,
        }
    }

    pub fn is_send(self) -> bool {
        matches!(self, Polarity::Send)
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Polarity::Send => "!",
            Polarity::Recv => "?",
        })
    }
}

/// One payload slot in an action: a unique name within the action plus a
/// Rust type expression carried through to code generation verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub name: String,
    pub ty: String,
}

/// A send or receive event observed at one role: who the peer is, which way
/// the message moves, its label, and its payload shape.
///
/// Equality and hashing intentionally look only at `(peer, polarity,
/// label)` — payload types drive channel wiring during code generation but
/// do not distinguish one action from another during projection/DFA work.
#[derive(Debug, Clone)]
pub struct Action {
    pub proj_role: Role,
    pub peer: Role,
    pub polarity: Polarity,
    pub label: Label,
    pub payloads: Vec<Payload>,
}

impl Action {
    pub fn new(
        proj_role: impl Into<Role>,
        peer: impl Into<Role>,
        polarity: Polarity,
        label: impl Into<Label>,
        payloads: Vec<Payload>,
    ) -> Self {
        Action {
            proj_role: proj_role.into(),
            peer: peer.into(),
            polarity,
            label: label.into(),
            payloads,
        }
    }

    /// Swap sender/receiver and flip polarity.
    pub fn dual(&self) -> Self {
        Action {
            proj_role: self.peer.clone(),
            peer: self.proj_role.clone(),
            polarity: self.polarity.dual(),
            label: self.label.clone(),
            payloads: self.payloads.clone(),
        }
    }

    /// The key identity used by equality/hashing/the partial order on
    /// branch actions.
    fn identity(&self) -> (&str, Polarity, &str) {
        (&self.peer, self.polarity, &self.label)
    }

    /// The unordered pair of participants for this action's global form.
    pub fn participants(&self) -> GlobalParticipants {
        GlobalParticipants::new(self.proj_role.clone(), self.peer.clone())
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.peer, self.polarity, self.label)
    }
}

/// The unordered pair of participants in a two-party interaction, used by
/// the global type (which has no polarity, only "these two roles talk").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalParticipants(Role, Role);

impl GlobalParticipants {
    pub fn new(a: Role, b: Role) -> Self {
        if a <= b {
            GlobalParticipants(a, b)
        } else {
            GlobalParticipants(b, a)
        }
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0 == role || self.1 == role
    }

    pub fn other(&self, role: &str) -> Option<&str> {
        if self.0 == role {
            Some(&self.1)
        } else if self.1 == role {
            Some(&self.0)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(name: &str, ty: &str) -> Payload {
        Payload {
            name: name.to_string(),
            ty: ty.to_string(),
        }
    }

    #[test]
    fn dual_swaps_role_and_peer_and_flips_polarity() {
        let a = Action::new("A", "B", Polarity::Send, "ping", vec![]);
        let d = a.dual();
        assert_eq!(d.proj_role, "B");
        assert_eq!(d.peer, "A");
        assert_eq!(d.polarity, Polarity::Recv);
        assert_eq!(d.label, "ping");
    }

    #[test]
    fn equality_ignores_payload_types_and_names() {
        let a = Action::new("A", "B", Polarity::Send, "go", vec![payload("x", "u32")]);
        let b = Action::new("A", "B", Polarity::Send, "go", vec![payload("y", "String")]);
        assert_eq!(a, b);
    }

    #[test]
    fn equality_ignores_proj_role() {
        // Two actions with the same peer/polarity/label are the same action
        // even when observed from different projected roles.
        let a = Action::new("A", "B", Polarity::Send, "go", vec![]);
        let b = Action::new("C", "B", Polarity::Send, "go", vec![]);
        assert_eq!(a, b);
    }

    #[test]
    fn global_participants_is_order_independent() {
        assert_eq!(
            GlobalParticipants::new("A".into(), "B".into()),
            GlobalParticipants::new("B".into(), "A".into())
        );
    }
}
