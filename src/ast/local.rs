//! The local protocol tree (`LocalType`), one role's viewpoint.

use crate::action::{Action, Role};
use indexmap::IndexMap;
use std::rc::Rc;

/// The local protocol tree. `UnmergedChoice` is a projection intermediate
/// it is produced by [`crate::projection::project`] and
/// consumed exactly once by [`crate::projectability`], which replaces every
/// occurrence with the canonical [`LocalType::MChoice`] form. No other
/// module should ever construct or match on `UnmergedChoice`.
#[derive(Debug, Clone)]
pub enum LocalType {
    End,
    Msg(Action, Rc<LocalType>),
    Rec(String, Rc<LocalType>),
    Var(String),
    /// The canonical post-check choice: every branch starts with a
    /// distinct leading action. Code generation only ever sees this form.
    MChoice(Vec<(Action, Rc<LocalType>)>),
    /// `project(GChoice([g1..gn]), role)`: for each branch, the full
    /// per-role projection map, so the projectability check can inspect
    /// every role's first-action set without re-projecting. The branch
    /// vector is `Rc`-shared across every role's copy of this node, so the
    /// projectability check can memoise its decision per choice rather than
    /// per (choice, role).
    UnmergedChoice(Role, Rc<Vec<IndexMap<Role, LocalType>>>),
}

impl LocalType {
    pub fn msg(action: Action, cont: LocalType) -> Self {
        LocalType::Msg(action, Rc::new(cont))
    }

    pub fn rec(tvar: impl Into<String>, body: LocalType) -> Self {
        LocalType::Rec(tvar.into(), Rc::new(body))
    }

    pub fn is_end(&self) -> bool {
        matches!(self, LocalType::End)
    }

    /// Whether `tvar` occurs free in this type — used to drop unused
    /// `rec` binders during normalisation.
    pub fn mentions_var(&self, tvar: &str) -> bool {
        match self {
            LocalType::End => false,
            LocalType::Var(t) => t == tvar,
            LocalType::Msg(_, cont) => cont.mentions_var(tvar),
            LocalType::Rec(t, body) => t != tvar && body.mentions_var(tvar),
            LocalType::MChoice(branches) => branches.iter().any(|(_, k)| k.mentions_var(tvar)),
            LocalType::UnmergedChoice(_, projections) => projections
                .iter()
                .any(|m| m.values().any(|l| l.mentions_var(tvar))),
        }
    }

    /// Render as the surface `choice { ... } or { ... }` textual form used
    /// for `--project` output and diagnostics. Only meaningful once every
    /// `UnmergedChoice` has been resolved to `MChoice`.
    pub fn to_text(&self, indent: usize) -> String {
        let pad = "  ".repeat(indent);
        match self {
            LocalType::End => format!("{pad}end"),
            LocalType::Var(t) => format!("{pad}continue {t};"),
            LocalType::Msg(a, cont) => {
                format!("{pad}{a};\n{}", cont.to_text(indent))
            }
            LocalType::Rec(t, body) => {
                format!("{pad}rec {t} {{\n{}\n{pad}}}", body.to_text(indent + 1))
            }
            LocalType::MChoice(branches) => {
                let branches: Vec<String> = branches
                    .iter()
                    .map(|(a, k)| {
                        format!(
                            "{pad}{{\n{}{};\n{}\n{pad}}}",
                            "  ".repeat(indent + 1),
                            a,
                            k.to_text(indent + 1)
                        )
                    })
                    .collect();
                format!("{pad}choice\n{}", branches.join(&format!("\n{pad}or\n")))
            }
            LocalType::UnmergedChoice(..) => format!("{pad}<unresolved choice>"),
        }
    }
}

impl std::fmt::Display for LocalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text(0))
    }
}
