//! Projection, projectability and DFA normalisation for multiparty session
//! types with mixed choice, plus code generation targeting `tokio`
//! channels.
//!
//! The pipeline a source file goes through end to end:
//! parse ([`parser`]) → normalise ([`normalize`]) → project ([`projection`])
//! → resolve mixed choice into canonical local types ([`projectability`],
//! backed by [`fixpoint`]) → minimise into a DFA-equivalent tree ([`dfa`])
//! → generate role modules ([`codegen`]). [`driver`] wires the whole thing
//! together for the [`crate::config::Options`] the CLI binary builds.

pub mod action;
pub mod ast;
pub mod codegen;
pub mod config;
pub mod dfa;
pub mod driver;
pub mod error;
pub mod fixpoint;
pub mod namegen;
pub mod normalize;
pub mod parser;
pub mod projectability;
pub mod projection;

pub use ast::{GlobalType, LocalType, Protocol};
pub use error::{AnalysisError, Result};
