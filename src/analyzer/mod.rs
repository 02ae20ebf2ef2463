//! Semantic analysis and pruning
//!
//! This module checks a parsed program and rewrites its tree in place:
//! - [`engine`]: Analyzer state and the [`analyze`] entry point
//! - [`scope`]: Scope, variable and method tables
//! - [`errors`]: Fatal analysis errors
//!
//! # Stages
//!
//! 1. Method collection: every signature is read off the method spine and
//!    `void main()` is moved to the front.
//! 2. Scope and control-flow analysis of each body: declarations, jumps,
//!    missing returns, dead code after a jump.
//! 3. Expression typing and constant folding, interleaved with stage 2.
//!    Folded values are stored on the expression nodes.
//! 4. Pruning: unreachable methods, unused variables, dead code and folded
//!    definitions are removed; values read inside loops are re-materialized
//!    in front of the loop.
//!
//! Semantic problems are reported to the caller's
//! [`Diagnostics`](crate::diagnostics::Diagnostics); only a missing entry
//! point or an incomplete tree stops analysis.

pub mod builtins;
pub mod engine;
pub mod errors;
mod expressions;
mod loops;
mod methods;
mod prune;
pub mod scope;
mod statements;

pub use engine::{analyze, Analysis, Analyzer};
pub use errors::AnalysisError;
