//! # Introduction
//!
//! predicc is the front end of a compiler for a small C-like language with
//! `int`, `float` and `boolean` values, methods, structured control flow and
//! three built-ins (`print`, `intInput`, `floatInput`).
//!
//! ## Pipeline
//!
//! ```text
//! Source → Lexer → Parser → Tree → Analyzer → Pruned, annotated tree
//! ```
//!
//! 1. [`parser`]: tokenises the source and parses it against a grammar
//!    loaded from text (the built-in one by default) into an arena tree.
//! 2. [`analyzer`]: resolves names and types, folds constants and prunes
//!    the tree in place.
//! 3. [`diagnostics`]: structured errors and warnings collected by every
//!    stage.
//! 4. [`dump`]: JSON view of a tree for inspection.
//!
//! ## Example
//!
//! ```
//! use predicc::analyzer::analyze;
//! use predicc::diagnostics::Diagnostics;
//! use predicc::parser::parse::Parser;
//!
//! let mut diagnostics = Diagnostics::new();
//! let mut ast = Parser::new("void main() { print(3 - 1 - 1); }")
//!     .unwrap()
//!     .parse_program(&mut diagnostics);
//! analyze(&mut ast, &mut diagnostics).unwrap();
//! assert!(!diagnostics.has_errors());
//! ```

pub mod analyzer;
pub mod diagnostics;
pub mod dump;
pub mod parser;
pub mod value;
