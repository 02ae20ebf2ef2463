//! Grammar-driven parser
//!
//! This module turns source text into a concrete syntax tree:
//! - [`lexer`]: Tokenization (source text → tokens)
//! - [`grammar`]: Grammar loading from the BNF-like text format
//! - [`first`]: FIRST-set computation
//! - [`parse`]: Table-driven predictive parsing with backtracking
//! - [`ast`]: Arena tree with parent links and fold annotations
//! - [`rotation`]: Left-associativity fix-up of binary operator tails
//!
//! # Parser Implementation
//!
//! No parser generator: the built-in grammar is embedded as text, loaded at
//! first use, and driven by an explicit stack, so nesting depth is bounded
//! only by memory. Where several productions can start with the lookahead
//! token, the parser records a choice point and backtracks on failure.

pub mod ast;
pub mod first;
pub mod grammar;
pub mod lexer;
pub mod parse;
pub mod rotation;
