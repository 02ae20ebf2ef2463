//! Table-driven predictive parser
//!
//! The parser is a stack machine over grammar symbols. It never recurses on
//! the host stack, so nesting depth is bounded by memory only.
//!
//! When more than one production of a nonterminal can start with the current
//! token, the first is tried and a [`ChoicePoint`] is recorded with a copy of
//! the symbol stack, the token position, the tree cursor and a mark into the
//! tree's undo journal. A later terminal mismatch restores the most recent
//! choice point and tries its next candidate. A choice point is committed
//! (dropped) when the node it opened is complete.
//!
//! Syntax errors never abort the parse: they are reported to the
//! [`Diagnostics`] sink and the parser resynchronizes. After one error,
//! further errors are suppressed until a terminal matches again.

use tracing::{debug, trace};

use super::ast::{Ast, NodeId, SourceLocation};
use super::grammar::{Grammar, NtId, Symbol, TermId};
use super::lexer::{LexError, Lexer, Token, TokenKind};
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Retry information for an ambiguous expansion
#[derive(Debug, Clone)]
struct ChoicePoint {
    nonterminal: NtId,
    /// Indices of the productions whose FIRST set matched
    candidates: Vec<usize>,
    /// Index into `candidates` currently being tried
    chosen: usize,
    position: usize,
    stack: Vec<Symbol>,
    cursor: Option<NodeId>,
    journal_mark: usize,
    /// Node opened by the current attempt
    node: NodeId,
}

/// Predictive parser over a token stream
pub struct Parser<'g> {
    grammar: &'g Grammar,
    tokens: Vec<Token>,
    position: usize,
    stack: Vec<Symbol>,
    history: Vec<ChoicePoint>,
    ast: Ast,
    current: Option<NodeId>,
    statement: Option<NtId>,
    recovering: bool,
    errors: usize,
}

impl Parser<'static> {
    /// Lex `source` and prepare to parse it with the built-in grammar
    pub fn new(source: &str) -> Result<Self, LexError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Parser::with_tokens(Grammar::builtin(), tokens))
    }
}

impl<'g> Parser<'g> {
    /// Parse `tokens` with `grammar`. A missing end sentinel is appended.
    pub fn with_tokens(grammar: &'g Grammar, mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_end) {
            let location = tokens.last().map(|t| t.location).unwrap_or_default();
            tokens.push(Token::end(location));
        }

        Parser {
            grammar,
            tokens,
            position: 0,
            stack: Vec::new(),
            history: Vec::new(),
            ast: Ast::new(),
            current: None,
            statement: grammar.nonterminal("statement"),
            recovering: false,
            errors: 0,
        }
    }

    /// Run the parser to completion and return the tree.
    ///
    /// Syntax errors are reported to `diagnostics`; the tree is still
    /// returned (with empty terminals where input was missing) so callers
    /// can decide whether to continue.
    pub fn parse_program(mut self, diagnostics: &mut Diagnostics) -> Ast {
        debug!(tokens = self.tokens.len(), "parsing");
        self.stack = vec![Symbol::End, Symbol::NonTerminal(self.grammar.start())];

        while let Some(symbol) = self.stack.pop() {
            if self.position >= self.tokens.len() {
                break;
            }
            match symbol {
                Symbol::NonTerminal(nt) => self.expand(nt, diagnostics),
                Symbol::Terminal(t) => self.expect(t, diagnostics),
                Symbol::Epsilon => self.attach(None),
                Symbol::End => {
                    let token = &self.tokens[self.position];
                    if !token.is_end() {
                        let found = token.to_string();
                        let location = token.location;
                        self.report(diagnostics, DiagnosticKind::TrailingInput { found }, location);
                    }
                    break;
                }
            }
        }

        if self.current.is_some() && self.errors == 0 {
            let location = self.tokens.last().map(|t| t.location).unwrap_or_default();
            self.report(diagnostics, DiagnosticKind::UnexpectedEnd, location);
        }

        debug!(nodes = self.ast.len(), errors = self.errors, "parsing finished");
        self.ast.end_journal();
        self.ast
    }

    // ===== Expansion =====

    fn expand(&mut self, nt: NtId, diagnostics: &mut Diagnostics) {
        let grammar = self.grammar;
        let first = grammar.first_sets();
        let token = &self.tokens[self.position];
        let candidates: Vec<usize> = grammar
            .productions(nt)
            .iter()
            .enumerate()
            .filter(|(_, production)| first.starts(grammar, production.first(), token))
            .map(|(index, _)| index)
            .collect();

        match candidates.len() {
            0 if first.is_nullable(nt) => {
                self.open(nt, 1);
                self.attach(None);
            }
            0 => {
                if !self.backtrack() {
                    self.nonterminal_error(nt, diagnostics);
                }
            }
            1 => {
                self.apply(nt, candidates[0]);
            }
            alternatives => {
                let production = candidates[0];
                self.ast.begin_journal();
                trace!(
                    nonterminal = &**grammar.name(nt),
                    alternatives,
                    position = self.position,
                    "choice point"
                );
                self.history.push(ChoicePoint {
                    nonterminal: nt,
                    candidates,
                    chosen: 0,
                    position: self.position,
                    stack: self.stack.clone(),
                    cursor: self.current,
                    journal_mark: self.ast.journal_len(),
                    node: 0,
                });
                let node = self.apply(nt, production);
                if let Some(point) = self.history.last_mut() {
                    point.node = node;
                }
            }
        }
    }

    /// Push a production's symbols (leftmost on top) and open its node
    fn apply(&mut self, nt: NtId, production: usize) -> NodeId {
        let grammar = self.grammar;
        let production = &grammar.productions(nt)[production];
        self.stack.extend(production.symbols.iter().rev());
        self.open(nt, production.len())
    }

    fn open(&mut self, nt: NtId, arity: usize) -> NodeId {
        let node = self.ast.open(
            self.current,
            self.grammar.name(nt).clone(),
            self.grammar.kind(nt),
            arity,
        );
        self.current = Some(node);
        node
    }

    // ===== Terminals =====

    fn expect(&mut self, terminal: TermId, diagnostics: &mut Diagnostics) {
        let token = &self.tokens[self.position];
        if token.matches(self.grammar.terminal_name(terminal)) {
            let token = token.clone();
            self.position += 1;
            self.recovering = false;
            self.attach(Some(token));
            return;
        }

        if !self.backtrack() {
            self.terminal_error(terminal, diagnostics);
        }
    }

    /// Attach a terminal to the open node, then close every node that is now
    /// complete, rotating operator tails on the way up.
    fn attach(&mut self, token: Option<Token>) {
        let Some(parent) = self.current else {
            return;
        };
        self.ast.push_terminal(parent, token);

        while let Some(node) = self.current {
            if !self.ast.is_complete(node) {
                break;
            }
            self.commit(node);
            let node = self.ast.rotate(node);
            self.current = self.ast.parent(node);
        }
    }

    // ===== Backtracking =====

    /// Drop choice points whose node just closed
    fn commit(&mut self, node: NodeId) {
        while self.history.last().is_some_and(|point| point.node == node) {
            self.history.pop();
        }
        if self.history.is_empty() {
            self.ast.end_journal();
        }
    }

    /// Restore the most recent choice point that still has an untried
    /// candidate and expand that candidate. Returns `false` when history is
    /// exhausted.
    fn backtrack(&mut self) -> bool {
        while let Some(point) = self.history.last_mut() {
            point.chosen += 1;
            if point.chosen < point.candidates.len() {
                let nt = point.nonterminal;
                let production = point.candidates[point.chosen];
                self.position = point.position;
                self.stack = point.stack.clone();
                self.current = point.cursor;
                self.ast.rollback(point.journal_mark);

                trace!(
                    nonterminal = &**self.grammar.name(nt),
                    production,
                    position = self.position,
                    "backtracking"
                );
                let node = self.apply(nt, production);
                if let Some(point) = self.history.last_mut() {
                    point.node = node;
                }
                return true;
            }
            self.history.pop();
        }

        self.ast.end_journal();
        false
    }

    // ===== Error recovery =====

    fn report(
        &mut self,
        diagnostics: &mut Diagnostics,
        kind: DiagnosticKind,
        location: SourceLocation,
    ) {
        if self.recovering {
            trace!(?kind, "suppressed follow-on syntax error");
            return;
        }
        self.recovering = true;
        self.errors += 1;
        diagnostics.report(kind, location);
    }

    fn nonterminal_error(&mut self, nt: NtId, diagnostics: &mut Diagnostics) {
        let token = self.tokens[self.position].clone();
        let expected = self.grammar.describe(Symbol::NonTerminal(nt));

        if token.is_end() {
            self.report(
                diagnostics,
                DiagnosticKind::UnexpectedToken {
                    found: token.to_string(),
                    expected,
                },
                token.location,
            );
            self.position = self.tokens.len();
            return;
        }

        let kind = if token.is(TokenKind::StringLiteral) {
            DiagnosticKind::StringArgument
        } else {
            DiagnosticKind::UnexpectedToken {
                found: token.to_string(),
                expected,
            }
        };
        self.report(diagnostics, kind, token.location);
        self.stack.push(Symbol::NonTerminal(nt));
        self.position += 1;
    }

    fn terminal_error(&mut self, terminal: TermId, diagnostics: &mut Diagnostics) {
        let token = self.tokens[self.position].clone();
        let expected = self.grammar.terminal_name(terminal);

        if expected == ";" && (self.starts_statement(&token) || token.is(TokenKind::RBrace)) {
            self.report(
                diagnostics,
                DiagnosticKind::MissingSemicolon {
                    found: token.to_string(),
                },
                token.location,
            );
        } else if self.position > 0 && self.tokens[self.position - 1].is(TokenKind::StringLiteral)
        {
            self.report(diagnostics, DiagnosticKind::StringArgument, token.location);
            self.skip_past_close_paren();
        } else {
            self.report(
                diagnostics,
                DiagnosticKind::UnexpectedToken {
                    found: token.to_string(),
                    expected: self.grammar.describe(Symbol::Terminal(terminal)),
                },
                token.location,
            );
            if !token.is_end() {
                self.position += 1;
            }
        }

        self.attach(None);
    }

    fn starts_statement(&self, token: &Token) -> bool {
        self.statement.is_some_and(|statement| {
            self.grammar
                .first_sets()
                .starts(self.grammar, Symbol::NonTerminal(statement), token)
        })
    }

    fn skip_past_close_paren(&mut self) {
        while let Some(token) = self.tokens.get(self.position) {
            if token.is_end() {
                return;
            }
            self.position += 1;
            if token.is(TokenKind::RParen) {
                return;
            }
        }
    }
}
