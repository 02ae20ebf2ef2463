//! FIRST sets
//!
//! For every nonterminal, the set of terminals that can begin one of its
//! derivations, plus ε when some production is exactly ε (or starts with a
//! nullable nonterminal, whose ε is carried over with the rest of its set).
//!
//! Only the first symbol of each production is inspected. Sets are computed
//! depth-first with a visited guard: a nonterminal reached again while it is
//! still being computed contributes what it has so far, so indirect cycles
//! terminate instead of recursing forever.

use rustc_hash::FxHashSet;

use super::grammar::{Grammar, NtId, Symbol, TermId};
use super::lexer::Token;

/// Member of a FIRST set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum First {
    Terminal(TermId),
    Epsilon,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstSets {
    sets: Vec<FxHashSet<First>>,
}

impl FirstSets {
    pub fn compute(grammar: &Grammar) -> FirstSets {
        let count = grammar.nonterminal_count();
        let mut sets = vec![FxHashSet::default(); count];
        let mut visited = vec![false; count];

        for nt in 0..count {
            visit(grammar, nt, &mut sets, &mut visited);
        }

        FirstSets { sets }
    }

    pub fn get(&self, nt: NtId) -> &FxHashSet<First> {
        &self.sets[nt]
    }

    pub fn is_nullable(&self, nt: NtId) -> bool {
        self.sets[nt].contains(&First::Epsilon)
    }

    /// Whether `symbol` can begin with `token`
    pub fn starts(&self, grammar: &Grammar, symbol: Symbol, token: &Token) -> bool {
        match symbol {
            Symbol::Terminal(t) => token.matches(grammar.terminal_name(t)),
            Symbol::NonTerminal(nt) => {
                token.kind.is_some()
                    && grammar
                        .terminal(token.terminal())
                        .is_some_and(|t| self.sets[nt].contains(&First::Terminal(t)))
            }
            Symbol::Epsilon | Symbol::End => false,
        }
    }
}

fn visit(grammar: &Grammar, nt: NtId, sets: &mut [FxHashSet<First>], visited: &mut [bool]) {
    if visited[nt] {
        return;
    }
    visited[nt] = true;

    for production in grammar.productions(nt) {
        match production.first() {
            Symbol::Terminal(t) => {
                sets[nt].insert(First::Terminal(t));
            }
            Symbol::NonTerminal(inner) => {
                visit(grammar, inner, sets, visited);
                if inner != nt {
                    let inherited: Vec<First> = sets[inner].iter().copied().collect();
                    sets[nt].extend(inherited);
                }
            }
            Symbol::Epsilon => {
                sets[nt].insert(First::Epsilon);
            }
            Symbol::End => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::Lexer;

    fn first_terminals(grammar: &Grammar, name: &str) -> Vec<String> {
        let nt = grammar.nonterminal(name).unwrap();
        let mut names: Vec<String> = grammar
            .first_sets()
            .get(nt)
            .iter()
            .map(|f| match f {
                First::Terminal(t) => grammar.terminal_name(*t).to_string(),
                First::Epsilon => "ε".to_string(),
            })
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_first_of_expression() {
        let grammar = Grammar::builtin();
        assert_eq!(
            first_terminals(grammar, "expression"),
            vec![
                "!", "(", "-", "false", "float-literal", "identifier", "int-literal", "true"
            ]
        );
    }

    #[test]
    fn test_nullable_sets() {
        let grammar = Grammar::builtin();
        let first = grammar.first_sets();
        for name in ["methods", "statements", "else-part", "arguments", "additive-tail"] {
            assert!(first.is_nullable(grammar.nonterminal(name).unwrap()), "{}", name);
        }
        for name in ["statement", "expression", "type"] {
            assert!(!first.is_nullable(grammar.nonterminal(name).unwrap()), "{}", name);
        }
    }

    #[test]
    fn test_recomputation_is_identical() {
        let grammar = Grammar::builtin();
        assert_eq!(&FirstSets::compute(grammar), grammar.first_sets());
    }

    #[test]
    fn test_cycles_terminate() {
        let grammar = Grammar::parse(
            "<a> ::= <b> \"x\" | \"y\"\n<b> ::= <a> \"z\" | \"w\"",
        )
        .unwrap();
        assert_eq!(first_terminals(&grammar, "a"), vec!["w", "y"]);
    }

    #[test]
    fn test_token_matching() {
        let grammar = Grammar::builtin();
        let first = grammar.first_sets();
        let tokens = Lexer::new("x 3 ; int").tokenize().unwrap();
        let expression = Symbol::NonTerminal(grammar.nonterminal("expression").unwrap());
        let statement = Symbol::NonTerminal(grammar.nonterminal("statement").unwrap());

        assert!(first.starts(grammar, expression, &tokens[0]));
        assert!(first.starts(grammar, expression, &tokens[1]));
        assert!(!first.starts(grammar, expression, &tokens[2]));
        assert!(first.starts(grammar, statement, &tokens[3]));
        assert!(!first.starts(grammar, statement, &tokens[4]));
    }
}
