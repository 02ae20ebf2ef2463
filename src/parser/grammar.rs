//! Grammar table and its definition language
//!
//! A grammar is written one entry per nonterminal:
//!
//! ```text
//! <statement> ::= <declaration> | "break" ";" | ε
//! ```
//!
//! `<name>` references a nonterminal, `"text"` is a terminal (either a token
//! category such as `"identifier"` or a literal spelling such as `";"`), and
//! `ε` (or `E`) is the empty production. A line starting with `|` continues
//! the previous entry; `#` starts a comment line. The first entry is the start
//! symbol.
//!
//! Names are interned into dense ids so parser stack entries are `Copy`.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::ast::Kind;
use super::first::FirstSets;

/// Nonterminal id
pub type NtId = usize;
/// Terminal id
pub type TermId = usize;

/// One grammar symbol as it appears on the parser stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(TermId),
    NonTerminal(NtId),
    Epsilon,
    /// Bottom-of-stack marker, matched by the end-of-input sentinel
    End,
}

/// One alternative right-hand side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub symbols: Vec<Symbol>,
}

impl Production {
    pub fn first(&self) -> Symbol {
        self.symbols.first().copied().unwrap_or(Symbol::Epsilon)
    }

    pub fn is_epsilon(&self) -> bool {
        matches!(self.symbols.as_slice(), [Symbol::Epsilon])
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Grammar loading error
#[derive(Debug, Clone)]
pub struct GrammarError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grammar error at line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for GrammarError {}

/// Grammar of the language, embedded at build time
pub const BUILTIN_GRAMMAR: &str = include_str!("grammar.bnf");

/// A loaded grammar with its FIRST sets
#[derive(Debug, Clone)]
pub struct Grammar {
    names: Vec<Arc<str>>,
    kinds: Vec<Kind>,
    productions: Vec<Vec<Production>>,
    nonterminal_ids: FxHashMap<String, NtId>,
    terminals: Vec<String>,
    terminal_ids: FxHashMap<String, TermId>,
    first: FirstSets,
}

impl Grammar {
    /// The built-in grammar, parsed on first use and shared for the process.
    ///
    /// # Panics
    ///
    /// If the embedded grammar text is malformed, which the unit tests rule out.
    pub fn builtin() -> &'static Grammar {
        static BUILTIN: OnceLock<Grammar> = OnceLock::new();
        BUILTIN.get_or_init(|| match Grammar::parse(BUILTIN_GRAMMAR) {
            Ok(grammar) => grammar,
            Err(e) => panic!("embedded grammar is invalid: {}", e),
        })
    }

    /// Parse a grammar definition and compute its FIRST sets
    pub fn parse(text: &str) -> Result<Grammar, GrammarError> {
        let mut builder = Builder::default();
        let mut current: Option<NtId> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (owner, body) = if let Some(rest) = line.strip_prefix('|') {
                let owner = current.ok_or_else(|| GrammarError {
                    line: line_no,
                    message: "continuation line before any entry".to_string(),
                })?;
                (owner, rest)
            } else {
                let (head, body) = line.split_once("::=").ok_or_else(|| GrammarError {
                    line: line_no,
                    message: format!("expected `<name> ::= ...`, found `{}`", line),
                })?;
                let name = bracketed(head.trim()).ok_or_else(|| GrammarError {
                    line: line_no,
                    message: format!("invalid nonterminal `{}`", head.trim()),
                })?;
                let id = builder.nonterminal(name);
                if builder.defined[id] {
                    return Err(GrammarError {
                        line: line_no,
                        message: format!("<{}> is defined twice", name),
                    });
                }
                builder.defined[id] = true;
                builder.first_use[id].get_or_insert(line_no);
                (id, body)
            };

            let alternatives = builder.alternatives(body, line_no)?;
            builder.productions[owner].extend(alternatives);
            current = Some(owner);
        }

        builder.finish()
    }

    /// Start symbol (the first entry)
    pub fn start(&self) -> NtId {
        0
    }

    pub fn nonterminal_count(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, nt: NtId) -> &Arc<str> {
        &self.names[nt]
    }

    pub fn kind(&self, nt: NtId) -> Kind {
        self.kinds[nt]
    }

    pub fn nonterminal(&self, name: &str) -> Option<NtId> {
        self.nonterminal_ids.get(name).copied()
    }

    pub fn productions(&self, nt: NtId) -> &[Production] {
        &self.productions[nt]
    }

    pub fn terminal_name(&self, t: TermId) -> &str {
        &self.terminals[t]
    }

    pub fn terminal(&self, name: &str) -> Option<TermId> {
        self.terminal_ids.get(name).copied()
    }

    pub fn first_sets(&self) -> &FirstSets {
        &self.first
    }

    /// Human-readable form of a symbol for diagnostics
    pub fn describe(&self, symbol: Symbol) -> String {
        match symbol {
            Symbol::Terminal(t) => format!("'{}'", self.terminals[t]),
            Symbol::NonTerminal(nt) => format!("<{}>", self.names[nt]),
            Symbol::Epsilon => "nothing".to_string(),
            Symbol::End => "end of file".to_string(),
        }
    }
}

fn close_alternative(symbols: Vec<Symbol>, line: usize) -> Result<Production, GrammarError> {
    let message = if symbols.is_empty() {
        "empty alternative (write ε)"
    } else if symbols.len() > 1 && symbols.contains(&Symbol::Epsilon) {
        "ε must be an alternative on its own"
    } else {
        return Ok(Production { symbols });
    };
    Err(GrammarError {
        line,
        message: message.to_string(),
    })
}

fn bracketed(text: &str) -> Option<&str> {
    let name = text.strip_prefix('<')?.strip_suffix('>')?;
    (!name.is_empty() && !name.contains(char::is_whitespace)).then_some(name)
}

#[derive(Default)]
struct Builder {
    names: Vec<String>,
    nonterminal_ids: FxHashMap<String, NtId>,
    defined: Vec<bool>,
    first_use: Vec<Option<usize>>,
    productions: Vec<Vec<Production>>,
    terminals: Vec<String>,
    terminal_ids: FxHashMap<String, TermId>,
}

impl Builder {
    fn nonterminal(&mut self, name: &str) -> NtId {
        if let Some(&id) = self.nonterminal_ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.nonterminal_ids.insert(name.to_string(), id);
        self.defined.push(false);
        self.first_use.push(None);
        self.productions.push(Vec::new());
        id
    }

    fn terminal(&mut self, name: &str) -> TermId {
        if let Some(&id) = self.terminal_ids.get(name) {
            return id;
        }
        let id = self.terminals.len();
        self.terminals.push(name.to_string());
        self.terminal_ids.insert(name.to_string(), id);
        id
    }

    /// Split an entry body into productions. `|` separates alternatives
    /// except inside a quoted terminal.
    fn alternatives(&mut self, body: &str, line: usize) -> Result<Vec<Production>, GrammarError> {
        let error = |message: String| GrammarError { line, message };
        let mut productions = Vec::new();
        let mut symbols = Vec::new();
        let mut rest = body.trim_start();

        loop {
            if rest.is_empty() || rest.starts_with('|') {
                productions.push(close_alternative(std::mem::take(&mut symbols), line)?);
                match rest.strip_prefix('|') {
                    Some(after) => rest = after.trim_start(),
                    None => break,
                }
                continue;
            }

            if let Some(quoted) = rest.strip_prefix('"') {
                let end = quoted
                    .find('"')
                    .ok_or_else(|| error(format!("unterminated terminal in `{}`", body.trim())))?;
                if end == 0 {
                    return Err(error("empty terminal \"\"".to_string()));
                }
                symbols.push(Symbol::Terminal(self.terminal(&quoted[..end])));
                rest = &quoted[end + 1..];
            } else {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '|')
                    .unwrap_or(rest.len());
                let word = &rest[..end];
                if word == "ε" || word == "E" {
                    symbols.push(Symbol::Epsilon);
                } else {
                    let name = bracketed(word)
                        .ok_or_else(|| error(format!("unexpected symbol `{}`", word)))?;
                    let id = self.nonterminal(name);
                    self.first_use[id].get_or_insert(line);
                    symbols.push(Symbol::NonTerminal(id));
                }
                rest = &rest[end..];
            }
            rest = rest.trim_start();
        }

        Ok(productions)
    }

    fn finish(self) -> Result<Grammar, GrammarError> {
        if self.names.is_empty() {
            return Err(GrammarError {
                line: 0,
                message: "grammar has no entries".to_string(),
            });
        }
        if let Some(missing) = self.defined.iter().position(|defined| !defined) {
            return Err(GrammarError {
                line: self.first_use[missing].unwrap_or(0),
                message: format!("<{}> is used but never defined", self.names[missing]),
            });
        }

        let names: Vec<Arc<str>> = self.names.iter().map(|n| Arc::from(n.as_str())).collect();
        let kinds = self.names.iter().map(|n| Kind::from_label(n)).collect();
        let mut grammar = Grammar {
            names,
            kinds,
            productions: self.productions,
            nonterminal_ids: self.nonterminal_ids,
            terminals: self.terminals,
            terminal_ids: self.terminal_ids,
            first: FirstSets::default(),
        };
        grammar.first = FirstSets::compute(&grammar);
        Ok(grammar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_grammar_loads() {
        let grammar = Grammar::builtin();
        assert_eq!(&**grammar.name(grammar.start()), "program");
        assert_eq!(grammar.kind(grammar.start()), Kind::Program);

        let statement = grammar.nonterminal("statement").unwrap();
        assert_eq!(grammar.productions(statement).len(), 10);
        assert!(grammar.terminal("identifier").is_some());
        assert!(grammar.terminal("<=").is_some());
    }

    #[test]
    fn test_builtin_kinds_are_all_known() {
        let grammar = Grammar::builtin();
        for nt in 0..grammar.nonterminal_count() {
            assert_ne!(grammar.kind(nt), Kind::Other, "<{}>", grammar.name(nt));
        }
    }

    #[test]
    fn test_continuation_and_epsilon() {
        let grammar = Grammar::parse(
            "# list\n<list> ::= \"x\" <list>\n    | ε\n",
        )
        .unwrap();
        let list = grammar.nonterminal("list").unwrap();
        let productions = grammar.productions(list);
        assert_eq!(productions.len(), 2);
        assert_eq!(productions[0].len(), 2);
        assert!(productions[1].is_epsilon());
    }

    #[test]
    fn test_bar_inside_terminal() {
        let grammar = Grammar::parse("<or> ::= \"||\" <or> | ε").unwrap();
        let productions = grammar.productions(0);
        assert_eq!(productions.len(), 2);
        assert_eq!(grammar.terminal_name(0), "||");
    }

    #[test]
    fn test_ascii_epsilon() {
        let grammar = Grammar::parse("<a> ::= \"x\" | E").unwrap();
        assert!(grammar.productions(0)[1].is_epsilon());
    }

    #[test]
    fn test_undefined_nonterminal_is_rejected() {
        let err = Grammar::parse("<a> ::= <b> \"x\"").unwrap_err();
        assert!(err.message.contains("<b>"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_malformed_entries_are_rejected() {
        assert!(Grammar::parse("a ::= \"x\"").is_err());
        assert!(Grammar::parse("<a> ::= \"x").is_err());
        assert!(Grammar::parse("<a> ::= \"x\" |").is_err());
        assert!(Grammar::parse("<a> ::= \"x\"\n<a> ::= \"y\"").is_err());
        assert!(Grammar::parse("| \"x\"").is_err());
        assert!(Grammar::parse("").is_err());
    }
}
