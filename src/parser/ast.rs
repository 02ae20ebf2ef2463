//! Arena-allocated parse tree
//!
//! The tree is built by the predictive parser and then rewritten in place by
//! the rotation step and by every analyzer stage. Nodes live in one `Vec` and
//! refer to each other by [`NodeId`]; a parent link is only an index, so every
//! rewrite is index reassignment.
//!
//! Invariants kept by every mutating method:
//! - a nonterminal's `children.len()` equals its arity once it is complete;
//! - each attached child's `parent` names the node holding it, and a node
//!   detached from its slot no longer names that node as its parent.
//!
//! While the parser has live choice points it turns on the undo journal;
//! [`Ast::rollback`] then restores the tree to an earlier mark.

use crate::value::Value;
use std::sync::Arc;

use super::lexer::{Token, TokenKind};

/// Index of a node in the arena
pub type NodeId = usize;

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Closed set of node kinds the analyzer dispatches on.
///
/// Each kind corresponds to one nonterminal of the built-in grammar; any
/// other label loaded from a custom grammar maps to [`Kind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Program,
    Methods,
    Method,
    ReturnType,
    Type,
    Parameters,
    ParameterTail,
    Parameter,
    Statements,
    Statement,
    Declaration,
    AssignmentOrCall,
    AssignmentOrCallRest,
    Assignment,
    IfStatement,
    ElsePart,
    WhileLoop,
    DoWhileLoop,
    ForLoop,
    ReturnStatement,
    ReturnValue,
    Arguments,
    ArgumentList,
    ArgumentTail,
    Expression,
    LogicalOrExpression,
    LogicalOrTail,
    LogicalAndExpression,
    LogicalAndTail,
    EqualityExpression,
    EqualityTail,
    RelationalExpression,
    RelationalTail,
    AdditiveExpression,
    AdditiveTail,
    MultiplicativeExpression,
    MultiplicativeTail,
    UnaryExpression,
    PrimaryExpression,
    IdentifierOrCall,
    CallSuffix,
    Number,
    BooleanLiteral,
    Other,
}

const LABELS: &[(Kind, &str)] = &[
    (Kind::Program, "program"),
    (Kind::Methods, "methods"),
    (Kind::Method, "method"),
    (Kind::ReturnType, "return-type"),
    (Kind::Type, "type"),
    (Kind::Parameters, "parameters"),
    (Kind::ParameterTail, "parameter-tail"),
    (Kind::Parameter, "parameter"),
    (Kind::Statements, "statements"),
    (Kind::Statement, "statement"),
    (Kind::Declaration, "declaration"),
    (Kind::AssignmentOrCall, "assignment-or-call"),
    (Kind::AssignmentOrCallRest, "assignment-or-call-rest"),
    (Kind::Assignment, "assignment"),
    (Kind::IfStatement, "if-statement"),
    (Kind::ElsePart, "else-part"),
    (Kind::WhileLoop, "while-loop"),
    (Kind::DoWhileLoop, "do-while-loop"),
    (Kind::ForLoop, "for-loop"),
    (Kind::ReturnStatement, "return-statement"),
    (Kind::ReturnValue, "return-value"),
    (Kind::Arguments, "arguments"),
    (Kind::ArgumentList, "argument-list"),
    (Kind::ArgumentTail, "argument-tail"),
    (Kind::Expression, "expression"),
    (Kind::LogicalOrExpression, "logical-or-expression"),
    (Kind::LogicalOrTail, "logical-or-tail"),
    (Kind::LogicalAndExpression, "logical-and-expression"),
    (Kind::LogicalAndTail, "logical-and-tail"),
    (Kind::EqualityExpression, "equality-expression"),
    (Kind::EqualityTail, "equality-tail"),
    (Kind::RelationalExpression, "relational-expression"),
    (Kind::RelationalTail, "relational-tail"),
    (Kind::AdditiveExpression, "additive-expression"),
    (Kind::AdditiveTail, "additive-tail"),
    (Kind::MultiplicativeExpression, "multiplicative-expression"),
    (Kind::MultiplicativeTail, "multiplicative-tail"),
    (Kind::UnaryExpression, "unary-expression"),
    (Kind::PrimaryExpression, "primary-expression"),
    (Kind::IdentifierOrCall, "identifier-or-call"),
    (Kind::CallSuffix, "call-suffix"),
    (Kind::Number, "number"),
    (Kind::BooleanLiteral, "boolean-literal"),
];

impl Kind {
    pub fn from_label(label: &str) -> Kind {
        LABELS
            .iter()
            .find(|(_, name)| *name == label)
            .map_or(Kind::Other, |(kind, _)| *kind)
    }

    /// Grammar label of this kind (`"other"` for [`Kind::Other`])
    pub fn label(self) -> &'static str {
        LABELS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or("other", |(_, name)| name)
    }

    /// Binary precedence levels: `X-expression ::= operand X-tail`
    pub fn is_binary_expression(self) -> bool {
        matches!(
            self,
            Kind::LogicalOrExpression
                | Kind::LogicalAndExpression
                | Kind::EqualityExpression
                | Kind::RelationalExpression
                | Kind::AdditiveExpression
                | Kind::MultiplicativeExpression
        )
    }

    /// Literal leaves whose fold annotation is kept permanently
    pub fn is_literal(self) -> bool {
        matches!(self, Kind::Number | Kind::BooleanLiteral)
    }
}

/// Interior node
#[derive(Debug, Clone)]
pub struct NonTerminal {
    pub label: Arc<str>,
    pub kind: Kind,
    pub arity: usize,
    pub children: Vec<NodeId>,
    /// Folded value, set by the analyzer
    pub constant: Option<Value>,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    NonTerminal(NonTerminal),
    /// A matched token, or `None` for an epsilon match
    Terminal(Option<Token>),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub data: NodeData,
}

/// Inverse of one structural change, recorded while journaling
#[derive(Debug, Clone)]
enum Undo {
    Alloc,
    PushChild(NodeId),
    SetChild {
        node: NodeId,
        slot: usize,
        old: NodeId,
    },
    SetParent {
        node: NodeId,
        old: Option<NodeId>,
    },
    SetRoot(Option<NodeId>),
}

/// The syntax tree
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    journal: Option<Vec<Undo>>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of allocated nodes, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    fn nonterminal(&self, id: NodeId) -> Option<&NonTerminal> {
        match &self.nodes[id].data {
            NodeData::NonTerminal(nt) => Some(nt),
            NodeData::Terminal(_) => None,
        }
    }

    fn nonterminal_mut(&mut self, id: NodeId) -> Option<&mut NonTerminal> {
        match &mut self.nodes[id].data {
            NodeData::NonTerminal(nt) => Some(nt),
            NodeData::Terminal(_) => None,
        }
    }

    /// Kind of a nonterminal, `None` for terminals
    pub fn kind(&self, id: NodeId) -> Option<Kind> {
        self.nonterminal(id).map(|nt| nt.kind)
    }

    pub fn is_kind(&self, id: NodeId, kind: Kind) -> bool {
        self.kind(id) == Some(kind)
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.nonterminal(id).map(|nt| &*nt.label)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nonterminal(id).map_or(&[], |nt| &nt.children)
    }

    /// Child in `slot`.
    ///
    /// # Panics
    ///
    /// If the node has no such child; analyzer code relies on the grammar
    /// fixing each production's shape.
    pub fn child(&self, id: NodeId, slot: usize) -> NodeId {
        self.children(id)[slot]
    }

    /// Token of a terminal node
    pub fn token(&self, id: NodeId) -> Option<&Token> {
        match &self.nodes[id].data {
            NodeData::Terminal(token) => token.as_ref(),
            NodeData::NonTerminal(_) => None,
        }
    }

    pub fn token_is(&self, id: NodeId, kind: TokenKind) -> bool {
        self.token(id).is_some_and(|t| t.is(kind))
    }

    /// Terminal holding no token
    pub fn is_epsilon(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].data, NodeData::Terminal(None))
    }

    /// Nonterminal expanded by the empty production
    pub fn is_empty_production(&self, id: NodeId) -> bool {
        match self.children(id) {
            [only] => self.is_epsilon(*only),
            _ => false,
        }
    }

    pub fn constant(&self, id: NodeId) -> Option<Value> {
        self.nonterminal(id).and_then(|nt| nt.constant)
    }

    pub(crate) fn set_constant(&mut self, id: NodeId, value: Option<Value>) {
        if let Some(nt) = self.nonterminal_mut(id) {
            nt.constant = value;
        }
    }

    /// Whether every declared child slot is filled
    pub fn is_complete(&self, id: NodeId) -> bool {
        self.nonterminal(id)
            .map_or(true, |nt| nt.children.len() >= nt.arity)
    }

    // ===== Construction =====

    fn alloc(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node { parent, data });
        self.record(Undo::Alloc);
        id
    }

    fn attach(&mut self, parent: Option<NodeId>, id: NodeId) {
        match parent {
            Some(p) => {
                if let Some(nt) = self.nonterminal_mut(p) {
                    nt.children.push(id);
                    self.record(Undo::PushChild(p));
                }
            }
            None if self.root.is_none() => {
                self.record(Undo::SetRoot(self.root));
                self.root = Some(id);
            }
            None => {}
        }
    }

    /// Open an interior node of `arity` slots as the next child of `parent`,
    /// or as the root when `parent` is `None` and there is no root yet.
    pub(crate) fn open(
        &mut self,
        parent: Option<NodeId>,
        label: Arc<str>,
        kind: Kind,
        arity: usize,
    ) -> NodeId {
        let id = self.alloc(
            parent,
            NodeData::NonTerminal(NonTerminal {
                label,
                kind,
                arity,
                children: Vec::with_capacity(arity),
                constant: None,
            }),
        );
        self.attach(parent, id);
        id
    }

    /// Append a terminal child (`None` for epsilon)
    pub(crate) fn push_terminal(&mut self, parent: NodeId, token: Option<Token>) -> NodeId {
        let id = self.alloc(Some(parent), NodeData::Terminal(token));
        self.attach(Some(parent), id);
        id
    }

    /// A complete detached interior node owning `children`
    pub(crate) fn build(&mut self, kind: Kind, children: Vec<NodeId>) -> NodeId {
        let label: Arc<str> = Arc::from(kind.label());
        let arity = children.len();
        let id = self.alloc(
            None,
            NodeData::NonTerminal(NonTerminal {
                label,
                kind,
                arity,
                children: Vec::new(),
                constant: None,
            }),
        );
        for child in children {
            self.nodes[child].parent = Some(id);
            if let Some(nt) = self.nonterminal_mut(id) {
                nt.children.push(child);
            }
        }
        id
    }

    /// A detached terminal
    pub(crate) fn leaf(&mut self, token: Option<Token>) -> NodeId {
        self.alloc(None, NodeData::Terminal(token))
    }

    // ===== Rewriting =====

    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) {
        let old = self.nodes[node].parent;
        self.record(Undo::SetParent { node, old });
        self.nodes[node].parent = parent;
    }

    /// Put `child` into `slot` of `node`. The displaced child is detached
    /// unless it has already been re-parented elsewhere.
    pub(crate) fn set_child(&mut self, node: NodeId, slot: usize, child: NodeId) {
        let Some(nt) = self.nonterminal_mut(node) else {
            return;
        };
        let old = std::mem::replace(&mut nt.children[slot], child);
        self.record(Undo::SetChild { node, slot, old });
        if old != child && self.nodes[old].parent == Some(node) {
            self.set_parent(old, None);
        }
        self.set_parent(child, Some(node));
    }

    /// Slot of `child` within its parent
    pub fn slot_of(&self, child: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.nodes[child].parent?;
        let slot = self.children(parent).iter().position(|&c| c == child)?;
        Some((parent, slot))
    }

    /// Put `new` where `old` currently hangs. No-op for a detached `old`.
    pub(crate) fn replace(&mut self, old: NodeId, new: NodeId) {
        if let Some((parent, slot)) = self.slot_of(old) {
            self.set_child(parent, slot, new);
        } else if self.root == Some(old) {
            self.root = Some(new);
            self.nodes[new].parent = None;
        }
    }

    /// Turn a nonterminal into an empty placeholder: its only child becomes
    /// an epsilon terminal.
    pub(crate) fn clear(&mut self, id: NodeId) {
        if self.nonterminal(id).is_none() || self.is_empty_production(id) {
            return;
        }
        let epsilon = self.leaf(None);
        self.nodes[epsilon].parent = Some(id);
        let old = match self.nonterminal_mut(id) {
            Some(nt) => {
                nt.arity = 1;
                nt.constant = None;
                std::mem::replace(&mut nt.children, vec![epsilon])
            }
            None => return,
        };
        for child in old {
            self.nodes[child].parent = None;
        }
    }

    /// Keep only the children in `slots` (in that order)
    pub(crate) fn retain_slots(&mut self, id: NodeId, slots: &[usize]) {
        let kept: Vec<NodeId> = slots.iter().map(|&s| self.child(id, s)).collect();
        let Some(nt) = self.nonterminal_mut(id) else {
            return;
        };
        let old = std::mem::replace(&mut nt.children, kept.clone());
        nt.arity = kept.len();
        for child in old {
            if !kept.contains(&child) {
                self.nodes[child].parent = None;
            }
        }
    }

    /// Whether `id` is connected to the root through parent links
    pub fn is_attached(&self, mut id: NodeId) -> bool {
        loop {
            if self.root == Some(id) {
                return true;
            }
            match self.nodes[id].parent {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    // ===== Journal =====

    fn record(&mut self, undo: Undo) {
        if let Some(journal) = &mut self.journal {
            journal.push(undo);
        }
    }

    /// Start recording undo entries (no-op if already recording)
    pub(crate) fn begin_journal(&mut self) {
        if self.journal.is_none() {
            self.journal = Some(Vec::new());
        }
    }

    /// Stop recording and forget all entries
    pub(crate) fn end_journal(&mut self) {
        self.journal = None;
    }

    pub(crate) fn journal_len(&self) -> usize {
        self.journal.as_ref().map_or(0, Vec::len)
    }

    /// Undo every change recorded after `mark`
    pub(crate) fn rollback(&mut self, mark: usize) {
        let Some(mut journal) = self.journal.take() else {
            return;
        };
        while journal.len() > mark {
            let Some(undo) = journal.pop() else { break };
            match undo {
                Undo::Alloc => {
                    self.nodes.pop();
                }
                Undo::PushChild(node) => {
                    if let Some(nt) = self.nonterminal_mut(node) {
                        nt.children.pop();
                    }
                }
                Undo::SetChild { node, slot, old } => {
                    if let Some(nt) = self.nonterminal_mut(node) {
                        nt.children[slot] = old;
                    }
                }
                Undo::SetParent { node, old } => self.nodes[node].parent = old,
                Undo::SetRoot(old) => self.root = old,
            }
        }
        self.journal = Some(journal);
    }

    // ===== Queries =====

    /// Attached nodes in depth-first pre-order
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    /// Attached nonterminals of `kind`, in source order
    pub fn find_all(&self, kind: Kind) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| self.is_kind(id, kind))
            .collect()
    }

    /// Tokens under `id` in source order, joined by single spaces
    pub fn text_of(&self, id: NodeId) -> String {
        let mut words = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            match &self.nodes[node].data {
                NodeData::Terminal(Some(token)) => words.push(token.text().to_string()),
                NodeData::Terminal(None) => {}
                NodeData::NonTerminal(nt) => stack.extend(nt.children.iter().rev()),
            }
        }
        words.join(" ")
    }

    /// The whole program as space-separated tokens
    pub fn source_text(&self) -> String {
        self.root.map(|root| self.text_of(root)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(kind: Kind) -> Arc<str> {
        Arc::from(kind.label())
    }

    fn ident(name: &str) -> Option<Token> {
        Some(Token::synthetic(TokenKind::Identifier, Some(name.to_string())))
    }

    #[test]
    fn test_kind_labels_round_trip() {
        assert_eq!(Kind::from_label("if-statement"), Kind::IfStatement);
        assert_eq!(Kind::IfStatement.label(), "if-statement");
        assert_eq!(Kind::from_label("something-else"), Kind::Other);
    }

    #[test]
    fn test_open_and_complete() {
        let mut ast = Ast::new();
        let root = ast.open(None, label(Kind::Parameter), Kind::Parameter, 2);
        assert_eq!(ast.root(), Some(root));
        assert!(!ast.is_complete(root));

        ast.push_terminal(root, ident("int"));
        ast.push_terminal(root, ident("x"));
        assert!(ast.is_complete(root));
        assert_eq!(ast.source_text(), "int x");
    }

    #[test]
    fn test_rollback_restores_structure() {
        let mut ast = Ast::new();
        let root = ast.open(None, label(Kind::Statements), Kind::Statements, 2);
        ast.push_terminal(root, ident("a"));

        ast.begin_journal();
        let mark = ast.journal_len();
        let inner = ast.open(Some(root), label(Kind::Statements), Kind::Statements, 1);
        ast.push_terminal(inner, ident("b"));
        assert_eq!(ast.len(), 4);

        ast.rollback(mark);
        assert_eq!(ast.len(), 2);
        assert_eq!(ast.children(root).len(), 1);
        assert_eq!(ast.source_text(), "a");
    }

    #[test]
    fn test_clear_detaches_children() {
        let mut ast = Ast::new();
        let root = ast.open(None, label(Kind::Statement), Kind::Statement, 1);
        let leaf = ast.push_terminal(root, ident("x"));

        ast.clear(root);
        assert!(ast.is_empty_production(root));
        assert_eq!(ast.parent(leaf), None);
        assert_eq!(ast.source_text(), "");
    }

    #[test]
    fn test_replace_relinks_parent() {
        let mut ast = Ast::new();
        let root = ast.open(None, label(Kind::Statement), Kind::Statement, 1);
        let old = ast.push_terminal(root, ident("old"));
        let new = ast.leaf(ident("new"));

        ast.replace(old, new);
        assert_eq!(ast.child(root, 0), new);
        assert_eq!(ast.parent(new), Some(root));
        assert_eq!(ast.parent(old), None);
        assert!(ast.is_attached(new));
        assert!(!ast.is_attached(old));
    }
}
