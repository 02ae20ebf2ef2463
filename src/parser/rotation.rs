//! Associativity rotation for operator tails
//!
//! The grammar encodes each binary precedence level as
//!
//! ```text
//! X-expression ::= operand X-tail
//! X-tail       ::= op operand X-tail | ε
//! ```
//!
//! so `a - b - c` parses as `X[a, T1[-, b, T2[-, c, ε]]]`, a right-leaning
//! chain. When the outermost tail closes, the chain is reversed in place to
//! `X[a, T2[-, c, T1[-, b, ε]]]`: each tail now applies its operator to the
//! value of the tail nested below it, so the innermost tail is evaluated
//! first and `a - b - c` folds as `(a - b) - c`.

use super::ast::{Ast, Kind, NodeId};

/// Tail kind → the binary-expression kind it hangs under
const ROTATIONS: &[(Kind, Kind)] = &[
    (Kind::LogicalOrTail, Kind::LogicalOrExpression),
    (Kind::LogicalAndTail, Kind::LogicalAndExpression),
    (Kind::EqualityTail, Kind::EqualityExpression),
    (Kind::RelationalTail, Kind::RelationalExpression),
    (Kind::AdditiveTail, Kind::AdditiveExpression),
    (Kind::MultiplicativeTail, Kind::MultiplicativeExpression),
];

/// Binary-expression kind a tail rotates against, if `kind` is a tail
pub fn partner(kind: Kind) -> Option<Kind> {
    ROTATIONS
        .iter()
        .find(|(tail, _)| *tail == kind)
        .map(|(_, expression)| *expression)
}

impl Ast {
    /// Reverse the operator chain starting at `tail` if it is the top tail of
    /// a binary expression. Returns the node now occupying `tail`'s slot, so
    /// the caller can keep bubbling from there.
    pub(crate) fn rotate(&mut self, tail: NodeId) -> NodeId {
        let Some(kind) = self.kind(tail) else {
            return tail;
        };
        let Some(expression) = partner(kind) else {
            return tail;
        };
        let Some((parent, slot)) = self.slot_of(tail) else {
            return tail;
        };
        if !self.is_kind(parent, expression) || self.children(tail).len() != 3 {
            return tail;
        }

        let mut chain = vec![tail];
        let mut end = self.child(tail, 2);
        while self.is_kind(end, kind) && self.children(end).len() == 3 {
            chain.push(end);
            end = self.child(end, 2);
        }
        if chain.len() == 1 {
            return tail;
        }

        tracing::trace!(tail = kind.label(), length = chain.len(), "rotating operator chain");

        self.set_child(chain[0], 2, end);
        for pair in chain.windows(2) {
            self.set_child(pair[1], 2, pair[0]);
        }
        let head = chain[chain.len() - 1];
        self.set_child(parent, slot, head);
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::{Token, TokenKind};
    use std::sync::Arc;

    fn open(ast: &mut Ast, parent: Option<NodeId>, kind: Kind, arity: usize) -> NodeId {
        ast.open(parent, Arc::from(kind.label()), kind, arity)
    }

    fn token(ast: &mut Ast, parent: NodeId, kind: TokenKind, lexeme: Option<&str>) {
        ast.push_terminal(parent, Some(Token::synthetic(kind, lexeme.map(String::from))));
    }

    /// `a - b - c` as the parser builds it, before rotation
    fn chain() -> (Ast, NodeId, NodeId, NodeId) {
        let mut ast = Ast::new();
        let expr = open(&mut ast, None, Kind::AdditiveExpression, 2);
        token(&mut ast, expr, TokenKind::Identifier, Some("a"));
        let t1 = open(&mut ast, Some(expr), Kind::AdditiveTail, 3);
        token(&mut ast, t1, TokenKind::Minus, None);
        token(&mut ast, t1, TokenKind::Identifier, Some("b"));
        let t2 = open(&mut ast, Some(t1), Kind::AdditiveTail, 3);
        token(&mut ast, t2, TokenKind::Minus, None);
        token(&mut ast, t2, TokenKind::Identifier, Some("c"));
        let end = open(&mut ast, Some(t2), Kind::AdditiveTail, 1);
        ast.push_terminal(end, None);
        (ast, expr, t1, t2)
    }

    #[test]
    fn test_inner_tail_does_not_rotate() {
        let (mut ast, _, t1, t2) = chain();
        assert_eq!(ast.rotate(t2), t2);
        assert_eq!(ast.parent(t2), Some(t1));
    }

    #[test]
    fn test_chain_is_reversed() {
        let (mut ast, expr, t1, t2) = chain();
        let head = ast.rotate(t1);

        assert_eq!(head, t2);
        assert_eq!(ast.child(expr, 1), t2);
        assert_eq!(ast.child(t2, 2), t1);
        assert_eq!(ast.parent(t2), Some(expr));
        assert_eq!(ast.parent(t1), Some(t2));

        let end = ast.child(t1, 2);
        assert!(ast.is_empty_production(end));
        assert_eq!(ast.parent(end), Some(t1));

        for id in ast.preorder() {
            assert!(ast.is_complete(id));
            for &child in ast.children(id) {
                assert_eq!(ast.parent(child), Some(id));
            }
        }
    }

    #[test]
    fn test_single_operator_is_untouched() {
        let mut ast = Ast::new();
        let expr = open(&mut ast, None, Kind::AdditiveExpression, 2);
        token(&mut ast, expr, TokenKind::Identifier, Some("a"));
        let t1 = open(&mut ast, Some(expr), Kind::AdditiveTail, 3);
        token(&mut ast, t1, TokenKind::Plus, None);
        token(&mut ast, t1, TokenKind::Identifier, Some("b"));
        let end = open(&mut ast, Some(t1), Kind::AdditiveTail, 1);
        ast.push_terminal(end, None);

        assert_eq!(ast.rotate(t1), t1);
        assert_eq!(ast.source_text(), "a + b");
    }
}
