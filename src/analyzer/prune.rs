//! Tree pruning.
//!
//! Runs after every method body has been analyzed, so decisions that depend
//! on later code (is the variable ever read? is the method ever called?)
//! are final. Steps, in order:
//!
//! 1. Drop methods the entry point cannot reach.
//! 2. Empty the declarations of variables that are never read.
//! 3. Empty statement-list tails after a jump, untaken `if`s and loops that
//!    never run.
//! 4. Elide folded definitions that were not reactivated.
//! 5. Insert re-materializing assignments in front of loops.
//! 6. Clear fold annotations that are no longer authoritative.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::analyzer::engine::{Analyzer, Removal};
use crate::analyzer::scope::VarId;
use crate::parser::ast::{Kind, NodeId};
use crate::parser::lexer::{Token, TokenKind};
use crate::value::Value;

/// Binary precedence levels from tightest to loosest, with their tails
const LADDER: &[(Kind, Kind)] = &[
    (Kind::MultiplicativeExpression, Kind::MultiplicativeTail),
    (Kind::AdditiveExpression, Kind::AdditiveTail),
    (Kind::RelationalExpression, Kind::RelationalTail),
    (Kind::EqualityExpression, Kind::EqualityTail),
    (Kind::LogicalAndExpression, Kind::LogicalAndTail),
    (Kind::LogicalOrExpression, Kind::LogicalOrTail),
];

impl Analyzer<'_> {
    pub(crate) fn prune(&mut self) {
        let reachable = self.reachable_methods();
        self.drop_unreachable_methods(&reachable);

        for (index, &scope) in self.method_scopes.iter().enumerate() {
            if !reachable[index] {
                continue;
            }
            for var in self.scopes.variables_under(scope) {
                let variable = self.scopes.var(var);
                if let (false, Some(declaration)) = (variable.used, variable.declaration) {
                    trace!(name = %variable.name, "unused variable");
                    self.ast.clear(declaration);
                }
            }
        }

        for list in std::mem::take(&mut self.dead_tails) {
            let rest = self.ast.child(list, 1);
            self.ast.clear(rest);
        }
        for statement in std::mem::take(&mut self.dead_statements) {
            self.ast.clear(statement);
        }

        let mut elided = 0;
        for record in std::mem::take(&mut self.removable) {
            if record.reactivated {
                continue;
            }
            elided += 1;
            match record.target {
                Removal::Statement(statement) => self.ast.clear(statement),
                Removal::Initializer(declaration) => {
                    if self.ast.children(declaration).len() == 5 {
                        self.ast.retain_slots(declaration, &[0, 1, 4]);
                    }
                }
            }
        }

        for entry in std::mem::take(&mut self.rematerialize) {
            self.inject(entry.statement, &entry.assignments);
        }

        for condition in std::mem::take(&mut self.loop_conditions) {
            self.clear_dependent(condition);
        }
        self.clear_consumed();

        let mut index = 0;
        self.methods.retain(|_| {
            index += 1;
            reachable[index - 1]
        });
        debug!(methods = self.methods.len(), elided, "tree pruned");
    }

    /// Breadth-first over call edges from the entry point (index 0)
    fn reachable_methods(&self) -> Vec<bool> {
        let mut reachable = vec![false; self.methods.len()];
        let mut queue = VecDeque::new();
        if !reachable.is_empty() {
            reachable[0] = true;
            queue.push_back(0);
        }
        while let Some(method) = queue.pop_front() {
            for &callee in &self.calls[method] {
                if !reachable[callee] {
                    reachable[callee] = true;
                    queue.push_back(callee);
                }
            }
        }
        reachable
    }

    /// Splice unreachable methods out of the method spine
    fn drop_unreachable_methods(&mut self, reachable: &[bool]) {
        for (index, method) in self.methods.iter().enumerate() {
            if reachable[index] {
                continue;
            }
            debug!(method = %method.name, "removing unreachable method");
            let Some(link) = self.ast.parent(method.node) else {
                continue;
            };
            let Some((owner, slot)) = self.ast.slot_of(link) else {
                continue;
            };
            let rest = self.ast.child(link, 1);
            self.ast.clear(link);
            self.ast.set_child(owner, slot, rest);
        }
    }

    /// Put `var = value;` statements in front of a loop statement. A loop
    /// that is not an element of a statement list is wrapped in a block.
    fn inject(&mut self, statement: NodeId, assignments: &[(VarId, Value)]) {
        if assignments.is_empty()
            || !self.ast.is_attached(statement)
            || self.ast.is_empty_production(statement)
        {
            return;
        }
        let Some((parent, slot)) = self.ast.slot_of(statement) else {
            return;
        };
        trace!(statement, count = assignments.len(), "re-materializing before loop");

        if self.ast.is_kind(parent, Kind::Statements) {
            // list[S, rest] => list[A, list'[S, rest]]
            let mut list = parent;
            for &(var, value) in assignments {
                let assignment = self.assignment_statement(var, value);
                let head = self.ast.child(list, 0);
                let rest = self.ast.child(list, 1);
                let tail = self.ast.build(Kind::Statements, vec![head, rest]);
                self.ast.set_child(list, 0, assignment);
                self.ast.set_child(list, 1, tail);
                list = tail;
            }
        } else {
            let epsilon = self.ast.leaf(None);
            let mut list = self.ast.build(Kind::Statements, vec![epsilon]);
            list = self.ast.build(Kind::Statements, vec![statement, list]);
            for &(var, value) in assignments.iter().rev() {
                let assignment = self.assignment_statement(var, value);
                list = self.ast.build(Kind::Statements, vec![assignment, list]);
            }
            let open = self.ast.leaf(Some(Token::synthetic(TokenKind::LBrace, None)));
            let close = self.ast.leaf(Some(Token::synthetic(TokenKind::RBrace, None)));
            let block = self.ast.build(Kind::Statement, vec![open, list, close]);
            self.ast.set_child(parent, slot, block);
        }
    }

    /// `statement[assignment-or-call[identifier, rest["=", expression], ";"]]`
    fn assignment_statement(&mut self, var: VarId, value: Value) -> NodeId {
        let name = self.scopes.var(var).name.clone();
        let identifier = self
            .ast
            .leaf(Some(Token::synthetic(TokenKind::Identifier, Some(name))));
        let assign = self.ast.leaf(Some(Token::synthetic(TokenKind::Assign, None)));
        let expression = self.literal_expression(value);
        let rest = self
            .ast
            .build(Kind::AssignmentOrCallRest, vec![assign, expression]);
        let semicolon = self
            .ast
            .leaf(Some(Token::synthetic(TokenKind::Semicolon, None)));
        let call = self
            .ast
            .build(Kind::AssignmentOrCall, vec![identifier, rest, semicolon]);
        self.ast.build(Kind::Statement, vec![call])
    }

    /// A full `expression` ladder around a literal, annotated with `value`.
    /// Negative numbers become unary minus applied to the magnitude.
    fn literal_expression(&mut self, value: Value) -> NodeId {
        let (literal, magnitude, negative) = match value {
            Value::Int(n) => {
                let token = Token::synthetic(TokenKind::IntLiteral, Some(n.unsigned_abs().to_string()));
                let leaf = self.ast.leaf(Some(token));
                (
                    self.ast.build(Kind::Number, vec![leaf]),
                    Value::Int(n.wrapping_abs()),
                    n < 0,
                )
            }
            Value::Float(x) => {
                let token = Token::synthetic(TokenKind::FloatLiteral, Some(format!("{:?}", x.abs())));
                let leaf = self.ast.leaf(Some(token));
                (
                    self.ast.build(Kind::Number, vec![leaf]),
                    Value::Float(x.abs()),
                    x.is_sign_negative(),
                )
            }
            Value::Bool(b) => {
                let kind = if b { TokenKind::True } else { TokenKind::False };
                let leaf = self.ast.leaf(Some(Token::synthetic(kind, None)));
                (self.ast.build(Kind::BooleanLiteral, vec![leaf]), value, false)
            }
        };
        self.ast.set_constant(literal, Some(magnitude));

        let primary = self.ast.build(Kind::PrimaryExpression, vec![literal]);
        let mut operand = self.ast.build(Kind::UnaryExpression, vec![primary]);
        if negative {
            let minus = self.ast.leaf(Some(Token::synthetic(TokenKind::Minus, None)));
            operand = self.ast.build(Kind::UnaryExpression, vec![minus, operand]);
        }

        for &(level, tail) in LADDER {
            let epsilon = self.ast.leaf(None);
            let tail = self.ast.build(tail, vec![epsilon]);
            operand = self.ast.build(level, vec![operand, tail]);
        }
        let expression = self.ast.build(Kind::Expression, vec![operand]);
        self.ast.set_constant(expression, Some(value));
        expression
    }

    /// Clear annotations on every path from `node` down to a variable read
    /// or call. Returns whether such a path exists.
    fn clear_dependent(&mut self, node: NodeId) -> bool {
        match self.ast.kind(node) {
            None | Some(Kind::Number) | Some(Kind::BooleanLiteral) => false,
            Some(kind) => {
                let mut dependent = kind == Kind::IdentifierOrCall;
                for child in self.ast.children(node).to_vec() {
                    dependent |= self.clear_dependent(child);
                }
                if dependent {
                    self.ast.set_constant(node, None);
                }
                dependent
            }
        }
    }

    /// Below an annotated node, only literal leaves keep their annotation
    fn clear_consumed(&mut self) {
        let mut stack: Vec<(NodeId, bool)> = self.ast.root().map(|r| (r, false)).into_iter().collect();
        while let Some((node, covered)) = stack.pop() {
            let annotated = self.ast.constant(node).is_some();
            let literal = self.ast.kind(node).is_some_and(Kind::is_literal);
            if annotated && covered && !literal {
                self.ast.set_constant(node, None);
            }
            for &child in self.ast.children(node) {
                stack.push((child, covered || annotated));
            }
        }
    }
}
