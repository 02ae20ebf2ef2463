//! Expression typing and constant folding.
//!
//! Every analyzed expression node is annotated with its folded value (or
//! none). Binary levels are read in their rotated form: a level is
//! `operand tail`, and after rotation the top tail holds the rightmost
//! operand, so `eval(T, base) = eval(T.next, base) OP operand(T)` folds left
//! to right.

use crate::analyzer::engine::Analyzer;
use crate::analyzer::scope::{ScopeId, VarId};
use crate::diagnostics::DiagnosticKind;
use crate::parser::ast::{Kind, NodeId};
use crate::parser::lexer::TokenKind;
use crate::value::{BinaryOp, Type, UnaryOp, Value};

/// Type and folded value of an analyzed expression
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Typed {
    pub ty: Type,
    pub constant: Option<Value>,
    /// Folded variables whose values were substituted into the result
    pub deps: Vec<VarId>,
}

impl Typed {
    pub fn runtime(ty: Type) -> Self {
        Typed {
            ty,
            constant: None,
            deps: Vec::new(),
        }
    }

    fn constant(value: Value) -> Self {
        Typed {
            ty: value.ty(),
            constant: Some(value),
            deps: Vec::new(),
        }
    }
}

impl Analyzer<'_> {
    /// Analyze an `expression` node. `None` means an error was reported
    /// somewhere inside.
    pub(crate) fn analyze_expression(&mut self, expression: NodeId, scope: ScopeId) -> Option<Typed> {
        let result = self.analyze_operand(self.ast.child(expression, 0), scope);
        self.annotate(expression, result.as_ref().and_then(|r| r.constant));
        result
    }

    /// A condition must be boolean
    pub(crate) fn analyze_condition(&mut self, expression: NodeId, scope: ScopeId) -> Option<Typed> {
        let result = self.analyze_expression(expression, scope)?;
        if result.ty != Type::Boolean {
            let location = self.location(expression);
            self.report(DiagnosticKind::ConditionNotBoolean { found: result.ty }, location);
            return None;
        }
        Some(result)
    }

    fn analyze_operand(&mut self, node: NodeId, scope: ScopeId) -> Option<Typed> {
        match self.ast.kind(node) {
            Some(kind) if kind.is_binary_expression() => {
                let base = self.analyze_operand(self.ast.child(node, 0), scope);
                let result = self.fold_tail(self.ast.child(node, 1), base, scope);
                self.annotate(node, result.as_ref().and_then(|r| r.constant));
                result
            }
            Some(Kind::UnaryExpression) => self.analyze_unary(node, scope),
            Some(Kind::Expression) => self.analyze_expression(node, scope),
            _ => None,
        }
    }

    /// Fold a rotated tail chain onto `base`
    fn fold_tail(&mut self, tail: NodeId, base: Option<Typed>, scope: ScopeId) -> Option<Typed> {
        if self.ast.is_empty_production(tail) {
            return base;
        }
        let left = self.fold_tail(self.ast.child(tail, 2), base, scope);
        let right = self.analyze_operand(self.ast.child(tail, 1), scope);

        let result = match (left, right) {
            (Some(left), Some(right)) => self.combine(self.ast.child(tail, 0), left, right),
            _ => None,
        };
        self.annotate(tail, result.as_ref().and_then(|r| r.constant));
        result
    }

    fn combine(&mut self, operator: NodeId, left: Typed, right: Typed) -> Option<Typed> {
        let (symbol, location) = self.identifier(operator);
        let op = BinaryOp::from_symbol(&symbol)?;

        let Some(ty) = op.result_type(left.ty, right.ty) else {
            self.report(
                DiagnosticKind::IncompatibleOperands {
                    operator: symbol,
                    left: left.ty,
                    right: right.ty,
                },
                location,
            );
            return None;
        };
        if op == BinaryOp::Div && right.constant.is_some_and(|v| v.is_zero()) {
            self.report(DiagnosticKind::DivisionByZero, location);
            return None;
        }

        let constant = match (left.constant, right.constant) {
            (Some(a), Some(b)) => op.apply(a, b),
            _ => None,
        };
        let mut deps = left.deps;
        for var in right.deps {
            if !deps.contains(&var) {
                deps.push(var);
            }
        }
        Some(Typed { ty, constant, deps })
    }

    fn analyze_unary(&mut self, node: NodeId, scope: ScopeId) -> Option<Typed> {
        let first = self.ast.child(node, 0);

        let operator = self
            .ast
            .token(first)
            .map(|token| (UnaryOp::from_symbol(token.text()), token.location));

        let result = match operator {
            Some((op, location)) => {
                let operand = self.analyze_unary(self.ast.child(node, 1), scope);
                match (op, operand) {
                    (Some(op), Some(operand)) => match op.result_type(operand.ty) {
                        Some(ty) => Some(Typed {
                            ty,
                            constant: operand.constant.and_then(|v| op.apply(v)),
                            deps: operand.deps,
                        }),
                        None => {
                            self.report(
                                DiagnosticKind::InvalidOperand {
                                    operator: op.symbol().to_string(),
                                    found: operand.ty,
                                },
                                location,
                            );
                            None
                        }
                    },
                    _ => None,
                }
            }
            None => self.analyze_primary(first, scope),
        };

        self.annotate(node, result.as_ref().and_then(|r| r.constant));
        result
    }

    fn analyze_primary(&mut self, node: NodeId, scope: ScopeId) -> Option<Typed> {
        let first = self.ast.child(node, 0);

        let result = if self.ast.token_is(first, TokenKind::LParen) {
            self.analyze_expression(self.ast.child(node, 1), scope)
        } else {
            match self.ast.kind(first) {
                Some(Kind::IdentifierOrCall) => self.analyze_identifier_or_call(first, scope),
                Some(Kind::Number) => self.analyze_number(first),
                Some(Kind::BooleanLiteral) => self.analyze_boolean(first),
                _ => None,
            }
        };

        self.annotate(node, result.as_ref().and_then(|r| r.constant));
        result
    }

    fn analyze_identifier_or_call(&mut self, node: NodeId, scope: ScopeId) -> Option<Typed> {
        let name = self.ast.child(node, 0);
        let suffix = self.ast.child(node, 1);

        let result = if self.ast.is_empty_production(suffix) {
            self.analyze_identifier(name, scope)
        } else {
            match self.analyze_call(name, self.ast.child(suffix, 1), scope) {
                Some(result) if result.ty == Type::Void => {
                    let (name, location) = self.identifier(name);
                    self.report(DiagnosticKind::VoidValue { name }, location);
                    None
                }
                result => result,
            }
        };

        self.annotate(node, result.as_ref().and_then(|r| r.constant));
        result
    }

    /// Read of a variable
    fn analyze_identifier(&mut self, name: NodeId, scope: ScopeId) -> Option<Typed> {
        let (name, location) = self.identifier(name);
        let var = self.resolve_variable(&name, location, scope)?;

        let here = self.scopes.scope(scope);
        let (loop_depth, unreachable) = (here.loop_depth, here.unreachable);
        let variable = self.scopes.var(var);
        let (ty, declared_depth) = (variable.ty, variable.loop_depth);

        match variable.folded() {
            Some(value) if loop_depth > declared_depth && !unreachable => {
                if let Some(&statement) = self.loops.get(declared_depth) {
                    self.schedule_rematerialization(statement, var, value);
                }
                let variable = self.scopes.var_mut(var);
                variable.mutable = true;
                variable.value = None;
                variable.used = true;
                Some(Typed::runtime(ty))
            }
            Some(value) => Some(Typed {
                ty,
                constant: Some(value),
                deps: vec![var],
            }),
            None => {
                if !unreachable {
                    self.scopes.var_mut(var).used = true;
                }
                Some(Typed::runtime(ty))
            }
        }
    }

    fn analyze_number(&mut self, node: NodeId) -> Option<Typed> {
        let token = self.ast.token(self.ast.child(node, 0))?;
        let (kind, literal, location) = (token.kind, token.text().to_string(), token.location);

        let value = match kind {
            Some(TokenKind::IntLiteral) => match literal.parse::<i32>() {
                Ok(n) => Value::Int(n),
                Err(_) => {
                    self.report(DiagnosticKind::IntegerOverflow { literal }, location);
                    return None;
                }
            },
            Some(TokenKind::FloatLiteral) => match literal.parse::<f32>() {
                Ok(x) if x.is_finite() => Value::Float(x),
                _ => {
                    self.report(DiagnosticKind::FloatOverflow { literal }, location);
                    return None;
                }
            },
            _ => return None,
        };

        self.annotate(node, Some(value));
        Some(Typed::constant(value))
    }

    fn analyze_boolean(&mut self, node: NodeId) -> Option<Typed> {
        let keyword = self.ast.child(node, 0);
        let value = if self.ast.token_is(keyword, TokenKind::True) {
            Value::Bool(true)
        } else if self.ast.token_is(keyword, TokenKind::False) {
            Value::Bool(false)
        } else {
            return None;
        };

        self.annotate(node, Some(value));
        Some(Typed::constant(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::engine::Analyzer;
    use crate::diagnostics::{DiagnosticKind, Diagnostics};
    use crate::parser::ast::{Ast, Kind};
    use crate::parser::parse::Parser;
    use crate::value::{Type, Value};

    fn parse(source: &str) -> Ast {
        let mut diagnostics = Diagnostics::new();
        let ast = Parser::new(source)
            .expect("lexes")
            .parse_program(&mut diagnostics);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
        ast
    }

    /// Fold the initializer of the first declaration in `main`
    fn fold(body: &str) -> (Option<Value>, Vec<DiagnosticKind>) {
        let mut ast = parse(&format!("void main() {{ {} }}", body));
        let mut diagnostics = Diagnostics::new();
        {
            let mut analyzer = Analyzer::new(&mut ast, &mut diagnostics);
            analyzer.collect_methods();
            analyzer.calls = vec![Default::default(); analyzer.methods.len()];
            analyzer.analyze_method(0);
        }
        let declaration = *ast.find_all(Kind::Declaration).last().expect("a declaration");
        let value = ast.constant(ast.child(declaration, 3));
        (value, diagnostics.iter().map(|d| d.kind.clone()).collect())
    }

    #[test]
    fn test_left_associative_folding() {
        assert_eq!(fold("int x = 3 - 1 - 1;").0, Some(Value::Int(1)));
        assert_eq!(fold("int x = 16 / 4 / 2;").0, Some(Value::Int(2)));
        assert_eq!(fold("int x = 2 + 3 * 4;").0, Some(Value::Int(14)));
        assert_eq!(fold("int x = (2 + 3) * 4;").0, Some(Value::Int(20)));
    }

    #[test]
    fn test_unary_and_logical() {
        assert_eq!(fold("int x = -(2 - 5);").0, Some(Value::Int(3)));
        assert_eq!(fold("boolean b = !(1 < 2) || 2 == 2;").0, Some(Value::Bool(true)));
        assert_eq!(fold("float f = 1.5 * 2.0;").0, Some(Value::Float(3.0)));
    }

    #[test]
    fn test_variables_are_substituted() {
        assert_eq!(fold("int y = 4; int x = y * y;").0, Some(Value::Int(16)));
        assert_eq!(fold("int x = 2; x = x + 5; int y = x * 2;").0, Some(Value::Int(14)));
        assert_eq!(fold("int p = intInput(); int y = p + 1;").0, None);
    }

    #[test]
    fn test_division_by_zero() {
        let (value, kinds) = fold("int x = 1 / 0;");
        assert_eq!(value, None);
        assert_eq!(kinds, vec![DiagnosticKind::DivisionByZero]);
    }

    #[test]
    fn test_operand_type_errors() {
        let (_, kinds) = fold("int x = 1 + 2.0;");
        assert_eq!(
            kinds,
            vec![DiagnosticKind::IncompatibleOperands {
                operator: "+".to_string(),
                left: Type::Int,
                right: Type::Float,
            }]
        );

        let (_, kinds) = fold("boolean b = -true;");
        assert_eq!(
            kinds,
            vec![DiagnosticKind::InvalidOperand {
                operator: "-".to_string(),
                found: Type::Boolean,
            }]
        );
    }

    #[test]
    fn test_literal_overflow() {
        let (_, kinds) = fold("int x = 2147483648;");
        assert_eq!(
            kinds,
            vec![DiagnosticKind::IntegerOverflow {
                literal: "2147483648".to_string()
            }]
        );
        assert_eq!(fold("int x = 2147483647;").0, Some(Value::Int(i32::MAX)));
    }

    #[test]
    fn test_condition_must_be_boolean() {
        let (_, kinds) = fold("int x = 1; if (x) { }");
        assert_eq!(kinds, vec![DiagnosticKind::ConditionNotBoolean { found: Type::Int }]);
    }
}
