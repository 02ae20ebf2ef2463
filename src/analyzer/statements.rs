//! Scope and control-flow analysis of method bodies.
//!
//! Adds `impl Analyzer` methods for statement lists, blocks, declarations,
//! assignments, `if`, `return`, `break` and `continue`. Loops live in
//! [`crate::analyzer::loops`].
//!
//! Every statement reports a [`Flow`]: whether all paths through it return,
//! and whether control can fall through to the next statement. Statements
//! after a jump are still analyzed (for diagnostics) but in an unreachable
//! scope, and the list tail is scheduled for removal.

use tracing::trace;

use crate::analyzer::engine::{Analyzer, Removal};
use crate::analyzer::scope::{ScopeId, ScopeKind, VarId, Variable};
use crate::diagnostics::{DiagnosticKind, TypeContext};
use crate::parser::ast::{Kind, NodeId, SourceLocation};
use crate::parser::lexer::TokenKind;
use crate::value::Type;

/// How control leaves a statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Flow {
    /// Every path through the statement executes a `return`
    pub returns: bool,
    /// Control never reaches the following statement
    pub jumps: bool,
}

impl Flow {
    pub const JUMP: Flow = Flow {
        returns: false,
        jumps: true,
    };
}

impl Analyzer<'_> {
    /// Analyze the body of method `index`
    pub(crate) fn analyze_method(&mut self, index: usize) {
        self.current = index;
        self.undeclared_variables.clear();
        self.undeclared_methods.clear();
        self.loops.clear();
        self.loop_jumps.clear();

        let node = self.methods[index].node;
        let scope = self.scopes.root();
        self.method_scopes.push(scope);

        for parameter in self.parameter_nodes(self.ast.child(node, 3)) {
            let ty = self.type_of(self.ast.child(parameter, 0));
            let (name, location) = self.identifier(self.ast.child(parameter, 1));
            if self.scopes.lookup_local(scope, &name).is_some() {
                self.report(DiagnosticKind::Redeclaration { name }, location);
                continue;
            }
            let mut variable = Variable::new(ty, name);
            variable.mutable = true;
            variable.used = true;
            self.scopes.declare(scope, variable);
        }

        let returns = self.analyze_statements(self.ast.child(node, 6), scope);

        let method = &self.methods[index];
        if method.return_type != Type::Void && !returns {
            let name = method.name.clone();
            let location = self.location(self.ast.child(node, 1));
            self.report(DiagnosticKind::MissingReturn { method: name }, location);
        }
        trace!(method = %self.methods[index].name, returns, "method analyzed");
    }

    /// Analyze a `statements` list. Returns whether some statement in it
    /// returns on every path.
    pub(crate) fn analyze_statements(&mut self, list: NodeId, scope: ScopeId) -> bool {
        let mut returns = false;
        let mut scope = scope;
        let mut list = list;

        while self.ast.is_kind(list, Kind::Statements) && !self.ast.is_empty_production(list) {
            let flow = self.analyze_statement(self.ast.child(list, 0), scope);
            returns |= flow.returns;

            let rest = self.ast.child(list, 1);
            if flow.jumps && !self.ast.is_empty_production(rest) {
                self.dead_tails.push(list);
                if !self.scopes.scope(scope).unreachable {
                    scope = self.scopes.child(scope, ScopeKind::dead());
                }
            }
            list = rest;
        }
        returns
    }

    pub(crate) fn analyze_statement(&mut self, statement: NodeId, scope: ScopeId) -> Flow {
        let head = self.ast.child(statement, 0);

        match self.ast.kind(head) {
            Some(Kind::Declaration) => {
                self.analyze_declaration(head, Some(statement), scope);
                Flow::default()
            }
            Some(Kind::AssignmentOrCall) => {
                self.analyze_assignment_or_call(head, statement, scope);
                Flow::default()
            }
            Some(Kind::IfStatement) => self.analyze_if(head, statement, scope),
            Some(Kind::WhileLoop) => self.analyze_while(head, statement, scope),
            Some(Kind::DoWhileLoop) => self.analyze_do_while(head, statement, scope),
            Some(Kind::ForLoop) => self.analyze_for(head, statement, scope),
            Some(Kind::ReturnStatement) => self.analyze_return(head, scope),
            Some(_) => Flow::default(),
            None => {
                if self.ast.token_is(head, TokenKind::LBrace) {
                    let block = self.scopes.child(scope, ScopeKind::block());
                    Flow {
                        returns: self.analyze_statements(self.ast.child(statement, 1), block),
                        jumps: false,
                    }
                } else if self.ast.token_is(head, TokenKind::Break) {
                    self.analyze_jump(head, scope, DiagnosticKind::BreakOutsideLoop)
                } else if self.ast.token_is(head, TokenKind::Continue) {
                    self.analyze_jump(head, scope, DiagnosticKind::ContinueOutsideLoop)
                } else {
                    Flow::default()
                }
            }
        }
    }

    fn analyze_jump(&mut self, keyword: NodeId, scope: ScopeId, outside: DiagnosticKind) -> Flow {
        if !self.scopes.scope(scope).in_loop {
            let location = self.location(keyword);
            self.report(outside, location);
        }
        if let Some(jumped) = self.loop_jumps.last_mut() {
            *jumped = true;
        }
        Flow::JUMP
    }

    /// `type identifier ;` or `type identifier = expression ;`
    ///
    /// `statement` is `None` for the initializer clause of a `for`; such a
    /// declaration is never elided and its initializer never folded away.
    pub(crate) fn analyze_declaration(
        &mut self,
        declaration: NodeId,
        statement: Option<NodeId>,
        scope: ScopeId,
    ) -> Option<VarId> {
        let ty = self.type_of(self.ast.child(declaration, 0));
        let (name, location) = self.identifier(self.ast.child(declaration, 1));

        if self.scopes.lookup_local(scope, &name).is_some() {
            self.report(DiagnosticKind::Redeclaration { name }, location);
            if self.ast.children(declaration).len() == 5 {
                self.analyze_expression(self.ast.child(declaration, 3), scope);
            }
            return None;
        }

        let mut variable = Variable::new(ty, name);
        variable.declaration = statement;

        let mut definition = None;
        if self.ast.children(declaration).len() == 5 {
            let expression = self.ast.child(declaration, 3);
            match self.analyze_expression(expression, scope) {
                Some(result) if result.ty != ty => {
                    let location = self.location(expression);
                    self.report(
                        DiagnosticKind::TypeMismatch {
                            context: TypeContext::Declaration,
                            expected: ty,
                            found: result.ty,
                        },
                        location,
                    );
                    variable.mutable = true;
                }
                Some(result) => match (result.constant, statement) {
                    (Some(value), Some(_)) => {
                        variable.value = Some(value);
                        definition = Some(Removal::Initializer(declaration));
                    }
                    _ => {
                        variable.mutable = true;
                        variable.used = true;
                    }
                },
                None => variable.mutable = true,
            }
        }

        let var = self.scopes.declare(scope, variable);
        if let Some(target) = definition {
            let record = self.add_removable(target);
            self.scopes.var_mut(var).last_definition = Some(record);
        }
        Some(var)
    }

    fn analyze_assignment_or_call(&mut self, node: NodeId, statement: NodeId, scope: ScopeId) {
        let name = self.ast.child(node, 0);
        let rest = self.ast.child(node, 1);

        if self.ast.token_is(self.ast.child(rest, 0), TokenKind::Assign) {
            self.analyze_assignment(name, self.ast.child(rest, 1), Some(statement), scope);
        } else {
            self.analyze_call(name, self.ast.child(rest, 1), scope);
        }
    }

    /// `identifier = expression`. `statement` is the enclosing statement
    /// when the assignment may be removed after folding.
    pub(crate) fn analyze_assignment(
        &mut self,
        name: NodeId,
        expression: NodeId,
        statement: Option<NodeId>,
        scope: ScopeId,
    ) {
        let result = self.analyze_expression(expression, scope);
        let (name, location) = self.identifier(name);
        let Some(var) = self.resolve_variable(&name, location, scope) else {
            return;
        };
        let Some(result) = result else {
            return;
        };

        let ty = self.scopes.var(var).ty;
        if result.ty != ty {
            self.report(
                DiagnosticKind::TypeMismatch {
                    context: TypeContext::Assignment,
                    expected: ty,
                    found: result.ty,
                },
                location,
            );
            return;
        }

        let here = self.scopes.scope(scope);
        if here.unreachable {
            return;
        }
        let escaping = here.region > self.scopes.var(var).region;

        match (result.constant, statement) {
            (Some(value), Some(statement)) if !escaping => {
                let record = self.add_removable(Removal::Statement(statement));
                let variable = self.scopes.var_mut(var);
                variable.value = Some(value);
                variable.mutable = false;
                variable.last_definition = Some(record);
            }
            _ => self.materialize(var),
        }
    }

    /// Look `name` up, reporting it once per method if it is undeclared
    pub(crate) fn resolve_variable(
        &mut self,
        name: &str,
        location: SourceLocation,
        scope: ScopeId,
    ) -> Option<VarId> {
        let found = self.scopes.lookup(scope, name);
        if found.is_none() && self.undeclared_variables.insert(name.to_string()) {
            self.report(
                DiagnosticKind::UndeclaredVariable {
                    name: name.to_string(),
                },
                location,
            );
        }
        found
    }

    fn analyze_if(&mut self, node: NodeId, statement: NodeId, scope: ScopeId) -> Flow {
        let condition = self.ast.child(node, 2);
        let known = self
            .analyze_condition(condition, scope)
            .and_then(|result| result.constant)
            .and_then(|value| value.as_bool());

        let then_branch = self.ast.child(node, 4);
        let else_part = self.ast.child(node, 5);
        let else_branch =
            (!self.ast.is_empty_production(else_part)).then(|| self.ast.child(else_part, 1));

        let conditional = known.is_none();
        let then_scope = self
            .scopes
            .child(scope, ScopeKind::branch(conditional, known == Some(false)));
        let then_flow = self.analyze_statement(then_branch, then_scope);

        let else_flow = else_branch.map(|branch| {
            let else_scope = self
                .scopes
                .child(scope, ScopeKind::branch(conditional, known == Some(true)));
            self.analyze_statement(branch, else_scope)
        });

        let Some(value) = known else {
            return Flow {
                returns: then_flow.returns && else_flow.is_some_and(|flow| flow.returns),
                jumps: false,
            };
        };

        let location = self.location(condition);
        self.report(DiagnosticKind::ConstantCondition { value }, location);
        if self.scopes.scope(scope).unreachable {
            return Flow::default();
        }

        let (taken, flow) = if value {
            (Some(then_branch), then_flow)
        } else {
            (else_branch, else_flow.unwrap_or_default())
        };
        match taken {
            Some(branch) => self.ast.replace(statement, branch),
            None => self.dead_statements.push(statement),
        }
        flow
    }

    fn analyze_return(&mut self, node: NodeId, scope: ScopeId) -> Flow {
        let expected = self.methods[self.current].return_type;
        let value = self.ast.child(node, 1);

        let found = if self.ast.is_empty_production(value) {
            Some(Type::Void)
        } else {
            self.analyze_expression(self.ast.child(value, 0), scope)
                .map(|result| result.ty)
        };

        if let Some(found) = found.filter(|&found| found != expected) {
            let location = self.location(node);
            self.report(
                DiagnosticKind::TypeMismatch {
                    context: TypeContext::Return,
                    expected,
                    found,
                },
                location,
            );
        }
        Flow {
            returns: true,
            jumps: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::engine::Analyzer;
    use crate::diagnostics::{DiagnosticKind, Diagnostics, TypeContext};
    use crate::parser::ast::Ast;
    use crate::parser::parse::Parser;
    use crate::value::Type;

    fn parse(source: &str) -> Ast {
        let mut diagnostics = Diagnostics::new();
        let ast = Parser::new(source)
            .expect("lexes")
            .parse_program(&mut diagnostics);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
        ast
    }

    /// Collect and analyze without pruning
    fn check(source: &str) -> Vec<DiagnosticKind> {
        let mut ast = parse(source);
        let mut diagnostics = Diagnostics::new();
        let mut analyzer = Analyzer::new(&mut ast, &mut diagnostics);
        analyzer.collect_methods();
        analyzer.calls = vec![Default::default(); analyzer.methods.len()];
        for index in 0..analyzer.methods.len() {
            analyzer.analyze_method(index);
        }
        diagnostics.iter().map(|d| d.kind.clone()).collect()
    }

    #[test]
    fn test_redeclaration_reported_once() {
        let kinds = check("void main() { int x = 1; int x = 2; }");
        assert_eq!(
            kinds,
            vec![DiagnosticKind::Redeclaration {
                name: "x".to_string()
            }]
        );
    }

    #[test]
    fn test_redeclared_initializer_is_still_checked() {
        let kinds = check("void main() { int x = 1; print(x); int x = y + 1 / 0; }");
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::Redeclaration {
                    name: "x".to_string()
                },
                DiagnosticKind::UndeclaredVariable {
                    name: "y".to_string()
                },
                DiagnosticKind::DivisionByZero,
            ]
        );
    }

    #[test]
    fn test_shadowing_in_block_is_allowed() {
        let kinds = check("void main() { int x = 1; { int x = 2; print(x); } print(x); }");
        assert!(kinds.is_empty(), "{:?}", kinds);
    }

    #[test]
    fn test_undeclared_reported_once_per_method() {
        let kinds = check("void main() { y = 1; y = 2; } void f() { y = 3; }");
        let undeclared = kinds
            .iter()
            .filter(|k| matches!(k, DiagnosticKind::UndeclaredVariable { .. }))
            .count();
        assert_eq!(undeclared, 2);
    }

    #[test]
    fn test_missing_return_on_some_path() {
        let kinds = check(
            "void main() { } int f(boolean b) { if (b) { return 1; } } \
             int g(boolean b) { if (b) { return 1; } else { return 2; } }",
        );
        assert_eq!(
            kinds,
            vec![DiagnosticKind::MissingReturn {
                method: "f".to_string()
            }]
        );
    }

    #[test]
    fn test_return_type_mismatch() {
        let kinds = check("void main() { return 1; } int f() { return; }");
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::TypeMismatch {
                    context: TypeContext::Return,
                    expected: Type::Void,
                    found: Type::Int,
                },
                DiagnosticKind::TypeMismatch {
                    context: TypeContext::Return,
                    expected: Type::Int,
                    found: Type::Void,
                },
            ]
        );
    }

    #[test]
    fn test_break_outside_loop() {
        let kinds = check(
            "void main() { break; } void g() { continue; } \
             void f() { while (intInput() > 0) { break; } do { continue; } while (false); }",
        );
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::BreakOutsideLoop,
                DiagnosticKind::ContinueOutsideLoop,
                DiagnosticKind::ConstantCondition { value: false },
            ]
        );
    }

    #[test]
    fn test_assignment_type_mismatch() {
        let kinds = check("void main() { int x; x = true; }");
        assert_eq!(
            kinds,
            vec![DiagnosticKind::TypeMismatch {
                context: TypeContext::Assignment,
                expected: Type::Int,
                found: Type::Boolean,
            }]
        );
    }
}
