//! Method calls and built-in functions
//!
//! Built-ins (`print`, `intInput`, `floatInput`) are matched before the user
//! method table whenever their arity fits. User calls resolve in three
//! steps, each with its own diagnostic: by name, by argument count, then by
//! exact argument types.

use crate::analyzer::engine::Analyzer;
use crate::analyzer::expressions::Typed;
use crate::analyzer::scope::ScopeId;
use crate::diagnostics::DiagnosticKind;
use crate::parser::ast::NodeId;
use crate::parser::lexer::TokenKind;
use crate::value::Type;

/// Built-in functions, with the number of arguments they take
pub const BUILTINS: &[(&str, usize)] = &[("print", 1), ("intInput", 0), ("floatInput", 0)];

/// One analyzed call argument
#[derive(Debug)]
enum Argument {
    /// A string literal (only `print` accepts one)
    Text,
    /// An expression; `None` if it had errors
    Value(Option<Typed>),
}

impl Analyzer<'_> {
    /// Analyze a call of `name` with the given `arguments` node. Every
    /// argument is analyzed exactly once, before resolution.
    pub(crate) fn analyze_call(&mut self, name: NodeId, arguments: NodeId, scope: ScopeId) -> Option<Typed> {
        let (name, location) = self.identifier(name);

        let mut analyzed = Vec::new();
        for argument in self.argument_nodes(arguments) {
            if self.ast.token_is(argument, TokenKind::StringLiteral) {
                analyzed.push(Argument::Text);
            } else {
                analyzed.push(Argument::Value(self.analyze_expression(argument, scope)));
            }
        }

        if let Some(result) = self.call_builtin(&name, &analyzed) {
            return result;
        }

        if analyzed.iter().any(|a| matches!(a, Argument::Text)) {
            self.report(DiagnosticKind::StringArgument, location);
            return None;
        }

        let named: Vec<usize> = (0..self.methods.len())
            .filter(|&i| self.methods[i].name == name)
            .collect();
        if named.is_empty() {
            if self.undeclared_methods.insert(name.clone()) {
                self.report(DiagnosticKind::UndeclaredMethod { name }, location);
            }
            return None;
        }

        let counted: Vec<usize> = named
            .into_iter()
            .filter(|&i| self.methods[i].parameters.len() == analyzed.len())
            .collect();
        if counted.is_empty() {
            let found = analyzed.len();
            self.report(DiagnosticKind::ArgumentCount { name, found }, location);
            return None;
        }

        let mut types = Vec::with_capacity(analyzed.len());
        let mut deps = Vec::new();
        for argument in analyzed {
            match argument {
                Argument::Value(Some(result)) => {
                    types.push(result.ty);
                    deps.extend(result.deps);
                }
                // Errors inside the argument were already reported
                _ => return None,
            }
        }

        let Some(target) = counted.into_iter().find(|&i| self.methods[i].accepts(&types)) else {
            self.report(
                DiagnosticKind::NoMatchingOverload {
                    name,
                    arguments: types,
                },
                location,
            );
            return None;
        };

        if !self.scopes.scope(scope).unreachable {
            self.calls[self.current].insert(target);
        }
        Some(Typed {
            ty: self.methods[target].return_type,
            constant: None,
            deps,
        })
    }

    /// `Some(result)` if the call is a built-in
    fn call_builtin(&mut self, name: &str, arguments: &[Argument]) -> Option<Option<Typed>> {
        let arity = BUILTINS
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, arity)| *arity)?;
        if arity != arguments.len() {
            return None;
        }

        let result = match (name, arguments) {
            ("print", [Argument::Text]) => Some(Typed::runtime(Type::Void)),
            ("print", [Argument::Value(value)]) => value.as_ref().map(|value| Typed {
                ty: Type::Void,
                constant: None,
                deps: value.deps.clone(),
            }),
            ("intInput", []) => Some(Typed::runtime(Type::Int)),
            ("floatInput", []) => Some(Typed::runtime(Type::Float)),
            _ => None,
        };
        Some(result)
    }

    /// Argument nodes of an `arguments` node: one string-literal terminal,
    /// or the `expression` nodes of an argument list
    fn argument_nodes(&self, arguments: NodeId) -> Vec<NodeId> {
        let first = self.ast.child(arguments, 0);
        if self.ast.is_epsilon(first) {
            return Vec::new();
        }
        if self.ast.token(first).is_some() {
            return vec![first];
        }

        let mut found = vec![self.ast.child(first, 0)];
        let mut tail = self.ast.child(first, 1);
        while !self.ast.is_empty_production(tail) {
            found.push(self.ast.child(tail, 1));
            tail = self.ast.child(tail, 2);
        }
        found
    }
}

/// Whether `name` is a built-in function
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.iter().any(|(builtin, _)| *builtin == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::parser::ast::Ast;
    use crate::parser::parse::Parser;

    fn check(source: &str) -> Vec<DiagnosticKind> {
        let mut diagnostics = Diagnostics::new();
        let mut ast: Ast = Parser::new(source)
            .expect("lexes")
            .parse_program(&mut diagnostics);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics);

        let mut analyzer = Analyzer::new(&mut ast, &mut diagnostics);
        analyzer.collect_methods();
        analyzer.calls = vec![Default::default(); analyzer.methods.len()];
        for index in 0..analyzer.methods.len() {
            analyzer.analyze_method(index);
        }
        diagnostics.iter().map(|d| d.kind.clone()).collect()
    }

    #[test]
    fn test_builtins() {
        let kinds = check(
            "void main() { print(\"hi\"); print(1 + 2); int a = intInput(); \
             float b = floatInput(); print(a); print(b); }",
        );
        assert!(kinds.is_empty(), "{:?}", kinds);
        assert!(is_builtin("print"));
        assert!(!is_builtin("main"));
    }

    #[test]
    fn test_overload_resolution() {
        let kinds = check(
            "void main() { f(1); f(1.0); f(true); f(1, 2); g(); } \
             void f(int a) { } void f(float a) { }",
        );
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::NoMatchingOverload {
                    name: "f".to_string(),
                    arguments: vec![Type::Boolean],
                },
                DiagnosticKind::ArgumentCount {
                    name: "f".to_string(),
                    found: 2,
                },
                DiagnosticKind::UndeclaredMethod {
                    name: "g".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_void_call_as_value() {
        let kinds = check("void main() { int x = f(); } void f() { }");
        assert_eq!(
            kinds,
            vec![DiagnosticKind::VoidValue {
                name: "f".to_string()
            }]
        );
    }

    #[test]
    fn test_call_edges_skip_dead_code() {
        let mut diagnostics = Diagnostics::new();
        let mut ast = Parser::new("void main() { a(); return; b(); } void a() { } void b() { }")
            .expect("lexes")
            .parse_program(&mut diagnostics);
        let mut analyzer = Analyzer::new(&mut ast, &mut diagnostics);
        analyzer.collect_methods();
        analyzer.calls = vec![Default::default(); analyzer.methods.len()];
        analyzer.analyze_method(0);

        let callees: Vec<usize> = analyzer.calls[0].iter().copied().collect();
        assert_eq!(callees, vec![1]);
    }
}
