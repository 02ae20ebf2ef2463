//! Method collection.
//!
//! Adds `impl Analyzer` methods that read every signature off the method
//! spine (`program ::= method methods`, `methods ::= method methods | ε`)
//! before any body is analyzed, so calls may refer to methods defined later
//! in the file. The entry point is moved to the front of both the table and
//! the spine.

use tracing::debug;

use crate::analyzer::engine::Analyzer;
use crate::analyzer::scope::{Method, Parameter};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::parser::ast::{Kind, NodeId};
use crate::parser::lexer::TokenKind;
use crate::value::Type;

impl Analyzer<'_> {
    /// Fill the method table. Returns whether a `void main()` exists.
    pub(crate) fn collect_methods(&mut self) -> bool {
        let Some(root) = self.ast.root() else {
            return false;
        };

        let mut entry = None;
        let mut spine = root;
        while !self.ast.is_empty_production(spine) {
            let node = self.ast.child(spine, 0);
            if !self.ast.is_kind(node, Kind::Method) {
                break;
            }
            let method = self.read_signature(node);

            if self.methods.iter().any(|m| m.same_signature(&method)) {
                let location = self.location(self.ast.child(node, 1));
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateMethod {
                            name: method.name.clone(),
                        },
                        location,
                    )
                    .in_method(method.name.clone()),
                );
            } else if entry.is_none() && method.is_entry_point() {
                entry = Some(self.methods.len());
            }
            self.methods.push(method);

            spine = self.ast.child(spine, 1);
        }

        debug!(count = self.methods.len(), "methods collected");

        match entry {
            Some(0) => true,
            Some(index) => {
                self.move_to_front(index);
                true
            }
            None => false,
        }
    }

    /// Move the method at `index` to the head of the table and the spine
    fn move_to_front(&mut self, index: usize) {
        let Some(root) = self.ast.root() else {
            return;
        };
        let node = self.methods[index].node;
        let Some(link) = self.ast.parent(node) else {
            return;
        };
        let Some((owner, slot)) = self.ast.slot_of(link) else {
            return;
        };

        // Unlink: owner -> link[node, rest] becomes owner -> rest
        let rest = self.ast.child(link, 1);
        self.ast.clear(link);
        self.ast.set_child(owner, slot, rest);

        // Relink: program[first, tail] becomes program[node, methods[first, tail]]
        let first = self.ast.child(root, 0);
        let tail = self.ast.child(root, 1);
        let methods = self.ast.build(Kind::Methods, vec![first, tail]);
        self.ast.set_child(root, 0, node);
        self.ast.set_child(root, 1, methods);

        let method = self.methods.remove(index);
        self.methods.insert(0, method);
    }

    fn read_signature(&self, node: NodeId) -> Method {
        let return_type = self.return_type(self.ast.child(node, 0));
        let (name, _) = self.identifier(self.ast.child(node, 1));
        let parameters = self
            .parameter_nodes(self.ast.child(node, 3))
            .into_iter()
            .map(|parameter| Parameter {
                ty: self.type_of(self.ast.child(parameter, 0)),
                name: self.identifier(self.ast.child(parameter, 1)).0,
            })
            .collect();

        Method {
            return_type,
            name,
            parameters,
            node,
        }
    }

    /// `parameter` nodes of a `parameters` list, in order
    pub(crate) fn parameter_nodes(&self, parameters: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        if self.ast.is_empty_production(parameters) {
            return found;
        }
        found.push(self.ast.child(parameters, 0));

        let mut tail = self.ast.child(parameters, 1);
        while !self.ast.is_empty_production(tail) {
            found.push(self.ast.child(tail, 1));
            tail = self.ast.child(tail, 2);
        }
        found
    }

    /// Type named by a `type` node
    pub(crate) fn type_of(&self, node: NodeId) -> Type {
        let keyword = self.ast.children(node).first().copied().unwrap_or(node);
        match self.ast.token(keyword).and_then(|t| t.kind) {
            Some(TokenKind::Int) => Type::Int,
            Some(TokenKind::Float) => Type::Float,
            Some(TokenKind::Boolean) => Type::Boolean,
            _ => Type::Void,
        }
    }

    fn return_type(&self, node: NodeId) -> Type {
        let first = self.ast.child(node, 0);
        if self.ast.is_kind(first, Kind::Type) {
            self.type_of(first)
        } else {
            Type::Void
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::engine::Analyzer;
    use crate::diagnostics::{DiagnosticKind, Diagnostics};
    use crate::parser::ast::Kind;
    use crate::parser::parse::Parser;
    use crate::value::Type;

    fn parse(source: &str) -> crate::parser::ast::Ast {
        let mut diagnostics = Diagnostics::new();
        let ast = Parser::new(source)
            .expect("lexes")
            .parse_program(&mut diagnostics);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
        ast
    }

    #[test]
    fn test_signatures_are_read() {
        let mut ast = parse("int add(int a, float b) { return a; } void main() { }");
        let mut diagnostics = Diagnostics::new();
        let mut analyzer = Analyzer::new(&mut ast, &mut diagnostics);

        assert!(analyzer.collect_methods());
        let names: Vec<&str> = analyzer.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["main", "add"]);

        let add = &analyzer.methods[1];
        assert_eq!(add.return_type, Type::Int);
        let types: Vec<Type> = add.parameters.iter().map(|p| p.ty).collect();
        assert_eq!(types, vec![Type::Int, Type::Float]);
    }

    #[test]
    fn test_main_moves_to_front_of_tree() {
        let mut ast = parse("void a() { } void b() { } void main() { } void c() { }");
        let mut diagnostics = Diagnostics::new();
        Analyzer::new(&mut ast, &mut diagnostics).collect_methods();

        let order: Vec<String> = ast
            .find_all(Kind::Method)
            .into_iter()
            .filter(|&m| ast.is_attached(m))
            .map(|m| ast.text_of(ast.child(m, 1)))
            .collect();
        assert_eq!(order, vec!["main", "a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_and_missing_main() {
        let mut ast = parse("void f(int a) { } void f(int b) { } void f(float c) { }");
        let mut diagnostics = Diagnostics::new();
        let mut analyzer = Analyzer::new(&mut ast, &mut diagnostics);

        assert!(!analyzer.collect_methods());
        assert_eq!(analyzer.methods.len(), 3);
        let duplicates = diagnostics
            .iter()
            .filter(|d| matches!(d.kind, DiagnosticKind::DuplicateMethod { .. }))
            .count();
        assert_eq!(duplicates, 1);
    }
}
