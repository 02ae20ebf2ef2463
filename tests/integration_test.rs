// Integration tests for the parse and analysis pipeline

use predicc::analyzer::{analyze, Analysis, AnalysisError};
use predicc::diagnostics::{DiagnosticKind, Diagnostics, TypeContext};
use predicc::parser::ast::{Ast, Kind};
use predicc::parser::parse::Parser;
use predicc::value::{Type, Value};

fn parse(source: &str) -> (Ast, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let ast = Parser::new(source)
        .expect("Lexing failed")
        .parse_program(&mut diagnostics);
    (ast, diagnostics)
}

fn compile(source: &str) -> (Ast, Diagnostics, Result<Analysis, AnalysisError>) {
    let (mut ast, mut diagnostics) = parse(source);
    assert!(!diagnostics.has_errors(), "Parsing failed: {:?}", diagnostics);
    let result = analyze(&mut ast, &mut diagnostics);
    (ast, diagnostics, result)
}

fn errors(diagnostics: &Diagnostics) -> Vec<DiagnosticKind> {
    diagnostics.errors().map(|d| d.kind.clone()).collect()
}

#[test]
fn test_minimal_program() {
    let (ast, diagnostics, result) = compile("void main() { }");

    assert!(result.is_ok(), "Analysis failed: {:?}", result);
    assert!(diagnostics.is_empty());
    assert_eq!(ast.source_text(), "void main ( ) { }");
}

#[test]
fn test_method_calls_and_parameters() {
    let source = r#"
        int add(int a, int b) {
            return a + b;
        }

        void main() {
            int result = add(3, 4);
            print(result);
        }
    "#;

    let (ast, diagnostics, result) = compile(source);
    let analysis = result.expect("Analysis failed");

    assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
    let names: Vec<&str> = analysis.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["main", "add"]);
    assert!(ast.source_text().starts_with("void main ( ) { int result = add ( 3 , 4 ) ;"));
}

#[test]
fn test_redeclaration_reports_one_error() {
    let (_, diagnostics, result) = compile("void main() { int x = 1; int x = 2; print(x); }");

    assert!(result.is_ok());
    assert_eq!(
        errors(&diagnostics),
        vec![DiagnosticKind::Redeclaration {
            name: "x".to_string()
        }]
    );
}

#[test]
fn test_division_by_constant_zero() {
    let (_, diagnostics, _) = compile("void main() { int x = 1 / 0; print(x); }");
    assert_eq!(errors(&diagnostics), vec![DiagnosticKind::DivisionByZero]);
}

#[test]
fn test_dead_branch_elimination() {
    let source = r#"
        void main() {
            if (false) {
                print("dead");
            }
            if (2 > 1) {
                print("live");
            } else {
                print("dead");
            }
        }
    "#;

    let (ast, diagnostics, result) = compile(source);

    assert!(result.is_ok());
    assert_eq!(diagnostics.warning_count(), 2);
    assert!(ast.find_all(Kind::IfStatement).is_empty());
    // String literal lexemes are stored unquoted
    assert_eq!(ast.source_text(), "void main ( ) { { print ( live ) ; } }");
}

#[test]
fn test_unreachable_methods_pruned() {
    let source = r#"
        void helper() { print(1); }
        void orphan() { helper(); }
        void main() { helper(); }
    "#;

    let (ast, _, result) = compile(source);
    let analysis = result.expect("Analysis failed");

    let names: Vec<&str> = analysis.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["main", "helper"]);
    assert_eq!(ast.find_all(Kind::Method).len(), 2);
}

#[test]
fn test_unused_variables_eliminated() {
    let source = r#"
        void main() {
            int unused = 42;
            int kept = intInput();
            float folded = 2.5;
            print(folded);
        }
    "#;

    let (ast, diagnostics, _) = compile(source);

    assert!(!diagnostics.has_errors());
    assert_eq!(
        ast.source_text(),
        "void main ( ) { int kept = intInput ( ) ; print ( folded ) ; }"
    );
}

#[test]
fn test_loop_rematerialization() {
    let source = r#"
        void main() {
            int step = 5;
            int total = 0;
            while (intInput() > 0) {
                total = total + step;
            }
            print(total);
        }
    "#;

    let (ast, diagnostics, _) = compile(source);

    assert!(!diagnostics.has_errors());
    assert_eq!(
        ast.source_text(),
        "void main ( ) { int step ; int total ; total = 0 ; step = 5 ; \
         while ( intInput ( ) > 0 ) { total = total + step ; } print ( total ) ; }"
    );

    // The injected value is a full expression annotated with the constant
    let injected: Vec<Value> = ast
        .find_all(Kind::Expression)
        .into_iter()
        .filter_map(|e| ast.constant(e))
        .collect();
    assert_eq!(injected, vec![Value::Int(0), Value::Int(5)]);
}

#[test]
fn test_missing_return_reported_once() {
    let source = r#"
        int sign(int n) {
            if (n > 0) {
                return 1;
            }
        }

        void main() { print(sign(3)); }
    "#;

    let (_, diagnostics, _) = compile(source);
    assert_eq!(
        errors(&diagnostics),
        vec![DiagnosticKind::MissingReturn {
            method: "sign".to_string()
        }]
    );
}

#[test]
fn test_missing_main_is_fatal() {
    let (_, diagnostics, result) = compile("void start() { int x = true; }");

    assert_eq!(result.unwrap_err(), AnalysisError::MissingEntryPoint);
    // Bodies are still checked
    assert_eq!(
        errors(&diagnostics),
        vec![DiagnosticKind::TypeMismatch {
            context: TypeContext::Declaration,
            expected: Type::Int,
            found: Type::Boolean,
        }]
    );
}

#[test]
fn test_errors_carry_method_context() {
    let (_, diagnostics, _) = compile("void main() { undefined(); }");
    let error = diagnostics.errors().next().expect("an error");

    assert_eq!(error.method.as_deref(), Some("main"));
    assert_eq!((error.line, error.column), (1, 15));
}

#[test]
fn test_syntax_errors_are_collected() {
    let (_, diagnostics) = parse("void main() { int x = 1 print(x); }");

    assert!(diagnostics
        .errors()
        .any(|d| matches!(d.kind, DiagnosticKind::MissingSemicolon { .. })));
}

#[test]
fn test_nested_parentheses() {
    let depth = 200;
    let source = format!(
        "void main() {{ print({}1{}); }}",
        "(".repeat(depth),
        ")".repeat(depth)
    );

    let (ast, diagnostics, result) = compile(&source);

    assert!(result.is_ok());
    assert!(!diagnostics.has_errors());
    let expression = ast.find_all(Kind::Expression)[0];
    assert_eq!(ast.constant(expression), Some(Value::Int(1)));
}
