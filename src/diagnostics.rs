//! Structured diagnostics
//!
//! Every stage reports into a [`Diagnostics`] sink passed by `&mut`. Records
//! carry the message parameters rather than preformatted text; rendering (and
//! colour) is up to the caller.

use crate::parser::ast::SourceLocation;
use crate::value::Type;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// Where a value was required to have a particular type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeContext {
    Declaration,
    Assignment,
    Return,
}

/// What went wrong
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    // ===== Syntax =====
    /// Token does not fit the expected symbol
    UnexpectedToken { found: String, expected: String },

    /// A `;` is missing before a token that starts the next statement
    MissingSemicolon { found: String },

    /// A string literal where only an expression is allowed
    StringArgument,

    /// Input continues after the program is complete
    TrailingInput { found: String },

    /// Input ended before the program was complete
    UnexpectedEnd,

    // ===== Semantic =====
    /// Name already bound in the same scope
    Redeclaration { name: String },

    UndeclaredVariable { name: String },

    UndeclaredMethod { name: String },

    /// Same name and parameter types as an earlier method
    DuplicateMethod { name: String },

    /// No method of this name takes this many arguments
    ArgumentCount { name: String, found: usize },

    /// No overload accepts these argument types
    NoMatchingOverload { name: String, arguments: Vec<Type> },

    /// Value of the wrong type for a declaration, assignment or return
    TypeMismatch {
        context: TypeContext,
        expected: Type,
        found: Type,
    },

    /// `if`/loop condition is not boolean
    ConditionNotBoolean { found: Type },

    IncompatibleOperands {
        operator: String,
        left: Type,
        right: Type,
    },

    InvalidOperand { operator: String, found: Type },

    /// A `void` call used as a value
    VoidValue { name: String },

    MissingReturn { method: String },

    BreakOutsideLoop,

    ContinueOutsideLoop,

    DivisionByZero,

    IntegerOverflow { literal: String },

    FloatOverflow { literal: String },

    // ===== Warnings =====
    ConstantCondition { value: bool },
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::ConstantCondition { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::UnexpectedToken { found, expected } => {
                write!(f, "Unexpected {}, expected {}", found, expected)
            }
            DiagnosticKind::MissingSemicolon { found } => {
                write!(f, "Missing ';' before {}", found)
            }
            DiagnosticKind::StringArgument => {
                write!(f, "String literals are only accepted as the sole argument of print")
            }
            DiagnosticKind::TrailingInput { found } => {
                write!(f, "Unexpected {} after the end of the program", found)
            }
            DiagnosticKind::UnexpectedEnd => write!(f, "Unexpected end of file"),
            DiagnosticKind::Redeclaration { name } => {
                write!(f, "The variable \"{}\" has already been declared", name)
            }
            DiagnosticKind::UndeclaredVariable { name } => {
                write!(f, "The variable \"{}\" is not declared", name)
            }
            DiagnosticKind::UndeclaredMethod { name } => {
                write!(f, "The method \"{}\" is not declared", name)
            }
            DiagnosticKind::DuplicateMethod { name } => {
                write!(f, "The method \"{}\" is already defined with the same parameters", name)
            }
            DiagnosticKind::ArgumentCount { name, found } => write!(
                f,
                "No method \"{}\" takes {} argument{}",
                name,
                found,
                if *found == 1 { "" } else { "s" }
            ),
            DiagnosticKind::NoMatchingOverload { name, arguments } => {
                let types: Vec<String> = arguments.iter().map(Type::to_string).collect();
                write!(
                    f,
                    "No method \"{}\" accepts arguments ({})",
                    name,
                    types.join(", ")
                )
            }
            DiagnosticKind::TypeMismatch {
                context,
                expected,
                found,
            } => {
                let what = match context {
                    TypeContext::Declaration => "Cannot initialize",
                    TypeContext::Assignment => "Cannot assign",
                    TypeContext::Return => "Cannot return",
                };
                write!(f, "{} a value of type '{}' where '{}' is expected", what, found, expected)
            }
            DiagnosticKind::ConditionNotBoolean { found } => {
                write!(f, "Invalid data type '{}'. Expected boolean", found)
            }
            DiagnosticKind::IncompatibleOperands {
                operator,
                left,
                right,
            } => write!(
                f,
                "Incompatible operand types for '{}': found '{}' and '{}'",
                operator, left, right
            ),
            DiagnosticKind::InvalidOperand { operator, found } => {
                write!(f, "Operator '{}' cannot be applied to '{}'", operator, found)
            }
            DiagnosticKind::VoidValue { name } => {
                write!(f, "The method \"{}\" does not return a value", name)
            }
            DiagnosticKind::MissingReturn { method } => write!(
                f,
                "Method \"{}\" does not return a value on all execution paths",
                method
            ),
            DiagnosticKind::BreakOutsideLoop => write!(f, "Break is outside the loop"),
            DiagnosticKind::ContinueOutsideLoop => write!(f, "Continue is outside the loop"),
            DiagnosticKind::DivisionByZero => write!(f, "Division by zero"),
            DiagnosticKind::IntegerOverflow { literal } => write!(
                f,
                "Integer value {} exceeds the 32-bit storage limit",
                literal
            ),
            DiagnosticKind::FloatOverflow { literal } => write!(
                f,
                "Float value {} exceeds the 32-bit storage limit (approximately ±3.4e38)",
                literal
            ),
            DiagnosticKind::ConstantCondition { value } => {
                write!(f, "Expression is always {}", value)
            }
        }
    }
}

/// One reported problem
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub line: usize,
    pub column: usize,
    /// Method being analyzed, if any
    pub method: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, location: SourceLocation) -> Self {
        Diagnostic {
            severity: kind.severity(),
            kind,
            line: location.line,
            column: location.column,
            method: None,
        }
    }

    pub fn in_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "line {}, column {}: ", self.line, self.column)?;
        }
        write!(f, "{}", self.kind)?;
        if let Some(method) = &self.method {
            write!(f, " (in method \"{}\")", method)?;
        }
        Ok(())
    }
}

/// Collector for diagnostics from every stage
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn report(&mut self, kind: DiagnosticKind, location: SourceLocation) {
        self.push(Diagnostic::new(kind, location));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| !d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
