// Analysis driver and shared state

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::analyzer::errors::AnalysisError;
use crate::analyzer::scope::{Method, ScopeId, Scopes, VarId};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::parser::ast::{Ast, NodeId, SourceLocation};
use crate::value::Value;

/// Result of a successful analysis
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Reachable methods, entry point first, in source order otherwise
    pub methods: Vec<Method>,
}

/// Analyze and prune `ast` in place.
///
/// Semantic errors and warnings go to `diagnostics`. The only failures are a
/// missing entry point and an incomplete tree; in both cases the tree is
/// left unpruned.
pub fn analyze(ast: &mut Ast, diagnostics: &mut Diagnostics) -> Result<Analysis, AnalysisError> {
    if ast.preorder().into_iter().any(|id| !ast.is_complete(id)) {
        return Err(AnalysisError::IncompleteTree);
    }
    Analyzer::new(ast, diagnostics).run()
}

/// What to drop from the tree if a folded definition stays folded
#[derive(Debug, Clone, Copy)]
pub(crate) enum Removal {
    /// A whole assignment `statement`
    Statement(NodeId),
    /// The initializer of a `declaration`
    Initializer(NodeId),
}

/// A definition whose value was propagated into later reads
#[derive(Debug, Clone)]
pub(crate) struct Removable {
    pub target: Removal,
    /// Set when the definition must execute after all
    pub reactivated: bool,
}

/// Assignments to re-insert in front of a loop statement
#[derive(Debug, Clone)]
pub(crate) struct Rematerialization {
    pub statement: NodeId,
    pub assignments: Vec<(VarId, Value)>,
}

/// Semantic analyzer state for one run
pub struct Analyzer<'a> {
    /// Tree being analyzed and rewritten
    pub(crate) ast: &'a mut Ast,

    pub(crate) diagnostics: &'a mut Diagnostics,

    /// Method table; index 0 is the entry point once collection is done
    pub(crate) methods: Vec<Method>,

    pub(crate) scopes: Scopes,

    /// Root scope of each method, parallel to `methods`
    pub(crate) method_scopes: Vec<ScopeId>,

    /// Index of the method being analyzed
    pub(crate) current: usize,

    /// Names already reported as undeclared in the current method
    pub(crate) undeclared_variables: FxHashSet<String>,
    pub(crate) undeclared_methods: FxHashSet<String>,

    /// Call graph: callee indices per caller
    pub(crate) calls: Vec<FxHashSet<usize>>,

    /// Statement nodes of the enclosing loops, outermost first
    pub(crate) loops: Vec<NodeId>,

    /// Whether a `break`/`continue` targets each enclosing loop
    pub(crate) loop_jumps: Vec<bool>,

    /// Statement lists whose tail follows a jump
    pub(crate) dead_tails: Vec<NodeId>,

    /// Statements to empty (untaken `if`, loops that never run)
    pub(crate) dead_statements: Vec<NodeId>,

    pub(crate) removable: Vec<Removable>,

    pub(crate) rematerialize: Vec<Rematerialization>,

    /// Conditions of kept loops that read folded variables
    pub(crate) loop_conditions: Vec<NodeId>,
}

impl<'a> Analyzer<'a> {
    pub fn new(ast: &'a mut Ast, diagnostics: &'a mut Diagnostics) -> Self {
        Analyzer {
            ast,
            diagnostics,
            methods: Vec::new(),
            scopes: Scopes::new(),
            method_scopes: Vec::new(),
            current: 0,
            undeclared_variables: FxHashSet::default(),
            undeclared_methods: FxHashSet::default(),
            calls: Vec::new(),
            loops: Vec::new(),
            loop_jumps: Vec::new(),
            dead_tails: Vec::new(),
            dead_statements: Vec::new(),
            removable: Vec::new(),
            rematerialize: Vec::new(),
            loop_conditions: Vec::new(),
        }
    }

    /// Run every stage: collect methods, analyze each body, then prune
    pub fn run(mut self) -> Result<Analysis, AnalysisError> {
        debug!("collecting methods");
        let has_entry = self.collect_methods();
        self.calls = vec![FxHashSet::default(); self.methods.len()];

        for index in 0..self.methods.len() {
            self.analyze_method(index);
        }
        debug!(
            methods = self.methods.len(),
            errors = self.diagnostics.error_count(),
            "method bodies analyzed"
        );

        if !has_entry {
            return Err(AnalysisError::MissingEntryPoint);
        }

        self.prune();
        Ok(Analysis {
            methods: self.methods,
        })
    }

    // ===== Helper methods =====

    /// Report an error or warning attributed to the current method
    pub(crate) fn report(&mut self, kind: DiagnosticKind, location: SourceLocation) {
        let mut diagnostic = Diagnostic::new(kind, location);
        if let Some(method) = self.methods.get(self.current) {
            diagnostic = diagnostic.in_method(method.name.clone());
        }
        self.diagnostics.push(diagnostic);
    }

    /// Location of the first token under `node`
    pub(crate) fn location(&self, node: NodeId) -> SourceLocation {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(token) = self.ast.token(id) {
                return token.location;
            }
            stack.extend(self.ast.children(id).iter().rev());
        }
        SourceLocation::default()
    }

    /// Text and location of an identifier terminal
    pub(crate) fn identifier(&self, node: NodeId) -> (String, SourceLocation) {
        match self.ast.token(node) {
            Some(token) => (token.text().to_string(), token.location),
            None => (String::new(), SourceLocation::default()),
        }
    }

    /// Record the folded value of an expression node (or clear it)
    pub(crate) fn annotate(&mut self, node: NodeId, constant: Option<Value>) {
        self.ast.set_constant(node, constant);
    }

    pub(crate) fn add_removable(&mut self, target: Removal) -> usize {
        self.removable.push(Removable {
            target,
            reactivated: false,
        });
        self.removable.len() - 1
    }

    /// The variable's runtime storage must hold its value from here on:
    /// reinstate the definition that was going to be elided and stop folding.
    pub(crate) fn materialize(&mut self, var: VarId) {
        let variable = self.scopes.var(var);
        if !variable.mutable && variable.value.is_some() {
            if let Some(record) = variable.last_definition {
                self.removable[record].reactivated = true;
            }
        }
        let variable = self.scopes.var_mut(var);
        variable.mutable = true;
        variable.value = None;
        variable.used = true;
    }

    /// Queue `var = value;` in front of the loop `statement` (once per variable)
    pub(crate) fn schedule_rematerialization(&mut self, statement: NodeId, var: VarId, value: Value) {
        let index = match self
            .rematerialize
            .iter()
            .position(|entry| entry.statement == statement)
        {
            Some(index) => index,
            None => {
                self.rematerialize.push(Rematerialization {
                    statement,
                    assignments: Vec::new(),
                });
                self.rematerialize.len() - 1
            }
        };
        let entry = &mut self.rematerialize[index];
        if !entry.assignments.iter().any(|(v, _)| *v == var) {
            entry.assignments.push((var, value));
        }
    }
}
