//! Loop analysis (`while`, `do-while`, `for`).
//!
//! Loop bodies get a loop scope: one level deeper in loop nesting and in
//! conditional regions. A read inside the body of a variable folded outside
//! the loop cannot be substituted (a later iteration may see a different
//! value), so the value is re-materialized by an explicit assignment in
//! front of the outermost loop that sits inside the variable's scope.

use crate::analyzer::engine::Analyzer;
use crate::analyzer::expressions::Typed;
use crate::analyzer::scope::{ScopeId, ScopeKind, VarId};
use crate::analyzer::statements::Flow;
use crate::diagnostics::DiagnosticKind;
use crate::parser::ast::NodeId;

impl Analyzer<'_> {
    /// `while ( expression ) statement`
    pub(crate) fn analyze_while(&mut self, node: NodeId, statement: NodeId, scope: ScopeId) -> Flow {
        let condition = self.ast.child(node, 2);
        let (known, deps) = split(self.analyze_condition(condition, scope));
        let never = known == Some(false);

        self.enter_loop(statement);
        let body = self.scopes.child(scope, ScopeKind::loop_body(never));
        self.analyze_statement(self.ast.child(node, 4), body);
        self.exit_loop();

        self.finish_loop(statement, condition, known, &deps, scope, never);
        Flow::default()
    }

    /// `do statement while ( expression ) ;`
    ///
    /// The body runs before the condition is first evaluated, so it is
    /// analyzed first. A known-false condition reduces the loop to its body
    /// unless the body jumps out of it.
    pub(crate) fn analyze_do_while(&mut self, node: NodeId, statement: NodeId, scope: ScopeId) -> Flow {
        let body = self.ast.child(node, 1);

        self.enter_loop(statement);
        let body_scope = self.scopes.child(scope, ScopeKind::loop_body(false));
        let flow = self.analyze_statement(body, body_scope);
        let jumped = self.exit_loop();

        let condition = self.ast.child(node, 4);
        let (known, deps) = split(self.analyze_condition(condition, scope));

        if known == Some(false) && !jumped && !self.scopes.scope(scope).unreachable {
            if deps.is_empty() {
                let location = self.location(condition);
                self.report(DiagnosticKind::ConstantCondition { value: false }, location);
            }
            self.ast.replace(statement, body);
            for entry in &mut self.rematerialize {
                if entry.statement == statement {
                    entry.statement = body;
                }
            }
            return flow;
        }

        self.finish_loop(statement, condition, known, &deps, scope, false);
        Flow {
            returns: flow.returns,
            jumps: false,
        }
    }

    /// `for ( declaration expression ; assignment ) statement`
    ///
    /// Initializer, condition, update and body share one loop scope. The
    /// update runs after the body and is never folded away.
    pub(crate) fn analyze_for(&mut self, node: NodeId, statement: NodeId, scope: ScopeId) -> Flow {
        self.enter_loop(statement);
        let header = self.scopes.child(scope, ScopeKind::loop_body(false));

        let initializer = self.ast.child(node, 2);
        self.analyze_declaration(initializer, None, header);
        let pure_initializer = self.ast.children(initializer).len() != 5
            || self.ast.constant(self.ast.child(initializer, 3)).is_some();

        let condition = self.ast.child(node, 3);
        let (known, deps) = split(self.analyze_condition(condition, header));
        // A non-constant initializer may call a method, so the loop stays
        // and its body must stay consistent with the call graph.
        let removed = known == Some(false) && pure_initializer;

        let body = self.scopes.child(header, ScopeKind::branch(false, removed));
        self.analyze_statement(self.ast.child(node, 7), body);

        let update = self.ast.child(node, 5);
        let update_scope = self.scopes.child(header, ScopeKind::branch(false, removed));
        self.analyze_assignment(
            self.ast.child(update, 0),
            self.ast.child(update, 2),
            None,
            update_scope,
        );
        self.exit_loop();

        self.finish_loop(statement, condition, known, &deps, scope, removed);
        Flow::default()
    }

    fn enter_loop(&mut self, statement: NodeId) {
        self.loops.push(statement);
        self.loop_jumps.push(false);
    }

    /// Returns whether a `break`/`continue` targeted the loop
    fn exit_loop(&mut self) -> bool {
        self.loops.pop();
        self.loop_jumps.pop().unwrap_or(false)
    }

    /// Common tail of loop analysis: warn about constant conditions, drop a
    /// loop that never runs, and keep the condition of a running loop live.
    fn finish_loop(
        &mut self,
        statement: NodeId,
        condition: NodeId,
        known: Option<bool>,
        deps: &[VarId],
        scope: ScopeId,
        remove: bool,
    ) {
        if let Some(value) = known {
            if deps.is_empty() {
                let location = self.location(condition);
                self.report(DiagnosticKind::ConstantCondition { value }, location);
            }
        }
        if self.scopes.scope(scope).unreachable {
            return;
        }
        if remove {
            self.dead_statements.push(statement);
        } else {
            self.keep_condition_live(statement, condition, deps);
        }
    }

    /// The condition of a loop that runs is re-evaluated every iteration:
    /// folded variables it read are re-materialized in front of the loop and
    /// its dependent annotations are cleared during pruning.
    fn keep_condition_live(&mut self, statement: NodeId, condition: NodeId, deps: &[VarId]) {
        if deps.is_empty() {
            return;
        }
        self.loop_conditions.push(condition);
        for &var in deps {
            if let Some(value) = self.scopes.var(var).folded() {
                self.schedule_rematerialization(statement, var, value);
            }
            self.scopes.var_mut(var).used = true;
        }
    }
}

/// Known boolean value and dependencies of a checked condition
fn split(result: Option<Typed>) -> (Option<bool>, Vec<VarId>) {
    match result {
        Some(result) => (result.constant.and_then(|v| v.as_bool()), result.deps),
        None => (None, Vec::new()),
    }
}
