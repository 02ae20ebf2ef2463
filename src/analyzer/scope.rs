//! Symbol tables: scopes, variables and methods
//!
//! Scopes and variables live in arenas owned by one analysis run and are
//! addressed by [`ScopeId`] / [`VarId`], so a variable found through a parent
//! scope can be updated without juggling borrows.

use rustc_hash::FxHashMap;

use crate::parser::ast::NodeId;
use crate::value::{Type, Value};

pub type ScopeId = usize;
pub type VarId = usize;

/// A declared variable
#[derive(Debug, Clone)]
pub struct Variable {
    pub ty: Type,
    pub name: String,
    /// Folded value while the variable is a known constant
    pub value: Option<Value>,
    pub mutable: bool,
    pub used: bool,
    pub announced: bool,
    /// `statement` node of the declaration, elided if the variable is unused
    pub declaration: Option<NodeId>,
    /// Loop nesting depth of the declaring scope
    pub(crate) loop_depth: usize,
    /// Conditional-region depth of the declaring scope
    pub(crate) region: usize,
    /// Removable record of the definition that produced `value`
    pub(crate) last_definition: Option<usize>,
}

impl Variable {
    pub fn new(ty: Type, name: impl Into<String>) -> Self {
        Variable {
            ty,
            name: name.into(),
            value: None,
            mutable: false,
            used: false,
            announced: true,
            declaration: None,
            loop_depth: 0,
            region: 0,
            last_definition: None,
        }
    }

    /// Known, immutable value that reads may substitute
    pub fn folded(&self) -> Option<Value> {
        if self.announced && !self.mutable {
            self.value
        } else {
            None
        }
    }
}

/// One lexical scope
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: FxHashMap<String, VarId>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub in_loop: bool,
    pub unreachable: bool,
    /// Number of enclosing loops
    pub loop_depth: usize,
    /// Number of enclosing conditionally executed regions (branches of a
    /// non-constant `if`, loop bodies)
    pub region: usize,
}

/// How a child scope differs from its parent
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ScopeKind {
    pub is_loop: bool,
    pub conditional: bool,
    pub unreachable: bool,
}

impl ScopeKind {
    pub fn block() -> Self {
        Self::default()
    }

    pub fn branch(conditional: bool, unreachable: bool) -> Self {
        ScopeKind {
            conditional,
            unreachable,
            ..Self::default()
        }
    }

    pub fn loop_body(unreachable: bool) -> Self {
        ScopeKind {
            is_loop: true,
            conditional: true,
            unreachable,
        }
    }

    pub fn dead() -> Self {
        ScopeKind {
            unreachable: true,
            ..Self::default()
        }
    }
}

/// Arena of scopes and variables for one analysis run
#[derive(Debug, Clone, Default)]
pub struct Scopes {
    scopes: Vec<Scope>,
    variables: Vec<Variable>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// A method's root scope
    pub fn root(&mut self) -> ScopeId {
        self.scopes.push(Scope::default());
        self.scopes.len() - 1
    }

    /// A child of `parent`; loop and unreachable flags are inherited
    pub(crate) fn child(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let outer = &self.scopes[parent];
        let scope = Scope {
            variables: FxHashMap::default(),
            parent: Some(parent),
            children: Vec::new(),
            in_loop: outer.in_loop || kind.is_loop,
            unreachable: outer.unreachable || kind.unreachable,
            loop_depth: outer.loop_depth + usize::from(kind.is_loop),
            region: outer.region + usize::from(kind.conditional),
        };
        let id = self.scopes.len();
        self.scopes.push(scope);
        self.scopes[parent].children.push(id);
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.variables[id]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.variables[id]
    }

    /// Bind `variable` in `scope`, taking the scope's depths
    pub fn declare(&mut self, scope: ScopeId, mut variable: Variable) -> VarId {
        variable.loop_depth = self.scopes[scope].loop_depth;
        variable.region = self.scopes[scope].region;
        let id = self.variables.len();
        self.scopes[scope]
            .variables
            .insert(variable.name.clone(), id);
        self.variables.push(variable);
        id
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        self.scopes[scope].variables.get(name).copied()
    }

    /// Resolve `name` through the scope chain
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(var) = self.lookup_local(id, name) {
                return Some(var);
            }
            current = self.scopes[id].parent;
        }
        None
    }

    /// Variables declared in `scope` and all scopes below it
    pub fn variables_under(&self, scope: ScopeId) -> Vec<VarId> {
        let mut found = Vec::new();
        let mut pending = vec![scope];
        while let Some(id) = pending.pop() {
            found.extend(self.scopes[id].variables.values().copied());
            pending.extend(self.scopes[id].children.iter().copied());
        }
        found.sort_unstable();
        found
    }
}

/// A method parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub ty: Type,
    pub name: String,
}

/// A method signature plus its location in the tree
#[derive(Debug, Clone)]
pub struct Method {
    pub return_type: Type,
    pub name: String,
    pub parameters: Vec<Parameter>,
    /// The `method` node
    pub node: NodeId,
}

impl Method {
    /// Same name and parameter types
    pub fn same_signature(&self, other: &Method) -> bool {
        self.name == other.name
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.ty == b.ty)
    }

    pub fn accepts(&self, arguments: &[Type]) -> bool {
        self.parameters.len() == arguments.len()
            && self
                .parameters
                .iter()
                .zip(arguments)
                .all(|(p, ty)| p.ty == *ty)
    }

    pub fn is_entry_point(&self) -> bool {
        self.name == "main" && self.return_type == Type::Void && self.parameters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        let x = scopes.declare(root, Variable::new(Type::Int, "x"));
        let inner = scopes.child(root, ScopeKind::block());

        assert_eq!(scopes.lookup(inner, "x"), Some(x));
        assert_eq!(scopes.lookup_local(inner, "x"), None);
        assert_eq!(scopes.lookup(root, "y"), None);
    }

    #[test]
    fn test_flags_are_inherited() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        let body = scopes.child(root, ScopeKind::loop_body(false));
        let dead = scopes.child(body, ScopeKind::dead());
        let nested = scopes.child(dead, ScopeKind::block());

        let nested = scopes.scope(nested);
        assert!(nested.in_loop);
        assert!(nested.unreachable);
        assert_eq!(nested.loop_depth, 1);
        assert_eq!(nested.region, 1);
    }

    #[test]
    fn test_declare_records_depths() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        let branch = scopes.child(root, ScopeKind::branch(true, false));
        let body = scopes.child(branch, ScopeKind::loop_body(false));
        let v = scopes.declare(body, Variable::new(Type::Float, "f"));

        assert_eq!(scopes.var(v).loop_depth, 1);
        assert_eq!(scopes.var(v).region, 2);
        assert_eq!(scopes.variables_under(root), vec![v]);
    }

    #[test]
    fn test_signatures() {
        let int_param = |name: &str| Parameter {
            ty: Type::Int,
            name: name.to_string(),
        };
        let a = Method {
            return_type: Type::Int,
            name: "f".to_string(),
            parameters: vec![int_param("a")],
            node: 0,
        };
        let b = Method {
            return_type: Type::Void,
            name: "f".to_string(),
            parameters: vec![int_param("b")],
            node: 1,
        };

        assert!(a.same_signature(&b));
        assert!(a.accepts(&[Type::Int]));
        assert!(!a.accepts(&[Type::Float]));
        assert!(!a.is_entry_point());
    }
}
