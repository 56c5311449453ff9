//! Lexical scopes and symbol tables.
//!
//! Scopes form a tree per module, stored as an arena of nodes with parent
//! indices. Each scope carries its nesting level (the code generator indents
//! emitted assembly by it) and an ordered symbol table.

use indexmap::IndexMap;
use std::rc::Rc;
use tomb_ast::{CompileResult, CompilerError, Literal, MethodKind, Phase, Span, TypeRef};

/// Index of a scope in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// What a name refers to.
#[derive(Debug, Clone)]
pub enum Symbol {
    /// A module-level constant, folded to its literal on use.
    Const { value: Literal, ty: TypeRef },
    /// A module global, backed by contract storage.
    Global { ty: TypeRef },
    /// A method-body local; `slot` is unique within the method.
    Local { slot: u32, ty: TypeRef },
    /// A method argument.
    Argument { slot: u32, ty: TypeRef },
    /// A method of the enclosing module.
    Method { kind: MethodKind },
    /// An imported library.
    Library,
    /// A declared struct type.
    StructType,
    /// A declared enum type.
    EnumType,
    /// A sibling top-level module.
    Module,
}

/// One lexical scope.
#[derive(Debug)]
pub struct Scope {
    parent: Option<ScopeId>,
    level: u32,
    symbols: IndexMap<Rc<str>, Symbol>,
}

/// Arena of scopes for one module.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the module root scope.
    pub fn root(&mut self) -> ScopeId {
        self.push(None, 0)
    }

    /// Open a child scope.
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        let level = self.scopes[parent.0 as usize].level + 1;
        self.push(Some(parent), level)
    }

    fn push(&mut self, parent: Option<ScopeId>, level: u32) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            level,
            symbols: IndexMap::new(),
        });
        id
    }

    /// Nesting depth of a scope; the root is level 0.
    pub fn level(&self, id: ScopeId) -> u32 {
        self.scopes[id.0 as usize].level
    }

    /// Declare a name in a scope.
    ///
    /// Redeclaring a name already present in the *same* scope is an error;
    /// shadowing an outer scope is allowed.
    pub fn declare(
        &mut self,
        id: ScopeId,
        name: Rc<str>,
        symbol: Symbol,
        span: Span,
    ) -> CompileResult<()> {
        let scope = &mut self.scopes[id.0 as usize];
        if scope.symbols.contains_key(&name) {
            return Err(CompilerError::new(
                Phase::Resolve,
                span,
                format!("duplicate declaration of '{name}'"),
            ));
        }
        scope.symbols.insert(name, symbol);
        Ok(())
    }

    /// Resolve a name lexically: nearest enclosing scope wins.
    pub fn resolve(&self, id: ScopeId, name: &str) -> Option<&Symbol> {
        let mut current = Some(id);
        while let Some(scope_id) = current {
            let scope = &self.scopes[scope_id.0 as usize];
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(symbol);
            }
            current = scope.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tomb_ast::TypeInterner;

    #[test]
    fn test_lexical_resolution() {
        let mut types = TypeInterner::new();
        let number = types.number();
        let string = types.string();

        let mut arena = ScopeArena::new();
        let root = arena.root();
        let inner = arena.child(root);

        arena
            .declare(root, "x".into(), Symbol::Global { ty: number.clone() }, Span::zero())
            .unwrap();
        arena
            .declare(
                inner,
                "x".into(),
                Symbol::Local {
                    slot: 0,
                    ty: string.clone(),
                },
                Span::zero(),
            )
            .unwrap();

        // Inner scope shadows the global.
        assert!(matches!(
            arena.resolve(inner, "x"),
            Some(Symbol::Local { .. })
        ));
        assert!(matches!(
            arena.resolve(root, "x"),
            Some(Symbol::Global { .. })
        ));
        assert!(arena.resolve(inner, "y").is_none());
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut types = TypeInterner::new();
        let number = types.number();

        let mut arena = ScopeArena::new();
        let root = arena.root();
        arena
            .declare(root, "x".into(), Symbol::Global { ty: number.clone() }, Span::zero())
            .unwrap();
        let err = arena
            .declare(root, "x".into(), Symbol::Global { ty: number }, Span::zero())
            .unwrap_err();
        assert!(err.message.contains("duplicate"));
    }

    #[test]
    fn test_levels() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let a = arena.child(root);
        let b = arena.child(a);
        assert_eq!(arena.level(root), 0);
        assert_eq!(arena.level(a), 1);
        assert_eq!(arena.level(b), 2);
    }
}
