//! Lexical scopes for emission.
//!
//! Scopes are stored in one vector and linked by parent id; entering and
//! exiting follows block structure in LIFO order. Member tables are
//! insertion-ordered maps so that anything walking a scope sees variables
//! in declaration order.

use std::hash::BuildHasherDefault;

use bitflags::bitflags;
use indexmap::IndexMap;
use rustc_hash::FxHasher;

use rimec_par::ast::Const;

/// An insertion-ordered map with the Fx hasher.
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

bitflags! {
    /// Per-variable emission state.
    ///
    /// The visit flags implement the classic white/gray/black walk over
    /// global constants: unvisited, `VISITING` (gray, currently being
    /// emitted), `VISITED` (black, emitted). Observing `VISITING` during
    /// lookup is a dependency cycle. Every lookup reads and possibly
    /// rewrites all four bits together, which is why this is one bitset
    /// and not separate maps.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct VarFlags: u8 {
        /// Lives in the global scope; backed by a top-level constant.
        const GLOBAL = 1 << 0;
        /// Emission of the backing constant is in progress.
        const VISITING = 1 << 1;
        /// The backing constant has been emitted.
        const VISITED = 1 << 2;
        /// The variable names an address (a stack cell or an integer data
        /// symbol) that must go through `loadl` before use as a value.
        const LOAD = 1 << 3;
    }
}

/// A resolved variable.
#[derive(Clone, Copy, Debug)]
pub struct Variable<'a> {
    pub flags: VarFlags,
    /// The defining constant, for globals.
    pub global: Option<&'a Const<'a>>,
}

/// Index of a scope in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeId(usize);

/// A single lexical scope.
#[derive(Debug)]
struct Scope<'a> {
    vars: FxIndexMap<&'a str, Variable<'a>>,
    parent: Option<ScopeId>,
}

/// The scope stack, rooted at the global scope.
pub struct ScopeTree<'a> {
    scopes: Vec<Scope<'a>>,
    current: ScopeId,
}

impl<'a> ScopeTree<'a> {
    /// The global scope's id.
    pub const GLOBAL: ScopeId = ScopeId(0);

    /// Creates a tree containing only the global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                vars: FxIndexMap::default(),
                parent: None,
            }],
            current: Self::GLOBAL,
        }
    }

    /// The scope lookups currently start from.
    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Repoints lookups at `id`. Used to emit a referenced global from the
    /// global scope while a procedure body is mid-emission.
    pub fn set_current(&mut self, id: ScopeId) {
        debug_assert!(id.0 < self.scopes.len());
        self.current = id;
    }

    /// Opens a child of the current scope and makes it current.
    pub fn enter(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            vars: FxIndexMap::default(),
            parent: Some(self.current),
        });
        self.current = id;
        id
    }

    /// Closes the current scope, returning to its parent. Scopes close in
    /// LIFO order, mirroring block exit.
    pub fn exit(&mut self) {
        debug_assert_eq!(self.current.0, self.scopes.len() - 1);
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.scopes.pop();
            self.current = parent;
        }
    }

    /// Inserts into the current scope, returning the displaced variable if
    /// the name was already bound there.
    pub fn insert(&mut self, name: &'a str, var: Variable<'a>) -> Option<Variable<'a>> {
        self.scopes[self.current.0].vars.insert(name, var)
    }

    /// Looks `name` up in the current scope only.
    pub fn get_immediate(&self, name: &str) -> Option<Variable<'a>> {
        self.scopes[self.current.0].vars.get(name).copied()
    }

    /// Resolves `name` through the scope chain, innermost first.
    pub fn find(&self, name: &str) -> Option<Variable<'a>> {
        let mut id = self.current;

        loop {
            let scope = &self.scopes[id.0];

            if let Some(&var) = scope.vars.get(name) {
                return Some(var);
            }

            id = scope.parent?;
        }
    }

    /// Mutable access to a global's entry, for flag updates during the
    /// constant walk.
    pub fn get_global_mut(&mut self, name: &str) -> Option<&mut Variable<'a>> {
        self.scopes[Self::GLOBAL.0].vars.get_mut(name)
    }
}

impl<'a> Default for ScopeTree<'a> {
    fn default() -> Self {
        Self::new()
    }
}
