//! The two independent scoped namespaces spec §3 requires: `ns_ident` for
//! ordinary identifiers (variables, functions, typedefs, enum constants) and
//! `ns_tag` for `struct`/`union`/`enum` tags. Both are instances of the same
//! [`Namespace`] machinery, mirroring how `types::ty`'s `Aggregate` and this
//! module's `SymEntry` are both shared, mutable, `Rc<RefCell<_>>`-backed
//! records.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::symbol::Symbol;
use crate::types::Ty;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SymType {
    Definition,
    Declaration,
    Tentative,
    Typedef,
    /// An enumeration constant; its value lives in `SymEntry::enum_value`.
    EnumConstant,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Linkage {
    None,
    Internal,
    External,
}

#[derive(Debug)]
pub struct SymEntry {
    pub name: Symbol,
    pub ty: Ty,
    pub symtype: SymType,
    pub linkage: Linkage,
    /// Scope depth the symbol was declared at; `0` is file scope.
    pub depth: u32,
    pub enum_value: Option<i64>,
}

pub type SymRef = Rc<RefCell<SymEntry>>;

/// One of `ns_ident`/`ns_tag`: a stack of scopes, innermost last.
#[derive(Default)]
pub struct Namespace {
    scopes: Vec<HashMap<Symbol, SymRef>>,
}

impl Namespace {
    #[must_use] pub fn new() -> Self {
        Namespace { scopes: vec![HashMap::new()] }
    }

    #[must_use] pub fn current_depth(&self) -> u32 {
        u32::try_from(self.scopes.len() - 1).unwrap()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop file scope");
        self.scopes.pop();
    }

    /// Looks up `name` starting from the innermost scope outward (spec §3's
    /// shadowing rule: an inner declaration hides an outer one of the same
    /// name, in the same namespace, for the rest of the inner scope).
    #[must_use] pub fn lookup(&self, name: Symbol) -> Option<SymRef> {
        self.scopes.iter().rev().find_map(|scope| scope.get(&name).cloned())
    }

    /// Looks up `name` only in the innermost scope, for redeclaration checks.
    #[must_use] pub fn lookup_current(&self, name: Symbol) -> Option<SymRef> {
        self.scopes.last().and_then(|scope| scope.get(&name)).cloned()
    }

    pub fn add(&mut self, entry: SymEntry) -> SymRef {
        let name = entry.name;
        let sym = Rc::new(RefCell::new(entry));
        self.scopes.last_mut().unwrap().insert(name, sym.clone());
        sym
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::void;

    fn entry(name: Symbol, depth: u32) -> SymEntry {
        SymEntry { name, ty: void(), symtype: SymType::Declaration, linkage: Linkage::None, depth, enum_value: None }
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut ns = Namespace::new();
        let x = crate::symbol::intern("x");
        ns.add(entry(x, 0));
        ns.push_scope();
        ns.add(entry(x, 1));
        assert_eq!(ns.lookup(x).unwrap().borrow().depth, 1);
        ns.pop_scope();
        assert_eq!(ns.lookup(x).unwrap().borrow().depth, 0);
    }

    #[test]
    fn lookup_current_does_not_see_outer_scopes() {
        let mut ns = Namespace::new();
        let x = crate::symbol::intern("x");
        ns.add(entry(x, 0));
        ns.push_scope();
        assert!(ns.lookup_current(x).is_none());
        assert!(ns.lookup(x).is_some());
    }
}
