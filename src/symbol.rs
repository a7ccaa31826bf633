//! String interning.
//!
//! Every identifier, tag name, and string-literal body the lexer or parser
//! touches is interned once into a process-wide table and referred to
//! afterwards by a cheap `Copy` [`Symbol`].

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::idx::Idx;

crate::mk_idx! {
    /// An interned string.
    pub struct Symbol;
}

#[derive(Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    map: HashMap<Box<str>, Symbol>,
}

impl Interner {
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }
        let sym = Symbol::from_usize(self.strings.len());
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.map.insert(boxed, sym);
        sym
    }

    pub fn resolve(&self, sym: Symbol) -> &str { &self.strings[sym.index()] }
}

fn global() -> &'static Mutex<Interner> {
    static GLOBAL: OnceLock<Mutex<Interner>> = OnceLock::new();
    GLOBAL.get_or_init(|| Mutex::new(Interner::default()))
}

/// Intern a string in the process-wide table.
pub fn intern(s: &str) -> Symbol { global().lock().unwrap().intern(s) }

/// Look up the text behind a previously interned symbol.
///
/// Takes a closure rather than returning `&str` because the backing table
/// lives behind a lock shared by every caller.
pub fn with_str<R>(sym: Symbol, f: impl FnOnce(&str) -> R) -> R {
    f(global().lock().unwrap().resolve(sym))
}

pub fn symbol_eq_str(sym: Symbol, s: &str) -> bool { with_str(sym, |t| t == s) }

/// Build a dense lookup table from a set of `(Symbol, T)` pairs, indexed by
/// the interned symbol's raw index. Used for the keyword and builtin tables
/// where symbols are interned once up front.
#[must_use]
pub fn init_dense_symbol_map<T: Copy>(pairs: &[(Symbol, T)]) -> Box<[Option<T>]> {
    let len = pairs.iter().map(|(s, _)| s.index() + 1).max().unwrap_or(0);
    let mut table = vec![None; len];
    for &(s, v) in pairs {
        table[s.index()] = Some(v);
    }
    table.into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let a = intern("foo");
        let b = intern("foo");
        let c = intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(symbol_eq_str(a, "foo"));
    }
}
