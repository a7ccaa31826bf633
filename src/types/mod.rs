//! Type algebra: the canonical `Ty` tree, aggregate (struct/union) bodies,
//! and the declaration-specifier bitmask table (spec §4.2).

pub mod ty;

pub use ty::*;
