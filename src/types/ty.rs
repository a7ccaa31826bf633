//! The canonical type representation.
//!
//! A [`Ty`] is an `Rc<TypeNode>`. Struct/union bodies live behind
//! `Rc<RefCell<Aggregate>>` so that every alias of an incomplete tag type —
//! created while the tag is still forward-declared — observes the same
//! members once the body is parsed (spec §3's "forward declarations of tags
//! are completed in place" invariant). Qualifiers are attached to the
//! `TypeNode` wrapper rather than the `Aggregate` itself, which is what lets
//! [`type_tagged_copy`] hand back an independently-qualifiable alias to the
//! same shared body without any extra bookkeeping.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::symbol::Symbol;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Qualifiers: u8 {
        const CONST    = 0b01;
        const VOLATILE = 0b10;
    }
}

/// Width, in bytes, of an integer type (spec §4.2's basic-type table).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntWidth {
    Char = 1,
    Short = 2,
    Int = 4,
    Long = 8,
}

impl IntWidth {
    #[must_use] pub fn bytes(self) -> u64 { self as u64 }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AggregateKind { Struct, Union }

/// A struct or union member. `offset` is only meaningful once the owning
/// [`Aggregate`] is `complete`.
#[derive(Clone, Debug)]
pub struct Member {
    pub name: Symbol,
    pub ty: Ty,
    pub offset: u64,
}

/// The shared, mutable body of a struct/union tag. Incomplete until its
/// member-declaration-list has been parsed, at which point `members`,
/// `size`, `align` and `complete` are filled in on the same `Aggregate`
/// every outstanding alias already points to.
#[derive(Debug)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub tag: Option<Symbol>,
    pub members: Vec<Member>,
    pub complete: bool,
    pub size: u64,
    pub align: u64,
}

impl Aggregate {
    #[must_use] pub fn incomplete(kind: AggregateKind, tag: Option<Symbol>) -> Rc<RefCell<Aggregate>> {
        Rc::new(RefCell::new(Aggregate { kind, tag, members: Vec::new(), complete: false, size: 0, align: 1 }))
    }
}

#[derive(Clone, Debug)]
pub enum TypeKind {
    Void,
    Signed(IntWidth),
    Unsigned(IntWidth),
    Float,
    Double,
    Pointer(Ty),
    /// `None` length is an incomplete array (spec §4.5's
    /// string-literal / brace-initializer completion case).
    Array(Ty, Option<u64>),
    Function { ret: Ty, params: Vec<Ty>, vararg: bool },
    Tagged(Rc<RefCell<Aggregate>>),
}

#[derive(Debug)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub qual: Qualifiers,
}

pub type Ty = Rc<TypeNode>;

fn mk(kind: TypeKind) -> Ty { Rc::new(TypeNode { kind, qual: Qualifiers::empty() }) }

#[must_use] pub fn void() -> Ty { mk(TypeKind::Void) }
#[must_use] pub fn char_ty() -> Ty { mk(TypeKind::Signed(IntWidth::Char)) }
#[must_use] pub fn unsigned_char() -> Ty { mk(TypeKind::Unsigned(IntWidth::Char)) }
#[must_use] pub fn short_ty() -> Ty { mk(TypeKind::Signed(IntWidth::Short)) }
#[must_use] pub fn unsigned_short() -> Ty { mk(TypeKind::Unsigned(IntWidth::Short)) }
#[must_use] pub fn int_ty() -> Ty { mk(TypeKind::Signed(IntWidth::Int)) }
#[must_use] pub fn unsigned_int() -> Ty { mk(TypeKind::Unsigned(IntWidth::Int)) }
#[must_use] pub fn long_ty() -> Ty { mk(TypeKind::Signed(IntWidth::Long)) }
#[must_use] pub fn unsigned_long() -> Ty { mk(TypeKind::Unsigned(IntWidth::Long)) }
#[must_use] pub fn float_ty() -> Ty { mk(TypeKind::Float) }
#[must_use] pub fn double_ty() -> Ty { mk(TypeKind::Double) }
#[must_use] pub fn pointer_to(inner: Ty) -> Ty { mk(TypeKind::Pointer(inner)) }
#[must_use] pub fn array_of(elem: Ty, len: Option<u64>) -> Ty { mk(TypeKind::Array(elem, len)) }
#[must_use] pub fn function_of(ret: Ty, params: Vec<Ty>, vararg: bool) -> Ty {
    mk(TypeKind::Function { ret, params, vararg })
}

bitflags! {
    /// The declaration-specifier bitmask, one bit per keyword token, spec
    /// §4.2. `LONG`/`LONG_LONG` is accumulated the same way the original
    /// parser's `set_specifier` macro does: the first `long` sets `LONG`,
    /// a second sets `LONG_LONG` on top of it, and `long long` collapses to
    /// plain `Long` in [`IntWidth`] since this front end targets a 64-bit
    /// `long` either way.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct SpecifierBits: u16 {
        const VOID     = 0x001;
        const CHAR     = 0x002;
        const SHORT    = 0x004;
        const INT      = 0x008;
        const SIGNED   = 0x010;
        const UNSIGNED = 0x020;
        const LONG     = 0x040;
        const LONG_LONG = 0x080;
        const FLOAT    = 0x100;
        const DOUBLE   = 0x200;
    }
}

/// Maps a declaration-specifier bitmask to its canonical basic type
/// (spec §4.2, exact table recovered from `get_basic_type_from_specifier`).
#[must_use]
pub fn get_basic_type_from_specifier(spec: SpecifierBits) -> Option<Ty> {
    use SpecifierBits as S;
    Some(match spec.bits() {
        b if b == S::VOID.bits() => void(),
        b if b == S::CHAR.bits() || b == (S::SIGNED | S::CHAR).bits() => char_ty(),
        b if b == (S::UNSIGNED | S::CHAR).bits() => unsigned_char(),
        b if b == S::SHORT.bits()
            || b == (S::SIGNED | S::SHORT).bits()
            || b == (S::SHORT | S::INT).bits()
            || b == (S::SIGNED | S::SHORT | S::INT).bits() => short_ty(),
        b if b == (S::UNSIGNED | S::SHORT).bits()
            || b == (S::UNSIGNED | S::SHORT | S::INT).bits() => unsigned_short(),
        b if b == S::INT.bits()
            || b == S::SIGNED.bits()
            || b == (S::SIGNED | S::INT).bits() => int_ty(),
        b if b == S::UNSIGNED.bits()
            || b == (S::UNSIGNED | S::INT).bits() => unsigned_int(),
        b if b == S::LONG.bits()
            || b == (S::SIGNED | S::LONG).bits()
            || b == (S::LONG | S::INT).bits()
            || b == (S::SIGNED | S::LONG | S::INT).bits()
            || b == (S::LONG | S::LONG_LONG).bits()
            || b == (S::SIGNED | S::LONG | S::LONG_LONG).bits()
            || b == (S::SIGNED | S::LONG | S::LONG_LONG | S::INT).bits() => long_ty(),
        b if b == (S::UNSIGNED | S::LONG).bits()
            || b == (S::UNSIGNED | S::LONG | S::INT).bits()
            || b == (S::UNSIGNED | S::LONG | S::LONG_LONG).bits()
            || b == (S::UNSIGNED | S::LONG | S::LONG_LONG | S::INT).bits() => unsigned_long(),
        b if b == S::FLOAT.bits() => float_ty(),
        b if b == S::DOUBLE.bits() || b == (S::DOUBLE | S::LONG).bits() => double_ty(),
        _ => return None,
    })
}

impl TypeNode {
    #[must_use] pub fn with_qual(&self, qual: Qualifiers) -> Ty {
        Rc::new(TypeNode { kind: self.kind.clone(), qual: self.qual | qual })
    }

    #[must_use] pub fn is_void(&self) -> bool { matches!(self.kind, TypeKind::Void) }
    #[must_use] pub fn is_pointer(&self) -> bool { matches!(self.kind, TypeKind::Pointer(_)) }
    #[must_use] pub fn is_array(&self) -> bool { matches!(self.kind, TypeKind::Array(..)) }
    #[must_use] pub fn is_function(&self) -> bool { matches!(self.kind, TypeKind::Function { .. }) }
    #[must_use] pub fn is_tagged(&self) -> bool { matches!(self.kind, TypeKind::Tagged(_)) }

    #[must_use] pub fn is_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Signed(_) | TypeKind::Unsigned(_))
    }

    #[must_use] pub fn is_float(&self) -> bool {
        matches!(self.kind, TypeKind::Float | TypeKind::Double)
    }

    #[must_use] pub fn is_arithmetic(&self) -> bool { self.is_integer() || self.is_float() }

    #[must_use] pub fn is_struct_or_union(&self) -> bool {
        matches!(&self.kind, TypeKind::Tagged(agg) if matches!(
            agg.borrow().kind, AggregateKind::Struct | AggregateKind::Union))
    }

    #[must_use] pub fn is_struct(&self) -> bool {
        matches!(&self.kind, TypeKind::Tagged(agg) if agg.borrow().kind == AggregateKind::Struct)
    }

    #[must_use] pub fn is_union(&self) -> bool {
        matches!(&self.kind, TypeKind::Tagged(agg) if agg.borrow().kind == AggregateKind::Union)
    }

    #[must_use] pub fn is_vararg(&self) -> bool {
        matches!(&self.kind, TypeKind::Function { vararg, .. } if *vararg)
    }

    #[must_use] pub fn is_complete(&self) -> bool {
        match &self.kind {
            TypeKind::Void | TypeKind::Function { .. } => false,
            TypeKind::Array(_, len) => len.is_some(),
            TypeKind::Tagged(agg) => agg.borrow().complete,
            _ => true,
        }
    }

    /// The pointee/element type of a pointer or array (spec §4.1's
    /// `type_deref`, used for `*` and `[]`).
    #[must_use] pub fn type_deref(&self) -> Option<Ty> {
        match &self.kind {
            TypeKind::Pointer(inner) | TypeKind::Array(inner, _) => Some(inner.clone()),
            _ => None,
        }
    }

    /// Number of declared struct/union members, or `0` for anything else.
    #[must_use] pub fn nmembers(&self) -> usize {
        match &self.kind {
            TypeKind::Tagged(agg) => agg.borrow().members.len(),
            _ => 0,
        }
    }

    /// Looks up a member by position, for positional (brace) initializers.
    #[must_use] pub fn get_member(&self, index: usize) -> Option<Member> {
        match &self.kind {
            TypeKind::Tagged(agg) => agg.borrow().members.get(index).cloned(),
            _ => None,
        }
    }

    /// Looks up a member by name, for `.`/`->` field access.
    #[must_use] pub fn find_type_member(&self, name: Symbol) -> Option<Member> {
        match &self.kind {
            TypeKind::Tagged(agg) => agg.borrow().members.iter().find(|m| m.name == name).cloned(),
            _ => None,
        }
    }

    #[must_use] pub fn size_of(&self) -> Option<u64> {
        Some(match &self.kind {
            TypeKind::Void => return None,
            TypeKind::Signed(w) | TypeKind::Unsigned(w) => w.bytes(),
            TypeKind::Float => 4,
            TypeKind::Double => 8,
            TypeKind::Pointer(_) => 8,
            TypeKind::Array(elem, Some(len)) => elem.size_of()? * len,
            TypeKind::Array(_, None) => return None,
            TypeKind::Function { .. } => return None,
            TypeKind::Tagged(agg) => {
                let agg = agg.borrow();
                if !agg.complete { return None; }
                agg.size
            }
        })
    }

    /// Strips qualifiers, returning the underlying unqualified type.
    #[must_use] pub fn unqualified(&self) -> Ty {
        Rc::new(TypeNode { kind: self.kind.clone(), qual: Qualifiers::empty() })
    }
}

impl PartialEq for TypeNode {
    /// Structural equality used for type-compatibility checks; tagged types
    /// compare by shared identity of their `Aggregate` (two tags are the
    /// same type iff they are the same declaration), matching the "tags are
    /// nominal, everything else is structural" rule spec §4 assumes.
    fn eq(&self, other: &Self) -> bool {
        if self.qual != other.qual { return false; }
        match (&self.kind, &other.kind) {
            (TypeKind::Void, TypeKind::Void) | (TypeKind::Float, TypeKind::Float) | (TypeKind::Double, TypeKind::Double) => true,
            (TypeKind::Signed(a), TypeKind::Signed(b)) | (TypeKind::Unsigned(a), TypeKind::Unsigned(b)) => a == b,
            (TypeKind::Pointer(a), TypeKind::Pointer(b)) => a == b,
            (TypeKind::Array(a, la), TypeKind::Array(b, lb)) => a == b && la == lb,
            (TypeKind::Function { ret: ra, params: pa, vararg: va },
             TypeKind::Function { ret: rb, params: pb, vararg: vb }) => ra == rb && pa == pb && va == vb,
            (TypeKind::Tagged(a), TypeKind::Tagged(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.qual.contains(Qualifiers::CONST) { write!(f, "const ")?; }
        if self.qual.contains(Qualifiers::VOLATILE) { write!(f, "volatile ")?; }
        match &self.kind {
            TypeKind::Void => write!(f, "void"),
            TypeKind::Signed(IntWidth::Char) => write!(f, "char"),
            TypeKind::Signed(w) => write!(f, "{w:?}"),
            TypeKind::Unsigned(w) => write!(f, "unsigned {w:?}"),
            TypeKind::Float => write!(f, "float"),
            TypeKind::Double => write!(f, "double"),
            TypeKind::Pointer(inner) => write!(f, "{inner}*"),
            TypeKind::Array(inner, Some(n)) => write!(f, "{inner}[{n}]"),
            TypeKind::Array(inner, None) => write!(f, "{inner}[]"),
            TypeKind::Function { ret, .. } => write!(f, "{ret} (*)(...)"),
            TypeKind::Tagged(agg) => {
                let agg = agg.borrow();
                let kw = match agg.kind { AggregateKind::Struct => "struct", AggregateKind::Union => "union" };
                write!(f, "{kw} {}", agg.tag.map_or_else(|| "<anon>".into(), |s| crate::symbol::with_str(s, str::to_owned)))
            }
        }
    }
}

/// Produces a fresh `TypeNode` aliasing the same shared `Aggregate`, so that
/// qualifying one use of a tag (`const struct foo x`) never affects another
/// (spec §4.2's "qualifiers apply per use, not per tag" note).
#[must_use]
pub fn type_tagged_copy(ty: &Ty) -> Ty {
    match &ty.kind {
        TypeKind::Tagged(agg) => Rc::new(TypeNode { kind: TypeKind::Tagged(agg.clone()), qual: ty.qual }),
        _ => ty.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specifier_table_matches_basic_combinations() {
        assert!(get_basic_type_from_specifier(SpecifierBits::INT).unwrap() == int_ty());
        assert!(get_basic_type_from_specifier(SpecifierBits::UNSIGNED | SpecifierBits::LONG).unwrap() == unsigned_long());
        assert!(get_basic_type_from_specifier(SpecifierBits::SIGNED | SpecifierBits::CHAR).unwrap() == char_ty());
        assert!(get_basic_type_from_specifier(SpecifierBits::DOUBLE | SpecifierBits::LONG).unwrap() == double_ty());
        assert!(get_basic_type_from_specifier(SpecifierBits::SHORT | SpecifierBits::DOUBLE).is_none());
    }

    #[test]
    fn forward_declared_tag_is_completed_in_place() {
        let agg = Aggregate::incomplete(AggregateKind::Struct, None);
        let alias_a = Rc::new(TypeNode { kind: TypeKind::Tagged(agg.clone()), qual: Qualifiers::empty() });
        let alias_b = type_tagged_copy(&alias_a).with_qual(Qualifiers::CONST);
        assert!(!alias_a.is_complete());
        assert!(!alias_b.is_complete());
        agg.borrow_mut().complete = true;
        agg.borrow_mut().size = 4;
        assert!(alias_a.is_complete());
        assert!(alias_b.is_complete());
        assert_eq!(alias_b.size_of(), Some(4));
    }

    #[test]
    fn qualified_alias_does_not_affect_original() {
        let agg = Aggregate::incomplete(AggregateKind::Struct, None);
        let base = Rc::new(TypeNode { kind: TypeKind::Tagged(agg), qual: Qualifiers::empty() });
        let qualified = type_tagged_copy(&base).with_qual(Qualifiers::CONST);
        assert!(!base.qual.contains(Qualifiers::CONST));
        assert!(qualified.qual.contains(Qualifiers::CONST));
    }
}
