//! Initializers (spec §4.5): the `= expr` / `= { ... }` tail of a
//! declarator, for both file-scope and block-scope declarations.
//!
//! File-scope initializers must be computable at load time — a genuine
//! compile-time constant, or a string literal (which lowers to a data
//! reference, not computed code) — everything else is deferred to a block
//! scope's ordinary `Assign` instructions. Struct/array initializers walk
//! their declared members/elements in order, composing each one's offset
//! the same way [`super::expr::member_var`] does for `.`/`->`.

use crate::diag::{ParseError, PResult};
use crate::ir::{BlockId, Var, VarKind};
use crate::sym::SymRef;
use crate::token::TokenKind;
use crate::types::{self, AggregateKind, TypeKind};

use super::expr::member_var;
use super::Parser;

/// The symbol a `Direct` `Var` names, if any — used to patch an incomplete
/// array's length in place once its initializer's element count is known.
fn direct_symbol(v: &Var) -> Option<SymRef> {
    match &v.kind {
        VarKind::Direct(sym) => Some(sym.clone()),
        _ => None,
    }
}

impl<'a> Parser<'a> {
    /// `initializer := assignment-expression | '{' initializer-list '}'`.
    pub(crate) fn initializer(&mut self, target: &Var, block: BlockId, file_scope: bool) -> PResult<BlockId> {
        if self.peek().kind == TokenKind::LBrace {
            self.object_initializer(target, block, file_scope)
        } else {
            self.scalar_initializer(target, block, file_scope)
        }
    }

    fn scalar_initializer(&mut self, target: &Var, block: BlockId, file_scope: bool) -> PResult<BlockId> {
        let (block, rhs) = self.assignment_expression(block)?;
        let load_time_computable = rhs.is_immediate() || matches!(rhs.kind, VarKind::StringLiteral(_));
        if file_scope && !load_time_computable {
            return Err(ParseError::InitializerNotComputableAtLoadTime);
        }
        if let TypeKind::Array(elem, None) = &target.ty.kind {
            if let VarKind::StringLiteral(sym) = &rhs.kind {
                if let Some(sym_entry) = direct_symbol(target) {
                    let len = crate::symbol::with_str(*sym, |t| t.len() as u64);
                    sym_entry.borrow_mut().ty = types::array_of(elem.clone(), Some(len + 1));
                }
            }
        }
        crate::ir::eval_assign(&mut self.cfg, block, target, rhs);
        Ok(block)
    }

    /// `'{' initializer-list '}'`, dispatching on `target`'s type (spec
    /// §4.5's union/struct/array cases, recovered from the source this was
    /// distilled from: a union initializer may only set its first member, a
    /// struct/array initializer walks its members/elements in declaration
    /// order and zero-fills whatever's left unmentioned).
    fn object_initializer(&mut self, target: &Var, mut block: BlockId, file_scope: bool) -> PResult<BlockId> {
        self.consume(TokenKind::LBrace)?;
        match &target.ty.kind {
            TypeKind::Tagged(agg) if agg.borrow().kind == AggregateKind::Union => {
                if self.peek().kind != TokenKind::RBrace {
                    let member = target.ty.get_member(0).ok_or(ParseError::MissingMemberName)?;
                    let union_size = target.ty.size_of().unwrap_or(0);
                    let member_size = member.ty.size_of().unwrap_or(0);
                    if member_size < union_size {
                        block = self.zero_fill_raw(target, union_size, block);
                    }
                    let member_target = member_var(target.clone(), member);
                    block = self.initializer(&member_target, block, file_scope)?;
                    if self.peek().kind == TokenKind::Comma {
                        self.next();
                    }
                    if self.peek().kind != TokenKind::RBrace {
                        return Err(ParseError::ExcessUnionInitializerElements);
                    }
                }
            }
            TypeKind::Tagged(agg) if agg.borrow().kind == AggregateKind::Struct => {
                let nmembers = target.ty.nmembers();
                let mut i = 0usize;
                while self.peek().kind != TokenKind::RBrace {
                    if i >= nmembers {
                        return Err(ParseError::ExcessInitializerElements);
                    }
                    let member = target.ty.get_member(i).unwrap();
                    let member_target = member_var(target.clone(), member);
                    block = self.initializer(&member_target, block, file_scope)?;
                    i += 1;
                    if self.peek().kind == TokenKind::Comma {
                        self.next();
                        continue;
                    }
                    break;
                }
                for j in i..nmembers {
                    let member = target.ty.get_member(j).unwrap();
                    let member_target = member_var(target.clone(), member);
                    block = self.zero_fill(&member_target, block);
                }
            }
            TypeKind::Array(elem, declared_len) => {
                let elem_size = elem.size_of().unwrap_or(0);
                let mut i: u64 = 0;
                while self.peek().kind != TokenKind::RBrace {
                    let elem_target = Var { kind: target.kind.clone(), ty: elem.clone(), offset: target.offset + i * elem_size };
                    block = self.initializer(&elem_target, block, file_scope)?;
                    i += 1;
                    if self.peek().kind == TokenKind::Comma {
                        self.next();
                        continue;
                    }
                    break;
                }
                match declared_len {
                    None => {
                        if let Some(sym_entry) = direct_symbol(target) {
                            sym_entry.borrow_mut().ty = types::array_of(elem.clone(), Some(i));
                        }
                    }
                    Some(len) => {
                        for j in i..*len {
                            let elem_target = Var { kind: target.kind.clone(), ty: elem.clone(), offset: target.offset + j * elem_size };
                            block = self.zero_fill(&elem_target, block);
                        }
                    }
                }
            }
            _ => {
                block = self.initializer(target, block, file_scope)?;
                if self.peek().kind == TokenKind::Comma {
                    self.next();
                }
            }
        }
        self.consume(TokenKind::RBrace)?;
        Ok(block)
    }

    /// Structurally zero-initializes every scalar leaf of `target`'s type
    /// (spec §4.5: "members/elements not covered by an initializer are
    /// zero-initialized").
    fn zero_fill(&mut self, target: &Var, block: BlockId) -> BlockId {
        match &target.ty.kind {
            TypeKind::Tagged(agg) if agg.borrow().complete => {
                let kind = agg.borrow().kind;
                let mut block = block;
                match kind {
                    AggregateKind::Struct => {
                        for i in 0..target.ty.nmembers() {
                            let member = target.ty.get_member(i).unwrap();
                            let member_target = member_var(target.clone(), member);
                            block = self.zero_fill(&member_target, block);
                        }
                        block
                    }
                    AggregateKind::Union => {
                        if let Some(member) = target.ty.get_member(0) {
                            let member_target = member_var(target.clone(), member);
                            self.zero_fill(&member_target, block)
                        } else {
                            block
                        }
                    }
                }
            }
            TypeKind::Array(elem, Some(len)) => {
                let mut block = block;
                let elem_size = elem.size_of().unwrap_or(0);
                for i in 0..*len {
                    let elem_target = Var { kind: target.kind.clone(), ty: elem.clone(), offset: target.offset + i * elem_size };
                    block = self.zero_fill(&elem_target, block);
                }
                block
            }
            _ => {
                let width = target.ty.size_of().unwrap_or(8);
                crate::ir::eval_assign(&mut self.cfg, block, target, crate::ir::var_zero(width));
                block
            }
        }
    }

    /// Zero-fills `size` bytes of `target` viewed as a raw array of words
    /// (8-byte aligned sizes) or bytes — used ahead of a union's first
    /// member initializer when that member is narrower than the union
    /// itself, so the padding a narrow member wouldn't reach is still
    /// cleared (spec §4.5).
    fn zero_fill_raw(&mut self, target: &Var, size: u64, block: BlockId) -> BlockId {
        let (elem, count) = if size % 8 == 0 {
            (types::long_ty(), size / 8)
        } else {
            (types::char_ty(), size)
        };
        let raw_target = Var { kind: target.kind.clone(), ty: types::array_of(elem, Some(count)), offset: target.offset };
        self.zero_fill(&raw_target, block)
    }
}

#[cfg(test)]
mod tests {
    use crate::diag::ParserConfig;
    use crate::ir::{Inst, Var, VarKind};
    use crate::parser::Parser;

    fn parse_one(src: &str) -> crate::ir::Cfg {
        let unit = Parser::new(src, ParserConfig::default()).parse_translation_unit().unwrap();
        unit.items.into_iter().next().expect("expected one committed item")
    }

    fn assign_offsets(cfg: &crate::ir::Cfg) -> Vec<u64> {
        cfg.block(cfg.head)
            .code
            .iter()
            .filter_map(|inst| match inst {
                Inst::Assign { target, .. } => Some(target.offset),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn incomplete_array_initializer_completes_its_length_from_element_count() {
        // spec S3: `int a[] = {1,2,3,4};` patches `a`'s type to `[4] int`
        // and emits exactly four assignments at offsets 0,4,8,12.
        let cfg = parse_one("int a[] = {1,2,3,4};");
        assert_eq!(assign_offsets(&cfg), vec![0, 4, 8, 12]);

        let target = match &cfg.block(cfg.head).code[0] {
            Inst::Assign { target, .. } => target.clone(),
            other => panic!("expected an Assign, found {other:?}"),
        };
        let Var { kind: VarKind::Direct(sym), .. } = &target else { panic!("expected a direct target") };
        assert_eq!(sym.borrow().ty.size_of(), Some(16), "4 elements * 4 bytes");
    }

    #[test]
    fn struct_initializer_zero_fills_members_not_mentioned() {
        // spec S6: `struct S { int a; int b; }; struct S s = {1};` assigns
        // 1 to `s.a` (offset 0) and zero-fills `s.b` (offset 4).
        let cfg = parse_one("struct S { int a; int b; }; struct S s = {1};");
        assert_eq!(assign_offsets(&cfg), vec![0, 4]);
    }

    #[test]
    fn union_initializer_may_only_set_its_first_member() {
        let err = Parser::new(
            "union U { int a; int b; }; union U u = {1, 2};",
            ParserConfig::default(),
        )
        .parse_translation_unit()
        .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::ExcessUnionInitializerElements));
    }

    #[test]
    fn union_initializer_zero_fills_padding_past_a_narrower_first_member() {
        // `union U { char a; int b; }` is 4 bytes wide; `a` is 1. Assigning
        // `{1}` must clear the whole 4 bytes before writing `a`, not just
        // `a`'s own byte.
        let cfg = parse_one("union U { char a; int b; }; union U u = {1};");
        let offsets = assign_offsets(&cfg);
        assert!(offsets.len() > 1, "expected a raw zero-fill ahead of the member assignment");
        assert_eq!(*offsets.last().unwrap(), 0, "the member initializer itself writes at offset 0");
    }

    #[test]
    fn file_scope_initializer_must_be_load_time_computable() {
        let err = Parser::new(
            "int f(void); int x = f();",
            ParserConfig::default(),
        )
        .parse_translation_unit()
        .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::InitializerNotComputableAtLoadTime));
    }
}
