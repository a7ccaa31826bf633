//! Declaration specifiers, declarators, and the struct/union/enum
//! declarations that can appear inside a specifier list (spec §4.2–§4.4).
//!
//! A declarator is parsed as a function from a base type to the final type
//! rather than as a mutable chain of type nodes spliced in place: `Ty` here
//! is an immutable `Rc<TypeNode>` (see `types::ty`), so there is no node to
//! mutate the way the original's pointer-chain splice does. `void (*f)(int)`
//! still works out the same way — the parenthesized inner declarator's
//! closure is composed *around* whatever the trailing suffixes build, which
//! is exactly the original's "walk to the first null `next`, then splice"
//! trick expressed as function composition instead of pointer surgery.

use std::rc::Rc;

use log::trace;

use crate::diag::{ParseError, PResult};
use crate::ir::Cfg;
use crate::sym::{Linkage, SymEntry, SymType};
use crate::symbol::Symbol;
use crate::token::TokenKind;
use crate::types::{
    self, AggregateKind, Aggregate, Member, Qualifiers, SpecifierBits, Ty, TypeKind, TypeNode,
    get_basic_type_from_specifier, type_tagged_copy,
};

use super::{name_str, Parser};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum StorageClass { Extern, Static, Auto, Register, Typedef }

/// A declarator, read off as a function waiting for its base type.
type DeclaratorFn = Box<dyn FnOnce(Ty) -> Ty>;

fn identity_declarator() -> DeclaratorFn { Box::new(|base| base) }

fn align_of_size(size: u64) -> u64 { size.clamp(1, 8) }

fn align_up(offset: u64, align: u64) -> u64 {
    if align == 0 { offset } else { (offset + align - 1) / align * align }
}

impl<'a> Parser<'a> {
    /// Parses an unordered multiset of specifier/qualifier/storage-class
    /// tokens (spec §4.2). `allow_storage` is `false` in specifier-qualifier
    /// contexts (struct members, parameter types, `sizeof (type-name)`),
    /// where any storage class is an error.
    pub(crate) fn declaration_specifiers(&mut self, allow_storage: bool) -> PResult<(Ty, Option<StorageClass>)> {
        let mut bits = SpecifierBits::empty();
        let mut qual = Qualifiers::empty();
        let mut storage: Option<StorageClass> = None;
        let mut explicit_ty: Option<Ty> = None;

        loop {
            let kind = self.peek().kind;
            let bit = match kind {
                TokenKind::Void => Some(SpecifierBits::VOID),
                TokenKind::Char => Some(SpecifierBits::CHAR),
                TokenKind::Short => Some(SpecifierBits::SHORT),
                TokenKind::Int => Some(SpecifierBits::INT),
                TokenKind::Signed => Some(SpecifierBits::SIGNED),
                TokenKind::Unsigned => Some(SpecifierBits::UNSIGNED),
                TokenKind::Float => Some(SpecifierBits::FLOAT),
                TokenKind::Double => Some(SpecifierBits::DOUBLE),
                _ => None,
            };
            if let Some(bit) = bit {
                if kind == TokenKind::Int && bits.contains(SpecifierBits::INT) {
                    return Err(ParseError::DuplicateTypeSpecifier("int".into()));
                }
                if bits.intersects(bit) {
                    return Err(ParseError::DuplicateTypeSpecifier(format!("{kind:?}")));
                }
                self.next();
                bits |= bit;
                continue;
            }
            if kind == TokenKind::Long {
                self.next();
                if bits.contains(SpecifierBits::LONG_LONG) {
                    return Err(ParseError::DuplicateTypeSpecifier("long".into()));
                } else if bits.contains(SpecifierBits::LONG) {
                    bits |= SpecifierBits::LONG_LONG;
                } else {
                    bits |= SpecifierBits::LONG;
                }
                continue;
            }
            if kind.starts_type_qualifier() {
                let q = if kind == TokenKind::Const { Qualifiers::CONST } else { Qualifiers::VOLATILE };
                if qual.contains(q) {
                    return Err(ParseError::DuplicateTypeQualifier(format!("{kind:?}")));
                }
                qual |= q;
                self.next();
                continue;
            }
            let sc = match kind {
                TokenKind::Extern => Some(StorageClass::Extern),
                TokenKind::Static => Some(StorageClass::Static),
                TokenKind::Auto => Some(StorageClass::Auto),
                TokenKind::Register => Some(StorageClass::Register),
                TokenKind::Typedef => Some(StorageClass::Typedef),
                _ => None,
            };
            if let Some(sc) = sc {
                if !allow_storage {
                    return Err(ParseError::UnexpectedStorageClass);
                }
                if storage.is_some() {
                    return Err(ParseError::MultipleStorageClasses);
                }
                storage = Some(sc);
                self.next();
                continue;
            }
            match kind {
                TokenKind::Struct if explicit_ty.is_none() && bits.is_empty() => {
                    self.next();
                    explicit_ty = Some(self.struct_or_union_specifier(AggregateKind::Struct)?);
                }
                TokenKind::Union if explicit_ty.is_none() && bits.is_empty() => {
                    self.next();
                    explicit_ty = Some(self.struct_or_union_specifier(AggregateKind::Union)?);
                }
                TokenKind::Enum if explicit_ty.is_none() && bits.is_empty() => {
                    self.next();
                    explicit_ty = Some(self.enum_specifier()?);
                }
                TokenKind::Identifier if explicit_ty.is_none() && bits.is_empty() => {
                    let name = self.peek().string_value.unwrap();
                    if let Some(sym) = self.ns_ident.lookup(name) {
                        if sym.borrow().symtype == SymType::Typedef {
                            self.next();
                            explicit_ty = Some(sym.borrow().ty.clone());
                            continue;
                        }
                    }
                    break;
                }
                _ => break,
            }
        }

        let base = if let Some(ty) = explicit_ty {
            if !bits.is_empty() {
                return Err(ParseError::InvalidSpecifierCombination);
            }
            ty
        } else if bits.is_empty() {
            return Err(ParseError::MissingTypeSpecifier);
        } else {
            get_basic_type_from_specifier(bits).ok_or(ParseError::InvalidSpecifierCombination)?
        };

        Ok((base.with_qual(qual), storage))
    }

    /// `struct-or-union-specifier`, entered just after the `struct`/`union`
    /// keyword has been consumed (spec §4.4).
    fn struct_or_union_specifier(&mut self, kind: AggregateKind) -> PResult<Ty> {
        let tag_name = if self.peek().kind == TokenKind::Identifier {
            Some(self.next().string_value.unwrap())
        } else {
            None
        };

        let agg = if let Some(name) = tag_name {
            if let Some(sym) = self.ns_tag.lookup(name) {
                let existing = match &sym.borrow().ty.kind {
                    TypeKind::Tagged(agg) => agg.clone(),
                    _ => return Err(ParseError::TagKindMismatch { tag: name_str(name), previous: "enum" }),
                };
                if existing.borrow().kind != kind {
                    let previous = match existing.borrow().kind { AggregateKind::Struct => "struct", AggregateKind::Union => "union" };
                    return Err(ParseError::TagKindMismatch { tag: name_str(name), previous });
                }
                existing
            } else {
                let agg = Aggregate::incomplete(kind, Some(name));
                let ty = Rc::new(TypeNode { kind: TypeKind::Tagged(agg.clone()), qual: Qualifiers::empty() });
                let depth = self.ns_tag.current_depth();
                self.ns_tag.add(SymEntry { name, ty, symtype: SymType::Typedef, linkage: Linkage::None, depth, enum_value: None });
                agg
            }
        } else {
            Aggregate::incomplete(kind, None)
        };

        if self.peek().kind == TokenKind::LBrace {
            if agg.borrow().complete {
                let tag = tag_name.map_or_else(|| "<anon>".to_string(), name_str);
                return Err(ParseError::TagRedefinition(tag));
            }
            self.next();
            let mut members = Vec::new();
            while self.peek().kind != TokenKind::RBrace {
                let (base_ty, _storage) = self.declaration_specifiers(false)?;
                loop {
                    let (declfn, name) = self.declarator()?;
                    let member_ty = declfn(base_ty.clone());
                    let name = name.ok_or(ParseError::MissingMemberName)?;
                    if !member_ty.is_complete() {
                        return Err(ParseError::IncompleteMemberType(name_str(name)));
                    }
                    members.push(Member { name, ty: member_ty, offset: 0 });
                    if self.peek().kind == TokenKind::Comma { self.next(); continue; }
                    break;
                }
                self.consume(TokenKind::Semicolon)?;
            }
            self.consume(TokenKind::RBrace)?;
            layout_members(kind, &mut members);
            let (size, align) = aggregate_size_align(kind, &members);
            let mut agg_mut = agg.borrow_mut();
            agg_mut.members = members;
            agg_mut.complete = true;
            agg_mut.size = size;
            agg_mut.align = align;
        }

        let ty = Rc::new(TypeNode { kind: TypeKind::Tagged(agg), qual: Qualifiers::empty() });
        Ok(type_tagged_copy(&ty))
    }

    /// `enum-specifier`, entered just after the `enum` keyword has been
    /// consumed (spec §4.4). Enums are always plain signed `int`; the tag
    /// symbol's `enum_value` doubles as a "has a body been parsed yet"
    /// sentinel, exactly as in the source this was distilled from.
    fn enum_specifier(&mut self) -> PResult<Ty> {
        let ty = types::int_ty();
        let tag_name = if self.peek().kind == TokenKind::Identifier {
            Some(self.next().string_value.unwrap())
        } else {
            None
        };

        let tag_sym = tag_name.map(|name| {
            if let Some(sym) = self.ns_tag.lookup(name) {
                sym
            } else {
                let depth = self.ns_tag.current_depth();
                self.ns_tag.add(SymEntry { name, ty: ty.clone(), symtype: SymType::Typedef, linkage: Linkage::None, depth, enum_value: None })
            }
        });

        if self.peek().kind == TokenKind::LBrace {
            if let Some(sym) = &tag_sym {
                if sym.borrow().enum_value.unwrap_or(0) != 0 {
                    let tag = tag_name.map_or_else(|| "<anon>".to_string(), name_str);
                    return Err(ParseError::EnumRedefinition(tag));
                }
            }
            self.enumerator_list()?;
            if let Some(sym) = &tag_sym {
                sym.borrow_mut().enum_value = Some(1);
            }
        } else if tag_name.is_none() {
            self.enumerator_list()?;
        }

        Ok(ty)
    }

    fn enumerator_list(&mut self) -> PResult<()> {
        self.consume(TokenKind::LBrace)?;
        let mut running = 0i64;
        loop {
            let name_tok = self.consume(TokenKind::Identifier)?;
            let name = name_tok.string_value.unwrap();
            if self.peek().kind == TokenKind::Assign {
                self.next();
                let val = self.constant_expression()?;
                if !val.ty.is_integer() {
                    return Err(ParseError::ConstantExpressionNotComputable);
                }
                running = match val.kind {
                    crate::ir::VarKind::Immediate(crate::ir::Imm::Int(n)) => n,
                    _ => return Err(ParseError::ConstantExpressionNotComputable),
                };
            }
            let depth = self.ns_ident.current_depth();
            let sym = self.ns_ident.add(SymEntry {
                name, ty: types::int_ty(), symtype: SymType::EnumConstant,
                linkage: Linkage::None, depth, enum_value: Some(running),
            });
            let _ = sym;
            running += 1;
            if self.peek().kind != TokenKind::Comma { break; }
            self.next();
            if self.peek().kind == TokenKind::RBrace { break; }
        }
        self.consume(TokenKind::RBrace)?;
        Ok(())
    }

    /// `declarator := pointer* direct-declarator` (spec §4.3).
    ///
    /// `[]`/`()` suffixes bind tighter to the identifier than a leading `*`:
    /// `int *a[3]` is an array of pointers, not a pointer to an array. So the
    /// pointer chain is applied to the base type first, and the direct
    /// declarator's suffix chain wraps around that result, not the other way
    /// around.
    pub(crate) fn declarator(&mut self) -> PResult<(DeclaratorFn, Option<Symbol>)> {
        let ptr_fn = self.pointer_chain()?;
        let (dd_fn, name) = self.direct_declarator()?;
        Ok((Box::new(move |base| dd_fn(ptr_fn(base))), name))
    }

    fn pointer_chain(&mut self) -> PResult<DeclaratorFn> {
        let mut f: DeclaratorFn = identity_declarator();
        while self.peek().kind == TokenKind::Star {
            self.next();
            let mut q = Qualifiers::empty();
            loop {
                match self.peek().kind {
                    TokenKind::Const => { q |= Qualifiers::CONST; self.next(); }
                    TokenKind::Volatile => { q |= Qualifiers::VOLATILE; self.next(); }
                    _ => break,
                }
            }
            let prev = f;
            f = Box::new(move |base| types::pointer_to(prev(base)).with_qual(q));
        }
        Ok(f)
    }

    fn direct_declarator(&mut self) -> PResult<(DeclaratorFn, Option<Symbol>)> {
        let (mut core, name): (DeclaratorFn, Option<Symbol>) = match self.peek().kind {
            TokenKind::LParen if self.peek_n(1).kind != TokenKind::RParen
                && !self.peek_n(1).kind.starts_type_name() => {
                self.next();
                let (inner, inner_name) = self.declarator()?;
                self.consume(TokenKind::RParen)?;
                (inner, inner_name)
            }
            TokenKind::Identifier => {
                let tok = self.next();
                (identity_declarator(), tok.string_value)
            }
            _ => (identity_declarator(), None),
        };

        // Suffixes chain so that the first one parsed ends up outermost:
        // `a[3][4]` is an array of 3 arrays of 4, not the reverse. Each new
        // suffix is applied directly to the base type and `prev` wraps
        // *around* that result, rather than wrapping the suffix around
        // `prev(base)` — the latter would nest them in parse order instead
        // of the array's declared dimension order.
        //
        // `[]` (an unspecified length) is only valid as the outermost
        // dimension — i.e. the first bracket encountered here (spec §4.3:
        // "`[]` is permitted only at the outermost dimension … Nested
        // incomplete element types are an error"). Every later bracket in
        // the same chain must carry an explicit size.
        let mut at_outermost_dimension = true;
        loop {
            match self.peek().kind {
                TokenKind::LBracket => {
                    self.next();
                    let len = if self.peek().kind == TokenKind::RBracket {
                        if !at_outermost_dimension {
                            return Err(ParseError::IncompleteElementType);
                        }
                        None
                    } else {
                        Some(self.array_dimension()?)
                    };
                    at_outermost_dimension = false;
                    self.consume(TokenKind::RBracket)?;
                    let prev = core;
                    core = Box::new(move |base| prev(types::array_of(base, len)));
                }
                TokenKind::LParen => {
                    self.next();
                    let (params, vararg) = self.parameter_type_list()?;
                    self.consume(TokenKind::RParen)?;
                    at_outermost_dimension = false;
                    let prev = core;
                    core = Box::new(move |base| prev(types::function_of(base, params, vararg)));
                }
                _ => break,
            }
        }
        Ok((core, name))
    }

    fn array_dimension(&mut self) -> PResult<u64> {
        let val = self.constant_expression()?;
        match val.kind {
            crate::ir::VarKind::Immediate(crate::ir::Imm::Int(n)) if n >= 1 => Ok(n as u64),
            _ => Err(ParseError::ArrayDimensionNotNatural),
        }
    }

    /// Parameter-type-list; returns the parameter types (for the function
    /// `Ty`) and the vararg flag. Named parameters are additionally
    /// registered against the in-progress [`Cfg`] by `top_level_declaration`
    /// once the function's own scope has been pushed, so this just returns
    /// the bare types plus their names via `self.pending_params`.
    fn parameter_type_list(&mut self) -> PResult<(Vec<Ty>, bool)> {
        self.pending_params.clear();
        if self.peek().kind == TokenKind::Void && self.peek_n(1).kind == TokenKind::RParen {
            self.next();
            return Ok((Vec::new(), false));
        }
        if self.peek().kind == TokenKind::RParen {
            return Ok((Vec::new(), false));
        }
        let mut params = Vec::new();
        let mut vararg = false;
        loop {
            if self.peek().kind == TokenKind::Dots {
                self.next();
                vararg = true;
                break;
            }
            let (base, _storage) = self.declaration_specifiers(false)?;
            let (declfn, name) = self.declarator()?;
            let ty = declfn(base);
            params.push(ty.clone());
            self.pending_params.push((name, ty));
            if self.peek().kind == TokenKind::Comma {
                self.next();
                if self.peek().kind == TokenKind::RParen {
                    return Err(ParseError::TrailingCommaInParameterList);
                }
                continue;
            }
            break;
        }
        Ok((params, vararg))
    }

    /// `type-name`: a specifier-qualifier-list followed by an optional
    /// abstract declarator (spec §4.1's cast/`sizeof` collaborator).
    pub(crate) fn type_name(&mut self) -> PResult<Ty> {
        let (base, _storage) = self.declaration_specifiers(false)?;
        let (declfn, name) = self.declarator()?;
        if name.is_some() {
            return Err(ParseError::AbstractDeclaratorIdentifier);
        }
        Ok(declfn(base))
    }

    /// Top-level entry point for one declaration-or-definition (spec §4.7).
    pub(crate) fn top_level_declaration(&mut self) -> PResult<Option<Cfg>> {
        let (base, storage) = self.declaration_specifiers(true)?;
        if self.peek().kind == TokenKind::Semicolon {
            self.next();
            return Ok(None);
        }

        loop {
            let (declfn, name) = self.declarator()?;
            let ty = declfn(base.clone());
            let name = name.ok_or(ParseError::MissingParameterName(0))?;

            let depth = self.ns_ident.current_depth();
            let (symtype, linkage) = decide_symtype_linkage(storage, depth);

            let sym = self.ns_ident.add(SymEntry { name, ty: ty.clone(), symtype, linkage, depth, enum_value: None });
            trace!("registered '{}' as {symtype:?}/{linkage:?} at depth {depth}", name_str(name));

            match self.peek().kind {
                TokenKind::LBrace if ty.is_function() && depth == 0 => {
                    return self.function_definition(name, &ty).map(Some);
                }
                TokenKind::Assign => {
                    self.next();
                    if symtype == SymType::Declaration {
                        return Err(ParseError::ExternSymbolInitialized(name_str(name)));
                    }
                    if depth == 0 && !self.file_scope_initialized.insert(name) {
                        return Err(ParseError::SymbolAlreadyDefined(name_str(name)));
                    }
                    let head = self.cfg.head;
                    let target = crate::ir::var_direct(&sym);
                    let _ = self.initializer(&target, head, true)?;
                    if self.peek().kind == TokenKind::Comma { self.next(); continue; }
                    self.consume(TokenKind::Semicolon)?;
                    break;
                }
                TokenKind::Comma => { self.next(); continue; }
                _ => { self.consume(TokenKind::Semicolon)?; break; }
            }
        }

        let cfg = self.swap_cfg(crate::symbol::intern(""));
        if cfg.block(cfg.head).code.is_empty() {
            Ok(None)
        } else {
            Ok(Some(cfg))
        }
    }

    /// `{ ... }` function body, entered once `(type, name)` has been parsed
    /// and the symbol registered (spec §4.7 step 4's `{` case).
    fn function_definition(&mut self, name: Symbol, ty: &Ty) -> PResult<Cfg> {
        let (ret, params, vararg) = match &ty.kind {
            TypeKind::Function { ret, params, vararg } => (ret.clone(), params.clone(), *vararg),
            _ => return Err(ParseError::InvalidFunctionDefinition),
        };
        if self.pending_params.len() != params.len() {
            return Err(ParseError::InvalidFunctionDefinition);
        }

        self.cfg = Cfg::new(name);
        self.push_scope();

        let mut last_param = None;
        let pending = std::mem::take(&mut self.pending_params);
        for (pname, pty) in pending {
            let pname = pname.ok_or(ParseError::MissingParameterName(0))?;
            let depth = self.ns_ident.current_depth();
            let entry = SymEntry { name: pname, ty: pty, symtype: SymType::Definition, linkage: Linkage::None, depth, enum_value: None };
            let sym = self.ns_ident.add(entry);
            self.cfg.register_param(sym);
            last_param = Some(pname);
        }

        let func_str = crate::symbol::with_str(name, str::to_owned);
        let func_sym_name = crate::symbol::intern("__func__");
        let func_ty = types::array_of(types::char_ty(), Some(func_str.len() as u64 + 1));
        let depth = self.ns_ident.current_depth();
        let func_sym = self.ns_ident.add(SymEntry {
            name: func_sym_name, ty: func_ty, symtype: SymType::Definition, linkage: Linkage::None, depth, enum_value: None,
        });
        let head = self.cfg.head;
        let string_literal = crate::ir::var_string(crate::symbol::intern(&func_str), func_str.len() as u64);
        let func_target = crate::ir::var_direct(&func_sym);
        crate::ir::eval_assign(&mut self.cfg, head, &func_target, string_literal);

        self.func = Some(super::FnContext {
            name, ret, vararg, last_param,
            labels: Default::default(),
            goto_fixups: Vec::new(),
        });

        let body_start = self.cfg.head;
        let _end = self.compound_statement(body_start)?;

        if let Some(func) = &self.func {
            if let Some((block, label)) = func.goto_fixups.first() {
                let label = name_str(*label);
                return Err(ParseError::UndefinedSymbol(format!("label '{label}' used by goto in block {block:?} is never defined")));
            }
        }

        self.pop_scope();
        self.func = None;
        Ok(self.swap_cfg(crate::symbol::intern("")))
    }
}

/// `(symtype, linkage)` decision table, spec §4.7 step 2. Shared between
/// the top-level loop and block-scope declaration-statements (`stmt.rs`),
/// which is the only reason `depth` is a parameter rather than always `0`.
pub(crate) fn decide_symtype_linkage(storage: Option<StorageClass>, depth: u32) -> (SymType, Linkage) {
    match storage {
        Some(StorageClass::Extern) => (SymType::Declaration, Linkage::External),
        Some(StorageClass::Static) => (SymType::Tentative, Linkage::Internal),
        Some(StorageClass::Typedef) => (SymType::Typedef, Linkage::None),
        Some(StorageClass::Auto | StorageClass::Register) => (SymType::Definition, Linkage::None),
        None if depth > 0 => (SymType::Definition, Linkage::None),
        None => (SymType::Tentative, Linkage::External),
    }
}

fn layout_members(kind: AggregateKind, members: &mut [Member]) {
    match kind {
        AggregateKind::Struct => {
            let mut offset = 0u64;
            for m in members.iter_mut() {
                let size = m.ty.size_of().unwrap_or(0);
                let align = align_of_size(size);
                offset = align_up(offset, align);
                m.offset = offset;
                offset += size;
            }
        }
        AggregateKind::Union => {
            for m in members.iter_mut() { m.offset = 0; }
        }
    }
}

fn aggregate_size_align(kind: AggregateKind, members: &[Member]) -> (u64, u64) {
    let align = members.iter().map(|m| align_of_size(m.ty.size_of().unwrap_or(0))).max().unwrap_or(1);
    let size = match kind {
        AggregateKind::Struct => members.last().map_or(0, |m| m.offset + m.ty.size_of().unwrap_or(0)),
        AggregateKind::Union => members.iter().map(|m| m.ty.size_of().unwrap_or(0)).max().unwrap_or(0),
    };
    (align_up(size, align), align)
}

#[cfg(test)]
mod tests {
    use crate::diag::ParserConfig;
    use crate::ir::{Imm, Inst, VarKind};
    use crate::parser::Parser;
    use crate::sym::{Linkage, SymType};

    fn parse(src: &str) -> crate::parser::TranslationUnit {
        Parser::new(src, ParserConfig::default()).parse_translation_unit().unwrap()
    }

    fn only_assign_target(cfg: &crate::ir::Cfg) -> crate::ir::Var {
        match cfg.block(cfg.head).code.last().expect("expected an instruction") {
            Inst::Assign { target, .. } => target.clone(),
            other => panic!("expected an Assign, found {other:?}"),
        }
    }

    #[test]
    fn tentative_extern_vs_tentative_internal_linkage() {
        // `int x;` alone commits nothing (no initializer, no body); `static
        // int y = 5;` does, and its target symbol carries Tentative/Internal.
        let unit = parse("int x; static int y = 5;");
        assert_eq!(unit.items.len(), 1);
        let target = only_assign_target(&unit.items[0]);
        let VarKind::Direct(sym) = &target.kind else { panic!("expected a direct target") };
        let sym = sym.borrow();
        assert_eq!(sym.symtype, SymType::Tentative);
        assert_eq!(sym.linkage, Linkage::Internal);
    }

    #[test]
    fn plain_file_scope_declaration_commits_no_cfg() {
        let unit = parse("int x;");
        assert!(unit.items.is_empty(), "a bare declaration with no initializer or body commits nothing");
    }

    #[test]
    fn extern_symbol_with_initializer_is_an_error() {
        let err = Parser::new("extern int x = 1;", ParserConfig::default())
            .parse_translation_unit()
            .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::ExternSymbolInitialized(_)));
    }

    #[test]
    fn specifier_canonicalization_is_permutation_independent() {
        // every permutation of `signed`/`long`/`int` resolves to the same type.
        let a = Parser::new("signed long int", ParserConfig::default()).declaration_specifiers(false).unwrap().0;
        let b = Parser::new("long signed int", ParserConfig::default()).declaration_specifiers(false).unwrap().0;
        let c = Parser::new("long int signed", ParserConfig::default()).declaration_specifiers(false).unwrap().0;
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn duplicate_int_specifier_is_rejected() {
        let err = Parser::new("int int", ParserConfig::default()).declaration_specifiers(false).unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::DuplicateTypeSpecifier(_)));
    }

    #[test]
    fn struct_member_offsets_are_laid_out_in_order_with_alignment() {
        // `struct S { char c; int i; }` must pad `i` up to a 4-byte boundary.
        let mut p = Parser::new("struct S { char c; int i; } s;", ParserConfig::default());
        let (ty, _) = p.declaration_specifiers(true).unwrap();
        assert_eq!(ty.get_member(0).unwrap().offset, 0);
        assert_eq!(ty.get_member(1).unwrap().offset, 4);
    }

    #[test]
    fn redefining_a_struct_tag_body_is_an_error() {
        let err = Parser::new("struct S { int a; }; struct S { int b; };", ParserConfig::default())
            .parse_translation_unit()
            .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::TagRedefinition(_)));
    }

    #[test]
    fn enum_constants_take_explicit_values_and_continue_from_them() {
        // spec S4: `enum E { A, B=3, C };` -> A=0, B=3, C=4.
        let unit = parse("enum E { A, B=3, C }; int f(void) { return A + B + C; }");
        let cfg = &unit.items[0];
        match &cfg.block(cfg.head).code[0] {
            Inst::Return(Some(v)) => {
                assert!(matches!(v.kind, VarKind::Immediate(Imm::Int(7))), "A+B+C == 0+3+4 == 7, folded at parse time");
            }
            other => panic!("expected a folded return, found {other:?}"),
        }
    }

    #[test]
    fn redefining_an_enum_tag_body_is_an_error() {
        let err = Parser::new("enum E { A }; enum E { B };", ParserConfig::default())
            .parse_translation_unit()
            .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::EnumRedefinition(_)));
    }

    #[test]
    fn array_of_pointers_not_pointer_to_array() {
        // `int *a[3]` binds `[]` tighter than the leading `*`: an array of
        // 3 pointers to int, not a pointer to a 3-element array.
        let unit = parse("void f(void) { int *a[3]; }");
        let local = &unit.items[0].locals[0];
        let ty = local.borrow().ty.clone();
        let crate::types::TypeKind::Array(elem, Some(3)) = &ty.kind else {
            panic!("expected an array of length 3, found {ty:?}");
        };
        assert!(elem.is_pointer(), "array element should be a pointer, found {elem:?}");
    }

    #[test]
    fn multi_dimensional_array_dimensions_preserve_declaration_order() {
        // `int a[2][3]` is an array of 2 arrays of 3, not the reverse.
        let unit = parse("void f(void) { int a[2][3]; }");
        let local = &unit.items[0].locals[0];
        let ty = local.borrow().ty.clone();
        let crate::types::TypeKind::Array(elem, Some(2)) = &ty.kind else {
            panic!("expected outer length 2, found {ty:?}");
        };
        let crate::types::TypeKind::Array(_, Some(3)) = &elem.kind else {
            panic!("expected inner length 3, found {elem:?}");
        };
    }

    #[test]
    fn parenthesized_pointer_to_function_returns_the_declared_type() {
        // `void (*f)(int)` is a pointer to a function, not a function
        // returning a pointer (the parenthesized `*f` must splice around
        // the trailing `(int)` suffix, not be wrapped by it).
        let unit = parse("void g(void) { void (*f)(int); }");
        let local = &unit.items[0].locals[0];
        let ty = local.borrow().ty.clone();
        assert!(ty.is_pointer(), "expected a pointer, found {ty:?}");
        let crate::types::TypeKind::Pointer(inner) = &ty.kind else { unreachable!() };
        assert!(inner.is_function(), "pointee should be a function type, found {inner:?}");
    }

    #[test]
    fn unspecified_length_array_rejected_past_the_outermost_dimension() {
        let err = Parser::new("int a[3][];", ParserConfig::default())
            .parse_translation_unit()
            .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::IncompleteElementType));
    }

    #[test]
    fn unspecified_length_array_accepted_at_the_outermost_dimension() {
        let unit = parse("int a[][3] = {{1,2,3},{4,5,6}};");
        assert_eq!(unit.items.len(), 1);
    }

    #[test]
    fn second_file_scope_initializer_is_rejected() {
        let err = Parser::new("int x = 1; int x = 2;", ParserConfig::default())
            .parse_translation_unit()
            .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::SymbolAlreadyDefined(_)));
    }

    #[test]
    fn tentative_declaration_followed_by_an_initializer_is_not_a_redefinition() {
        // `int x;` alone is tentative, not an initializer — a later `int x = 1;`
        // for the same name is the only definition and must be accepted.
        let unit = parse("int x; int x = 1;");
        assert_eq!(unit.items.len(), 1);
    }
}
