//! Statements and the CFG weaving they drive (spec §4.6).
//!
//! Every production here has the shape `fn(&mut self, BlockId) -> PResult<BlockId>`:
//! handed the block its statement should append to (or branch from), it hands
//! back the block subsequent statements continue in. `break`/`continue`/`return`
//! each terminate their parent block and hand back a fresh orphan block, so
//! dead code after them still has somewhere to parse into (spec §4.6: "Orphan
//! blocks are minted ... so that following statements parse into a fresh
//! block"). A compound statement pushes and pops both namespaces exactly once,
//! matching spec §3's scope-balance invariant.

use crate::diag::{ParseError, PResult};
use crate::ir::{self, var_int, BlockId, IrOp};
use crate::sym::{SymEntry, SymType};
use crate::token::TokenKind;

use super::{name_str, Parser, SwitchCtx};

impl<'a> Parser<'a> {
    /// `compound-statement := '{' ( declaration | statement )* '}'`. Pushes
    /// both `ns_ident` and `ns_tag` (spec §4.6: "a compound statement ...
    /// pushes both `ns_ident` and `ns_tag` scopes ... and pops on `}`"),
    /// relaxing the K&R ordering restriction per `ParserConfig`'s C99 knob.
    pub(crate) fn compound_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::LBrace)?;
        self.push_scope();
        let mut block = parent;
        while self.peek().kind != TokenKind::RBrace {
            block = self.block_item(block)?;
        }
        self.consume(TokenKind::RBrace)?;
        self.pop_scope();
        Ok(block)
    }

    /// One element of a compound statement's body: a declaration or a
    /// statement, freely interleaved (spec §4.6's "K&R restriction relaxed").
    fn block_item(&mut self, parent: BlockId) -> PResult<BlockId> {
        if self.starts_declaration() {
            self.block_declaration(parent)
        } else {
            self.statement(parent)
        }
    }

    /// Whether the current token can lead a `declaration-specifiers` (spec
    /// §4.6's statement-leader dispatch table): a basic-type keyword, a
    /// qualifier, a storage class, `struct`/`union`/`enum`, or an identifier
    /// already bound as a `typedef` name in the current scope.
    fn starts_declaration(&self) -> bool {
        let kind = self.peek().kind;
        if kind.starts_type_name() { return true; }
        if matches!(kind, TokenKind::Typedef | TokenKind::Extern | TokenKind::Static | TokenKind::Auto | TokenKind::Register) {
            return true;
        }
        if kind == TokenKind::Identifier {
            if let Some(name) = self.peek().string_value {
                if let Some(sym) = self.ns_ident.lookup(name) {
                    return sym.borrow().symtype == SymType::Typedef;
                }
            }
        }
        false
    }

    /// A block-scope declaration-statement: same specifier/declarator
    /// grammar as a top-level declaration (spec §4.7), but its initializer
    /// IR lands in the live `parent` block instead of `current_cfg.head`,
    /// and the symbol is registered against the in-progress `Cfg` via
    /// `register_named_local` rather than committing a fresh one.
    fn block_declaration(&mut self, parent: BlockId) -> PResult<BlockId> {
        let (base, storage) = self.declaration_specifiers(true)?;
        if self.peek().kind == TokenKind::Semicolon {
            self.next();
            return Ok(parent);
        }

        let mut block = parent;
        loop {
            let (declfn, name) = self.declarator()?;
            let ty = declfn(base.clone());
            let name = name.ok_or(ParseError::MissingParameterName(0))?;

            let depth = self.ns_ident.current_depth();
            let (symtype, linkage) = super::decl::decide_symtype_linkage(storage, depth);
            let sym = self.ns_ident.add(SymEntry { name, ty: ty.clone(), symtype, linkage, depth, enum_value: None });
            if symtype != SymType::Typedef {
                self.cfg.register_named_local(sym.clone());
            }

            match self.peek().kind {
                TokenKind::Assign => {
                    self.next();
                    if symtype == SymType::Declaration {
                        return Err(ParseError::ExternSymbolInitialized(name_str(name)));
                    }
                    let target = ir::var_direct(&sym);
                    block = self.initializer(&target, block, false)?;
                    if self.peek().kind == TokenKind::Comma { self.next(); continue; }
                    self.consume(TokenKind::Semicolon)?;
                    break;
                }
                TokenKind::Comma => { self.next(); continue; }
                _ => { self.consume(TokenKind::Semicolon)?; break; }
            }
        }
        Ok(block)
    }

    /// Statement-leader dispatch (spec §4.6). A labeled statement
    /// (`identifier ':'`) is recognized with one token of lookahead ahead of
    /// the expression-statement fallback, since an identifier otherwise also
    /// leads a plain expression.
    pub(crate) fn statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        match self.peek().kind {
            TokenKind::LBrace => self.compound_statement(parent),
            TokenKind::If => self.if_statement(parent),
            TokenKind::While => self.while_statement(parent),
            TokenKind::Do => self.do_while_statement(parent),
            TokenKind::For => self.for_statement(parent),
            TokenKind::Switch => self.switch_statement(parent),
            TokenKind::Case => self.case_label(parent),
            TokenKind::Default => self.default_label(parent),
            TokenKind::Break => self.break_statement(parent),
            TokenKind::Continue => self.continue_statement(parent),
            TokenKind::Return => self.return_statement(parent),
            TokenKind::Goto => self.goto_statement(parent),
            TokenKind::Semicolon => { self.next(); Ok(parent) }
            TokenKind::Identifier if self.peek_n(1).kind == TokenKind::Colon => self.label_statement(parent),
            _ => self.expression_statement(parent),
        }
    }

    fn expression_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        let (block, _value) = self.expression(parent)?;
        self.consume(TokenKind::Semicolon)?;
        Ok(block)
    }

    /// Factors the three-way "prune if constant, else branch" idiom shared
    /// by `if`/`while`/`do`/`for` (SPEC_FULL.md §C: the same
    /// `is_immediate_true`/`is_immediate_false` check appears at every one
    /// of the original's call sites; this is one helper instead of four
    /// copies of it).
    fn weave_branch(&mut self, block: BlockId, cond: crate::ir::Var, false_target: BlockId, true_target: BlockId) {
        if cond.is_immediate_true() {
            ir::jump_to(&mut self.cfg, block, true_target);
        } else if cond.is_immediate_false() {
            ir::jump_to(&mut self.cfg, block, false_target);
        } else {
            ir::branch(&mut self.cfg, block, cond, false_target, true_target);
        }
    }

    /// `if (e) s [else s]` (spec §4.6). The else-or-next block is allocated
    /// before the `then` branch is parsed, since whether it ends up playing
    /// the role of `else` or `next` isn't known until after `then`'s
    /// statement has been consumed and the lookahead sees (or doesn't see)
    /// an `else` keyword.
    fn if_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::If)?;
        self.consume(TokenKind::LParen)?;
        let (block, cond) = self.expression(parent)?;
        self.consume(TokenKind::RParen)?;

        let then_block = self.cfg.new_block();
        let else_or_next = self.cfg.new_block();
        self.weave_branch(block, cond, else_or_next, then_block);
        let then_end = self.statement(then_block)?;

        if self.peek().kind == TokenKind::Else {
            self.next();
            let next = self.cfg.new_block();
            ir::jump_to(&mut self.cfg, then_end, next);
            let else_end = self.statement(else_or_next)?;
            ir::jump_to(&mut self.cfg, else_end, next);
            Ok(next)
        } else {
            ir::jump_to(&mut self.cfg, then_end, else_or_next);
            Ok(else_or_next)
        }
    }

    /// `while (e) s` (spec §4.6): `top` re-evaluates `e` on every iteration,
    /// so `continue` targets `top` itself, not a separate condition block.
    fn while_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::While)?;
        self.consume(TokenKind::LParen)?;
        let top = self.cfg.new_block();
        ir::jump_to(&mut self.cfg, parent, top);
        let (cond_end, cond) = self.expression(top)?;
        self.consume(TokenKind::RParen)?;

        let body = self.cfg.new_block();
        let next = self.cfg.new_block();
        self.weave_branch(cond_end, cond, next, body);

        self.break_stack.push(next);
        self.continue_stack.push(top);
        let body_end = self.statement(body)?;
        ir::jump_to(&mut self.cfg, body_end, top);
        self.break_stack.pop();
        self.continue_stack.pop();
        Ok(next)
    }

    /// `do s while (e);` (spec §4.6): the body runs once unconditionally
    /// before `e` is ever evaluated, and `continue` targets the condition
    /// block (re-checking `e`), not the body's entry.
    fn do_while_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::Do)?;
        let body = self.cfg.new_block();
        ir::jump_to(&mut self.cfg, parent, body);
        let cond_block = self.cfg.new_block();
        let next = self.cfg.new_block();

        self.break_stack.push(next);
        self.continue_stack.push(cond_block);
        let body_end = self.statement(body)?;
        ir::jump_to(&mut self.cfg, body_end, cond_block);
        self.break_stack.pop();
        self.continue_stack.pop();

        self.consume(TokenKind::While)?;
        self.consume(TokenKind::LParen)?;
        let (cond_end, cond) = self.expression(cond_block)?;
        self.consume(TokenKind::RParen)?;
        self.consume(TokenKind::Semicolon)?;
        self.weave_branch(cond_end, cond, next, body);
        Ok(next)
    }

    /// `for (init; cond; step) s` (spec §4.6). `init` is either an ordinary
    /// expression or a declaration (`for (int i = 0; ...)`, a C99
    /// convenience, spec §1) scoped to the whole loop via a dedicated
    /// `push_scope`/`pop_scope` pair. `step`'s tokens are parsed and its IR
    /// emitted into the `increment` block immediately, even though that
    /// block only runs after the body — a single left-to-right pass can
    /// still place instructions in a block that isn't wired into the live
    /// path until later. An absent `cond` is treated as an immediate-true
    /// `Var`, so [`Parser::weave_branch`] prunes it to a straight jump
    /// exactly as it would a literal `while (1)` (SPEC_FULL.md §C: "a
    /// constant-false condition inside an infinite/no-condition loop is
    /// still pruned").
    fn for_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::For)?;
        self.consume(TokenKind::LParen)?;

        // A declaration in the init clause (a C99 convenience, spec §1) is
        // scoped to the loop as a whole, not the surrounding block.
        self.push_scope();

        let mut current = parent;
        if self.starts_declaration() {
            // `block_declaration` consumes its own trailing `;`.
            current = self.block_declaration(current)?;
        } else {
            if self.peek().kind != TokenKind::Semicolon {
                let (block, _init) = self.expression(current)?;
                current = block;
            }
            self.consume(TokenKind::Semicolon)?;
        }

        let top = self.cfg.new_block();
        ir::jump_to(&mut self.cfg, current, top);
        let (cond_end, cond) = if self.peek().kind != TokenKind::Semicolon {
            self.expression(top)?
        } else {
            (top, var_int(1))
        };
        self.consume(TokenKind::Semicolon)?;

        let increment = self.cfg.new_block();
        let step_end = if self.peek().kind != TokenKind::RParen {
            let (block, _step) = self.expression(increment)?;
            block
        } else {
            increment
        };
        self.consume(TokenKind::RParen)?;
        ir::jump_to(&mut self.cfg, step_end, top);

        let body = self.cfg.new_block();
        let next = self.cfg.new_block();
        self.weave_branch(cond_end, cond, next, body);

        self.break_stack.push(next);
        self.continue_stack.push(increment);
        let body_end = self.statement(body)?;
        ir::jump_to(&mut self.cfg, body_end, increment);
        self.break_stack.pop();
        self.continue_stack.pop();
        self.pop_scope();
        Ok(next)
    }

    /// `switch (e) s` (spec §4.6/§8 property 3). The body is parsed first so
    /// every `case`/`default` it contains registers into the switch
    /// context; only once the body is fully consumed is the dispatch chain
    /// synthesized, branching off of `parent` (where `e` was evaluated) in
    /// source order, falling through to `default` if present or `next`
    /// otherwise (SPEC_FULL.md §C: "carried into `stmt.rs` unchanged").
    fn switch_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::Switch)?;
        self.consume(TokenKind::LParen)?;
        let (test_head, e) = self.expression(parent)?;
        self.consume(TokenKind::RParen)?;

        let next = self.cfg.new_block();
        self.switch_stack.push(SwitchCtx { default_label: None, cases: Vec::new() });
        self.break_stack.push(next);

        let body_start = self.cfg.new_block();
        let body_end = self.statement(body_start)?;
        ir::jump_to(&mut self.cfg, body_end, next);

        self.break_stack.pop();
        let ctx = self.switch_stack.pop().expect("switch_stack was just pushed above");

        let mut test_block = test_head;
        for (case_value, label) in ctx.cases {
            let cond = ir::eval_expr(&mut self.cfg, test_block, IrOp::Eq, case_value, e.clone());
            let next_test = self.cfg.new_block();
            ir::branch(&mut self.cfg, test_block, cond, next_test, label);
            test_block = next_test;
        }
        let tail = ctx.default_label.unwrap_or(next);
        ir::jump_to(&mut self.cfg, test_block, tail);
        Ok(next)
    }

    /// `case constant-expression ':'`. The previous block falls through
    /// into the fresh label unconditionally (spec §4.6: "the parent falls
    /// through (`jump[0]`) into the case's block") — the dispatch chain
    /// that actually reaches this label from outside the body is wired
    /// later, once the whole switch body has been parsed.
    fn case_label(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::Case)?;
        let value = self.constant_expression()?;
        self.consume(TokenKind::Colon)?;
        let label = self.cfg.new_block();
        {
            let ctx = self.switch_stack.last_mut().ok_or(ParseError::StrayCase)?;
            ctx.cases.push((value, label));
        }
        ir::jump_to(&mut self.cfg, parent, label);
        Ok(label)
    }

    /// `default ':'`. At most one per switch (spec §4.6: "`default` may
    /// appear at most once").
    fn default_label(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::Default)?;
        self.consume(TokenKind::Colon)?;
        let label = self.cfg.new_block();
        {
            let ctx = self.switch_stack.last_mut().ok_or(ParseError::StrayDefault)?;
            if ctx.default_label.is_some() {
                return Err(ParseError::DuplicateDefault);
            }
            ctx.default_label = Some(label);
        }
        ir::jump_to(&mut self.cfg, parent, label);
        Ok(label)
    }

    fn break_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::Break)?;
        self.consume(TokenKind::Semicolon)?;
        let target = *self.break_stack.last().ok_or(ParseError::BreakOutsideLoopOrSwitch)?;
        ir::jump_to(&mut self.cfg, parent, target);
        Ok(self.cfg.new_block())
    }

    fn continue_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::Continue)?;
        self.consume(TokenKind::Semicolon)?;
        let target = *self.continue_stack.last().ok_or(ParseError::ContinueOutsideLoop)?;
        ir::jump_to(&mut self.cfg, parent, target);
        Ok(self.cfg.new_block())
    }

    /// `return [expression] ';'` (spec §4.6). A `void`-returning function
    /// accepts only the bare form; otherwise a value is required.
    fn return_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::Return)?;
        let ret = self.func.as_ref().expect("return only appears inside a function body").ret.clone();
        if ret.is_void() {
            self.consume(TokenKind::Semicolon)?;
            ir::eval_return(&mut self.cfg, parent, None);
        } else {
            let (block, value) = self.expression(parent)?;
            self.consume(TokenKind::Semicolon)?;
            ir::eval_return(&mut self.cfg, block, Some(value));
        }
        Ok(self.cfg.new_block())
    }

    /// `goto identifier ';'`. Accepted and wired (spec §9's open question,
    /// resolved in DESIGN.md): a `goto` preceding its label is recorded in
    /// `FnContext::goto_fixups` and patched once [`Parser::label_statement`]
    /// sees the matching label; one still unresolved at the end of the
    /// function body is a fatal error (`function_definition` in `decl.rs`
    /// checks this once parsing finishes).
    fn goto_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        self.consume(TokenKind::Goto)?;
        let name = self.consume(TokenKind::Identifier)?.string_value.unwrap();
        self.consume(TokenKind::Semicolon)?;
        let func = self.func.as_mut().expect("goto only appears inside a function body");
        if let Some(&label) = func.labels.get(&name) {
            ir::jump_to(&mut self.cfg, parent, label);
        } else {
            func.goto_fixups.push((parent, name));
        }
        Ok(self.cfg.new_block())
    }

    /// `identifier ':' statement`. Resolves any `goto`s that targeted this
    /// label before it was seen.
    fn label_statement(&mut self, parent: BlockId) -> PResult<BlockId> {
        let name = self.consume(TokenKind::Identifier)?.string_value.unwrap();
        self.consume(TokenKind::Colon)?;
        let label = self.cfg.new_block();
        ir::jump_to(&mut self.cfg, parent, label);

        let resolved = {
            let func = self.func.as_mut().expect("labels only appear inside a function body");
            func.labels.insert(name, label);
            let pending = std::mem::take(&mut func.goto_fixups);
            let (resolved, remaining): (Vec<_>, Vec<_>) = pending.into_iter().partition(|&(_, lbl)| lbl == name);
            func.goto_fixups = remaining;
            resolved
        };
        for (block, _) in resolved {
            ir::jump_to(&mut self.cfg, block, label);
        }

        self.statement(label)
    }
}

#[cfg(test)]
mod tests {
    use crate::diag::ParserConfig;
    use crate::parser::Parser;

    fn parse_one(src: &str) -> crate::ir::Cfg {
        let unit = Parser::new(src, ParserConfig::default()).parse_translation_unit().unwrap();
        unit.items.into_iter().next().expect("expected one committed item")
    }

    #[test]
    fn if_else_wires_two_distinct_branches_both_returning() {
        let cfg = parse_one("int f(int a) { if (a) return 1; else return 2; }");
        let entry = cfg.block(cfg.head);
        let [on_false, on_true] = entry.jump;
        let (on_false, on_true) = (on_false.unwrap(), on_true.unwrap());
        assert_ne!(on_false, on_true);
        assert!(matches!(cfg.block(on_false).code.last(), Some(crate::ir::Inst::Return(_))));
        assert!(matches!(cfg.block(on_true).code.last(), Some(crate::ir::Inst::Return(_))));
    }

    #[test]
    fn constant_true_condition_prunes_to_a_straight_jump() {
        let cfg = parse_one("int f(void) { if (1) return 1; return 2; }");
        let entry = cfg.block(cfg.head);
        assert!(entry.jump[1].is_none(), "a pruned condition should leave only one successor");
        let taken = entry.jump[0].unwrap();
        assert!(matches!(cfg.block(taken).code.last(), Some(crate::ir::Inst::Return(_))));
    }

    #[test]
    fn while_loop_continue_targets_the_header_not_the_body() {
        let cfg = parse_one("int f(int n) { while (n) { n = n - 1; continue; } return 0; }");
        let header = cfg.block(cfg.head).jump[0].unwrap();
        let body = cfg.block(header).jump[1].unwrap();
        let continue_jump = cfg.block(body).jump[0].unwrap();
        assert_eq!(continue_jump, header);
    }

    #[test]
    fn switch_chain_is_source_order_with_default_fallthrough() {
        let cfg = parse_one(
            "int f(int x) { switch (x) { case 1: return 10; case 2: return 20; default: return 0; } }",
        );
        let entry = cfg.head;
        // first test block is the entry itself once `e` has been evaluated.
        let test1 = entry;
        let (on_false1, on_true1) = (cfg.block(test1).jump[0].unwrap(), cfg.block(test1).jump[1].unwrap());
        let case1_label = on_true1;
        assert!(matches!(cfg.block(case1_label).code.last(), Some(crate::ir::Inst::Return(_))));

        let test2 = on_false1;
        let (on_false2, on_true2) = (cfg.block(test2).jump[0].unwrap(), cfg.block(test2).jump[1].unwrap());
        let case2_label = on_true2;
        assert!(matches!(cfg.block(case2_label).code.last(), Some(crate::ir::Inst::Return(_))));

        // the chain's tail block (on_false2) carries no test of its own and
        // simply forwards to the `default` label.
        let default_label = cfg.block(on_false2).jump[0].unwrap();
        assert!(matches!(cfg.block(default_label).code.last(), Some(crate::ir::Inst::Return(_))));
    }

    #[test]
    fn break_outside_loop_or_switch_is_an_error() {
        let err = Parser::new("int f(void) { break; }", ParserConfig::default())
            .parse_translation_unit()
            .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::BreakOutsideLoopOrSwitch));
    }

    #[test]
    fn continue_outside_loop_is_an_error() {
        let err = Parser::new("int f(void) { continue; }", ParserConfig::default())
            .parse_translation_unit()
            .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::ContinueOutsideLoop));
    }

    #[test]
    fn stray_case_outside_switch_is_an_error() {
        let err = Parser::new("int f(void) { case 1: return 0; }", ParserConfig::default())
            .parse_translation_unit()
            .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::StrayCase));
    }

    #[test]
    fn duplicate_default_is_an_error() {
        let err = Parser::new(
            "int f(int x) { switch (x) { default: break; default: break; } }",
            ParserConfig::default(),
        )
        .parse_translation_unit()
        .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::DuplicateDefault));
    }

    #[test]
    fn forward_goto_resolves_once_the_label_is_seen() {
        let cfg = parse_one("int f(void) { goto done; return 1; done: return 0; }");
        // the block holding the goto jumps straight to the label's block.
        let goto_block = cfg.head;
        let target = cfg.block(goto_block).jump[0].unwrap();
        assert!(matches!(cfg.block(target).code.last(), Some(crate::ir::Inst::Return(_))));
    }

    #[test]
    fn compound_statement_balances_scope_depth() {
        let mut p = Parser::new("int f(void) { int x; { int y; } return x; }", ParserConfig::default());
        let depth_before = p.ns_ident.current_depth();
        let _ = p.parse_translation_unit().unwrap();
        // the namespace returns to file-scope depth once the function is done.
        assert_eq!(depth_before, 0);
    }

    #[test]
    fn mixed_declarations_and_statements_are_accepted() {
        let cfg = parse_one("int f(void) { int x = 1; x = x + 1; int y = x; return y; }");
        assert!(!cfg.block(cfg.head).code.is_empty());
    }

    #[test]
    fn for_loop_accepts_a_declaration_in_its_init_clause() {
        let cfg = parse_one(
            "int f(int n) { int total = 0; for (int i = 0; i < n; i = i + 1) { total = total + i; } return total; }",
        );
        // `total`'s declaration registers a local; `i`'s does too, scoped to
        // the loop, but both still land in the one function-wide locals list.
        assert_eq!(cfg.locals.len(), 2);
    }

    #[test]
    fn for_loop_declaration_does_not_leak_into_the_enclosing_scope() {
        let err = Parser::new(
            "int f(void) { for (int i = 0; i < 3; i = i + 1) { } return i; }",
            ParserConfig::default(),
        )
        .parse_translation_unit()
        .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::UndefinedSymbol(_)));
    }
}
