//! The recursive-descent parser, type resolver, and CFG/IR emitter.
//!
//! [`Parser`] owns everything the original's global mutable state held —
//! the token cursor, both namespaces, the CFG under construction, and the
//! `break_target`/`continue_target`/switch-context stacks — as ordinary
//! fields (spec §9's "parser-as-graph-builder" redesign note). Productions
//! are methods that take/return [`crate::ir::BlockId`]s into the current
//! [`crate::ir::Cfg`] rather than raw `Block` pointers.

mod decl;
mod expr;
mod init;
mod stmt;

use hashbrown::{HashMap, HashSet};
use log::trace;

use crate::diag::{ParseError, ParserConfig, PResult};
use crate::ir::{BlockId, Cfg, Var};
use crate::lexer::Lexer;
use crate::sym::Namespace;
use crate::symbol::Symbol;
use crate::token::{Token, TokenKind};
use crate::types::Ty;

/// The text behind an interned [`Symbol`], for diagnostics.
pub(crate) fn name_str(sym: Symbol) -> String { crate::symbol::with_str(sym, str::to_owned) }

/// Per-`switch` bookkeeping (spec §3's "Switch context").
pub(crate) struct SwitchCtx {
    pub default_label: Option<BlockId>,
    pub cases: Vec<(Var, BlockId)>,
}

/// State scoped to the function currently being defined; `None` while
/// parsing at file scope.
pub(crate) struct FnContext {
    pub name: Symbol,
    pub ret: Ty,
    pub vararg: bool,
    pub last_param: Option<Symbol>,
    pub labels: HashMap<Symbol, BlockId>,
    /// Blocks ending in an unresolved `goto`, recorded as `(block, label)`
    /// so the jump can be patched once the label is seen (spec §9's open
    /// question on `goto`, resolved here as forward-reference fixups rather
    /// than a hard error — see `DESIGN.md`).
    pub goto_fixups: Vec<(BlockId, Symbol)>,
}

/// A parsed translation unit: one [`Cfg`] per top-level item that produced
/// IR (spec §4.7 — a pure declaration with no initializer and no body
/// commits nothing).
pub struct TranslationUnit {
    pub items: Vec<Cfg>,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    pub(crate) config: ParserConfig,
    pub(crate) ns_ident: Namespace,
    pub(crate) ns_tag: Namespace,
    pub(crate) cfg: Cfg,
    pub(crate) break_stack: Vec<BlockId>,
    pub(crate) continue_stack: Vec<BlockId>,
    pub(crate) switch_stack: Vec<SwitchCtx>,
    pub(crate) func: Option<FnContext>,
    /// `(name, type)` for each parameter of the declarator currently being
    /// assembled, stashed here by `parameter_type_list` (spec §4.3) and
    /// drained by `function_definition` once the function's own scope has
    /// been pushed and each one can be registered against the CFG.
    pub(crate) pending_params: Vec<(Option<Symbol>, Ty)>,
    /// File-scope names that have already been given a `=` initializer.
    /// `symtype` alone can't answer "was this already initialized?" — a
    /// `static int y = 5;` still registers as `Tentative` — so a second
    /// initializer for the same name is caught here instead.
    pub(crate) file_scope_initialized: HashSet<Symbol>,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(src: &'a str, config: ParserConfig) -> Self {
        Parser {
            lexer: Lexer::new(src),
            config,
            ns_ident: Namespace::new(),
            ns_tag: Namespace::new(),
            cfg: Cfg::new(crate::symbol::intern("")),
            break_stack: Vec::new(),
            continue_stack: Vec::new(),
            switch_stack: Vec::new(),
            func: None,
            pending_params: Vec::new(),
            file_scope_initialized: HashSet::new(),
        }
    }

    pub(crate) fn peek(&self) -> Token { self.lexer.peek() }
    pub(crate) fn peek_n(&self, k: usize) -> Token { self.lexer.peek_n(k) }
    pub(crate) fn next(&mut self) -> Token { self.lexer.next() }
    pub(crate) fn consume(&mut self, kind: TokenKind) -> PResult<Token> { self.lexer.consume(kind) }

    pub(crate) fn at_end(&self) -> bool { self.peek().kind == TokenKind::End }

    /// Starts a fresh CFG for the next top-level declaration-or-definition
    /// (spec §4.7: "initializing a fresh CFG for each declaration-or-
    /// definition"), returning the one just finished.
    pub(crate) fn swap_cfg(&mut self, fun: Symbol) -> Cfg {
        std::mem::replace(&mut self.cfg, Cfg::new(fun))
    }

    pub(crate) fn push_scope(&mut self) {
        self.ns_ident.push_scope();
        self.ns_tag.push_scope();
        trace!("pushed scope, depth now {}", self.ns_ident.current_depth());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.ns_ident.pop_scope();
        self.ns_tag.pop_scope();
        trace!("popped scope, depth now {}", self.ns_ident.current_depth());
    }

    /// Top-level entry point (spec §4.7).
    pub fn parse_translation_unit(mut self) -> PResult<TranslationUnit> {
        let mut items = Vec::new();
        while !self.at_end() {
            if let Some(cfg) = self.top_level_declaration()? {
                items.push(cfg);
            }
        }
        Ok(TranslationUnit { items })
    }

    pub(crate) fn error_here(&self, make: impl FnOnce(Token) -> ParseError) -> ParseError {
        make(self.peek())
    }
}

#[cfg(test)]
mod tests {
    use crate::diag::ParserConfig;

    use super::Parser;

    #[test]
    fn each_function_gets_its_own_cfg_and_locals_do_not_leak_between_them() {
        let unit = Parser::new(
            "int f(void) { int x = 1; return x; } int g(void) { return 2; }",
            ParserConfig::default(),
        )
        .parse_translation_unit()
        .unwrap();
        assert_eq!(unit.items.len(), 2);
        assert!(!unit.items[0].locals.is_empty(), "f's local `x` should be registered against f's own Cfg");
        assert!(unit.items[1].locals.is_empty(), "g declares no locals of its own");
    }

    #[test]
    fn a_local_declared_in_one_function_is_not_visible_in_the_next() {
        let err = Parser::new("int f(void) { int x; return 0; } int g(void) { return x; }", ParserConfig::default())
            .parse_translation_unit()
            .unwrap_err();
        assert!(matches!(err, crate::diag::ParseError::UndefinedSymbol(_)));
    }

    #[test]
    fn pure_declarations_with_no_initializer_or_body_commit_no_cfg_items() {
        let unit = Parser::new("int f(void); int g(void);", ParserConfig::default())
            .parse_translation_unit()
            .unwrap();
        assert!(unit.items.is_empty());
    }
}
