//! The token vocabulary consumed by the parser. Spec §6 lists the keyword
//! and punctuator set the grammar in §4 actually dispatches on; this module
//! is the concrete `Token`/`TokenKind` the (out-of-scope) lexer collaborator
//! produces and the parser's `peek`/`peek_n`/`next`/`consume` operate over.

use std::fmt;

use crate::symbol::Symbol;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    // Literals & identifiers
    Identifier,
    IntegerConstant,
    FloatConstant,
    String,

    // Keywords
    Void, Char, Short, Int, Signed, Unsigned, Long, Float, Double,
    Const, Volatile,
    Struct, Union, Enum,
    Typedef, Extern, Static, Auto, Register,
    If, Else, Do, While, For, Goto, Continue, Break, Return,
    Switch, Case, Default,
    Sizeof,

    // Punctuators
    LParen, RParen, LBrace, RBrace, LBracket, RBracket,
    Comma, Semicolon, Colon, Question, Dot,
    Plus, Minus, Star, Slash, Percent,
    Amp, Pipe, Caret, Tilde, Bang,
    Lt, Gt, Assign,

    // Compound punctuators
    LShift, RShift, Leq, Geq, Eq, Neq,
    LogicalAnd, LogicalOr, Arrow, Increment, Decrement, Dots,
    MulAssign, DivAssign, ModAssign, PlusAssign, MinusAssign,
    AndAssign, OrAssign, XorAssign,

    End,
}

impl TokenKind {
    /// `true` for the token kinds that can open a type-name
    /// (`declaration-specifiers` FIRST set, spec §4.2/§4.3).
    #[must_use] pub fn starts_type_specifier(self) -> bool {
        matches!(self,
            TokenKind::Void | TokenKind::Char | TokenKind::Short | TokenKind::Int |
            TokenKind::Signed | TokenKind::Unsigned | TokenKind::Long |
            TokenKind::Float | TokenKind::Double |
            TokenKind::Struct | TokenKind::Union | TokenKind::Enum)
    }

    #[must_use] pub fn starts_type_qualifier(self) -> bool {
        matches!(self, TokenKind::Const | TokenKind::Volatile)
    }

    #[must_use] pub fn starts_type_name(self) -> bool {
        self.starts_type_specifier() || self.starts_type_qualifier()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Token {
    pub kind: TokenKind,
    /// Identifier name or string-literal body, when applicable.
    pub string_value: Option<Symbol>,
    pub int_value: i64,
    pub float_value: f64,
}

impl Token {
    #[must_use] pub fn simple(kind: TokenKind) -> Self {
        Token { kind, string_value: None, int_value: 0, float_value: 0.0 }
    }

    #[must_use] pub fn ident(sym: Symbol) -> Self {
        Token { kind: TokenKind::Identifier, string_value: Some(sym), int_value: 0, float_value: 0.0 }
    }

    #[must_use] pub fn int(v: i64) -> Self {
        Token { kind: TokenKind::IntegerConstant, string_value: None, int_value: v, float_value: 0.0 }
    }

    #[must_use] pub fn float(v: f64) -> Self {
        Token { kind: TokenKind::FloatConstant, string_value: None, int_value: 0, float_value: v }
    }

    #[must_use] pub fn string(sym: Symbol) -> Self {
        Token { kind: TokenKind::String, string_value: Some(sym), int_value: 0, float_value: 0.0 }
    }

    /// Display text for diagnostics; falls back to the interned string for
    /// identifiers/strings and a fixed spelling otherwise.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Identifier | TokenKind::String =>
                self.string_value.map_or_else(|| "<anon>".into(), |s| crate::symbol::with_str(s, str::to_owned)),
            TokenKind::IntegerConstant => self.int_value.to_string(),
            TokenKind::FloatConstant => self.float_value.to_string(),
            other => format!("{other:?}"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.describe()) }
}
