//! Token types for the rerec lexer
//!
//! This module defines all token types the lexer produces.
//! Designed for hand-written recursive descent parsing.

use std::fmt;

pub use crate::error::Span;

/// A token with its span
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is(&self, kind: &TokenKind) -> bool {
        &self.kind == kind
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }
}

/// All token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ==== Literals ====
    /// Integer literal: 42, 1_000_000
    Int(i64),
    /// Float literal: 3.14, 2.5e-3
    Float(f64),
    /// String literal: "hello"
    Str(String),

    // ==== Identifiers and keywords ====
    /// Identifier: foo, _bar, main2
    Ident(String),
    /// Keyword
    Keyword(Keyword),

    // ==== Delimiters ====
    /// (
    LParen,
    /// )
    RParen,
    /// {
    LBrace,
    /// }
    RBrace,

    // ==== Punctuation ====
    /// ,
    Comma,
    /// ;
    Semi,
    /// :
    Colon,
    /// .
    Dot,
    /// ->
    Arrow,

    // ==== Operators ====
    /// =
    Eq,
    /// ==
    EqEq,
    /// !=
    Ne,
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    /// !
    Not,

    // ==== Special ====
    /// Character the lexer could not match; kept so the parser can skip it
    Unknown(char),
    /// End of input
    Eof,
}

impl TokenKind {
    /// Short name used in "expected X, found Y" messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int(_) => "integer literal".to_string(),
            TokenKind::Float(_) => "float literal".to_string(),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Ident(name) => format!("identifier `{}`", name),
            TokenKind::Keyword(kw) => format!("keyword `{}`", kw),
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::LBrace => "`{`".to_string(),
            TokenKind::RBrace => "`}`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::Semi => "`;`".to_string(),
            TokenKind::Colon => "`:`".to_string(),
            TokenKind::Dot => "`.`".to_string(),
            TokenKind::Arrow => "`->`".to_string(),
            TokenKind::Eq => "`=`".to_string(),
            TokenKind::EqEq => "`==`".to_string(),
            TokenKind::Ne => "`!=`".to_string(),
            TokenKind::Lt => "`<`".to_string(),
            TokenKind::Le => "`<=`".to_string(),
            TokenKind::Gt => "`>`".to_string(),
            TokenKind::Ge => "`>=`".to_string(),
            TokenKind::Plus => "`+`".to_string(),
            TokenKind::Minus => "`-`".to_string(),
            TokenKind::Star => "`*`".to_string(),
            TokenKind::Slash => "`/`".to_string(),
            TokenKind::Percent => "`%`".to_string(),
            TokenKind::AndAnd => "`&&`".to_string(),
            TokenKind::OrOr => "`||`".to_string(),
            TokenKind::Not => "`!`".to_string(),
            TokenKind::Unknown(c) => format!("`{}`", c),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// Rerechan02 keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Module,
    Import,
    Func,
    Return,
    Let,
    If,
    Else,
    While,
    True,
    False,
}

impl Keyword {
    pub fn from_str(s: &str) -> Option<Keyword> {
        match s {
            "module" => Some(Keyword::Module),
            "import" => Some(Keyword::Import),
            "func" => Some(Keyword::Func),
            "return" => Some(Keyword::Return),
            "let" => Some(Keyword::Let),
            "if" => Some(Keyword::If),
            "else" => Some(Keyword::Else),
            "while" => Some(Keyword::While),
            "true" => Some(Keyword::True),
            "false" => Some(Keyword::False),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Module => "module",
            Keyword::Import => "import",
            Keyword::Func => "func",
            Keyword::Return => "return",
            Keyword::Let => "let",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::True => "true",
            Keyword::False => "false",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
