//! rerec lexer
//!
//! Hand-written maximal-munch scanner for the Rerechan02 lexical grammar.
//! Whitespace and comments are consumed and never emitted; the token
//! stream always ends in exactly one `Eof`.

pub mod token;

pub use token::{Keyword, Span, Token, TokenKind};

/// Lexer error
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Tokenize entire source into a vector.
    ///
    /// Invalid characters are recorded as errors and skipped so one pass
    /// can surface every lex error in the file.
    pub fn tokenize(source: &str) -> (Vec<Token>, Vec<LexError>) {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();

        loop {
            let tok = lexer.next_token();
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }

        (tokens, lexer.errors)
    }

    fn remaining(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.remaining().chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(LexError {
            message: message.into(),
            span,
        });
    }

    /// Get next token
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        if self.pos >= self.source.len() {
            return Token::new(TokenKind::Eof, Span::new(self.pos as u32, self.pos as u32));
        }

        let start = self.pos;
        let c = self.peek().unwrap_or('\0');

        let kind = if c.is_ascii_alphabetic() || c == '_' {
            self.lex_ident_or_keyword()
        } else if c.is_ascii_digit() {
            self.lex_number()
        } else if c == '"' {
            self.lex_string()
        } else {
            self.lex_operator()
        };

        Token::new(kind, Span::new(start as u32, self.pos as u32))
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    let start = self.pos;
                    self.bump();
                    self.bump();
                    let mut terminated = false;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.peek() == Some('/') {
                            self.bump();
                            terminated = true;
                            break;
                        }
                    }
                    if !terminated {
                        let span = Span::new(start as u32, self.pos as u32);
                        self.error("unterminated block comment", span);
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        match Keyword::from_str(text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(text.to_string()),
        }
    }

    /// Integer or float literal. Underscore separators are allowed between
    /// digits; a `.` only starts a fraction when followed by a digit, so
    /// field access after a literal would still lex (the grammar has none
    /// today, but the lexer should not paint itself into a corner).
    fn lex_number(&mut self) -> TokenKind {
        let start = self.pos;
        self.eat_digits();

        let mut is_float = false;
        if self.peek() == Some('.') && self.peek2().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            is_float = true;
            self.bump();
            self.eat_digits();
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let next = self.peek2();
            let has_exp = match next {
                Some(d) if d.is_ascii_digit() => true,
                Some('+') | Some('-') => {
                    // need a digit after the sign
                    let mut chars = self.remaining().chars();
                    chars.next();
                    chars.next();
                    chars.next().map(|c| c.is_ascii_digit()).unwrap_or(false)
                }
                _ => false,
            };
            if has_exp {
                is_float = true;
                self.bump(); // e
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.bump();
                }
                self.eat_digits();
            }
        }

        let text = &self.source[start..self.pos];
        let clean: String = text.chars().filter(|&c| c != '_').collect();
        let span = Span::new(start as u32, self.pos as u32);

        if is_float {
            // parse::<f64> saturates to infinity on overflow instead of
            // failing, so check finiteness rather than the Err case
            match clean.parse::<f64>() {
                Ok(n) if n.is_finite() => TokenKind::Float(n),
                _ => {
                    self.error(format!("float literal out of range: {}", text), span);
                    TokenKind::Float(0.0)
                }
            }
        } else {
            match clean.parse::<i64>() {
                Ok(n) => TokenKind::Int(n),
                Err(_) => {
                    self.error(format!("integer literal out of range: {}", text), span);
                    TokenKind::Int(0)
                }
            }
        }
    }

    fn eat_digits(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn lex_string(&mut self) -> TokenKind {
        let start = self.pos;
        self.bump(); // opening quote
        let mut value = String::new();

        loop {
            match self.bump() {
                Some('"') => return TokenKind::Str(value),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('0') => value.push('\0'),
                    Some(c) => {
                        let span = Span::new(start as u32, self.pos as u32);
                        self.error(format!("unknown escape: \\{}", c), span);
                    }
                    None => break,
                },
                Some('\n') | None => break,
                Some(c) => value.push(c),
            }
        }

        let span = Span::new(start as u32, self.pos as u32);
        self.error("unterminated string literal", span);
        TokenKind::Str(value)
    }

    /// Operators and punctuation, longest match first
    fn lex_operator(&mut self) -> TokenKind {
        let start = self.pos;
        let rest = self.remaining();

        // two-character operators
        let two = [
            ("->", TokenKind::Arrow),
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::Ne),
            ("<=", TokenKind::Le),
            (">=", TokenKind::Ge),
            ("&&", TokenKind::AndAnd),
            ("||", TokenKind::OrOr),
        ];
        for (text, kind) in two {
            if rest.starts_with(text) {
                self.bump();
                self.bump();
                return kind;
            }
        }

        let c = self.bump().unwrap_or('\0');
        match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '=' => TokenKind::Eq,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => TokenKind::Not,
            other => {
                let span = Span::new(start as u32, self.pos as u32);
                self.error(format!("unexpected character: '{}'", other), span);
                TokenKind::Unknown(other)
            }
        }
    }
}
