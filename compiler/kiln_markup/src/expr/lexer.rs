//! Expression tokenizer.
//!
//! Keywords (`and`, `if`, `None`, ...) are not distinguished here; the parser
//! recognizes them by name.

use super::ExprError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TokenKind {
    Name(String),
    /// Integer magnitude; unary minus is folded in by the parser so
    /// `i64::MIN` can be written.
    Int(u64),
    Float(f64),
    Str(String),
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Assign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Semi,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Name(name) => format!("`{name}`"),
            TokenKind::Int(n) => format!("`{n}`"),
            TokenKind::Float(x) => format!("`{x:?}`"),
            TokenKind::Str(_) => "string literal".to_owned(),
            TokenKind::Eof => "end of expression".to_owned(),
            punct => format!("`{}`", punct.punct()),
        }
    }

    fn punct(&self) -> &'static str {
        match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::SlashSlash => "//",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Assign => "=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::Semi => ";",
            _ => "?",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset in the expression source.
    pub offset: usize,
}

/// Tokenize `src`, always ending with an `Eof` token.
pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut lexer = Lexer { src, pos: 0 };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl Lexer<'_> {
    fn peek_byte(&self, ahead: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + ahead).copied()
    }

    fn next_token(&mut self) -> Result<Token, ExprError> {
        while self.peek_byte(0).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let offset = self.pos;
        let Some(b) = self.peek_byte(0) else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset,
            });
        };
        let kind = match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.name(),
            b'0'..=b'9' => self.number()?,
            b'.' if self.peek_byte(1).is_some_and(|d| d.is_ascii_digit()) => self.number()?,
            b'"' | b'\'' => self.string(b)?,
            _ => self.punct()?,
        };
        Ok(Token { kind, offset })
    }

    fn name(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek_byte(0)
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        TokenKind::Name(self.src[start..self.pos].to_owned())
    }

    fn number(&mut self) -> Result<TokenKind, ExprError> {
        let start = self.pos;
        let digits = |lexer: &mut Self| {
            while lexer.peek_byte(0).is_some_and(|b| b.is_ascii_digit()) {
                lexer.pos += 1;
            }
        };
        digits(self);
        let mut is_float = false;
        if self.peek_byte(0) == Some(b'.') && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit())
        {
            is_float = true;
            self.pos += 1;
            digits(self);
        }
        if matches!(self.peek_byte(0), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_byte(1), Some(b'+' | b'-')));
            if self.peek_byte(1 + sign).is_some_and(|b| b.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                digits(self);
            }
        }
        let text = &self.src[start..self.pos];
        if is_float {
            match text.parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(TokenKind::Float(x)),
                _ => Err(ExprError::new(start, format!("float literal `{text}` out of range"))),
            }
        } else {
            text.parse::<u64>()
                .map(TokenKind::Int)
                .map_err(|_| ExprError::new(start, format!("integer literal `{text}` out of range")))
        }
    }

    fn string(&mut self, quote: u8) -> Result<TokenKind, ExprError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let rest = &self.src[self.pos..];
            let Some(c) = rest.chars().next() else {
                return Err(ExprError::new(start, "unterminated string literal"));
            };
            self.pos += c.len_utf8();
            match c {
                c if c as u32 == u32::from(quote) => return Ok(TokenKind::Str(out)),
                '\\' => out.push(self.escape(start)?),
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, string_start: usize) -> Result<char, ExprError> {
        let at = self.pos - 1;
        let Some(b) = self.peek_byte(0) else {
            return Err(ExprError::new(string_start, "unterminated string literal"));
        };
        self.pos += 1;
        Ok(match b {
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'0' => '\0',
            b'\\' => '\\',
            b'"' => '"',
            b'\'' => '\'',
            b'u' => {
                let src = self.src;
                let parsed = src[self.pos..]
                    .strip_prefix('{')
                    .and_then(|r| r.split_once('}'))
                    .map(|(hex, _)| {
                        let c = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
                        (hex.len() + 2, c)
                    });
                match parsed {
                    Some((len, Some(c))) => {
                        self.pos += len;
                        c
                    }
                    _ => return Err(ExprError::new(at, "invalid unicode escape")),
                }
            }
            other => {
                return Err(ExprError::new(
                    at,
                    format!("unknown escape `\\{}`", char::from(other)),
                ))
            }
        })
    }

    fn punct(&mut self) -> Result<TokenKind, ExprError> {
        let two = |lexer: &mut Self, kind| {
            lexer.pos += 2;
            kind
        };
        let b = self.peek_byte(0).unwrap_or(0);
        let next = self.peek_byte(1);
        let kind = match (b, next) {
            (b'/', Some(b'/')) => two(self, TokenKind::SlashSlash),
            (b'=', Some(b'=')) => two(self, TokenKind::EqEq),
            (b'!', Some(b'=')) => two(self, TokenKind::NotEq),
            (b'<', Some(b'=')) => two(self, TokenKind::LtEq),
            (b'>', Some(b'=')) => two(self, TokenKind::GtEq),
            _ => {
                let kind = match b {
                    b'+' => TokenKind::Plus,
                    b'-' => TokenKind::Minus,
                    b'*' => TokenKind::Star,
                    b'/' => TokenKind::Slash,
                    b'%' => TokenKind::Percent,
                    b'<' => TokenKind::Lt,
                    b'>' => TokenKind::Gt,
                    b'=' => TokenKind::Assign,
                    b'(' => TokenKind::LParen,
                    b')' => TokenKind::RParen,
                    b'[' => TokenKind::LBracket,
                    b']' => TokenKind::RBracket,
                    b'{' => TokenKind::LBrace,
                    b'}' => TokenKind::RBrace,
                    b',' => TokenKind::Comma,
                    b':' => TokenKind::Colon,
                    b'.' => TokenKind::Dot,
                    b';' => TokenKind::Semi,
                    _ => {
                        let c = self.src[self.pos..].chars().next().unwrap_or('?');
                        return Err(ExprError::new(
                            self.pos,
                            format!("unexpected character `{c}`"),
                        ));
                    }
                };
                self.pos += 1;
                kind
            }
        };
        Ok(kind)
    }
}
