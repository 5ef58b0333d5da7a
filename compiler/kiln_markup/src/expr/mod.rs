//! Expression grammar.
//!
//! Precedence, lowest first:
//!
//! ```text
//! a if c else b
//! or
//! and
//! not
//! == != < <= > >= in, not in
//! + -
//! * / // %
//! unary -
//! call(...), .attr, [index]
//! literal, name, (...), [...], {...}
//! ```
//!
//! Besides plain expressions this module parses the directive-specific
//! forms: loop headers (`k, v in items`), block signatures
//! (`name(a, b=1)`) and with-bindings (`a=1; b=x`).

mod lexer;
mod parser;
#[cfg(test)]
mod tests;

use kiln_ir::{Expr, Param};
use smallvec::SmallVec;
use thiserror::Error;

use parser::ExprParser;

/// An expression source could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message} (at offset {offset})")]
pub struct ExprError {
    /// Byte offset in the expression source.
    pub offset: usize,
    pub message: String,
}

impl ExprError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        ExprError {
            offset,
            message: message.into(),
        }
    }
}

/// Parse a complete expression.
pub fn parse_expr(src: &str) -> Result<Expr, ExprError> {
    let mut p = ExprParser::new(src)?;
    let expr = p.expr()?;
    p.expect_eof()?;
    Ok(expr)
}

/// Parse a loop header: `name in expr` or `a, b in expr`.
pub fn parse_for_each(src: &str) -> Result<(SmallVec<[String; 2]>, Expr), ExprError> {
    let mut p = ExprParser::new(src)?;
    let mut targets = SmallVec::new();
    let parenthesized = p.eat_punct(&lexer::TokenKind::LParen);
    loop {
        targets.push(p.ident()?);
        if !p.eat_punct(&lexer::TokenKind::Comma) {
            break;
        }
    }
    if parenthesized {
        p.expect_punct(&lexer::TokenKind::RParen)?;
    }
    p.expect_keyword("in")?;
    let iter = p.expr()?;
    p.expect_eof()?;
    Ok((targets, iter))
}

/// Parse a block signature: `name`, `name()` or `name(a, b=default)`.
///
/// Parameters with defaults must follow those without.
pub fn parse_signature(src: &str) -> Result<(String, Vec<Param>), ExprError> {
    let mut p = ExprParser::new(src)?;
    let name = p.ident()?;
    let mut params: Vec<Param> = Vec::new();
    if p.eat_punct(&lexer::TokenKind::LParen) {
        while !p.eat_punct(&lexer::TokenKind::RParen) {
            let offset = p.offset();
            let param = p.ident()?;
            if params.iter().any(|existing| existing.name == param) {
                return Err(ExprError::new(offset, format!("duplicate parameter `{param}`")));
            }
            let default = if p.eat_punct(&lexer::TokenKind::Assign) {
                Some(p.expr()?)
            } else {
                if params.iter().any(|existing| existing.default.is_some()) {
                    return Err(ExprError::new(
                        offset,
                        format!("parameter `{param}` without a default follows one with a default"),
                    ));
                }
                None
            };
            params.push(Param {
                name: param,
                default,
            });
            if !p.eat_punct(&lexer::TokenKind::Comma) {
                p.expect_punct(&lexer::TokenKind::RParen)?;
                break;
            }
        }
    }
    p.expect_eof()?;
    Ok((name, params))
}

/// Parse with-bindings: `a=1; b=a + 1`. A trailing `;` is allowed.
pub fn parse_with_bindings(src: &str) -> Result<Vec<(String, Expr)>, ExprError> {
    let mut p = ExprParser::new(src)?;
    let mut bindings = Vec::new();
    while !p.at_eof() {
        let name = p.ident()?;
        p.expect_punct(&lexer::TokenKind::Assign)?;
        bindings.push((name, p.expr()?));
        if !p.eat_punct(&lexer::TokenKind::Semi) {
            break;
        }
    }
    p.expect_eof()?;
    if bindings.is_empty() {
        return Err(ExprError::new(0, "expected at least one binding"));
    }
    Ok(bindings)
}

/// Returns `true` if `name` is a plain identifier that is not a keyword.
pub fn is_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
        && !parser::is_keyword(name)
}
