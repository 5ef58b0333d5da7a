//! Recursive-descent expression parser, one method per precedence level.

use kiln_ir::{BinaryOp, Expr, Literal, UnaryOp};
use kiln_stack::ensure_sufficient_stack;

use super::lexer::{tokenize, Token, TokenKind};
use super::ExprError;

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "if", "else", "None", "True", "False",
];

pub(crate) fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

pub(crate) struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    pub(crate) fn new(src: &str) -> Result<Self, ExprError> {
        Ok(ExprParser {
            tokens: tokenize(src)?,
            pos: 0,
        })
    }

    // Cursor helpers

    fn current(&self) -> &Token {
        // `tokenize` always ends with `Eof`, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self, ahead: usize) -> &TokenKind {
        let index = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    pub(crate) fn offset(&self) -> usize {
        self.current().offset
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.current_kind().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        *self.current_kind() == TokenKind::Eof
    }

    fn unexpected(&self, expected: &str) -> ExprError {
        ExprError::new(
            self.offset(),
            format!("expected {expected}, found {}", self.current_kind().describe()),
        )
    }

    pub(crate) fn expect_eof(&self) -> Result<(), ExprError> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.unexpected("end of expression"))
        }
    }

    pub(crate) fn eat_punct(&mut self, kind: &TokenKind) -> bool {
        if self.current_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_punct(&mut self, kind: &TokenKind) -> Result<(), ExprError> {
        if self.eat_punct(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn is_keyword_at(&self, ahead: usize, keyword: &str) -> bool {
        matches!(self.peek_kind(ahead), TokenKind::Name(name) if name == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword_at(0, keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_keyword(&mut self, keyword: &str) -> Result<(), ExprError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{keyword}`")))
        }
    }

    /// A non-keyword name.
    pub(crate) fn ident(&mut self) -> Result<String, ExprError> {
        match self.current_kind() {
            TokenKind::Name(name) if !is_keyword(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    // Precedence levels

    pub(crate) fn expr(&mut self) -> Result<Expr, ExprError> {
        ensure_sufficient_stack(|| self.ternary())
    }

    fn ternary(&mut self) -> Result<Expr, ExprError> {
        let then = self.or_expr()?;
        if !self.eat_keyword("if") {
            return Ok(then);
        }
        let test = self.or_expr()?;
        self.expect_keyword("else")?;
        let otherwise = self.ternary()?;
        Ok(Expr::Cond {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or_expr(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ExprError> {
        if self.eat_keyword("not") {
            let operand = ensure_sufficient_stack(|| self.not_expr())?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn match_comparison_op(&self) -> Option<(BinaryOp, usize)> {
        let op = match self.current_kind() {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::GtEq,
            TokenKind::Name(name) if name == "in" => BinaryOp::In,
            TokenKind::Name(name) if name == "not" && self.is_keyword_at(1, "in") => {
                return Some((BinaryOp::NotIn, 2));
            }
            _ => return None,
        };
        Some((op, 1))
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.additive()?;
        while let Some((op, tokens)) = self.match_comparison_op() {
            for _ in 0..tokens {
                self.advance();
            }
            let right = self.additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn match_additive_op(&self) -> Option<BinaryOp> {
        match self.current_kind() {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        }
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.multiplicative()?;
        while let Some(op) = self.match_additive_op() {
            self.advance();
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn match_multiplicative_op(&self) -> Option<BinaryOp> {
        match self.current_kind() {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::SlashSlash => Some(BinaryOp::FloorDiv),
            TokenKind::Percent => Some(BinaryOp::Mod),
            _ => None,
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        while let Some(op) = self.match_multiplicative_op() {
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if *self.current_kind() != TokenKind::Minus {
            return self.postfix();
        }
        let offset = self.offset();
        self.advance();
        // Fold negative numeric literals so they print and re-parse as literals.
        let folded = match self.current_kind() {
            TokenKind::Int(n) if !self.starts_postfix(1) => Some(negate_int(*n, offset)?),
            TokenKind::Float(x) if !self.starts_postfix(1) => Some(Literal::Float(-x)),
            _ => None,
        };
        if let Some(lit) = folded {
            self.advance();
            return Ok(Expr::Literal(lit));
        }
        let operand = ensure_sufficient_stack(|| self.unary())?;
        Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)))
    }

    fn starts_postfix(&self, ahead: usize) -> bool {
        matches!(
            self.peek_kind(ahead),
            TokenKind::Dot | TokenKind::LParen | TokenKind::LBracket
        )
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        loop {
            match self.current_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.attr_name()?;
                    expr = Expr::Attr {
                        object: Box::new(expr),
                        name,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expr()?;
                    self.expect_punct(&TokenKind::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::LParen => {
                    self.advance();
                    expr = self.call_args(expr)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Attribute names may be keywords (`loop.else` is unusual but legal).
    fn attr_name(&mut self) -> Result<String, ExprError> {
        match self.current_kind() {
            TokenKind::Name(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("an attribute name")),
        }
    }

    fn call_args(&mut self, callee: Expr) -> Result<Expr, ExprError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.eat_punct(&TokenKind::RParen) {
            let is_kwarg = matches!(self.current_kind(), TokenKind::Name(_))
                && *self.peek_kind(1) == TokenKind::Assign;
            if is_kwarg {
                let offset = self.offset();
                let name = self.ident()?;
                if kwargs.iter().any(|(existing, _)| *existing == name) {
                    return Err(ExprError::new(
                        offset,
                        format!("keyword argument `{name}` repeated"),
                    ));
                }
                self.advance();
                kwargs.push((name, self.expr()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(ExprError::new(
                        self.offset(),
                        "positional argument follows keyword argument",
                    ));
                }
                args.push(self.expr()?);
            }
            if !self.eat_punct(&TokenKind::Comma) {
                self.expect_punct(&TokenKind::RParen)?;
                break;
            }
        }
        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
            kwargs,
        })
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        match self.advance() {
            TokenKind::Int(n) => i64::try_from(n)
                .map(|n| Expr::Literal(Literal::Int(n)))
                .map_err(|_| ExprError::new(offset, format!("integer literal `{n}` out of range"))),
            TokenKind::Float(x) => Ok(Expr::Literal(Literal::Float(x))),
            TokenKind::Str(s) => {
                let mut s = s;
                // Adjacent string literals concatenate.
                while let TokenKind::Str(next) = self.current_kind() {
                    s.push_str(next);
                    self.advance();
                }
                Ok(Expr::Literal(Literal::Str(s)))
            }
            TokenKind::Name(name) => match name.as_str() {
                "None" => Ok(Expr::Literal(Literal::None)),
                "True" => Ok(Expr::Literal(Literal::Bool(true))),
                "False" => Ok(Expr::Literal(Literal::Bool(false))),
                kw if is_keyword(kw) => Err(ExprError::new(
                    offset,
                    format!("expected an expression, found `{kw}`"),
                )),
                _ => Ok(Expr::Name(name)),
            },
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect_punct(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                while !self.eat_punct(&TokenKind::RBracket) {
                    items.push(self.expr()?);
                    if !self.eat_punct(&TokenKind::Comma) {
                        self.expect_punct(&TokenKind::RBracket)?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                while !self.eat_punct(&TokenKind::RBrace) {
                    let key = self.expr()?;
                    self.expect_punct(&TokenKind::Colon)?;
                    entries.push((key, self.expr()?));
                    if !self.eat_punct(&TokenKind::Comma) {
                        self.expect_punct(&TokenKind::RBrace)?;
                        break;
                    }
                }
                Ok(Expr::Map(entries))
            }
            other => Err(ExprError::new(
                offset,
                format!("expected an expression, found {}", other.describe()),
            )),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary(op, Box::new(left), Box::new(right))
}

fn negate_int(magnitude: u64, offset: usize) -> Result<Literal, ExprError> {
    if magnitude == 1 << 63 {
        return Ok(Literal::Int(i64::MIN));
    }
    i64::try_from(magnitude)
        .map(|n| Literal::Int(-n))
        .map_err(|_| ExprError::new(offset, format!("integer literal `-{magnitude}` out of range")))
}
