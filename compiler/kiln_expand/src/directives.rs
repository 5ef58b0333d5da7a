//! Directive attribute recognition and directive-value parsing.

use kiln_diagnostic::{DirectiveError, DirectiveErrorKind};
use kiln_ir::{Attribute, BinaryOp, Element, Expr, Param};
use kiln_markup::expr::{is_identifier, parse_for_each, parse_signature, parse_with_bindings};
use kiln_markup::{decode_entities, parse_expr, split_interpolations, ExprError, Segment};
use smallvec::SmallVec;

/// Loop targets as returned by the expression parser.
pub(crate) type Targets = SmallVec<[String; 2]>;

/// `py:*` attributes of one element, in application order (outermost
/// first).
#[derive(Default)]
pub(crate) struct AttrDirectives<'e> {
    pub def: Option<&'e Attribute>,
    pub block: Option<&'e Attribute>,
    pub extends: Option<&'e Attribute>,
    pub case: Option<&'e Attribute>,
    pub else_: Option<&'e Attribute>,
    pub for_: Option<&'e Attribute>,
    pub if_: Option<&'e Attribute>,
    pub with: Option<&'e Attribute>,
    pub switch: Option<&'e Attribute>,
    pub replace: Option<&'e Attribute>,
    pub content: Option<&'e Attribute>,
    pub strip: Option<&'e Attribute>,
    pub attrs: Option<&'e Attribute>,
}

impl<'e> AttrDirectives<'e> {
    /// Collect the directive attributes of `el`, rejecting unknown ones.
    pub fn collect(el: &'e Element, file: &str) -> Result<Self, DirectiveError> {
        let mut found = AttrDirectives::default();
        for attr in &el.attrs {
            let Some(name) = attr.directive() else {
                continue;
            };
            let slot = match name {
                "def" => &mut found.def,
                "block" => &mut found.block,
                "extends" => &mut found.extends,
                "case" => &mut found.case,
                "else" => &mut found.else_,
                "for" => &mut found.for_,
                "if" => &mut found.if_,
                "with" => &mut found.with,
                "switch" => &mut found.switch,
                "replace" => &mut found.replace,
                "content" => &mut found.content,
                "strip" => &mut found.strip,
                "attrs" => &mut found.attrs,
                _ => return Err(error(file, attr.line, &attr.name, DirectiveErrorKind::Unknown)),
            };
            *slot = Some(attr);
        }
        Ok(found)
    }
}

pub(crate) fn error(file: &str, line: u32, directive: &str, kind: DirectiveErrorKind) -> DirectiveError {
    DirectiveError {
        file: file.to_owned(),
        line,
        directive: directive.to_owned(),
        kind,
    }
}

/// Parses directive values, attributing failures to one directive.
pub(crate) struct ValueParser<'a> {
    pub file: &'a str,
    pub line: u32,
    pub directive: &'a str,
}

impl<'a> ValueParser<'a> {
    pub fn for_attr(file: &'a str, attr: &'a Attribute) -> Self {
        ValueParser {
            file,
            line: attr.line,
            directive: &attr.name,
        }
    }

    pub fn for_element(file: &'a str, el: &'a Element) -> Self {
        ValueParser {
            file,
            line: el.line,
            directive: &el.name,
        }
    }

    fn invalid(&self, text: &str, err: &ExprError) -> DirectiveError {
        error(
            self.file,
            self.line,
            self.directive,
            DirectiveErrorKind::InvalidExpression {
                text: text.to_owned(),
                message: err.message.clone(),
            },
        )
    }

    pub fn expr(&self, value: &str) -> Result<Expr, DirectiveError> {
        let src = decode_entities(value);
        parse_expr(src.trim()).map_err(|e| self.invalid(&src, &e))
    }

    pub fn for_each(&self, value: &str) -> Result<(Targets, Expr), DirectiveError> {
        let src = decode_entities(value);
        parse_for_each(src.trim()).map_err(|e| self.invalid(&src, &e))
    }

    pub fn signature(&self, value: &str) -> Result<(String, Vec<Param>), DirectiveError> {
        let src = decode_entities(value);
        parse_signature(src.trim()).map_err(|e| self.invalid(&src, &e))
    }

    pub fn bindings(&self, value: &str) -> Result<Vec<(String, Expr)>, DirectiveError> {
        let src = decode_entities(value);
        parse_with_bindings(src.trim()).map_err(|e| self.invalid(&src, &e))
    }

    /// A bare block or alias name.
    pub fn identifier(&self, value: &str) -> Result<String, DirectiveError> {
        let name = value.trim();
        if is_identifier(name) {
            Ok(name.to_owned())
        } else {
            Err(self.invalid(
                name,
                &ExprError {
                    offset: 0,
                    message: "expected a plain name".to_owned(),
                },
            ))
        }
    }

    /// A template reference: plain text, `${expr}`, or a mix of both.
    ///
    /// Mixed values concatenate their parts, with each expression passed
    /// through `str`.
    pub fn href(&self, value: &str) -> Result<Expr, DirectiveError> {
        let segments = split_interpolations(value, self.line).map_err(|e| {
            error(
                self.file,
                e.line,
                self.directive,
                DirectiveErrorKind::InvalidExpression {
                    text: e.source_text,
                    message: e.message,
                },
            )
        })?;
        let mut parts = segments.into_iter().map(|segment| match segment {
            Segment::Literal { text, .. } => Expr::str(decode_entities(&text)),
            Segment::Expr { expr, .. } => expr,
        });
        let Some(first) = parts.next() else {
            return Ok(Expr::str(""));
        };
        let Some(second) = parts.next() else {
            return Ok(first);
        };
        let as_str = |e: Expr| match e {
            Expr::Literal(_) => e,
            other => Expr::Call {
                callee: Box::new(Expr::name("str")),
                args: vec![other],
                kwargs: Vec::new(),
            },
        };
        let concat = |l: Expr, r: Expr| {
            Expr::Binary(BinaryOp::Add, Box::new(l), Box::new(as_str(r)))
        };
        let start = concat(as_str(first), second);
        Ok(parts.fold(start, concat))
    }
}
