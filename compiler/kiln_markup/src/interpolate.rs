//! Splitting text into literal runs and `${...}` substitutions.
//!
//! Recognized forms:
//!
//! - `${expr}`: any expression, braces and quotes balanced
//! - `$name` / `$name.attr.attr`: shorthand for a dotted name
//! - `$$`: a literal `$`
//!
//! Every segment records the template line it starts on, so a substitution
//! on the third line of a multi-line text node reports that line.

use kiln_ir::Expr;
use memchr::{memchr, memchr_iter};
use thiserror::Error;

use crate::entities::decode_entities;
use crate::expr::parse_expr;
use crate::scan::interpolation_end;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Markup emitted verbatim.
    Literal { text: String, line: u32 },
    /// A substitution; `source` is the decoded expression text.
    Expr { expr: Expr, source: String, line: u32 },
}

impl Segment {
    pub fn line(&self) -> u32 {
        match self {
            Segment::Literal { line, .. } | Segment::Expr { line, .. } => *line,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid expression `{source_text}` on line {line}: {message}")]
pub struct InterpolationError {
    pub line: u32,
    pub source_text: String,
    pub message: String,
}

/// Split `text`, which starts on template line `line`, into segments.
///
/// Adjacent literal runs are merged; text without substitutions yields a
/// single literal segment (or none when empty).
pub fn split_interpolations(text: &str, line: u32) -> Result<Vec<Segment>, InterpolationError> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut literal_line = line;
    let mut current_line = line;
    let mut pos = 0;

    while let Some(found) = memchr(b'$', &bytes[pos..]) {
        let dollar = pos + found;
        literal.push_str(&text[pos..dollar]);
        current_line += count_newlines(&text[pos..dollar]);

        let (end, substitution) = match bytes.get(dollar + 1).copied() {
            Some(b'$') => {
                literal.push('$');
                (dollar + 2, None)
            }
            Some(b'{') => {
                let Some(end) = interpolation_end(bytes, dollar) else {
                    return Err(InterpolationError {
                        line: current_line,
                        source_text: text[dollar..].to_owned(),
                        message: "unterminated `${`".to_owned(),
                    });
                };
                (end, Some(&text[dollar + 2..end - 1]))
            }
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                let end = dotted_name_end(bytes, dollar + 1);
                (end, Some(&text[dollar + 1..end]))
            }
            _ => {
                literal.push('$');
                (dollar + 1, None)
            }
        };

        if let Some(source) = substitution {
            if !literal.is_empty() {
                segments.push(Segment::Literal {
                    text: std::mem::take(&mut literal),
                    line: literal_line,
                });
            }
            let decoded = decode_entities(source.trim()).into_owned();
            let expr = parse_expr(&decoded).map_err(|e| InterpolationError {
                line: current_line,
                source_text: decoded.clone(),
                message: e.message,
            })?;
            segments.push(Segment::Expr {
                expr,
                source: decoded,
                line: current_line,
            });
            current_line += count_newlines(&text[dollar..end]);
            literal_line = current_line;
        }
        pos = end;
    }

    literal.push_str(&text[pos..]);
    if !literal.is_empty() {
        segments.push(Segment::Literal {
            text: literal,
            line: literal_line,
        });
    }
    Ok(segments)
}

fn count_newlines(s: &str) -> u32 {
    u32::try_from(memchr_iter(b'\n', s.as_bytes()).count()).unwrap_or(u32::MAX)
}

/// End of `name(.name)*` starting at `start`.
fn dotted_name_end(bytes: &[u8], start: usize) -> usize {
    let ident_end = |from: usize| {
        from + bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
            .count()
    };
    let mut end = ident_end(start);
    while bytes.get(end) == Some(&b'.')
        && bytes
            .get(end + 1)
            .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_')
    {
        end = ident_end(end + 1);
    }
    end
}
