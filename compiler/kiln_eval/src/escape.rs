//! Escaping, attribute rendering and attribute-part collection.

use std::sync::Arc;

use kiln_diagnostic::RenderErrorKind;
use kiln_ir::html::is_boolean_attribute;
use kiln_ir::Mode;

use crate::value::{Markup, Value};

/// Escapes text that contains `&`, `<` or `>`.
pub type EscapeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// The default escaper: `&`, `<` and `>` become character references.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

pub fn default_escape() -> EscapeFn {
    Arc::new(html_escape)
}

#[inline]
fn needs_escape(text: &str) -> bool {
    memchr::memchr3(b'&', b'<', b'>', text.as_bytes()).is_some()
}

/// Convert a value to markup.
///
/// `None` stays `None`; markup passes through unchanged; anything else is
/// converted to text and run through `escaper` only when it contains a
/// character that needs escaping.
pub fn escape(value: &Value, escaper: &dyn Fn(&str) -> String) -> Option<Markup> {
    match value {
        Value::None => None,
        Value::Markup(m) => Some(m.clone()),
        other => {
            let text = other.to_text();
            if needs_escape(&text) {
                Some(Markup::from(escaper(&text)))
            } else {
                Some(Markup::from(text))
            }
        }
    }
}

/// Escape a value for use inside a double-quoted attribute.
pub(crate) fn quote_attr_value(value: &Value, escaper: &dyn Fn(&str) -> String) -> String {
    match value {
        Value::Markup(m) => m.as_str().to_owned(),
        other => escape(other, escaper)
            .map(|m| m.as_str().replace('"', "&quot;"))
            .unwrap_or_default(),
    }
}

/// Write one attribute. `None` values are omitted.
pub(crate) fn render_attr(
    out: &mut String,
    name: &str,
    value: &Value,
    mode: Mode,
    escaper: &dyn Fn(&str) -> String,
) {
    if value.is_none() {
        return;
    }
    if is_boolean_attribute(name, mode) {
        out.push(' ');
        out.push_str(&name.to_ascii_lowercase());
    } else {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&quote_attr_value(value, escaper));
        out.push('"');
    }
}

/// Render a mapping (or a list of `[name, value]` pairs) as attributes,
/// sorted by name.
pub fn render_attrs(
    attrs: &Value,
    mode: Mode,
    escaper: &dyn Fn(&str) -> String,
) -> Result<String, RenderErrorKind> {
    let mut out = String::new();
    match attrs {
        Value::None => {}
        Value::Map(entries) => {
            for (name, value) in entries.iter() {
                render_attr(&mut out, name, value, mode, escaper);
            }
        }
        Value::List(items) => {
            let mut pairs = Vec::with_capacity(items.len());
            for item in items.iter() {
                match item {
                    Value::List(pair) if pair.len() == 2 => pairs.push((pair[0].to_text(), &pair[1])),
                    Value::List(pair) => {
                        return Err(RenderErrorKind::UnpackMismatch {
                            expected: 2,
                            got: pair.len(),
                        })
                    }
                    other => {
                        return Err(RenderErrorKind::NotIterable {
                            type_name: other.type_name(),
                        })
                    }
                }
            }
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, value) in pairs {
                render_attr(&mut out, &name, value, mode, escaper);
            }
        }
        other => {
            return Err(RenderErrorKind::UnsupportedOperand {
                op: "attrs",
                operand: other.type_name(),
            })
        }
    }
    Ok(out)
}

/// Join attribute parts, dropping `None`s. Returns `None` if nothing is
/// left, which omits the attribute.
pub fn collect(parts: impl IntoIterator<Item = Option<Markup>>) -> Option<Markup> {
    let mut joined: Option<String> = None;
    for part in parts.into_iter().flatten() {
        joined.get_or_insert_with(String::new).push_str(part.as_str());
    }
    joined.map(Markup::from)
}
