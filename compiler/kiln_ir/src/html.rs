//! HTML serialization tables shared by the expander and the runtime.

use crate::Mode;

/// Attributes rendered bare (`<input checked>`) in HTML modes.
pub const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "checked", "compact", "declare", "defer", "disabled", "ismap", "multiple", "nohref",
    "noresize", "noshade", "nowrap", "readonly", "selected",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Void elements that only the older HTML mode knows.
const LEGACY_VOID_ELEMENTS: &[&str] = &["basefont", "frame", "isindex", "keygen"];

/// Returns `true` if `name` renders bare in `mode`.
pub fn is_boolean_attribute(name: &str, mode: Mode) -> bool {
    mode.is_html()
        && BOOLEAN_ATTRIBUTES
            .iter()
            .any(|attr| attr.eq_ignore_ascii_case(name))
}

/// Returns `true` if `name` has no end tag in `mode`.
pub fn is_void_element(name: &str, mode: Mode) -> bool {
    match mode {
        Mode::Xml => false,
        Mode::Html5 => VOID_ELEMENTS.iter().any(|el| el.eq_ignore_ascii_case(name)),
        Mode::Html => VOID_ELEMENTS
            .iter()
            .chain(LEGACY_VOID_ELEMENTS)
            .any(|el| el.eq_ignore_ascii_case(name)),
    }
}
