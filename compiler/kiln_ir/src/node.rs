//! Parsed markup tree.
//!
//! The tree is owned by the parser result and only read by the expander.
//! Text and attribute values are kept exactly as written (entities are not
//! decoded) because they are emitted verbatim into already-escaped output.

use crate::DIRECTIVE_PREFIX;

/// A parsed template: the sequence of top-level nodes.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
}

/// A single unit of parsed markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text { text: String, line: u32 },
    Comment { text: String, line: u32 },
    CData { text: String, line: u32 },
    /// `<!DOCTYPE ...>` or `<?xml ...?>`, kept verbatim including delimiters.
    Declaration { text: String, line: u32 },
}

impl Node {
    /// Line of the node's first character.
    pub fn line(&self) -> u32 {
        match self {
            Node::Element(el) => el.line,
            Node::Text { line, .. }
            | Node::Comment { line, .. }
            | Node::CData { line, .. }
            | Node::Declaration { line, .. } => *line,
        }
    }

    /// Returns `true` for text nodes made only of whitespace.
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Node::Text { text, .. } if text.trim().is_empty())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An element with its attributes in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
    pub line: u32,
    /// Written as `<name/>`.
    pub self_closing: bool,
}

impl Element {
    /// The directive name if this element lives in the directive namespace
    /// (`py:if` → `Some("if")`).
    pub fn directive(&self) -> Option<&str> {
        self.name.strip_prefix(DIRECTIVE_PREFIX)
    }

    /// Look up an attribute by its full name.
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

/// A `name="value"` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub line: u32,
}

impl Attribute {
    /// The directive name for `py:*` attributes.
    pub fn directive(&self) -> Option<&str> {
        self.name.strip_prefix(DIRECTIVE_PREFIX)
    }
}
