//! Directive expansion: [`Document`] → [`IrTemplate`].
//!
//! Interprets every `py:*` element and attribute of a parsed template and
//! produces the closed set of IR operations the code generator understands.
//! Markup that is not a directive becomes literal output; `${...}`
//! substitutions become escaped emits; attributes holding substitutions
//! become `Collect` nodes.
//!
//! # Pipeline Position
//!
//! ```text
//! kiln_markup (Document) → [kiln_expand] → IrTemplate → kiln_codegen
//! ```
//!
//! Every IR node keeps the line of the markup construct it came from, which
//! is what ultimately lets render errors name template lines.

mod directives;
mod element;

use kiln_diagnostic::DirectiveError;
use kiln_ir::{Document, IrTemplate, Mode, Node};
use tracing::debug;

use element::{Expander, Place};

/// Options controlling expansion.
#[derive(Clone, Debug, Default)]
pub struct ExpandOptions {
    /// File name reported in errors and recorded on the template.
    pub filename: String,
    /// Output mode; detected from the doctype when `None`.
    pub mode: Option<Mode>,
}

impl ExpandOptions {
    pub fn new(filename: impl Into<String>) -> Self {
        ExpandOptions {
            filename: filename.into(),
            mode: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Expand a parsed template into IR.
#[tracing::instrument(level = "debug", skip(doc, options), fields(file = %options.filename))]
pub fn expand(doc: &Document, options: &ExpandOptions) -> Result<IrTemplate, DirectiveError> {
    let mode = options.mode.unwrap_or_else(|| detect_mode(doc));
    let mut expander = Expander::new(&options.filename, mode);
    let body = expander.children(&doc.nodes, Place::Root)?;
    debug!(%mode, nodes = body.len(), "expanded template");
    Ok(IrTemplate {
        filename: options.filename.clone(),
        mode,
        body,
    })
}

/// `Html5` if the template opens with an HTML doctype, `Xml` otherwise.
pub fn detect_mode(doc: &Document) -> Mode {
    let is_html_doctype = |text: &str| {
        let rest = text.get(..9).filter(|head| head.eq_ignore_ascii_case("<!DOCTYPE"));
        rest.is_some()
            && text[9..]
                .trim_start()
                .get(..4)
                .is_some_and(|name| name.eq_ignore_ascii_case("html"))
    };
    doc.nodes
        .iter()
        .find_map(|node| match node {
            Node::Declaration { text, .. } if is_html_doctype(text) => Some(Mode::Html5),
            _ => None,
        })
        .unwrap_or_default()
}
