//! Error reporting for the kiln template compiler.
//!
//! Every error a caller can observe names a template file and a template
//! line. Generated-listing line numbers only appear inside
//! [`GenerationError`], which signals a compiler defect rather than a user
//! mistake.
//!
//! | Stage | Error |
//! |---|---|
//! | parse | [`MalformedMarkupError`] |
//! | expand | [`DirectiveError`] |
//! | generate / assemble | [`GenerationError`] |
//! | render | [`RenderError`] |
//! | load | [`LoadError`] |
//!
//! [`TemplateError`] unifies them for the engine-level API.

mod location;
mod render;
#[cfg(test)]
mod tests;

use thiserror::Error;

pub use location::SourceLocation;
pub use render::{RenderError, RenderErrorKind, TraceFrame};

/// The markup could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{file}:{line}:{column}: malformed markup: {message}")]
pub struct MalformedMarkupError {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// A directive is unknown, incomplete or used where it is not allowed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{file}:{line}: {directive}: {kind}")]
pub struct DirectiveError {
    pub file: String,
    pub line: u32,
    /// Directive as written, e.g. `py:case`.
    pub directive: String,
    pub kind: DirectiveErrorKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DirectiveErrorKind {
    #[error("unknown directive")]
    Unknown,
    #[error("missing required attribute `{0}`")]
    MissingAttribute(&'static str),
    #[error("only allowed {0}")]
    Misplaced(&'static str),
    #[error("invalid expression `{text}`: {message}")]
    InvalidExpression { text: String, message: String },
    #[error("block `{0}` is defined more than once")]
    DuplicateBlock(String),
    #[error("does not accept content")]
    UnexpectedContent,
}

/// The generated listing could not be assembled into executable code.
///
/// Carries the numbered listing so the generator defect can be diagnosed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{file}: cannot assemble generated line {line}: {message}\n{listing}")]
pub struct GenerationError {
    pub file: String,
    /// Line in the generated listing (not a template line).
    pub line: u32,
    pub message: String,
    pub listing: String,
}

impl GenerationError {
    pub fn new(file: &str, line: u32, message: impl Into<String>, generated: &str) -> Self {
        GenerationError {
            file: file.to_owned(),
            line,
            message: message.into(),
            listing: numbered_listing(generated),
        }
    }

    pub fn listing(&self) -> &str {
        &self.listing
    }
}

/// Prefix every line of `text` with its 1-based number.
pub fn numbered_listing(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (i, line) in text.lines().enumerate() {
        out.push_str(&format!("{:>4} {line}\n", i + 1));
    }
    out
}

/// A named template could not be found.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("template `{name}` not found")]
    NotFound { name: String },
}

/// Any failure surfaced by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Markup(#[from] MalformedMarkupError),
    #[error(transparent)]
    Directive(#[from] DirectiveError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl TemplateError {
    /// Template file and line the error points at, if it has one.
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            TemplateError::Markup(e) => Some(SourceLocation::new(e.file.as_str(), e.line)),
            TemplateError::Directive(e) => Some(SourceLocation::new(e.file.as_str(), e.line)),
            TemplateError::Render(e) => e.location().cloned(),
            TemplateError::Generation(_) | TemplateError::Load(_) => None,
        }
    }
}
