//! Render-time errors.
//!
//! A render error records one [`TraceFrame`] per template function it passed
//! through, innermost first. Each frame's line comes from the function's
//! translated line table, so it always names a template line.

use std::fmt;

use thiserror::Error;

use crate::{SourceLocation, TemplateError};

/// One template function on the path of a render error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceFrame {
    pub location: SourceLocation,
    pub function: String,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.location, self.function)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RenderErrorKind {
    #[error("name `{name}` is not defined")]
    UndefinedName { name: String },
    #[error("{type_name} value has no attribute `{name}`")]
    NoAttribute { type_name: &'static str, name: String },
    #[error("{type_name} value is not callable")]
    NotCallable { type_name: &'static str },
    #[error("{type_name} value is not iterable")]
    NotIterable { type_name: &'static str },
    #[error("unsupported operand types for `{op}`: {left} and {right}")]
    UnsupportedOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("bad operand type for `{op}`: {operand}")]
    UnsupportedOperand { op: &'static str, operand: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in `{op}`")]
    IntegerOverflow { op: &'static str },
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("key `{key}` not found")]
    KeyNotFound { key: String },
    #[error("{type_name} value cannot be indexed by {index_type}")]
    NotIndexable {
        type_name: &'static str,
        index_type: &'static str,
    },
    #[error("cannot unpack {got} values into {expected} names")]
    UnpackMismatch { expected: usize, got: usize },
    #[error("`{function}` missing argument `{param}`")]
    MissingArgument { function: String, param: String },
    #[error("`{function}` got an unexpected argument `{name}`")]
    UnexpectedArgument { function: String, name: String },
    #[error("`{function}` takes {expected} positional arguments but {got} were given")]
    TooManyArguments {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("block `{name}` is not defined by this template or any parent")]
    MissingBlock { name: String },
    #[error("template has no {relation} template")]
    NoRelative { relation: &'static str },
    #[error("template `{name}` is already extended by this template or one of its children")]
    ExtendsCycle { name: String },
    #[error("cannot extend from a {type_name} value")]
    InvalidParent { type_name: &'static str },
    #[error("`case` evaluated outside of a switch")]
    NoActiveSwitch,
    #[error("template calls nested deeper than {limit}")]
    RecursionLimit { limit: usize },
    #[error("failed to import template `{name}`: {source}")]
    ImportFailed {
        name: String,
        source: Box<TemplateError>,
    },
    #[error("{0}")]
    Custom(String),
}

/// An error raised while rendering a compiled template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderError {
    pub kind: RenderErrorKind,
    /// Innermost first.
    pub frames: Vec<TraceFrame>,
}

impl RenderError {
    pub fn new(kind: RenderErrorKind) -> Self {
        RenderError {
            kind,
            frames: Vec::new(),
        }
    }

    /// Record that the error passed through `function` at `location`.
    #[must_use]
    pub fn in_frame(mut self, location: SourceLocation, function: impl Into<String>) -> Self {
        self.frames.push(TraceFrame {
            location,
            function: function.into(),
        });
        self
    }

    /// Where the error was raised.
    pub fn location(&self) -> Option<&SourceLocation> {
        self.frames.first().map(|frame| &frame.location)
    }

    /// Template line the error was raised at, `0` if unknown.
    pub fn line(&self) -> u32 {
        self.location().map_or(0, |loc| loc.line)
    }
}

impl From<RenderErrorKind> for RenderError {
    fn from(kind: RenderErrorKind) -> Self {
        RenderError::new(kind)
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location() {
            Some(loc) => write!(f, "{loc}: {}", self.kind)?,
            None => write!(f, "{}", self.kind)?,
        }
        for frame in self.frames.iter().skip(1) {
            write!(f, "\n  called from {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}
