//! Directive-resolved intermediate representation.
//!
//! The expander turns the markup tree into a tree of [`IrNode`]s drawn from a
//! closed set of operations. Every node carries the original template line of
//! the construct it represents; bodies keep the lines of their own nodes.

use smallvec::SmallVec;

use crate::{Expr, Mode};

/// How an expression result is written to the output.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum EmitMode {
    /// Escape unless the value carries the literal marker.
    Escaped,
    /// Render a mapping through `render_attrs`.
    Attrs,
}

/// A block parameter with an optional default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IrKind {
    /// emit-literal: already-escaped markup.
    Literal(String),
    /// emit-expression.
    Emit { expr: Expr, mode: EmitMode },
    /// conditional.
    If {
        test: Expr,
        then: Vec<IrNode>,
        otherwise: Vec<IrNode>,
    },
    /// loop.
    For {
        targets: SmallVec<[String; 2]>,
        iter: Expr,
        body: Vec<IrNode>,
    },
    /// call-block: emit the output of a block call without escaping.
    CallBlock { call: Expr },
    /// define-block.
    DefineBlock {
        name: String,
        params: Vec<Param>,
        body: Vec<IrNode>,
    },
    /// extend-parent.
    Extend { parent: Expr },
    /// switch: `body` holds only `Case` nodes.
    Switch { value: Expr, body: Vec<IrNode> },
    /// case; `value: None` is the default branch.
    Case {
        value: Option<Expr>,
        body: Vec<IrNode>,
    },
    /// with-scope.
    With {
        bindings: Vec<(String, Expr)>,
        body: Vec<IrNode>,
    },
    /// import; `alias: None` derives the alias from the name.
    Import { href: Expr, alias: Option<String> },
    /// collect: join `parts` and render the result as attribute `attr`,
    /// omitting it entirely when nothing remained.
    Collect { attr: String, parts: Vec<IrNode> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrNode {
    pub line: u32,
    pub kind: IrKind,
}

impl IrNode {
    pub fn new(line: u32, kind: IrKind) -> Self {
        IrNode { line, kind }
    }

    pub fn literal(line: u32, text: impl Into<String>) -> Self {
        IrNode::new(line, IrKind::Literal(text.into()))
    }

    pub fn emit(line: u32, expr: Expr, mode: EmitMode) -> Self {
        IrNode::new(line, IrKind::Emit { expr, mode })
    }

    /// Returns `true` for literal nodes containing only whitespace.
    pub fn is_blank_literal(&self) -> bool {
        matches!(&self.kind, IrKind::Literal(text) if text.trim().is_empty())
    }
}

/// The expander's output for one template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrTemplate {
    pub filename: String,
    pub mode: Mode,
    pub body: Vec<IrNode>,
}

impl IrTemplate {
    /// The parent expression if this template extends another one.
    pub fn extends(&self) -> Option<&Expr> {
        self.body.iter().find_map(|node| match &node.kind {
            IrKind::Extend { parent } => Some(parent),
            _ => None,
        })
    }
}
