//! Kiln IR - data model shared by every stage of the template compiler.
//!
//! - [`Node`]: parsed markup, each node tagged with its 1-based source line
//! - [`Expr`]: the expression language used by `${...}` and directive attributes
//! - [`IrNode`]: the directive-resolved intermediate form
//! - [`LineMap`]: generated line → template line
//! - [`DebugLineTable`]: instruction offset → line step function
//!
//! # Pipeline Position
//!
//! ```text
//! text → kiln_markup (Document) → kiln_expand (IrTemplate)
//!      → kiln_codegen (generated text + LineMap → CompiledTemplate) → kiln_eval
//! ```
//!
//! Lines are plain `u32`, 1-based. Line `0` means "no template origin" and is
//! never reported to users as a real location.

pub mod expr;
pub mod html;
pub mod ir;
mod line_map;
mod line_table;
mod mode;
pub mod node;

pub use expr::{BinaryOp, Expr, Literal, UnaryOp};
pub use ir::{EmitMode, IrKind, IrNode, IrTemplate, Param};
pub use line_map::LineMap;
pub use line_table::{Checkpoint, DebugLineTable, LineTableBuilder};
pub use mode::Mode;
pub use node::{Attribute, Document, Element, Node};

/// Name of the entry point every compiled template exposes.
pub const MAIN_FUNCTION: &str = "__main__";

/// Directive namespace prefix recognized in element and attribute names.
pub const DIRECTIVE_PREFIX: &str = "py:";
