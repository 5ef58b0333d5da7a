//! Markup and expression parsing.
//!
//! - [`parse`] / [`parse_named`]: markup text → [`Document`](kiln_ir::Document)
//! - [`expr`]: the expression grammar used inside `${...}` and directives
//! - [`split_interpolations`]: text → literal and expression segments
//! - [`decode_entities`]: character references in expression sources
//!
//! The markup parser does no directive validation: `py:*` names are kept as
//! ordinary element and attribute names for the expander to interpret.

mod cursor;
mod entities;
pub mod expr;
mod interpolate;
mod parser;
mod scan;

pub use entities::decode_entities;
pub use expr::{parse_expr, ExprError};
pub use interpolate::{split_interpolations, InterpolationError, Segment};
pub use parser::{parse, parse_named};
