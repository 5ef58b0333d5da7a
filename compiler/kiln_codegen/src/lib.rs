//! Kiln code generation.
//!
//! Three steps turn an [`IrTemplate`](kiln_ir::IrTemplate) into something
//! the runtime can execute, while keeping every instruction traceable to a
//! template line:
//!
//! 1. [`generate`]: IR → a textual listing in a small structured
//!    instruction language, plus a [`LineMap`](kiln_ir::LineMap) recording
//!    the template line of every listing line.
//! 2. [`assemble`]: listing → [`CompiledTemplate`], lowering structured
//!    `if`/`for`/`switch`/`with`/`collect` blocks to jumps and recording a
//!    native [`DebugLineTable`](kiln_ir::DebugLineTable) (instruction →
//!    listing line) per function.
//! 3. [`translate`]: rewrites each native table through the line map so
//!    instructions report template lines instead of listing lines.
//!
//! # Pipeline Position
//!
//! ```text
//! kiln_expand (IrTemplate) → [generate → assemble → translate] → kiln_eval
//! ```
//!
//! The listing is kept on the compiled template for diagnostics
//! ([`CompiledTemplate::generated_source`]).

mod assemble;
mod compiled;
mod generate;
mod translate;

pub use assemble::assemble;
pub use compiled::{CompiledTemplate, FuncId, Instr, TemplateFunction};
pub use generate::{generate, Generated};
pub use translate::translate;

use kiln_diagnostic::GenerationError;
use kiln_ir::IrTemplate;

/// Generate, assemble and translate in one step.
pub fn compile_ir(ir: &IrTemplate) -> Result<CompiledTemplate, GenerationError> {
    let generated = generate(ir);
    let mut compiled = assemble(&generated.text, &ir.filename, ir.mode)?;
    compiled.apply_line_map(&generated.line_map);
    Ok(compiled)
}
