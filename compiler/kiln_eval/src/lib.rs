//! Kiln Eval - the template runtime.
//!
//! Executes [`CompiledTemplate`](kiln_codegen::CompiledTemplate)s produced by
//! `kiln_codegen`:
//!
//! - [`Render`]: a lazy iterator of output chunks for one render
//! - [`Value`]: runtime values, with [`Markup`] marking pre-escaped text
//! - template instances with override and method tables for inheritance
//! - [`escape`], [`render_attrs`] and [`collect`] for output serialization
//! - [`TemplateImporter`]: how `extends`, `import` and `include` reach other
//!   templates
//!
//! # Pipeline Position
//!
//! ```text
//! kiln_codegen (CompiledTemplate) → kiln_eval (Render) → output chunks
//! ```
//!
//! Rendering is single-threaded. Compiled templates are shared as `Arc`;
//! everything mutable lives in the render.

mod builtins;
mod context;
mod escape;
mod eval;
mod import;
mod instance;
mod ops;
mod render;
mod value;
mod vm;

#[cfg(test)]
mod tests;

pub use builtins::Builtin;
pub use context::{Context, Locals, RenderContext};
pub use escape::{collect, default_escape, escape, html_escape, render_attrs, EscapeFn};
pub use import::{default_alias, NoImports, TemplateImporter};
pub use instance::{FuncRef, InstanceId};
pub use render::{render, Render, RenderOptions, DEFAULT_RECURSION_LIMIT};
pub use value::{Markup, NativeFn, Value};
