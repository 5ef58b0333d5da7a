//! Kiln - a markup template compiler.
//!
//! Templates are well-formed markup carrying `py:` directives and `${expr}`
//! substitutions. The [`Engine`] compiles them once, caches the result by
//! name and content, and renders them with a [`Context`] of variables.
//!
//! ```text
//! let engine = Engine::new(
//!     MemoryLoader::new()
//!         .with("base.html", BASE)
//!         .with("page.html", PAGE),
//! );
//! let html = engine.template("page.html")?.render(Context::new().with("who", "world"))?;
//! ```
//!
//! # Crates
//!
//! - `kiln_markup`: markup and expression parsing
//! - `kiln_expand`: directives → intermediate template
//! - `kiln_codegen`: listing generation, assembly and line translation
//! - `kiln_eval`: the runtime
//!
//! # Debugging
//!
//! Call [`init_tracing`] and set `RUST_LOG=kiln=debug` (or `trace`) to see
//! compiles, cache hits and inheritance links.

mod engine;
mod loader;

use std::sync::Once;

pub use engine::{Engine, EngineBuilder, EngineConfig, Template};
pub use loader::{Loader, MemoryLoader, TemplateSource};

pub use kiln_codegen::CompiledTemplate;
pub use kiln_diagnostic::{
    DirectiveError, GenerationError, LoadError, MalformedMarkupError, RenderError,
    RenderErrorKind, SourceLocation, TemplateError, TraceFrame,
};
pub use kiln_eval::{
    default_escape, html_escape, Context, EscapeFn, Markup, NativeFn, Render, Value,
    DEFAULT_RECURSION_LIMIT,
};
pub use kiln_ir::Mode;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
