//! The template engine: configuration, compile cache and rendering.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use kiln_codegen::{compile_ir, CompiledTemplate};
use kiln_diagnostic::TemplateError;
use kiln_eval::{default_escape, Context, EscapeFn, Render, RenderOptions, TemplateImporter, DEFAULT_RECURSION_LIMIT};
use kiln_expand::{expand, ExpandOptions};
use kiln_ir::Mode;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use tracing::{debug, trace};

use crate::loader::{Loader, MemoryLoader, TemplateSource};

/// Engine settings.
#[derive(Clone)]
pub struct EngineConfig {
    /// Serialization mode for every template; detected per template when
    /// `None`.
    pub mode: Option<Mode>,
    pub escape: EscapeFn,
    pub recursion_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            mode: None,
            escape: default_escape(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("mode", &self.mode)
            .field("recursion_limit", &self.recursion_limit)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`].
///
/// ```text
/// let engine = Engine::builder()
///     .loader(MemoryLoader::new().with("page.html", "<p>${who}</p>"))
///     .mode(Mode::Html5)
///     .build();
/// ```
pub struct EngineBuilder {
    loader: Option<Box<dyn Loader>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder {
            loader: None,
            config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Force a serialization mode instead of detecting it from the doctype.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = Some(mode);
        self
    }

    /// Replace the escaping function applied to substituted text.
    #[must_use]
    pub fn escape(mut self, escape: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.config.escape = Arc::new(escape);
        self
    }

    /// Maximum nesting of block calls during a render, and maximum length
    /// of an inheritance chain.
    #[must_use]
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.config.recursion_limit = limit;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            loader: self.loader.unwrap_or_else(|| Box::new(MemoryLoader::new())),
            config: self.config,
            cache: RwLock::new(FxHashMap::default()),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The latest compile of one template name.
struct CacheEntry {
    digest: u64,
    text: Box<str>,
    compiled: Arc<CompiledTemplate>,
}

impl CacheEntry {
    fn matches(&self, digest: u64, text: &str) -> bool {
        self.digest == digest && *self.text == *text
    }
}

fn digest(text: &str) -> u64 {
    let mut hasher = FxHasher::default();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Compiles, caches and renders templates.
///
/// Compilation is memoized per name: a name keeps only the compile of its
/// most recent text, so changed sources replace their old entry. The cache
/// lock is never held while compiling. Two threads compiling the same
/// uncached text both do the work and the first insert wins.
pub struct Engine {
    loader: Box<dyn Loader>,
    config: EngineConfig,
    cache: RwLock<FxHashMap<String, CacheEntry>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// An engine with default settings reading from `loader`.
    pub fn new(loader: impl Loader + 'static) -> Self {
        EngineBuilder::new().loader(loader).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compile `text` as template `name`, or return the cached result if
    /// `name` was last compiled from the same text.
    #[tracing::instrument(level = "debug", skip(self, text))]
    pub fn compile(&self, name: &str, text: &str) -> Result<Arc<CompiledTemplate>, TemplateError> {
        let digest = digest(text);
        if let Some(entry) = self.cache.read().get(name) {
            if entry.matches(digest, text) {
                trace!(name, "compile cache hit");
                return Ok(Arc::clone(&entry.compiled));
            }
        }

        let compiled = Arc::new(self.compile_uncached(name, text)?);
        let mut cache = self.cache.write();
        match cache.get_mut(name) {
            Some(entry) if entry.matches(digest, text) => Ok(Arc::clone(&entry.compiled)),
            Some(entry) => {
                trace!(name, "replacing stale compile");
                *entry = CacheEntry {
                    digest,
                    text: text.into(),
                    compiled: Arc::clone(&compiled),
                };
                Ok(compiled)
            }
            None => {
                cache.insert(
                    name.to_owned(),
                    CacheEntry {
                        digest,
                        text: text.into(),
                        compiled: Arc::clone(&compiled),
                    },
                );
                Ok(compiled)
            }
        }
    }

    fn compile_uncached(&self, name: &str, text: &str) -> Result<CompiledTemplate, TemplateError> {
        let doc = kiln_markup::parse_named(text, name)?;
        let mut options = ExpandOptions::new(name);
        if let Some(mode) = self.config.mode {
            options = options.with_mode(mode);
        }
        let ir = expand(&doc, &options)?;
        let compiled = compile_ir(&ir)?;
        debug!(
            name,
            mode = %compiled.mode(),
            functions = compiled.blocks().count() + 1,
            "compiled template"
        );
        Ok(compiled)
    }

    /// Compile a source read by a loader.
    pub fn compile_source(&self, source: &TemplateSource) -> Result<Arc<CompiledTemplate>, TemplateError> {
        self.compile(&source.name, &source.text)
    }

    /// Resolve `name` through the loader and compile it.
    pub fn load(&self, name: &str) -> Result<Arc<CompiledTemplate>, TemplateError> {
        let source = self.loader.resolve(name)?;
        self.compile_source(&source)
    }

    /// A renderable handle to the template called `name`.
    pub fn template(&self, name: &str) -> Result<Template<'_>, TemplateError> {
        Ok(Template {
            engine: self,
            compiled: self.load(name)?,
        })
    }

    /// A renderable handle to a template compiled from `text`.
    pub fn template_from_str(&self, name: &str, text: &str) -> Result<Template<'_>, TemplateError> {
        Ok(Template {
            engine: self,
            compiled: self.compile(name, text)?,
        })
    }

    /// Number of cached compiled templates, at most one per name.
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            escape: Arc::clone(&self.config.escape),
            recursion_limit: self.config.recursion_limit,
        }
    }
}

impl TemplateImporter for Engine {
    fn import(&self, name: &str) -> Result<Arc<CompiledTemplate>, TemplateError> {
        self.load(name)
    }

    fn default_alias_for(&self, name: &str) -> String {
        self.loader.default_alias_for(name)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("cached", &self.cached())
            .finish_non_exhaustive()
    }
}

/// A compiled template bound to the engine that resolves its imports.
#[derive(Clone)]
pub struct Template<'e> {
    engine: &'e Engine,
    compiled: Arc<CompiledTemplate>,
}

impl<'e> Template<'e> {
    pub fn compiled(&self) -> &Arc<CompiledTemplate> {
        &self.compiled
    }

    /// Render to a string.
    #[tracing::instrument(level = "debug", skip_all, fields(template = %self.compiled.filename()))]
    pub fn render(&self, vars: Context) -> Result<String, TemplateError> {
        Ok(self.stream(vars).into_string()?)
    }

    /// Render lazily, one output chunk at a time.
    pub fn stream(&self, vars: Context) -> Render<'e> {
        Render::new(&self.compiled, vars, self.engine, &self.engine.render_options())
    }
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", self.compiled.filename())
            .finish_non_exhaustive()
    }
}
