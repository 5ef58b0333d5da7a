//! Template sources and loaders.

use std::time::SystemTime;

use kiln_diagnostic::LoadError;
use kiln_eval::default_alias;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Template text as read by a [`Loader`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateSource {
    pub name: String,
    pub text: String,
    pub loaded_at: Option<SystemTime>,
}

impl TemplateSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        TemplateSource {
            name: name.into(),
            text: text.into(),
            loaded_at: None,
        }
    }

    #[must_use]
    pub fn loaded_now(mut self) -> Self {
        self.loaded_at = Some(SystemTime::now());
        self
    }
}

/// Finds template text by name.
pub trait Loader: Send + Sync {
    fn resolve(&self, name: &str) -> Result<TemplateSource, LoadError>;

    /// Alias bound by an `import` without `alias=`.
    fn default_alias_for(&self, name: &str) -> String {
        default_alias(name)
    }
}

/// Templates held in memory, keyed by name.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    templates: RwLock<FxHashMap<String, String>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    /// Add or replace a template. Engines pick up the new text on the next
    /// load because their cache is keyed by content.
    pub fn insert(&self, name: impl Into<String>, text: impl Into<String>) {
        self.templates.write().insert(name.into(), text.into());
    }
}

impl Loader for MemoryLoader {
    fn resolve(&self, name: &str) -> Result<TemplateSource, LoadError> {
        self.templates
            .read()
            .get(name)
            .map(|text| TemplateSource::new(name, text.as_str()).loaded_now())
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_owned(),
            })
    }
}
