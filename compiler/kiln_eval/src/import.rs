//! How the runtime reaches other templates.

use std::sync::Arc;

use kiln_codegen::CompiledTemplate;
use kiln_diagnostic::{LoadError, TemplateError};

/// Resolves template names for `extends`, `import` and `include`.
pub trait TemplateImporter {
    /// Compile (or fetch from cache) the template called `name`.
    fn import(&self, name: &str) -> Result<Arc<CompiledTemplate>, TemplateError>;

    /// Alias an `import` without `alias=` binds.
    fn default_alias_for(&self, name: &str) -> String {
        default_alias(name)
    }
}

/// An importer that knows no templates.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoImports;

impl TemplateImporter for NoImports {
    fn import(&self, name: &str) -> Result<Arc<CompiledTemplate>, TemplateError> {
        Err(LoadError::NotFound { name: name.to_owned() }.into())
    }
}

/// File stem of `name` with every non-identifier character replaced by `_`.
///
/// `"widgets/form-fields.html"` → `"form_fields"`.
pub fn default_alias(name: &str) -> String {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    let mut alias: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if alias.is_empty() || alias.starts_with(|c: char| c.is_ascii_digit()) {
        alias.insert(0, '_');
    }
    alias
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_from_file_stem() {
        assert_eq!(default_alias("widgets/form-fields.html"), "form_fields");
        assert_eq!(default_alias("lib.html"), "lib");
        assert_eq!(default_alias("a\\b\\x.y.html"), "x_y");
        assert_eq!(default_alias("2col.html"), "_2col");
        assert_eq!(default_alias(".hidden"), "_hidden");
    }
}
