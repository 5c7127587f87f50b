//! Client-side template cache registration.
//!
//! Compiled templates are shipped inside the bundle as entries of an
//! Angular `$templateCache` module, keyed by a URL-like path:
//!
//! ```text
//! angular.module("templates").run(["$templateCache", function($templateCache) {
//! $templateCache.put("/plugins/threefold-auth/login.template", "<div>...</div>");
//! }]);
//! ```

use super::{CompileError, SourceCompiler, TemplateCompiler};
use crate::build::SourceFile;
use serde_json::Value;
use std::path::{Component, Path};

/// Encode a string as a double-quoted script string literal.
pub fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Build the cache key for a template.
///
/// The key is `prefix` followed by the template path relative to its glob
/// base, using `/` separators. With `extension` set, the file extension is
/// replaced (e.g. `login.template` → `login.html`).
pub fn template_url(prefix: &str, relative: &Path, extension: Option<&str>) -> String {
    let relative = match extension {
        Some(ext) => relative.with_extension(ext),
        None => relative.to_path_buf(),
    };
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!("{}{}", prefix, parts.join("/"))
}

/// Registration statement for one template.
pub fn registration_entry(url: &str, html: &str) -> String {
    format!("$templateCache.put({}, {});", js_string(url), js_string(html))
}

/// Opening line of the template cache module.
pub fn module_header(module: &str) -> String {
    format!(
        "angular.module({}).run([\"$templateCache\", function($templateCache) {{",
        js_string(module)
    )
}

/// Closing line of the template cache module.
pub const MODULE_FOOTER: &str = "}]);";

/// Wrap registration entries in a template cache module.
pub fn wrap_module<S: AsRef<str>>(module: &str, entries: &[S]) -> String {
    let mut out = module_header(module);
    for entry in entries {
        out.push('\n');
        out.push_str(entry.as_ref());
    }
    out.push('\n');
    out.push_str(MODULE_FOOTER);
    out
}

/// Compiles a template and turns it into a registration entry.
#[derive(Debug, Clone)]
pub struct TemplateCacheCompiler {
    markup: TemplateCompiler,
    url_prefix: String,
    url_extension: Option<String>,
}

impl TemplateCacheCompiler {
    /// Create a template cache compiler.
    pub fn new(markup: TemplateCompiler, url_prefix: String, url_extension: Option<String>) -> Self {
        Self { markup, url_prefix, url_extension }
    }

    /// Cache key a source will be registered under.
    pub fn url_for(&self, source: &SourceFile) -> String {
        template_url(&self.url_prefix, &source.relative, self.url_extension.as_deref())
    }
}

impl SourceCompiler for TemplateCacheCompiler {
    fn compile(&self, source: &SourceFile, text: &str) -> Result<String, CompileError> {
        let html = self.markup.compile_str(&source.path, text)?;
        Ok(registration_entry(&self.url_for(source), &html))
    }
}
