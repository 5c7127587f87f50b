//! Bundle assembly.
//!
//! The bundle is the template cache module (all template entries, in path
//! order) followed by every compiled script (in path order), joined with
//! newlines and optionally minified.

use crate::compile::template_cache::wrap_module;
use crate::compile::{minify, CompileError};
use std::path::Path;

/// Ordered fragments of one bundle.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    module: String,
    templates: Vec<String>,
    scripts: Vec<String>,
}

impl Bundle {
    /// Empty bundle registering templates into `module`.
    pub fn new(module: impl Into<String>) -> Self {
        Self { module: module.into(), templates: Vec::new(), scripts: Vec::new() }
    }

    pub fn push_template(&mut self, entry: impl Into<String>) {
        self.templates.push(entry.into());
    }

    pub fn push_script(&mut self, script: impl Into<String>) {
        self.scripts.push(script.into());
    }

    /// Concatenated, unminified bundle text.
    ///
    /// The template cache module is left out when there are no templates.
    pub fn concat(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.scripts.len() + 1);
        if !self.templates.is_empty() {
            parts.push(wrap_module(&self.module, &self.templates));
        }
        parts.extend(self.scripts.iter().cloned());
        parts.join("\n")
    }

    /// Final bundle file content, always ending in a newline.
    ///
    /// `path` locates minifier errors.
    pub fn render(&self, path: &Path, minified: bool) -> Result<String, CompileError> {
        let text = self.concat();
        let mut out = if minified { minify(path, &text)? } else { text };
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }
}
