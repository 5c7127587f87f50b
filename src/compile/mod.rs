//! Source transformations.
//!
//! Each source kind has a compiler turning source text into a bundle
//! fragment:
//! - **Templates**: markup compiled to HTML, then wrapped as a template
//!   cache registration entry
//! - **Scripts**: validated and wrapped, or handed to an external compiler
//!
//! The finished bundle is passed through [`minify`].

pub mod lexer;
pub mod minify;
pub mod script;
pub mod template;
pub mod template_cache;

pub use minify::minify;
pub use script::ScriptCompiler;
pub use template::TemplateCompiler;
pub use template_cache::TemplateCacheCompiler;

use crate::build::SourceFile;
use std::path::PathBuf;

/// A source file that failed to transform, with location information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Path to the file containing the error
    pub file: PathBuf,
    /// Line number (1-indexed, None if unknown)
    pub line: Option<usize>,
    /// Column number (1-indexed, None if unknown)
    pub column: Option<usize>,
    /// Error message
    pub message: String,
}

impl CompileError {
    /// Create a new compile error with file and message
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self { file: file.into(), line: None, column: None, message: message.into() }
    }

    /// Create a compile error with line information
    pub fn with_line(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self { file: file.into(), line: Some(line), column: None, message: message.into() }
    }

    /// Create a compile error with full location information
    pub fn with_location(
        file: impl Into<PathBuf>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self { file: file.into(), line: Some(line), column: Some(column), message: message.into() }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error in {}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(col) = self.column {
                write!(f, ":{}", col)?;
            }
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Transforms one source file into a bundle fragment.
///
/// Implementations are shared across the worker pool, so they must be
/// `Send + Sync` and must not depend on call order.
pub trait SourceCompiler: Send + Sync {
    /// Compile `text`, the current content of `source`.
    fn compile(&self, source: &SourceFile, text: &str) -> Result<String, CompileError>;
}
