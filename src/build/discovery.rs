//! Source file discovery for the build system.
//!
//! Discovers template, script and image sources from the glob patterns in
//! the configuration. Every discovered file remembers its path relative to
//! the *glob base* of the pattern that found it: the leading directories
//! containing no wildcard (`images` for `images/**/*`).

use crate::build::BuildContext;
use glob::{glob, MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Kind of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    /// Markup compiled into a template cache entry
    Template,
    /// Script compiled into the bundle
    Script,
    /// Image asset copied verbatim
    Image,
    /// Plugin configuration file copied verbatim
    Config,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Template => write!(f, "template"),
            SourceKind::Script => write!(f, "script"),
            SourceKind::Image => write!(f, "image"),
            SourceKind::Config => write!(f, "config"),
        }
    }
}

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path relative to the glob base of the matching pattern
    pub relative: PathBuf,
    /// Source kind
    pub kind: SourceKind,
}

impl SourceFile {
    pub fn new(path: PathBuf, relative: PathBuf, kind: SourceKind) -> Self {
        Self { path, relative, kind }
    }
}

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
}

fn has_wildcard(part: &str) -> bool {
    part.contains(['*', '?', '[', '{'])
}

/// Leading directories of a glob pattern that contain no wildcard.
///
/// A pattern without any wildcard names a single file; its base is the
/// file's parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    let literal = parts.iter().take_while(|p| !has_wildcard(p)).count();
    let take = if literal == parts.len() { literal.saturating_sub(1) } else { literal };
    parts[..take].iter().collect()
}

fn absolute_pattern(base_dir: &Path, pattern: &str) -> String {
    let escaped = Pattern::escape(&base_dir.to_string_lossy());
    format!("{}/{}", escaped.trim_end_matches('/'), pattern.trim_start_matches("./"))
}

fn strip_base(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default())
}

/// Discover files matching a glob pattern.
///
/// # Arguments
/// - `base_dir` - Base directory to resolve patterns from
/// - `pattern` - Glob pattern to match, relative to `base_dir`
/// - `kind` - Kind tag for the discovered files
///
/// # Returns
/// Matching regular files, sorted by path.
pub fn discover_files(
    base_dir: &Path,
    pattern: &str,
    kind: SourceKind,
) -> Result<Vec<SourceFile>, DiscoveryError> {
    let full_pattern = absolute_pattern(base_dir, pattern);
    let paths =
        glob(&full_pattern).map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;
    let root = base_dir.join(glob_base(pattern));

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    let relative = strip_base(&path, &root);
                    files.push(SourceFile::new(path, relative, kind));
                }
            }
            Err(e) => {
                tracing::warn!("error reading path: {}", e);
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Discover all sources of one kind from the configured patterns.
///
/// Files matched by several patterns are reported once, with the relative
/// path from the first pattern that found them. Files inside the output
/// directory are skipped. The result is sorted by path.
pub fn discover_sources(
    ctx: &BuildContext,
    kind: SourceKind,
) -> Result<Vec<SourceFile>, DiscoveryError> {
    if kind == SourceKind::Config {
        let path = ctx.config_source();
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let relative = strip_base(&path, ctx.project_root());
        return Ok(vec![SourceFile::new(path, relative, kind)]);
    }

    let out_dir = ctx.out_dir();
    let mut all_files: BTreeMap<PathBuf, SourceFile> = BTreeMap::new();
    for pattern in ctx.source_patterns(kind) {
        for file in discover_files(ctx.project_root(), pattern, kind)? {
            if file.path.starts_with(&out_dir) {
                continue;
            }
            all_files.entry(file.path.clone()).or_insert(file);
        }
    }

    Ok(all_files.into_values().collect())
}

/// Classifies changed paths by the source patterns they match.
#[derive(Debug, Clone)]
pub struct SourceMatcher {
    patterns: Vec<(Pattern, SourceKind)>,
    out_dir: PathBuf,
}

impl SourceMatcher {
    /// Build a matcher for the template, script and image patterns.
    pub fn new(ctx: &BuildContext) -> Result<Self, DiscoveryError> {
        let mut patterns = Vec::new();
        for kind in [SourceKind::Template, SourceKind::Script, SourceKind::Image] {
            for pattern in ctx.source_patterns(kind) {
                let compiled = Pattern::new(&absolute_pattern(ctx.project_root(), pattern))
                    .map_err(|e| DiscoveryError::InvalidPattern(pattern.clone(), e))?;
                patterns.push((compiled, kind));
            }
        }
        Ok(Self { patterns, out_dir: ctx.out_dir() })
    }

    /// Kind of the first pattern matching `path`, if any.
    ///
    /// Paths inside the output directory never match.
    pub fn kind_of(&self, path: &Path) -> Option<SourceKind> {
        let path = normalize(path);
        if path.starts_with(&self.out_dir) {
            return None;
        }
        let options = MatchOptions { require_literal_separator: true, ..MatchOptions::new() };
        self.patterns
            .iter()
            .find(|(pattern, _)| pattern.matches_path_with(&path, options))
            .map(|(_, kind)| *kind)
    }
}

/// Drop `.` components so watcher paths compare equal to discovered ones.
fn normalize(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}
