//! Build result types.
//!
//! Contains types for representing the outcome of build tasks.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A build task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    CopyConfig,
    CopyImages,
    Compile,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::CopyConfig => write!(f, "copy-config"),
            Task::CopyImages => write!(f, "copy-images"),
            Task::Compile => write!(f, "compile"),
        }
    }
}

/// Result of a copy task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Files written into the output tree
    pub outputs: Vec<PathBuf>,
    /// Total bytes copied
    pub bytes: u64,
    /// Earlier outputs deleted because their source is gone
    pub removed: Vec<PathBuf>,
}

impl CopyReport {
    pub fn file_count(&self) -> usize {
        self.outputs.len()
    }
}

/// Cache statistics for one source kind in a compile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    /// Sources transformed in this pass
    pub compiled: usize,
    /// Sources served from the cache
    pub reused: usize,
}

impl KindStats {
    pub fn total(&self) -> usize {
        self.compiled + self.reused
    }
}

/// Result of a compile task.
#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    pub templates: KindStats,
    pub scripts: KindStats,
    /// Bundle file written
    pub bundle: PathBuf,
    /// Size of the written bundle in bytes
    pub bundle_size: usize,
    pub duration: Duration,
}

impl CompileReport {
    /// Sources transformed in this pass, all kinds.
    pub fn compiled_count(&self) -> usize {
        self.templates.compiled + self.scripts.compiled
    }

    /// Sources served from the cache, all kinds.
    pub fn reused_count(&self) -> usize {
        self.templates.reused + self.scripts.reused
    }
}

/// Result of a one-shot build.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub config: CopyReport,
    pub images: CopyReport,
    pub compile: CompileReport,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.config
            .outputs
            .iter()
            .chain(self.images.outputs.iter())
            .chain(std::iter::once(&self.compile.bundle))
            .collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let c = &self.compile;
        format!(
            "Build succeeded in {:?}: {} config file, {} images, bundle {} ({} bytes; {} templates, {} scripts, {} compiled, {} cached)",
            self.total_duration,
            self.config.file_count(),
            self.images.file_count(),
            c.bundle.display(),
            c.bundle_size,
            c.templates.total(),
            c.scripts.total(),
            c.compiled_count(),
            c.reused_count(),
        )
    }
}

/// Result of one watch-triggered rebuild.
#[derive(Debug, Default)]
pub struct RebuildReport {
    /// Tasks that ran, in order
    pub tasks: Vec<Task>,
    /// Changed paths that matched a source pattern
    pub changed: Vec<PathBuf>,
    pub images: Option<CopyReport>,
    pub compile: Option<CompileReport>,
    /// Task failures, reported but not fatal
    pub errors: Vec<(Task, String)>,
    /// Sources whose compile failed in this rebuild
    pub failed_files: Vec<PathBuf>,
    pub duration: Duration,
}

impl RebuildReport {
    /// Whether any source changed, i.e. whether tasks ran.
    pub fn triggered(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn ran(&self, task: Task) -> bool {
        self.tasks.contains(&task)
    }
}
