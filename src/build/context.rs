//! Build context containing configuration and paths for a build.

use crate::build::{glob_base, SourceKind};
use crate::config::loader::resolve_path;
use crate::config::PlugpackConfig;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// The context provides access to all information needed to run the build
/// tasks: the configuration, the project root and the derived input and
/// output locations.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: PlugpackConfig,
    /// Project root directory (where plugpack.toml is located)
    project_root: PathBuf,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `config` - The loaded configuration
    /// - `project_root` - The project root directory
    pub fn new(config: PlugpackConfig, project_root: PathBuf) -> Self {
        Self { config, project_root }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PlugpackConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the output directory (resolved to absolute path).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.plugin.out)
    }

    /// Plugin configuration file in the source tree.
    pub fn config_source(&self) -> PathBuf {
        self.resolve_path(&self.config.config_file())
    }

    /// Destination of the copied configuration file.
    pub fn config_output(&self) -> PathBuf {
        let source = self.config_source();
        let name = source.file_name().map(PathBuf::from).unwrap_or_else(|| self.config.config_file());
        self.out_dir().join(name)
    }

    /// Path of the bundle inside the output directory.
    pub fn bundle_path(&self) -> PathBuf {
        self.out_dir().join(self.config.bundle_name())
    }

    /// Directory image assets are copied into.
    pub fn images_out_dir(&self) -> PathBuf {
        self.out_dir().join(&self.config.images.dest)
    }

    /// Glob patterns configured for a source kind.
    ///
    /// The config file is not discovered through globs, so it has none.
    pub fn source_patterns(&self, kind: SourceKind) -> &[String] {
        match kind {
            SourceKind::Template => &self.config.templates.sources,
            SourceKind::Script => &self.config.scripts.sources,
            SourceKind::Image => &self.config.images.sources,
            SourceKind::Config => &[],
        }
    }

    /// Directories to watch: the glob bases of all watched patterns.
    ///
    /// Sorted and deduplicated; directories nested in another root are
    /// dropped since watches are recursive.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = [SourceKind::Template, SourceKind::Script, SourceKind::Image]
            .into_iter()
            .flat_map(|kind| self.source_patterns(kind).iter())
            .map(|pattern| self.project_root.join(glob_base(pattern)))
            .collect();
        roots.sort();
        roots.dedup();

        let mut result: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !result.iter().any(|kept| root.starts_with(kept)) {
                result.push(root);
            }
        }
        result
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        resolve_path(&self.project_root, path)
    }
}
