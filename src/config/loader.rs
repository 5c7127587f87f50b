//! Configuration loading and discovery for `plugpack.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{
    ImagesConfig, MinifyConfig, PluginConfig, PlugpackConfig, ScriptsConfig, TemplatesConfig,
    WatchConfig,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "plugpack.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse plugpack.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output directory
    pub out: Option<PathBuf>,
    /// Disable minification
    pub no_minify: Option<bool>,
}

/// Find plugpack.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    let cwd = env::current_dir().ok()?;
    find_config_from(cwd)
}

/// Find plugpack.toml by walking up from a specific directory.
///
/// This is the internal implementation that allows specifying the start directory,
/// useful for testing.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a plugpack.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns a default
/// configuration.
///
/// # Example
/// ```ignore
/// let config = load_config(Some(Path::new("my-plugin/plugpack.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<PlugpackConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<PlugpackConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: PlugpackConfig = toml::from_str(&contents)?;

    let root = project_root(path).unwrap_or_else(|| Path::new(""));
    let errors = config.validate_for_root(root);
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no plugpack.toml is found.
///
/// The plugin name is taken from the current directory name.
pub fn default_config() -> PlugpackConfig {
    let root = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    default_config_for(&root)
}

/// Create a default configuration for a project directory.
///
/// The plugin name is taken from the directory name.
pub fn default_config_for(project_root: &Path) -> PlugpackConfig {
    let plugin_name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "plugin".to_string());

    PlugpackConfig {
        plugin: PluginConfig {
            name: plugin_name,
            config: None,
            out: PathBuf::from("dist"),
            bundle: None,
        },
        templates: TemplatesConfig::default(),
        scripts: ScriptsConfig::default(),
        images: ImagesConfig::default(),
        minify: MinifyConfig::default(),
        watch: WatchConfig::default(),
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut PlugpackConfig, overrides: &CliOverrides) {
    if let Some(ref out) = overrides.out {
        config.plugin.out = out.clone();
    }

    if let Some(true) = overrides.no_minify {
        config.minify.enabled = false;
    }
}

/// Get the project root directory from a config file path.
///
/// Returns the parent directory of the plugpack.toml file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
