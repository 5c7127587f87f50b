//! Project initialization for plugpack
//!
//! Scaffolds a plugin source tree: `plugpack.toml`, the plugin config file,
//! the default source directories and a `.gitignore` for the build output.

use crate::config::{default_config_for, CONFIG_FILE_NAME};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during project initialization
#[derive(Debug, Error)]
pub enum InitError {
    /// plugpack.toml already exists
    #[error("Config already exists: {}", .0.display())]
    ConfigExists(PathBuf),
    /// Failed to create directory
    #[error("Failed to create directory: {0}")]
    CreateDir(#[source] std::io::Error),
    /// Failed to write file
    #[error("Failed to write file: {0}")]
    WriteFile(#[source] std::io::Error),
    /// Failed to render the config
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Initialize a plugin project in `path`.
///
/// Existing source directories, plugin config and `.gitignore` are left
/// alone. An existing `plugpack.toml` is only replaced with `force`.
///
/// # Returns
/// The files that were written.
pub fn init_project(path: &Path, name: Option<&str>, force: bool) -> Result<Vec<PathBuf>, InitError> {
    let config_path = path.join(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        return Err(InitError::ConfigExists(config_path));
    }

    let mut config = default_config_for(path);
    if let Some(name) = name {
        config.plugin.name = name.to_string();
    }

    let mut written = Vec::new();
    create_dir(path)?;
    write_file(&config_path, &toml::to_string_pretty(&config)?)?;
    written.push(config_path);

    for dir in ["partials", "coffee-like-script", "images"] {
        create_dir(&path.join(dir))?;
    }

    let plugin_config = path.join(config.config_file());
    if !plugin_config.exists() {
        write_file(&plugin_config, &generate_plugin_config(&config.plugin.name))?;
        written.push(plugin_config);
    }

    let gitignore = path.join(".gitignore");
    if !gitignore.exists() {
        write_file(&gitignore, &generate_gitignore(&config.plugin.out))?;
        written.push(gitignore);
    }

    Ok(written)
}

/// Create a directory and all parent directories.
fn create_dir(path: &Path) -> Result<(), InitError> {
    fs::create_dir_all(path).map_err(InitError::CreateDir)
}

/// Write content to a file.
fn write_file(path: &Path, content: &str) -> Result<(), InitError> {
    fs::write(path, content).map_err(InitError::WriteFile)
}

fn generate_plugin_config(name: &str) -> String {
    let value = serde_json::json!({ "name": name, "version": "0.1.0" });
    format!("{:#}\n", value)
}

fn generate_gitignore(out: &Path) -> String {
    format!("# plugpack build output\n{}/\n", out.display())
}
