//! Errors raised by the build tasks.

use crate::build::DiscoveryError;
use crate::compile::CompileError;
use crate::config::ConfigError;
use crate::watch::WatchError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during build execution.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Missing or unreadable source, or unwritable destination
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source failed to transform
    #[error("{0}")]
    Compile(#[from] CompileError),

    /// The file watcher could not be set up or failed
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// Invalid source pattern
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Unreadable or invalid configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl BuildError {
    /// Wrap an IO error with the path it happened at.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        BuildError::Io { path: path.as_ref().to_path_buf(), source }
    }

    /// Source path for compile errors.
    pub fn compile_path(&self) -> Option<&Path> {
        match self {
            BuildError::Compile(e) => Some(&e.file),
            _ => None,
        }
    }
}
