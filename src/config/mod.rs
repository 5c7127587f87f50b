//! Configuration module for the plugpack build runner
//!
//! Provides types and parsing for `plugpack.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{default_config, default_config_for, load_config, ConfigError, CONFIG_FILE_NAME};
pub use schema::*;
