//! plugpack - Build runner for web front-end plugins
//!
//! This library provides functionality to:
//! - Copy a plugin's config file and image assets into an output tree
//! - Compile markup templates into template cache entries and scripts
//!   into closure-wrapped script, with an in-memory transform cache
//! - Merge, concatenate and minify everything into one bundle
//! - Watch the sources and rebuild incrementally on change

pub mod build;
pub mod cli;
pub mod compile;
pub mod config;
pub mod init;
pub mod watch;
