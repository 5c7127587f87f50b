//! Build pipeline module for plugpack
//!
//! Turns a plugin source tree into a `dist/` directory holding the copied
//! config file, the copied image tree and one minified script bundle.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Find source files using glob patterns from config
//! - **Transform**: Compile templates and scripts in parallel, reusing
//!   cached outputs for unchanged files
//! - **Bundle**: Merge templates then scripts (each in path order),
//!   concatenate, minify and write atomically
//!
//! # Example
//!
//! ```ignore
//! use plugpack::build::{BuildContext, Runner};
//! use plugpack::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let mut runner = Runner::new(context);
//!
//! let result = runner.build()?;
//! println!("{}", result.summary());
//! ```

pub mod bundle;
pub mod cache;
pub mod context;
pub mod discovery;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod result;

pub use bundle::*;
pub use cache::*;
pub use context::*;
pub use discovery::*;
pub use error::*;
pub use output::*;
pub use pipeline::*;
pub use result::*;
