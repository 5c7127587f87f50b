//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::build::Task;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// plugpack - Build a web plugin's template and script bundle
#[derive(Parser)]
#[command(name = "plugpack")]
#[command(about = "plugpack - Compile templates and scripts into one minified plugin bundle")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default: nearest plugpack.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override output directory
    #[arg(short, long, global = true)]
    pub out: Option<PathBuf>,

    /// Write the bundle without minifying it
    #[arg(long, global = true)]
    pub no_minify: bool,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build, then watch for changes (same as running without a command)
    Default,
    /// One-shot build: copy config, copy images, compile
    Build {
        /// Dry run (list sources and outputs without building)
        #[arg(long)]
        dry_run: bool,
    },
    /// Build, then rebuild on every source change
    Watch,
    /// Copy the plugin config file into the output directory
    CopyConfig,
    /// Copy image assets into the output directory
    CopyImages,
    /// Compile templates and scripts into the bundle
    Compile,
    /// Create a plugpack.toml in the current directory
    Init {
        /// Plugin name (default: directory name)
        #[arg(long)]
        name: Option<String>,

        /// Overwrite an existing plugpack.toml
        #[arg(long)]
        force: bool,
    },
}

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub no_minify: bool,
}

/// Set up the tracing subscriber.
///
/// `--verbose` forces `debug`; otherwise `RUST_LOG` applies, falling back to `info`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Entry point for the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = GlobalOptions {
        config: cli.config,
        out: cli.out,
        no_minify: cli.no_minify,
    };

    match cli.command.unwrap_or(Commands::Default) {
        Commands::Default | Commands::Watch => build::run_default(&options),
        Commands::Build { dry_run } => build::run_build(&options, dry_run),
        Commands::CopyConfig => build::run_task(&options, Task::CopyConfig),
        Commands::CopyImages => build::run_task(&options, Task::CopyImages),
        Commands::Compile => build::run_task(&options, Task::Compile),
        Commands::Init { name, force } => build::run_init(name.as_deref(), force),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_command_means_default() {
        let cli = Cli::try_parse_from(["plugpack"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["plugpack", "build", "--dry-run", "--out", "public", "-v"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Build { dry_run: true })));
        assert_eq!(cli.out, Some(PathBuf::from("public")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_task_subcommand_names() {
        for name in ["copy-config", "copy-images", "compile", "watch", "default"] {
            assert!(Cli::try_parse_from(["plugpack", name]).is_ok(), "{name}");
        }
        assert!(Cli::try_parse_from(["plugpack", "deploy"]).is_err());
    }
}
