//! Build command implementations (build, tasks, default/watch, init)

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{GlobalOptions, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{discover_sources, BuildContext, BuildError, Runner, SourceKind, Task};
use crate::config::loader::{
    default_config_for, find_config, load_config, merge_cli_overrides, CliOverrides,
};
use crate::config::{loader, ConfigError};

/// Load the config and build the context for a command.
///
/// With `--config` the project root is that file's directory; otherwise the
/// nearest plugpack.toml is used, falling back to defaults for the current
/// directory.
fn load_context(options: &GlobalOptions) -> Result<BuildContext, ExitCode> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let config_path = match &options.config {
        Some(path) => {
            if !path.is_file() {
                eprintln!("Error: Config file not found: {}", path.display());
                return Err(ExitCode::from(EXIT_INVALID_ARGS));
            }
            Some(path.clone())
        }
        None => find_config(),
    };

    let (mut config, project_root) = match config_path {
        Some(config_path) => {
            tracing::debug!("Using config: {}", config_path.display());
            let cfg = load_config(Some(&config_path)).map_err(|e| {
                eprintln!("Error loading config: {}", e);
                ExitCode::from(EXIT_ERROR)
            })?;
            let root = match loader::project_root(&config_path) {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => cwd.clone(),
            };
            (cfg, root)
        }
        None => {
            tracing::debug!("No plugpack.toml found, using defaults");
            (default_config_for(&cwd), cwd.clone())
        }
    };

    let project_root = absolute(&project_root, &cwd);

    // Apply CLI overrides to config
    let overrides = CliOverrides {
        out: options.out.clone(),
        no_minify: options.no_minify.then_some(true),
    };
    merge_cli_overrides(&mut config, &overrides);

    let errors = config.validate_for_root(&project_root);
    if !errors.is_empty() {
        let messages = errors.iter().map(ToString::to_string).collect();
        eprintln!("Error: {}", ConfigError::Validation(messages));
        return Err(ExitCode::from(EXIT_ERROR));
    }

    Ok(BuildContext::new(config, project_root))
}

fn absolute(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() { path.to_path_buf() } else { cwd.join(path) };
    joined.canonicalize().unwrap_or(joined)
}

fn report_error(error: &BuildError) -> ExitCode {
    eprintln!("Error: {}", error);
    ExitCode::from(EXIT_ERROR)
}

/// Run the build command
pub fn run_build(options: &GlobalOptions, dry_run: bool) -> ExitCode {
    let context = match load_context(options) {
        Ok(context) => context,
        Err(code) => return code,
    };

    if dry_run {
        return print_dry_run(&context);
    }

    let mut runner = Runner::new(context);
    match runner.build() {
        Ok(result) => {
            println!("{}", result.summary());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => report_error(&e),
    }
}

/// List discovered sources and the outputs a build would write.
fn print_dry_run(context: &BuildContext) -> ExitCode {
    println!("Dry run - would build:");
    println!("  Project: {}", context.project_root().display());
    println!("  Output: {}", context.out_dir().display());
    println!("  Config: {} -> {}", context.config_source().display(), context.config_output().display());

    for kind in [SourceKind::Template, SourceKind::Script, SourceKind::Image] {
        match discover_sources(context, kind) {
            Ok(sources) => {
                println!("  {} sources: {}", kind, sources.len());
                for source in &sources {
                    println!("    - {}", source.relative.display());
                }
            }
            Err(e) => {
                eprintln!("  Error discovering {} sources: {}", kind, e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    }

    println!("  Bundle: {}", context.bundle_path().display());
    ExitCode::from(EXIT_SUCCESS)
}

/// Run a single task
pub fn run_task(options: &GlobalOptions, task: Task) -> ExitCode {
    let context = match load_context(options) {
        Ok(context) => context,
        Err(code) => return code,
    };
    let mut runner = Runner::new(context);

    let outcome = match task {
        Task::CopyConfig => runner.copy_config().map(|r| format!("Copied {} file", r.file_count())),
        Task::CopyImages => runner.copy_images().map(|r| format!("Copied {} images", r.file_count())),
        Task::Compile => runner.compile().map(|r| {
            format!("Compiled {} ({} bytes)", r.bundle.display(), r.bundle_size)
        }),
    };

    match outcome {
        Ok(message) => {
            println!("{}", message);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => report_error(&e),
    }
}

/// Run the default task: build, then watch until Ctrl+C
pub fn run_default(options: &GlobalOptions) -> ExitCode {
    let context = match load_context(options) {
        Ok(context) => context,
        Err(code) => return code,
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl+C handler: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }

    println!("Press Ctrl+C to stop");
    let mut runner = Runner::new(context);
    match runner.run_default(running) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => report_error(&e),
    }
}

/// Run the init command
pub fn run_init(name: Option<&str>, force: bool) -> ExitCode {
    use crate::init::{init_project, InitError};

    let project_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    match init_project(&project_path, name, force) {
        Ok(written) => {
            for path in &written {
                println!("Created {}", path.display());
            }
            println!();
            println!("Next steps:");
            println!("  add templates to partials/ and scripts to coffee-like-script/");
            println!("  plugpack build");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(InitError::ConfigExists(path)) => {
            eprintln!("Error: {} already exists", path.display());
            eprintln!("Use --force to overwrite it");
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
