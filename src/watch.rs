//! Watch mode for automatic rebuilds on file changes
//!
//! Provides debounced file system watching for `plugpack watch` and the
//! default task. Each debounced batch of changes is handed to
//! [`Runner::on_change`], which re-runs `copy-images` and `compile`.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::build::{RebuildReport, Runner};

/// How often the loop checks whether it should stop.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {}: {source}", path.display())]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    /// None of the source directories exist
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

/// Tracks files with errors across rebuilds for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Files that had errors in the previous build
    files_with_errors: BTreeSet<PathBuf>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with the files that failed in the latest build,
    /// returns the files that failed before and compile now
    pub fn update(&mut self, failed: &[PathBuf]) -> Vec<PathBuf> {
        let current: BTreeSet<PathBuf> = failed.iter().cloned().collect();
        let fixed: Vec<PathBuf> = self.files_with_errors.difference(&current).cloned().collect();
        self.files_with_errors = current;
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.files_with_errors.is_empty()
    }

    /// Get the number of files with errors
    pub fn error_count(&self) -> usize {
        self.files_with_errors.len()
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Log the outcome of a rebuild, reporting fixed files first
fn log_rebuild(report: &RebuildReport, fixed_files: &[PathBuf]) {
    for fixed in fixed_files {
        if let Some(name) = fixed.file_name() {
            info!("Fixed: {}", name.to_string_lossy());
        }
    }

    if report.is_success() {
        let compiled = report.compile.as_ref().map(|c| c.compiled_count()).unwrap_or(0);
        let images = report.images.as_ref().map(|i| i.file_count()).unwrap_or(0);
        info!(
            "Rebuild complete ({}) - recompiled: {} | images: {}",
            format_duration(report.duration),
            compiled,
            images
        );
    } else {
        let error_count = report.errors.len();
        error!(
            "Rebuild failed ({}) - {} error{}, keeping last good bundle",
            format_duration(report.duration),
            error_count,
            if error_count == 1 { "" } else { "s" }
        );
    }
}

/// Watch the runner's source directories and rebuild on change.
///
/// Blocks until `running` is cleared (Ctrl+C in the CLI) or the watcher
/// fails. An in-flight rebuild always finishes before the loop checks the
/// flag again; dropping the debouncer on return removes the watches.
///
/// # Returns
/// * `Ok(())` once `running` is cleared
/// * `Err(WatchError)` if watch setup fails or the event channel closes
pub fn watch(runner: &mut Runner, running: Arc<AtomicBool>) -> Result<(), WatchError> {
    let ctx = runner.context();
    let candidates = ctx.watch_roots();
    let roots: Vec<PathBuf> = candidates.iter().filter(|r| r.is_dir()).cloned().collect();
    if roots.is_empty() {
        let missing = candidates.into_iter().next().unwrap_or_else(|| ctx.project_root().to_path_buf());
        return Err(WatchError::SourceNotFound(missing));
    }
    for missing in candidates.iter().filter(|r| !r.is_dir()) {
        warn!("Not watching {}: directory does not exist", missing.display());
    }
    let watch_config = ctx.config().watch.clone();

    // Create channel for debounced events
    let (tx, rx) = channel();

    // Create debounced watcher
    let debounce_duration = Duration::from_millis(watch_config.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce_duration, tx).map_err(WatchError::WatcherInit)?;

    for root in &roots {
        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath { path: root.clone(), source })?;
    }

    let mut error_tracker = ErrorTracker::new();
    runner.begin_watching();
    info!("Watching {} director{} for changes...", roots.len(), if roots.len() == 1 { "y" } else { "ies" });

    let outcome = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(());
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(events)) => {
                let paths: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| {
                        matches!(e.kind, DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous)
                    })
                    .map(|e| e.path)
                    .collect();

                let changed = match runner.matching_changes(&paths) {
                    Ok(changed) => changed,
                    Err(e) => {
                        error!("{}", e);
                        continue;
                    }
                };
                if changed.is_empty() {
                    continue;
                }

                if watch_config.clear_screen {
                    clear_screen();
                }
                for path in &changed {
                    if let Some(name) = path.file_name() {
                        info!("Changed: {}", name.to_string_lossy());
                    }
                }

                let report = runner.on_change(&changed);
                let fixed_files = error_tracker.update(&report.failed_files);
                log_rebuild(&report, &fixed_files);
            }
            Ok(Err(error)) => {
                // Watch error (non-fatal) - log but continue watching
                warn!("Watch error: {:?}", error);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                break Err(WatchError::ChannelError("event channel disconnected".to_string()));
            }
        }
    };

    runner.stop_watching();
    info!("Stopped watching");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildContext, RunnerState};
    use crate::config::default_config_for;
    use tempfile::TempDir;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1000)), "1.00s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn test_watch_error_source_not_found() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_config_for(temp.path()), temp.path().to_path_buf());
        let mut runner = Runner::new(ctx);

        let result = watch(&mut runner, Arc::new(AtomicBool::new(true)));
        assert!(matches!(result, Err(WatchError::SourceNotFound(_))));
        assert_eq!(runner.state(), RunnerState::Idle);
    }

    #[test]
    fn test_watch_returns_when_stopped() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("partials")).unwrap();
        let ctx = BuildContext::new(default_config_for(temp.path()), temp.path().to_path_buf());
        let mut runner = Runner::new(ctx);

        let result = watch(&mut runner, Arc::new(AtomicBool::new(false)));
        assert!(result.is_ok());
        assert_eq!(runner.state(), RunnerState::Idle);
    }

    #[test]
    fn test_error_tracker_new() {
        let tracker = ErrorTracker::new();
        assert!(!tracker.has_errors());
        assert_eq!(tracker.error_count(), 0);
    }

    #[test]
    fn test_error_tracker_tracks_errors() {
        let mut tracker = ErrorTracker::new();

        let fixed = tracker.update(&[PathBuf::from("a.script"), PathBuf::from("b.template")]);
        assert!(fixed.is_empty());
        assert!(tracker.has_errors());
        assert_eq!(tracker.error_count(), 2);
    }

    #[test]
    fn test_error_tracker_detects_fixed_files() {
        let mut tracker = ErrorTracker::new();
        tracker.update(&[PathBuf::from("a.script"), PathBuf::from("b.template")]);

        let fixed = tracker.update(&[PathBuf::from("b.template")]);
        assert_eq!(fixed, vec![PathBuf::from("a.script")]);
        assert_eq!(tracker.error_count(), 1);

        let fixed = tracker.update(&[]);
        assert_eq!(fixed, vec![PathBuf::from("b.template")]);
        assert!(!tracker.has_errors());
    }
}
