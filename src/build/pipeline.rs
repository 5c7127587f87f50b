//! Build pipeline orchestration.
//!
//! The [`Runner`] owns the compilers and the transform caches and runs the
//! build tasks against a [`BuildContext`].

use crate::build::{
    atomic_write, copy_file, discover_sources, fingerprint, BuildContext, BuildError, BuildResult,
    Bundle, CompileReport, CopyReport, KindStats, RebuildReport, SourceFile, SourceKind,
    SourceMatcher, Task, TransformCache, SCRIPT_CACHE, TEMPLATE_CACHE,
};
use crate::compile::{CompileError, ScriptCompiler, SourceCompiler, TemplateCacheCompiler, TemplateCompiler};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a [`Runner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Nothing running
    Idle,
    /// Running a one-shot `build`
    RunningOneShot,
    /// Waiting for file changes
    Watching,
    /// Rebuilding after a change while watching
    RunningIncremental,
}

/// Outcome of transforming one source.
enum Transformed {
    /// The cached entry is still fresh
    Reused,
    /// Newly compiled, not yet committed to the cache
    Compiled { hash: String, output: String },
}

/// Runs the build tasks for one project.
pub struct Runner {
    context: BuildContext,
    templates: TemplateCacheCompiler,
    scripts: ScriptCompiler,
    template_cache: TransformCache,
    script_cache: TransformCache,
    /// Image copies written by the last successful `copy_images`
    image_outputs: BTreeSet<PathBuf>,
    state: RunnerState,
}

impl Runner {
    /// Create a runner with empty caches.
    pub fn new(context: BuildContext) -> Self {
        let config = context.config();
        let templates = TemplateCacheCompiler::new(
            TemplateCompiler::new(config.templates.pretty),
            config.url_prefix(),
            config.templates.url_extension.clone(),
        );
        let scripts = ScriptCompiler::from_command(&config.scripts.command, config.scripts.bare);
        Self {
            context,
            templates,
            scripts,
            template_cache: TransformCache::new(TEMPLATE_CACHE),
            script_cache: TransformCache::new(SCRIPT_CACHE),
            image_outputs: BTreeSet::new(),
            state: RunnerState::Idle,
        }
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn template_cache(&self) -> &TransformCache {
        &self.template_cache
    }

    pub fn script_cache(&self) -> &TransformCache {
        &self.script_cache
    }

    /// Copy the plugin configuration file into the output tree.
    pub fn copy_config(&mut self) -> Result<CopyReport, BuildError> {
        let source = self.context.config_source();
        let dest = self.context.config_output();
        let bytes = copy_file(&source, &dest)?;
        info!("Copied config {}", dest.display());
        Ok(CopyReport { outputs: vec![dest], bytes, ..CopyReport::default() })
    }

    /// Copy every matched image into the images output directory.
    ///
    /// Copies this runner wrote earlier whose source has since disappeared
    /// are deleted. Stops at the first failure; files copied before it stay
    /// in place.
    pub fn copy_images(&mut self) -> Result<CopyReport, BuildError> {
        let images = discover_sources(&self.context, SourceKind::Image)?;
        let dest_dir = self.context.images_out_dir();

        let mut report = CopyReport::default();
        for image in &images {
            let dest = dest_dir.join(&image.relative);
            report.bytes += copy_file(&image.path, &dest)?;
            debug!("Copied {}", image.relative.display());
            report.outputs.push(dest);
        }

        let current: BTreeSet<PathBuf> = report.outputs.iter().cloned().collect();
        for stale in self.image_outputs.difference(&current) {
            match fs::remove_file(stale) {
                Ok(()) => debug!("Removed {}", stale.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(BuildError::io(stale, e)),
            }
            report.removed.push(stale.clone());
        }
        self.image_outputs = current;

        info!("Copied {} images to {}", report.file_count(), dest_dir.display());
        Ok(report)
    }

    /// Compile templates and scripts and write the bundle.
    ///
    /// Unchanged sources are served from the caches. If any source fails,
    /// the first failure in path order is returned and no bundle is written.
    pub fn compile(&mut self) -> Result<CompileReport, BuildError> {
        let start = Instant::now();
        let templates = discover_sources(&self.context, SourceKind::Template)?;
        let scripts = discover_sources(&self.context, SourceKind::Script)?;

        let template_stats = transform_all(&self.templates, &mut self.template_cache, &templates)?;
        let script_stats = transform_all(&self.scripts, &mut self.script_cache, &scripts)?;

        // Both caches now hold exactly the discovered sources, in path order.
        let config = self.context.config();
        let mut bundle = Bundle::new(config.templates.module.clone());
        for entry in self.template_cache.outputs() {
            bundle.push_template(entry);
        }
        for script in self.script_cache.outputs() {
            bundle.push_script(script);
        }

        let bundle_path = self.context.bundle_path();
        let content = bundle.render(&bundle_path, config.minify.enabled)?;
        atomic_write(&bundle_path, content.as_bytes())?;

        let report = CompileReport {
            templates: template_stats,
            scripts: script_stats,
            bundle: bundle_path,
            bundle_size: content.len(),
            duration: start.elapsed(),
        };
        info!(
            "Wrote {} ({} templates, {} scripts; {} compiled, {} cached)",
            report.bundle.display(),
            template_stats.total(),
            script_stats.total(),
            report.compiled_count(),
            report.reused_count()
        );
        Ok(report)
    }

    /// One-shot build: copy config, copy images, compile.
    ///
    /// Aborts at the first failing task.
    pub fn build(&mut self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let previous = self.state;
        self.state = RunnerState::RunningOneShot;
        let result = self.build_tasks();
        self.state = previous;
        Ok(result?.with_duration(start.elapsed()))
    }

    fn build_tasks(&mut self) -> Result<BuildResult, BuildError> {
        let config = self.copy_config()?;
        let images = self.copy_images()?;
        let compile = self.compile()?;
        Ok(BuildResult { config, images, compile, ..BuildResult::new() })
    }

    /// Enter the watching state.
    pub fn begin_watching(&mut self) {
        self.state = RunnerState::Watching;
    }

    /// Leave the watching state.
    pub fn stop_watching(&mut self) {
        self.state = RunnerState::Idle;
    }

    /// Changed paths that match a template, script or image pattern.
    ///
    /// Sorted and deduplicated.
    pub fn matching_changes(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, BuildError> {
        let matcher = SourceMatcher::new(&self.context)?;
        let changed: BTreeSet<PathBuf> =
            paths.iter().filter(|p| matcher.kind_of(p).is_some()).cloned().collect();
        Ok(changed.into_iter().collect())
    }

    /// Handle one batch of changed paths.
    ///
    /// Paths that match no source pattern are ignored. If any match, their
    /// cache entries are dropped and `copy_images` and `compile` run. Task
    /// failures are logged and reported, never returned.
    pub fn on_change(&mut self, paths: &[PathBuf]) -> RebuildReport {
        let start = Instant::now();
        let mut report = RebuildReport::default();

        let changed = match self.matching_changes(paths) {
            Ok(changed) => changed,
            Err(e) => {
                error!("{}", e);
                report.errors.push((Task::Compile, e.to_string()));
                return report;
            }
        };
        if changed.is_empty() {
            return report;
        }

        for path in &changed {
            if self.template_cache.invalidate(path) || self.script_cache.invalidate(path) {
                debug!("Invalidated {}", path.display());
            }
        }

        let previous = self.state;
        self.state = RunnerState::RunningIncremental;

        report.tasks.push(Task::CopyImages);
        match self.copy_images() {
            Ok(images) => report.images = Some(images),
            Err(e) => {
                warn!("copy-images failed: {}", e);
                report.errors.push((Task::CopyImages, e.to_string()));
            }
        }

        report.tasks.push(Task::Compile);
        match self.compile() {
            Ok(compile) => report.compile = Some(compile),
            Err(e) => {
                error!("{}", e);
                if let Some(path) = e.compile_path() {
                    report.failed_files.push(path.to_path_buf());
                }
                report.errors.push((Task::Compile, e.to_string()));
            }
        }

        self.state = previous;
        report.changed = changed;
        report.duration = start.elapsed();
        report
    }

    /// Watch the sources and rebuild on change until `running` is cleared.
    pub fn watch(&mut self, running: Arc<AtomicBool>) -> Result<(), BuildError> {
        crate::watch::watch(self, running)?;
        Ok(())
    }

    /// Build, then watch until `running` is cleared.
    ///
    /// A failed initial build is logged and watching starts anyway, so the
    /// next save can fix it.
    pub fn run_default(&mut self, running: Arc<AtomicBool>) -> Result<(), BuildError> {
        match self.build() {
            Ok(result) => info!("{}", result.summary()),
            Err(e) => error!("{}", e),
        }
        self.watch(running)
    }
}

/// Transform `sources` in parallel, reusing fresh cache entries.
///
/// Waits for every source before touching the cache. Successful outputs are
/// committed even when another source failed; the first failure in source
/// order is returned. On success the cache holds one entry per source.
fn transform_all<C: SourceCompiler + ?Sized>(
    compiler: &C,
    cache: &mut TransformCache,
    sources: &[SourceFile],
) -> Result<KindStats, BuildError> {
    let live: BTreeSet<PathBuf> = sources.iter().map(|s| s.path.clone()).collect();
    let dropped = cache.retain_paths(&live);
    if dropped > 0 {
        debug!("{}: dropped {} removed sources", cache.namespace(), dropped);
    }

    let shared: &TransformCache = cache;
    let results: Vec<Result<Transformed, BuildError>> =
        sources.par_iter().map(|source| transform_one(compiler, shared, source)).collect();

    let mut stats = KindStats::default();
    let mut first_error = None;
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(Transformed::Reused) => {
                debug!("{}: hit {}", cache.namespace(), source.relative.display());
                stats.reused += 1;
            }
            Ok(Transformed::Compiled { hash, output }) => {
                debug!("{}: compiled {}", cache.namespace(), source.relative.display());
                stats.compiled += 1;
                cache.insert(source.path.clone(), hash, output);
            }
            Err(e) => {
                cache.invalidate(&source.path);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

fn transform_one<C: SourceCompiler + ?Sized>(
    compiler: &C,
    cache: &TransformCache,
    source: &SourceFile,
) -> Result<Transformed, BuildError> {
    let bytes = read_source(&source.path)?;
    let hash = fingerprint(&bytes);
    if cache.get_fresh(&source.path, &hash).is_some() {
        return Ok(Transformed::Reused);
    }

    let text = String::from_utf8(bytes)
        .map_err(|_| CompileError::new(&source.path, "source is not valid UTF-8"))?;
    let output = compiler.compile(source, &text)?;
    Ok(Transformed::Compiled { hash, output })
}

fn read_source(path: &Path) -> Result<Vec<u8>, BuildError> {
    fs::read(path).map_err(|e| BuildError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config_for;
    use tempfile::TempDir;

    fn project() -> (TempDir, Runner) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("partials")).unwrap();
        fs::create_dir_all(root.join("coffee-like-script")).unwrap();
        fs::create_dir_all(root.join("images")).unwrap();
        fs::write(root.join("partials/login.template"), "p Login").unwrap();
        fs::write(root.join("coffee-like-script/auth.script"), "var auth = {};\n").unwrap();
        fs::write(root.join("images/logo.png"), [1u8, 2, 3]).unwrap();

        let mut config = default_config_for(root);
        config.plugin.name = "demo".to_string();
        fs::write(root.join("demo.json"), "{}").unwrap();

        let runner = Runner::new(BuildContext::new(config, root.to_path_buf()));
        (temp, runner)
    }

    #[test]
    fn test_runner_starts_idle() {
        let (_temp, runner) = project();
        assert_eq!(runner.state(), RunnerState::Idle);
        assert!(runner.template_cache().is_empty());
    }

    #[test]
    fn test_build_writes_outputs_and_returns_to_idle() {
        let (temp, mut runner) = project();
        let result = runner.build().unwrap();

        assert_eq!(runner.state(), RunnerState::Idle);
        assert!(temp.path().join("dist/demo.json").is_file());
        assert!(temp.path().join("dist/images/logo.png").is_file());
        let bundle = fs::read_to_string(temp.path().join("dist/demo.js")).unwrap();
        assert!(bundle.contains(r#"$templateCache.put("/plugins/demo/login.template","<p>Login</p>")"#));
        assert!(bundle.contains("var auth={};"));
        assert_eq!(result.compile.compiled_count(), 2);
    }

    #[test]
    fn test_compile_reuses_cache() {
        let (_temp, mut runner) = project();
        runner.compile().unwrap();
        let second = runner.compile().unwrap();
        assert_eq!(second.compiled_count(), 0);
        assert_eq!(second.reused_count(), 2);
    }

    #[test]
    fn test_bundle_matches_cache_after_sources_removed() {
        let (temp, mut runner) = project();
        let scripts = temp.path().join("coffee-like-script");
        fs::write(scripts.join("zeta.script"), "window.zeta = 1;\n").unwrap();
        fs::write(scripts.join("alpha.script"), "window.alpha = 1;\n").unwrap();
        runner.compile().unwrap();

        fs::remove_file(scripts.join("auth.script")).unwrap();
        let report = runner.compile().unwrap();
        assert_eq!(report.scripts.total(), 2);
        assert_eq!(runner.script_cache().len(), 2);

        let bundle = fs::read_to_string(temp.path().join("dist/demo.js")).unwrap();
        assert!(!bundle.contains("auth"));
        let alpha = bundle.find("window.alpha=1;").unwrap();
        let zeta = bundle.find("window.zeta=1;").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_compile_accepts_division_after_postfix_update() {
        let (temp, mut runner) = project();
        fs::write(
            temp.path().join("coffee-like-script/auth.script"),
            "var n = 4;\nvar half = n++ / 2;\n",
        )
        .unwrap();

        runner.compile().unwrap();
        let bundle = fs::read_to_string(temp.path().join("dist/demo.js")).unwrap();
        assert!(bundle.contains("var half=n++/2;"));
    }

    #[test]
    fn test_compile_failure_commits_successful_entries() {
        let (temp, mut runner) = project();
        fs::write(temp.path().join("coffee-like-script/broken.script"), "f(").unwrap();

        let err = runner.compile().unwrap_err();
        assert!(err.compile_path().unwrap().ends_with("broken.script"));
        assert!(!temp.path().join("dist/demo.js").exists());
        assert_eq!(runner.template_cache().len(), 1);
        assert_eq!(runner.script_cache().len(), 1);
    }

    #[test]
    fn test_copy_images_removes_only_own_stale_copies() {
        let (temp, mut runner) = project();
        let dist_images = temp.path().join("dist/images");
        fs::write(temp.path().join("images/extra.png"), [4u8]).unwrap();
        runner.copy_images().unwrap();
        fs::write(dist_images.join("manual.png"), [9u8]).unwrap();

        fs::remove_file(temp.path().join("images/extra.png")).unwrap();
        let report = runner.copy_images().unwrap();

        assert_eq!(report.removed, vec![dist_images.join("extra.png")]);
        assert!(!dist_images.join("extra.png").exists());
        assert!(dist_images.join("logo.png").is_file());
        assert!(dist_images.join("manual.png").is_file());
    }

    #[test]
    fn test_build_missing_config_fails_before_compile() {
        let (temp, mut runner) = project();
        fs::remove_file(temp.path().join("demo.json")).unwrap();

        assert!(matches!(runner.build(), Err(BuildError::Io { .. })));
        assert_eq!(runner.state(), RunnerState::Idle);
        assert!(!temp.path().join("dist/demo.js").exists());
    }

    #[test]
    fn test_on_change_ignores_unrelated_paths() {
        let (temp, mut runner) = project();
        runner.begin_watching();
        let report = runner.on_change(&[temp.path().join("README.md")]);
        assert!(!report.triggered());
        assert_eq!(runner.state(), RunnerState::Watching);
    }

    #[test]
    fn test_on_change_reports_compile_failure_and_keeps_watching() {
        let (temp, mut runner) = project();
        runner.build().unwrap();
        runner.begin_watching();

        let bad = temp.path().join("coffee-like-script/auth.script");
        fs::write(&bad, "var auth = {;\n").unwrap();
        let report = runner.on_change(&[bad.clone()]);

        assert_eq!(report.tasks, vec![Task::CopyImages, Task::Compile]);
        assert!(report.images.is_some());
        assert!(report.compile.is_none());
        assert_eq!(report.failed_files, vec![bad]);
        assert_eq!(runner.state(), RunnerState::Watching);
    }
}
