//! CLI integration tests
//!
//! Runs the `plugpack` binary against temporary plugin projects and checks
//! exit codes, console output and the files written to the output tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

fn plugpack_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_plugpack"))
}

/// Run plugpack in `dir` and return (stdout, stderr, exit code)
fn run_plugpack(dir: &Path, args: &[&str]) -> (String, String, Option<i32>) {
    let output = Command::new(plugpack_binary())
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute plugpack");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code(),
    )
}

fn create_test_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A minimal project with one template, one script and one image
fn create_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    create_test_file(root, "plugpack.toml", "[plugin]\nname = \"threefold-auth\"\n");
    create_test_file(root, "threefold-auth.json", "{\"name\": \"threefold-auth\"}\n");
    create_test_file(root, "partials/login.template", "form\n  input(name=\"user\")\n");
    create_test_file(root, "coffee-like-script/auth.script", "// login\nvar auth = { ok: true };\n");
    create_test_file(root, "images/logo.png", "png");
    temp
}

// ============================================================================
// build
// ============================================================================

#[test]
fn test_build_writes_output_tree() {
    let temp = create_project();
    let root = temp.path();

    let (stdout, stderr, code) = run_plugpack(root, &["build"]);
    assert_eq!(code, Some(0), "stderr: {stderr}");
    assert!(stdout.contains("1 images"), "stdout: {stdout}");

    assert!(root.join("dist/threefold-auth.json").is_file());
    assert!(root.join("dist/images/logo.png").is_file());

    let bundle = fs::read_to_string(root.join("dist/threefold-auth.js")).unwrap();
    assert!(bundle.contains("/plugins/threefold-auth/login.template"));
    assert!(bundle.contains("var auth={ok:true};"));
    assert!(!bundle.contains("// login"));
}

#[test]
fn test_build_no_minify_flag() {
    let temp = create_project();
    let root = temp.path();

    let (_, stderr, code) = run_plugpack(root, &["build", "--no-minify"]);
    assert_eq!(code, Some(0), "stderr: {stderr}");

    let bundle = fs::read_to_string(root.join("dist/threefold-auth.js")).unwrap();
    assert!(bundle.contains("// login\nvar auth = { ok: true };"));
}

#[test]
fn test_build_out_override() {
    let temp = create_project();
    let root = temp.path();

    let (_, stderr, code) = run_plugpack(root, &["build", "--out", "public"]);
    assert_eq!(code, Some(0), "stderr: {stderr}");
    assert!(root.join("public/threefold-auth.js").is_file());
    assert!(!root.join("dist").exists());
}

#[test]
fn test_build_compile_error_exits_with_error() {
    let temp = create_project();
    let root = temp.path();
    create_test_file(root, "coffee-like-script/broken.script", "call(1, 2\n");

    let (_, stderr, code) = run_plugpack(root, &["build"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("broken.script"), "stderr: {stderr}");
    assert!(stderr.contains("unclosed '('"), "stderr: {stderr}");
    assert!(!root.join("dist/threefold-auth.js").exists());
}

#[test]
fn test_build_missing_plugin_config_exits_with_error() {
    let temp = create_project();
    let root = temp.path();
    fs::remove_file(root.join("threefold-auth.json")).unwrap();

    let (_, stderr, code) = run_plugpack(root, &["build"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("threefold-auth.json"), "stderr: {stderr}");
}

#[test]
fn test_build_dry_run_writes_nothing() {
    let temp = create_project();
    let root = temp.path();

    let (stdout, stderr, code) = run_plugpack(root, &["build", "--dry-run"]);
    assert_eq!(code, Some(0), "stderr: {stderr}");
    assert!(stdout.contains("Dry run"));
    assert!(stdout.contains("template sources: 1"), "stdout: {stdout}");
    assert!(stdout.contains("login.template"));
    assert!(stdout.contains("auth.script"));
    assert!(!root.join("dist").exists());
}

// ============================================================================
// Configuration errors
// ============================================================================

#[test]
fn test_missing_config_flag_exits_with_invalid_args() {
    let temp = create_project();

    let (_, stderr, code) = run_plugpack(temp.path(), &["build", "--config", "nope.toml"]);
    assert_eq!(code, Some(2));
    assert!(stderr.contains("Config file not found"), "stderr: {stderr}");
}

#[test]
fn test_invalid_config_exits_with_error() {
    let temp = create_project();
    create_test_file(temp.path(), "plugpack.toml", "[plugin]\nname = \"\"\n");

    let (_, stderr, code) = run_plugpack(temp.path(), &["build"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("plugin.name"), "stderr: {stderr}");
}

#[test]
fn test_out_override_at_project_root_rejected() {
    let temp = create_project();

    let (_, stderr, code) = run_plugpack(temp.path(), &["build", "--out", "."]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("plugin.out"), "stderr: {stderr}");
    assert!(!temp.path().join("threefold-auth.js").exists());
}

#[test]
fn test_out_override_holding_sources_rejected() {
    let temp = create_project();

    let (_, stderr, code) = run_plugpack(temp.path(), &["build", "--out", "images"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("images/**/*"), "stderr: {stderr}");
}

#[test]
fn test_unknown_command_exits_with_usage_error() {
    let temp = create_project();

    let (_, _, code) = run_plugpack(temp.path(), &["deploy"]);
    assert_eq!(code, Some(2));
}

#[test]
fn test_explicit_config_sets_project_root() {
    let temp = create_project();
    let outer = TempDir::new().unwrap();
    let config = temp.path().join("plugpack.toml");

    let (_, stderr, code) =
        run_plugpack(outer.path(), &["compile", "--config", config.to_str().unwrap()]);
    assert_eq!(code, Some(0), "stderr: {stderr}");
    assert!(temp.path().join("dist/threefold-auth.js").is_file());
}

// ============================================================================
// Single tasks
// ============================================================================

#[test]
fn test_copy_config_task_only_copies_config() {
    let temp = create_project();
    let root = temp.path();

    let (stdout, stderr, code) = run_plugpack(root, &["copy-config"]);
    assert_eq!(code, Some(0), "stderr: {stderr}");
    assert!(stdout.contains("Copied 1 file"));
    assert!(root.join("dist/threefold-auth.json").is_file());
    assert!(!root.join("dist/images").exists());
    assert!(!root.join("dist/threefold-auth.js").exists());
}

#[test]
fn test_copy_images_task() {
    let temp = create_project();
    let root = temp.path();

    let (stdout, _, code) = run_plugpack(root, &["copy-images"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("Copied 1 images"));
    assert!(root.join("dist/images/logo.png").is_file());
    assert!(!root.join("dist/threefold-auth.json").exists());
}

#[test]
fn test_compile_task() {
    let temp = create_project();
    let root = temp.path();

    let (stdout, _, code) = run_plugpack(root, &["compile"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("Compiled"));
    assert!(root.join("dist/threefold-auth.js").is_file());
    assert!(!root.join("dist/images").exists());
}

// ============================================================================
// init
// ============================================================================

#[test]
fn test_init_then_build() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    let (stdout, stderr, code) = run_plugpack(root, &["init", "--name", "gallery"]);
    assert_eq!(code, Some(0), "stderr: {stderr}");
    assert!(stdout.contains("plugpack.toml"));
    assert!(root.join("gallery.json").is_file());

    create_test_file(root, "partials/grid.template", "ul.grid\n");
    let (_, stderr, code) = run_plugpack(root, &["build"]);
    assert_eq!(code, Some(0), "stderr: {stderr}");
    assert!(root.join("dist/gallery.js").is_file());
}

#[test]
fn test_init_refuses_existing_config() {
    let temp = create_project();

    let (_, stderr, code) = run_plugpack(temp.path(), &["init"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("--force"));
}
