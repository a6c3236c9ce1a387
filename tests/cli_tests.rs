//! CLI integration tests
//!
//! Runs the `aline` binary against temporary projects and checks exit codes
//! and outputs.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn aline(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_aline"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run aline")
}

fn create_project(temp: &TempDir) {
    let root = temp.path();
    fs::write(
        root.join("assetline.toml"),
        "[project]\nname = \"site\"\n\n[scripts]\ninputs = [\"app/js/main.js\"]\n",
    )
    .unwrap();
    fs::create_dir_all(root.join("app/scss")).unwrap();
    fs::create_dir_all(root.join("app/js")).unwrap();
    fs::write(root.join("app/index.html"), "<html><body></body></html>").unwrap();
    fs::write(root.join("app/scss/style.scss"), "body { margin: 0; }\n").unwrap();
    fs::write(root.join("app/js/main.js"), "var ready = true;\n").unwrap();
}

#[test]
fn test_single_tasks_then_release() {
    let temp = TempDir::new().unwrap();
    create_project(&temp);

    for task in ["styles", "scripts", "sprite"] {
        let output = aline(temp.path(), &[task]);
        assert!(output.status.success(), "{} failed: {:?}", task, output);
    }
    assert!(temp.path().join("app/css/style.min.css").exists());
    assert!(temp.path().join("app/js/main.min.js").exists());

    let output = aline(temp.path(), &["release"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Build succeeded"));
    assert!(temp.path().join("dist/index.html").exists());
    assert!(temp.path().join("dist/css/style.min.css").exists());
}

#[test]
fn test_config_found_from_subdirectory() {
    let temp = TempDir::new().unwrap();
    create_project(&temp);

    let output = aline(&temp.path().join("app/scss"), &["styles"]);

    assert!(output.status.success(), "{:?}", output);
    assert!(temp.path().join("app/css/style.min.css").exists());
}

#[test]
fn test_failed_task_exits_with_error() {
    let temp = TempDir::new().unwrap();
    create_project(&temp);
    fs::write(temp.path().join("app/scss/style.scss"), "body { margin: ; ").unwrap();

    let output = aline(temp.path(), &["styles"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Build failed"));
}

#[test]
fn test_invalid_config_exits_with_error() {
    let temp = TempDir::new().unwrap();
    create_project(&temp);

    let output = aline(temp.path(), &["clean", "--out", "app"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(temp.path().join("app/index.html").exists());
}

#[test]
fn test_build_alias_runs_release() {
    let temp = TempDir::new().unwrap();
    create_project(&temp);
    fs::create_dir_all(temp.path().join("dist")).unwrap();
    fs::write(temp.path().join("dist/stray.txt"), "old").unwrap();

    let output = aline(temp.path(), &["build", "--no-cache"]);

    // Nothing built yet, so assemble fails, but clean has already run.
    assert_eq!(output.status.code(), Some(1));
    assert!(!temp.path().join("dist/stray.txt").exists());
    assert!(!temp.path().join(".assetline-cache").exists());
}
