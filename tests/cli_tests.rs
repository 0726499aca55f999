//! CLI integration tests
//!
//! Tests that change the working directory are serialized.

use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use quire::cli::{run_build, BuildArgs, GlobalOptions};
use quire::config::find_config;

/// Restores the working directory on drop.
struct CwdGuard {
    previous: PathBuf,
}

impl CwdGuard {
    fn enter(dir: &Path) -> Self {
        let previous = env::current_dir().unwrap();
        env::set_current_dir(dir).unwrap();
        Self { previous }
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.previous);
    }
}

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("quire.toml"), "[project]\nname = \"cli\"\n").unwrap();
    fs::create_dir_all(temp.path().join("src/blog")).unwrap();
    temp
}

#[test]
#[serial]
fn test_find_config_walks_up_from_cwd() {
    let temp = project();
    let _guard = CwdGuard::enter(&temp.path().join("src/blog"));

    let found = find_config().unwrap();
    assert_eq!(
        found.canonicalize().unwrap(),
        temp.path().join("quire.toml").canonicalize().unwrap()
    );
}

#[test]
#[serial]
fn test_find_config_none_outside_project() {
    let temp = TempDir::new().unwrap();
    let _guard = CwdGuard::enter(temp.path());

    // A quire.toml further up (e.g. in the system temp dir) would be found too
    let above = temp.path().ancestors().skip(1).any(|dir| dir.join("quire.toml").is_file());
    assert_eq!(find_config().is_some(), above);
}

#[test]
fn test_config_not_found_exits_with_error() {
    let temp = TempDir::new().unwrap();
    let code = run_build(&BuildArgs::default(), GlobalOptions::default(), temp.path());
    assert_eq!(code, 1);
}

#[test]
fn test_explicit_config_path() {
    let temp = project();
    fs::write(temp.path().join("src/index.page"), "{{env}}").unwrap();
    let elsewhere = TempDir::new().unwrap();

    let args = BuildArgs {
        config: Some(temp.path().join("quire.toml")),
        environment: Some("staging".to_string()),
        ..BuildArgs::default()
    };
    let code = run_build(&args, GlobalOptions::default(), elsewhere.path());

    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(temp.path().join("dist/index.html")).unwrap(), "staging");
}

#[test]
fn test_explicit_files_relative_to_cwd() {
    let temp = project();
    fs::write(temp.path().join("src/blog/post.page"), "post").unwrap();
    fs::write(temp.path().join("src/index.page"), "index").unwrap();

    let args = BuildArgs { files: vec![PathBuf::from("post.page")], ..BuildArgs::default() };
    let code = run_build(&args, GlobalOptions::default(), &temp.path().join("src/blog"));

    assert_eq!(code, 0);
    assert!(temp.path().join("dist/blog/post.html").exists());
    assert!(!temp.path().join("dist/index.html").exists());
}

#[test]
fn test_failed_pass_exits_with_error() {
    let temp = project();
    fs::write(temp.path().join("src/index.page"), "{{> missing.partial}}").unwrap();

    let code = run_build(&BuildArgs::default(), GlobalOptions::default(), temp.path());
    assert_eq!(code, 1);
}
