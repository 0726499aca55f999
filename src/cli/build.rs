//! Build command implementation (build, graph)

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{BuildArgs, GlobalOptions, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::progress::{ConsoleProgress, JsonProgress, ProgressReporter};
use crate::build::{BuildContext, BuildPipeline};
use crate::config::{load_project, merge_cli_overrides, CliOverrides};
use crate::graph::to_dot;
use crate::watch::{watch_and_rebuild, WatchController};

/// Run the build command from `cwd`, returning the process exit code.
///
/// A missing or invalid quire.toml fails before any pass runs. A
/// non-watch pass that ends with errors exits with [`EXIT_ERROR`].
pub fn run_build(args: &BuildArgs, options: GlobalOptions, cwd: &Path) -> u8 {
    let config_path = args.config.as_ref().map(|p| absolute(cwd, p));
    let mut loaded = match load_project(config_path.as_deref(), cwd) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return EXIT_ERROR;
        }
    };
    tracing::debug!(root = %loaded.project_root.display(), "project root");

    let overrides = CliOverrides {
        out: args.out.as_ref().map(|p| absolute(cwd, p)),
        src: args.src.as_ref().map(|p| absolute(cwd, p)),
        environment: args.environment.clone(),
    };
    merge_cli_overrides(&mut loaded.config, &overrides);

    let context = BuildContext::new(loaded.config, loaded.project_root)
        .with_watch(args.watch)
        .with_verbose(options.verbose);
    let pipeline = BuildPipeline::new(context).with_reporter(reporter(args, options));

    let files: Vec<PathBuf> = args.files.iter().map(|f| absolute(cwd, f)).collect();
    let files = if files.is_empty() { None } else { Some(files.as_slice()) };

    if args.watch {
        println!("Starting watch mode...");
        println!("Press Ctrl+C to stop");
        println!();

        return match watch_and_rebuild(WatchController::new(pipeline), files) {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                eprintln!("Watch error: {}", e);
                EXIT_ERROR
            }
        };
    }

    let report = match pipeline.run_pass(files) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Build error: {}", e);
            return EXIT_ERROR;
        }
    };

    if args.dependency_graph {
        print!("{}", to_dot(pipeline.index()));
    }

    if report.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_ERROR
    }
}

fn reporter(args: &BuildArgs, options: GlobalOptions) -> Arc<dyn ProgressReporter> {
    if args.json {
        return Arc::new(JsonProgress::new());
    }

    let colors = !options.no_color && std::io::stderr().is_terminal();
    Arc::new(ConsoleProgress::new().with_colors(colors).with_verbose(options.verbose))
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project(toml: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("quire.toml"), toml).unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        temp
    }

    #[test]
    fn test_missing_config_is_error() {
        let temp = TempDir::new().unwrap();
        let code = run_build(&BuildArgs::default(), GlobalOptions::default(), temp.path());
        assert_eq!(code, EXIT_ERROR);
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn test_invalid_config_is_error() {
        let temp = project("[watch]\ndebounce_ms = 999999\n");
        let code = run_build(&BuildArgs::default(), GlobalOptions::default(), temp.path());
        assert_eq!(code, EXIT_ERROR);
    }

    #[test]
    fn test_build_from_subdirectory() {
        let temp = project("[project]\nname = \"site\"\n");
        fs::write(temp.path().join("src/index.page"), "<p>{{env}}</p>").unwrap();

        let args = BuildArgs { environment: Some("production".to_string()), ..BuildArgs::default() };
        let code = run_build(&args, GlobalOptions::default(), &temp.path().join("src"));

        assert_eq!(code, EXIT_SUCCESS);
        let html = fs::read_to_string(temp.path().join("dist/index.html")).unwrap();
        assert_eq!(html, "<p>production</p>");
    }

    #[test]
    fn test_errors_exit_nonzero() {
        let temp = project("");
        fs::write(temp.path().join("src/bad.page"), "{{ nope }}").unwrap();
        fs::write(temp.path().join("src/good.page"), "ok").unwrap();

        let code = run_build(&BuildArgs::default(), GlobalOptions::default(), temp.path());
        assert_eq!(code, EXIT_ERROR);
        assert!(temp.path().join("dist/good.html").exists());
    }

    #[test]
    fn test_out_override_relative_to_cwd() {
        let temp = project("");
        fs::write(temp.path().join("src/a.txt"), "a").unwrap();

        let args = BuildArgs { out: Some(PathBuf::from("public")), ..BuildArgs::default() };
        let code = run_build(&args, GlobalOptions::default(), temp.path());
        assert_eq!(code, EXIT_SUCCESS);
        assert!(temp.path().join("public/a.txt").exists());
    }
}
