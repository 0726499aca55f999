//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

pub use build::run_build;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;

/// Quire - build a static site from a source tree, incrementally in watch mode
#[derive(Debug, Parser)]
#[command(name = "quire")]
#[command(about = "Quire - build a static site from a source tree")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the site (or only the given files)
    Build(BuildArgs),

    /// Build, then print the dependency graph in Graphviz DOT format
    Graph(GraphArgs),
}

/// Arguments of `quire build`.
#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
    /// Only build these files (relative to the working directory)
    pub files: Vec<PathBuf>,

    /// Watch for changes and rebuild affected files
    #[arg(short, long)]
    pub watch: bool,

    /// Environment tag passed to transformers
    #[arg(short, long = "env")]
    pub environment: Option<String>,

    /// Override source directory
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Override output directory
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Print the dependency graph after the build
    #[arg(long)]
    pub dependency_graph: bool,

    /// Machine-readable progress (one JSON object per line on stderr)
    #[arg(long)]
    pub json: bool,

    /// Path to quire.toml (default: search upwards from the working directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments of `quire graph`.
#[derive(Debug, Clone, Default, Args)]
pub struct GraphArgs {
    /// Only build these files
    pub files: Vec<PathBuf>,

    /// Environment tag passed to transformers
    #[arg(short, long = "env")]
    pub environment: Option<String>,

    /// Override source directory
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Override output directory
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Path to quire.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl From<GraphArgs> for BuildArgs {
    fn from(args: GraphArgs) -> Self {
        Self {
            files: args.files,
            environment: args.environment,
            src: args.src,
            out: args.out,
            config: args.config,
            dependency_graph: true,
            ..Self::default()
        }
    }
}

/// Options shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalOptions {
    /// Debug logging and per-file progress lines
    pub verbose: bool,
    /// Errors only
    pub quiet: bool,
    /// Disable colored output
    pub no_color: bool,
}

/// Entry point for the `quire` binary.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = GlobalOptions { verbose: cli.verbose, quiet: cli.quiet, no_color: cli.no_color };
    crate::logger::init_logger(options.verbose, options.quiet, options.no_color);

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: cannot read working directory: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let code = match cli.command {
        Commands::Build(args) => run_build(&args, options, &cwd),
        Commands::Graph(args) => run_build(&args.into(), options, &cwd),
    };
    ExitCode::from(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_flags() {
        let cli = Cli::try_parse_from([
            "quire",
            "build",
            "src/a.page",
            "--watch",
            "--env",
            "production",
            "--dependency-graph",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.files, vec![PathBuf::from("src/a.page")]);
                assert!(args.watch);
                assert!(args.dependency_graph);
                assert_eq!(args.environment.as_deref(), Some("production"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_graph_is_build_with_graph() {
        let cli = Cli::try_parse_from(["quire", "graph", "--out", "public"]).unwrap();
        let Commands::Graph(args) = cli.command else {
            panic!("expected graph command");
        };
        let build: BuildArgs = args.into();
        assert!(build.dependency_graph);
        assert!(!build.watch);
        assert_eq!(build.out, Some(PathBuf::from("public")));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["quire", "build", "-v", "-q"]).is_err());
    }
}
