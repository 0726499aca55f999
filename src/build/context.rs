//! Build context containing configuration and state for a build.

use crate::config::QuireConfig;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// The context is fixed for the whole run: every pass and every transformer
/// sees the same roots, environment tag and watch flag.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: QuireConfig,
    /// Project root directory (where quire.toml is located)
    project_root: PathBuf,
    /// Resolved source directory
    src_dir: PathBuf,
    /// Resolved output directory
    out_dir: PathBuf,
    /// Whether the build runs under the watch controller
    watch: bool,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `config` - The loaded configuration
    /// - `project_root` - The project root directory
    pub fn new(config: QuireConfig, project_root: PathBuf) -> Self {
        let src_dir = resolve(&project_root, &config.project.src);
        let out_dir = resolve(&project_root, &config.project.out);
        Self { config, project_root, src_dir, out_dir, watch: false, verbose: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &QuireConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the source directory (absolute).
    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    /// Get the output directory (absolute).
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Whether source and output directories are the same.
    ///
    /// Verbatim copies are skipped in that case.
    pub fn is_in_place(&self) -> bool {
        self.src_dir == self.out_dir
    }

    /// Whether the build runs in watch mode.
    pub fn is_watch(&self) -> bool {
        self.watch
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// The target environment tag.
    pub fn environment(&self) -> &str {
        &self.config.build.environment
    }

    /// Directory names never tracked as dependencies.
    pub fn vendor_dirs(&self) -> &[String] {
        &self.config.build.vendor_dirs
    }

    /// Set watch mode.
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        resolve(&self.project_root, path)
    }

    /// Path of the ignore list file.
    pub fn ignore_file(&self) -> PathBuf {
        self.project_root.join(&self.config.build.ignore_file)
    }

    /// Path of `file` relative to the source directory, if it lies inside it.
    pub fn relative_to_src<'a>(&self, file: &'a Path) -> Option<&'a Path> {
        file.strip_prefix(&self.src_dir).ok()
    }

    /// Mirrored output location of a source file.
    ///
    /// Returns `None` for files outside the source directory.
    pub fn mirrored_output(&self, file: &Path) -> Option<PathBuf> {
        self.relative_to_src(file).map(|rel| self.out_dir.join(rel))
    }

    /// Human-readable path for messages: source-relative when possible.
    pub fn display_path(&self, file: &Path) -> PathBuf {
        self.relative_to_src(file)
            .or_else(|| file.strip_prefix(&self.project_root).ok())
            .unwrap_or(file)
            .to_path_buf()
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
