//! Per-file execution context handed to transformers.
//!
//! The context is the only way transformer logic reaches the dependency
//! index: reads through [`ExecutionContext::load`] and explicit calls to
//! [`ExecutionContext::add_dependency`] both record edges for the entry being
//! processed.

use crate::build::BuildContext;
use crate::graph::{DependencyIndex, Recorder};
use crate::transform::{ModuleLoader, TransformError};
use path_clean::PathClean;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Context for transforming one file.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    build: &'a BuildContext,
    index: &'a DependencyIndex,
    loader: &'a dyn ModuleLoader,
    /// File the context is rooted at (may be a derived location)
    file: &'a Path,
    /// Entry that dependencies are recorded against
    entry: &'a Path,
}

impl std::fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("file", &self.file)
            .field("entry", &self.entry)
            .finish()
    }
}

impl<'a> ExecutionContext<'a> {
    /// Create a context for processing `file` as an entry.
    pub fn new(
        build: &'a BuildContext,
        index: &'a DependencyIndex,
        loader: &'a dyn ModuleLoader,
        file: &'a Path,
    ) -> Self {
        Self { build, index, loader, file, entry: file }
    }

    /// The file this context is rooted at.
    pub fn file(&self) -> &Path {
        self.file
    }

    /// The entry dependencies are recorded against.
    pub fn entry(&self) -> &Path {
        self.entry
    }

    /// Absolute source directory.
    pub fn source_root(&self) -> &Path {
        self.build.src_dir()
    }

    /// Absolute project root.
    pub fn project_root(&self) -> &Path {
        self.build.project_root()
    }

    /// Whether the build runs in watch mode.
    pub fn is_watch(&self) -> bool {
        self.build.is_watch()
    }

    /// The target environment tag.
    pub fn environment(&self) -> &str {
        self.build.environment()
    }

    /// The build-wide context.
    pub fn build(&self) -> &BuildContext {
        self.build
    }

    /// Path of the current file for messages.
    pub fn relative_path(&self) -> PathBuf {
        self.build.display_path(self.file)
    }

    /// Resolve a path relative to the current file's directory.
    ///
    /// Absolute paths pass through unchanged apart from lexical cleanup.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.clean()
        } else {
            self.file.parent().unwrap_or(self.file).join(path).clean()
        }
    }

    /// Relative URL from the current file's output location to `path` in the
    /// output root.
    ///
    /// A page at `blog/2024/post.page` gets `../../style.css` for `style.css`.
    pub fn url_for(&self, path: &str) -> String {
        let target = path.trim_start_matches('/');
        let depth = self
            .build
            .relative_to_src(self.file)
            .and_then(Path::parent)
            .map(|dir| dir.components().filter(|c| matches!(c, Component::Normal(_))).count())
            .unwrap_or(0);

        if depth == 0 {
            target.to_string()
        } else {
            format!("{}{}", "../".repeat(depth), target)
        }
    }

    /// Derive a context rooted at another file.
    ///
    /// `other` is expected to be absolute, usually the result of
    /// [`resolve_path`](Self::resolve_path). The derived context keeps
    /// recording dependencies against the same entry.
    pub fn context_for_file<'b>(&self, other: &'b Path) -> ExecutionContext<'b>
    where
        'a: 'b,
    {
        ExecutionContext {
            build: self.build,
            index: self.index,
            loader: self.loader,
            file: other,
            entry: self.entry,
        }
    }

    /// Record `path` as a dependency of the entry.
    ///
    /// Relative paths resolve against the current file. Returns whether the
    /// edge is tracked.
    pub fn add_dependency(&self, path: impl AsRef<Path>) -> bool {
        let resolved = self.resolve_path(path);
        self.index.record(self.entry, &resolved)
    }

    /// Reset the entry's dependency set and get a scoped recorder.
    pub fn begin_recording(&self) -> Recorder<'a> {
        self.index.begin_recording(self.entry)
    }

    /// Read a file through the module loader, recording it as a dependency.
    ///
    /// The edge is recorded before reading so a missing file still triggers
    /// a rebuild once it appears.
    pub fn load(&self, path: impl AsRef<Path>) -> io::Result<(PathBuf, Arc<str>)> {
        let resolved = self.resolve_path(path);
        self.index.record(self.entry, &resolved);
        let content = self.loader.load(&resolved)?;
        Ok((resolved, content))
    }

    /// Mirrored output path of the current file, with the extension replaced.
    ///
    /// Returns `None` when the file lies outside the source directory.
    pub fn output_path(&self, extension: Option<&str>) -> Option<PathBuf> {
        let out = self.build.mirrored_output(self.file)?;
        Some(match extension {
            Some(ext) => out.with_extension(ext),
            None => out,
        })
    }

    /// Create a diagnostic for the current file.
    pub fn error_at(&self, line: usize, col: usize, message: impl Into<String>) -> TransformError {
        TransformError::at(self.relative_path(), line, col, message)
    }
}
