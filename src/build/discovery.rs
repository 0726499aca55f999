//! Source file discovery for the build system.
//!
//! [`SourceTree`] walks the source directory; [`IgnoreList`] filters what the
//! walk (or an explicit file list) yields. Walking never skips anything on
//! its own; ignoring is a separate step.

use glob::{MatchOptions, Pattern};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern in the ignore file
    #[error("Invalid ignore pattern '{pattern}' on line {line}: {source}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// 1-indexed line in the ignore file
        line: usize,
        /// Parse failure
        source: glob::PatternError,
    },
    /// IO error reading the ignore file
    #[error("Failed to read ignore file {}: {source}", .path.display())]
    Io {
        /// Ignore file path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
}

/// Lazy, depth-first, sorted walk of a source directory.
///
/// Call [`files`](Self::files) again to restart the walk.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
}

impl SourceTree {
    /// Create a walker rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory being walked.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every file under the root, as absolute paths.
    ///
    /// Unreadable entries are logged and skipped.
    pub fn files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable path");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
    }
}

/// Glob patterns for paths that never enter a build pass.
///
/// Patterns match paths relative to the source root with `/` separators.
/// Matching is case-sensitive, `*` never crosses a `/`, and leading dots
/// are matched like any other character. A pattern that matches a directory
/// ignores everything below it.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    patterns: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl IgnoreList {
    /// Parse newline-delimited patterns. Blank lines and `#` comments are
    /// skipped.
    pub fn parse(text: &str) -> Result<Self, DiscoveryError> {
        let mut patterns = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let pattern = Pattern::new(line.trim_end_matches('/')).map_err(|source| {
                DiscoveryError::InvalidPattern { pattern: line.to_string(), line: index + 1, source }
            })?;
            patterns.push(pattern);
        }

        Ok(Self { patterns })
    }

    /// Read the ignore file at `path`.
    ///
    /// A missing file is an empty list. The file's own name is always
    /// ignored.
    pub fn load(path: &Path) -> Result<Self, DiscoveryError> {
        let mut list = match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(source) => return Err(DiscoveryError::Io { path: path.to_path_buf(), source }),
        };

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            list.patterns.push(Pattern::new(&Pattern::escape(name)).map_err(|source| {
                DiscoveryError::InvalidPattern { pattern: name.to_string(), line: 0, source }
            })?);
        }

        Ok(list)
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether there are no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a source-relative path is ignored.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let mut prefix = String::new();
        for component in relative.components() {
            let Component::Normal(name) = component else {
                continue;
            };
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(&name.to_string_lossy());

            if self.patterns.iter().any(|p| p.matches_with(&prefix, MATCH_OPTIONS)) {
                return true;
            }
        }

        false
    }
}
