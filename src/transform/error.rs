//! Transform error types.
//!
//! A [`TransformError`] is a per-file failure with a source position. It is
//! data, collected and reported by the build pass, never propagated past it.

use regex::Regex;
use std::any::Any;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// A line/column pair (1-indexed, 0 when unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Line number
    pub line: usize,
    /// Column number
    pub col: usize,
}

impl Location {
    /// Create a location.
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Start and end of a source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Span start
    pub start: Location,
    /// Span end
    pub end: Location,
}

impl Position {
    /// A zero-width position at `line:col`.
    pub fn at(line: usize, col: usize) -> Self {
        let loc = Location::new(line, col);
        Self { start: loc, end: loc }
    }

    /// Position used when nothing better is known.
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// A recoverable failure while transforming one file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{}:{} - {}", .filename.display(), .position.start.line, .position.start.col, .message)]
pub struct TransformError {
    /// File the error belongs to (source-root relative where possible)
    pub filename: PathBuf,
    /// Location of the error in that file
    pub position: Position,
    /// Error message
    pub message: String,
}

impl TransformError {
    /// Create an error at an explicit position.
    pub fn new(filename: impl Into<PathBuf>, position: Position, message: impl Into<String>) -> Self {
        Self { filename: filename.into(), position, message: message.into() }
    }

    /// Create an error at `line:col`.
    pub fn at(
        filename: impl Into<PathBuf>,
        line: usize,
        col: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::new(filename, Position::at(line, col), message)
    }

    /// Create an error with no known location.
    pub fn without_location(filename: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(filename, Position::unknown(), message)
    }

    /// Build an error from an arbitrary error value.
    ///
    /// The whole source chain is flattened into the message. If the text
    /// mentions `file` as `path:line:col` (optionally as `at func (path:line:col)`),
    /// that location is used.
    pub fn from_error(file: &Path, filename: impl Into<PathBuf>, error: &(dyn StdError + 'static)) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self::from_message(file, filename, message)
    }

    /// Build an error from a caught panic payload.
    pub fn from_panic(file: &Path, filename: impl Into<PathBuf>, payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };

        Self::from_message(file, filename, format!("transformer panicked: {}", detail))
    }

    fn from_message(file: &Path, filename: impl Into<PathBuf>, message: String) -> Self {
        match extract_location(file, &message) {
            Some((location, Some(function))) => Self::new(
                filename,
                Position { start: location, end: location },
                format!("at {}: {}", function, message),
            ),
            Some((location, None)) => {
                Self::new(filename, Position { start: location, end: location }, message)
            }
            None => Self::without_location(filename, message),
        }
    }
}

static LOCATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:at (?P<func>[^()\n]+?) \()?(?P<path>[^\s():]+):(?P<line>\d+):(?P<col>\d+)")
        .expect("location pattern is a valid regex")
});

/// Find the first `path:line:col` reference to `file` in `text`.
fn extract_location(file: &Path, text: &str) -> Option<(Location, Option<String>)> {
    LOCATION_PATTERN.captures_iter(text).find_map(|caps| {
        let candidate = Path::new(caps.name("path")?.as_str());
        if !file.ends_with(candidate) {
            return None;
        }

        let line = caps.name("line")?.as_str().parse().ok()?;
        let col = caps.name("col")?.as_str().parse().ok()?;
        let function = caps.name("func").map(|m| m.as_str().trim().to_string());
        Some((Location::new(line, col), function))
    })
}

/// Failure returned by a transformer's `process`.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A structured diagnostic with an exact location
    #[error("{0}")]
    Diagnostic(TransformError),
    /// Any other error; its location is recovered on a best-effort basis
    #[error("{0}")]
    Other(Box<dyn StdError + Send + Sync>),
}

impl ProcessError {
    /// Wrap an arbitrary error.
    pub fn other(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        ProcessError::Other(error.into())
    }

    /// Convert into a [`TransformError`] for `file`.
    pub fn into_transform_error(self, file: &Path, filename: impl Into<PathBuf>) -> TransformError {
        match self {
            ProcessError::Diagnostic(error) => error,
            ProcessError::Other(error) => TransformError::from_error(file, filename, error.as_ref()),
        }
    }
}

impl From<TransformError> for ProcessError {
    fn from(error: TransformError) -> Self {
        ProcessError::Diagnostic(error)
    }
}

impl From<std::io::Error> for ProcessError {
    fn from(error: std::io::Error) -> Self {
        ProcessError::Other(Box::new(error))
    }
}
