//! Transformer registry and dispatch.
//!
//! A [`Transformer`] recognizes a file by path and turns it into zero or more
//! output buffers. The [`TransformRegistry`] holds transformers in
//! registration order and hands each file to the first one that matches.
//! Files no transformer claims are reported as [`Dispatch::Unclaimed`] so the
//! build pass can fall back to a verbatim copy.
//!
//! # Ordering
//!
//! First match wins, so more specific matchers must be registered before
//! broader ones.

pub mod context;
pub mod error;
pub mod loader;
pub mod page;
pub mod stylesheet;

pub use context::*;
pub use error::*;
pub use loader::*;
pub use page::PageTransformer;
pub use stylesheet::StylesheetTransformer;

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// A pluggable handler for one kind of source file.
pub trait Transformer: Send + Sync {
    /// Short name used in logs and progress output.
    fn name(&self) -> &'static str;

    /// Whether this transformer handles `path`.
    fn matches(&self, path: &Path) -> bool;

    /// Transform `file` into output buffers.
    fn process(&self, file: &Path, ctx: &ExecutionContext<'_>)
        -> Result<TransformOutput, ProcessError>;
}

/// One generated output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Absolute destination path
    pub path: PathBuf,
    /// File contents
    pub contents: Vec<u8>,
}

impl OutputFile {
    /// Create an output file.
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self { path: path.into(), contents: contents.into() }
    }
}

/// Everything a transformer produced for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOutput {
    /// Generated files
    pub files: Vec<OutputFile>,
}

impl TransformOutput {
    /// A claimed file that produces nothing (partials).
    pub fn none() -> Self {
        Self::default()
    }

    /// A single output file.
    pub fn single(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self { files: vec![OutputFile::new(path, contents)] }
    }

    /// Add an output file.
    pub fn push(&mut self, file: OutputFile) {
        self.files.push(file);
    }
}

/// Result of dispatching one file to its transformer.
#[derive(Debug, Clone)]
pub struct TransformResult {
    /// Source file
    pub file: PathBuf,
    /// Name of the transformer that handled it
    pub transformer: &'static str,
    /// Files to write
    pub outputs: Vec<OutputFile>,
    /// Errors raised while transforming
    pub errors: Vec<TransformError>,
}

impl TransformResult {
    /// Whether the transform produced no errors.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of [`TransformRegistry::dispatch`].
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// A transformer claimed the file
    Transformed(TransformResult),
    /// No transformer matched; the caller decides whether to copy
    Unclaimed,
}

/// Ordered list of transformers.
#[derive(Default)]
pub struct TransformRegistry {
    transformers: Vec<Box<dyn Transformer>>,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry").field("transformers", &self.names()).finish()
    }
}

impl TransformRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in transformers, most specific first.
    pub fn with_defaults() -> Self {
        Self::new().with(PageTransformer::new()).with(StylesheetTransformer::new())
    }

    /// Append a transformer (builder style).
    pub fn with<T: Transformer + 'static>(mut self, transformer: T) -> Self {
        self.register(transformer);
        self
    }

    /// Append a transformer.
    pub fn register<T: Transformer + 'static>(&mut self, transformer: T) {
        self.transformers.push(Box::new(transformer));
    }

    /// Names of registered transformers, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    /// Number of registered transformers.
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    /// Whether no transformers are registered.
    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// The first transformer matching `path`.
    pub fn find(&self, path: &Path) -> Option<&dyn Transformer> {
        self.transformers.iter().find(|t| t.matches(path)).map(|t| t.as_ref())
    }

    /// Hand `file` to the first matching transformer.
    ///
    /// Errors and panics from the transformer are caught here and returned
    /// as data in the [`TransformResult`].
    pub fn dispatch(&self, file: &Path, ctx: &ExecutionContext<'_>) -> Dispatch {
        let Some(transformer) = self.find(file) else {
            return Dispatch::Unclaimed;
        };

        tracing::debug!(file = %file.display(), transformer = transformer.name(), "dispatch");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| transformer.process(file, ctx)));
        let (outputs, errors) = match outcome {
            Ok(Ok(output)) => (output.files, vec![]),
            Ok(Err(error)) => (vec![], vec![error.into_transform_error(file, ctx.relative_path())]),
            Err(payload) => {
                (vec![], vec![TransformError::from_panic(file, ctx.relative_path(), payload)])
            }
        };

        Dispatch::Transformed(TransformResult {
            file: file.to_path_buf(),
            transformer: transformer.name(),
            outputs,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildContext;
    use crate::config::QuireConfig;
    use crate::graph::DependencyIndex;

    struct Suffix(&'static str, &'static str);

    impl Transformer for Suffix {
        fn name(&self) -> &'static str {
            self.1
        }

        fn matches(&self, path: &Path) -> bool {
            path.to_string_lossy().ends_with(self.0)
        }

        fn process(
            &self,
            file: &Path,
            _ctx: &ExecutionContext<'_>,
        ) -> Result<TransformOutput, ProcessError> {
            Ok(TransformOutput::single(file.with_extension("out"), self.1.as_bytes()))
        }
    }

    struct Failing;

    impl Transformer for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn matches(&self, path: &Path) -> bool {
            path.extension().is_some_and(|e| e == "bad")
        }

        fn process(&self, _: &Path, ctx: &ExecutionContext<'_>) -> Result<TransformOutput, ProcessError> {
            Err(ctx.error_at(2, 5, "broken").into())
        }
    }

    struct Panicking;

    impl Transformer for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn matches(&self, path: &Path) -> bool {
            path.extension().is_some_and(|e| e == "boom")
        }

        fn process(&self, _: &Path, _: &ExecutionContext<'_>) -> Result<TransformOutput, ProcessError> {
            panic!("exploded")
        }
    }

    fn with_ctx(file: &str, f: impl FnOnce(&ExecutionContext<'_>)) {
        let build = BuildContext::new(QuireConfig::default(), PathBuf::from("/site"));
        let index = DependencyIndex::new("/site", vec![]);
        let cache = SourceCache::new();
        let file = PathBuf::from(file);
        let ctx = ExecutionContext::new(&build, &index, &cache, &file);
        f(&ctx);
    }

    #[test]
    fn test_first_match_wins() {
        let registry = TransformRegistry::new()
            .with(Suffix(".g.css", "generated"))
            .with(Suffix(".css", "stylesheet"));

        assert_eq!(registry.find(Path::new("a.g.css")).map(|t| t.name()), Some("generated"));
        assert_eq!(registry.find(Path::new("a.css")).map(|t| t.name()), Some("stylesheet"));
        assert!(registry.find(Path::new("a.png")).is_none());
        assert_eq!(registry.names(), vec!["generated", "stylesheet"]);
    }

    #[test]
    fn test_dispatch_unclaimed() {
        let registry = TransformRegistry::new().with(Suffix(".css", "stylesheet"));
        with_ctx("/site/src/logo.png", |ctx| {
            assert!(matches!(registry.dispatch(ctx.file(), ctx), Dispatch::Unclaimed));
        });
    }

    #[test]
    fn test_dispatch_transformed() {
        let registry = TransformRegistry::new().with(Suffix(".css", "stylesheet"));
        with_ctx("/site/src/a.css", |ctx| match registry.dispatch(ctx.file(), ctx) {
            Dispatch::Transformed(result) => {
                assert!(result.is_success());
                assert_eq!(result.transformer, "stylesheet");
                assert_eq!(result.outputs.len(), 1);
            }
            Dispatch::Unclaimed => panic!("expected transformed"),
        });
    }

    #[test]
    fn test_dispatch_collects_errors() {
        let registry = TransformRegistry::new().with(Failing);
        with_ctx("/site/src/x.bad", |ctx| match registry.dispatch(ctx.file(), ctx) {
            Dispatch::Transformed(result) => {
                assert!(result.outputs.is_empty());
                assert_eq!(result.errors.len(), 1);
                assert_eq!(result.errors[0].to_string(), "x.bad:2:5 - broken");
            }
            Dispatch::Unclaimed => panic!("expected transformed"),
        });
    }

    #[test]
    fn test_dispatch_catches_panics() {
        let registry = TransformRegistry::new().with(Panicking);
        with_ctx("/site/src/x.boom", |ctx| match registry.dispatch(ctx.file(), ctx) {
            Dispatch::Transformed(result) => {
                assert_eq!(result.errors.len(), 1);
                assert!(result.errors[0].message.contains("exploded"));
            }
            Dispatch::Unclaimed => panic!("expected transformed"),
        });
    }

    #[test]
    fn test_default_registry_order() {
        let registry = TransformRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["page", "stylesheet"]);
    }
}
