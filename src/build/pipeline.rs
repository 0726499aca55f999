//! Build pass orchestration.
//!
//! A pass runs in phases:
//!
//! 1. **Candidates**: an explicit file list, or a full walk of the source tree.
//! 2. **Ignore**: drop paths matched by the ignore list.
//! 3. **Transform**: dispatch every candidate to the registry in parallel and
//!    wait for all of them.
//! 4. **Copy fallback**: unclaimed files are copied verbatim unless an entry
//!    consumed them as a dependency during phase 3.
//! 5. **Write**: outputs are checked for collisions and written in parallel.
//!
//! Failures are isolated per file and returned in the [`PassReport`]; only
//! problems that prevent the pass from running at all are a [`BuildError`].

use crate::build::progress::{FileStatus, NullProgress, ProgressEvent, ProgressReporter};
use crate::build::{BuildContext, DiscoveryError, IgnoreList, PassReport, SourceTree};
use crate::graph::DependencyIndex;
use path_clean::PathClean;
use crate::transform::{
    Dispatch, ExecutionContext, ModuleLoader, SourceCache, TransformError, TransformRegistry,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Error that stops a pass before any file is processed.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Source directory missing
    #[error("Source directory {} does not exist", .0.display())]
    SourceMissing(PathBuf),
    /// Output directory could not be created
    #[error("Failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        /// Output directory
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// Ignore list could not be loaded
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Where the bytes of a planned write come from.
#[derive(Debug)]
enum WriteSource {
    Buffer(Vec<u8>),
    Copy(PathBuf),
}

/// One file the pass intends to write.
#[derive(Debug)]
struct PlannedWrite {
    /// Candidate file responsible for the write
    owner: PathBuf,
    dest: PathBuf,
    source: WriteSource,
}

/// Build pipeline running passes over one project.
///
/// The pipeline owns the state that outlives a single pass: the dependency
/// index and the module loader. Watch mode keeps one pipeline for the whole
/// session.
pub struct BuildPipeline {
    /// Build context
    context: BuildContext,
    /// Dependency index shared with the watch controller
    index: Arc<DependencyIndex>,
    /// Loader transformers read through
    loader: Arc<dyn ModuleLoader>,
    /// Registered transformers
    registry: TransformRegistry,
    /// Progress output
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("context", &self.context)
            .field("registry", &self.registry)
            .finish()
    }
}

impl BuildPipeline {
    /// Create a pipeline with the built-in transformers and a fresh index.
    pub fn new(context: BuildContext) -> Self {
        let index = Arc::new(DependencyIndex::new(
            context.project_root().to_path_buf(),
            context.vendor_dirs().to_vec(),
        ));
        Self {
            context,
            index,
            loader: Arc::new(SourceCache::new()),
            registry: TransformRegistry::with_defaults(),
            reporter: Arc::new(NullProgress::new()),
        }
    }

    /// Replace the transformer registry.
    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the progress reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replace the module loader.
    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Get the build context.
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// The dependency index.
    pub fn index(&self) -> &Arc<DependencyIndex> {
        &self.index
    }

    /// The module loader.
    pub fn loader(&self) -> &dyn ModuleLoader {
        self.loader.as_ref()
    }

    /// Run one pass.
    ///
    /// With `files`, only those files are candidates (relative paths resolve
    /// against the project root and are lexically cleaned, missing files are
    /// skipped). Without, the
    /// whole source tree is walked and the loader cache is cleared.
    pub fn run_pass(&self, files: Option<&[PathBuf]>) -> Result<PassReport, BuildError> {
        let start = Instant::now();
        let mut report = PassReport::new();

        let ignore = IgnoreList::load(&self.context.ignore_file())?;
        let candidates = match files {
            Some(files) => self.explicit_candidates(files),
            None => {
                // A full pass rereads everything
                self.loader.forget_all();
                self.walk_candidates()?
            }
        };

        let mut selected = Vec::with_capacity(candidates.len());
        for file in candidates {
            match self.context.relative_to_src(&file) {
                Some(rel) if ignore.is_ignored(rel) => {
                    tracing::debug!(file = %rel.display(), "ignored");
                    report.ignored.push(file);
                }
                _ => selected.push(file),
            }
        }

        self.reporter.report(ProgressEvent::PassStarted {
            total_files: selected.len(),
            scoped: files.is_some(),
        });

        let out_dir = self.context.out_dir();
        fs::create_dir_all(out_dir)
            .map_err(|source| BuildError::OutputDir { path: out_dir.to_path_buf(), source })?;

        let dispatched: Vec<(&PathBuf, Dispatch)> = selected
            .par_iter()
            .map(|file| {
                let ctx = ExecutionContext::new(&self.context, &self.index, self.loader(), file);
                (file, self.registry.dispatch(file, &ctx))
            })
            .collect();

        let mut failed: HashSet<PathBuf> = HashSet::new();
        let mut writes = Vec::new();
        let mut statuses: Vec<(&PathBuf, FileStatus)> = Vec::with_capacity(dispatched.len());

        for (file, dispatch) in dispatched {
            match dispatch {
                Dispatch::Transformed(result) => {
                    if !result.errors.is_empty() {
                        failed.insert(file.clone());
                        report.errors.extend(result.errors);
                    }
                    writes.extend(result.outputs.into_iter().map(|out| PlannedWrite {
                        owner: file.clone(),
                        dest: out.path,
                        source: WriteSource::Buffer(out.contents),
                    }));
                    report.transformed.push(file.clone());
                    statuses.push((file, FileStatus::Transformed));
                }
                Dispatch::Unclaimed if self.index.is_dependency(file) => {
                    tracing::debug!(file = %file.display(), "consumed as dependency, not copied");
                    report.skipped_dependencies.push(file.clone());
                    statuses.push((file, FileStatus::Skipped));
                }
                Dispatch::Unclaimed => match self.context.mirrored_output(file) {
                    Some(dest) if !self.context.is_in_place() => {
                        writes.push(PlannedWrite {
                            owner: file.clone(),
                            dest,
                            source: WriteSource::Copy(file.clone()),
                        });
                        statuses.push((file, FileStatus::Copied));
                    }
                    Some(_) => statuses.push((file, FileStatus::Skipped)),
                    None => {
                        tracing::warn!(file = %file.display(), "outside the source directory, not copied");
                        statuses.push((file, FileStatus::Skipped));
                    }
                },
            }
        }

        let writes = self.check_writes(writes, &mut report.errors, &mut failed);
        let results: Vec<(PlannedWrite, io::Result<()>)> = writes
            .into_par_iter()
            .map(|write| {
                let result = write_output(&write);
                (write, result)
            })
            .collect();

        let mut written: BTreeMap<PathBuf, usize> = BTreeMap::new();
        for (write, result) in results {
            match result {
                Ok(()) => {
                    if matches!(write.source, WriteSource::Copy(_)) {
                        report.copied.push(write.owner.clone());
                    }
                    *written.entry(write.owner).or_default() += 1;
                    report.outputs.push(write.dest);
                }
                Err(e) => {
                    report.errors.push(TransformError::without_location(
                        self.context.display_path(&write.owner),
                        format!("failed to write {}: {}", self.display_out(&write.dest), e),
                    ));
                    failed.insert(write.owner);
                }
            }
        }

        for (file, status) in statuses {
            let status = if failed.contains(file) { FileStatus::Failed } else { status };
            self.reporter.report(ProgressEvent::FileCompleted {
                file: self.context.display_path(file).display().to_string(),
                status,
                outputs: written.get(file).copied().unwrap_or(0),
            });
        }

        // Errors are reported only once every file has settled.
        for error in &report.errors {
            self.reporter.report(ProgressEvent::Error { file: None, message: error.to_string() });
        }

        report.failed = failed.into_iter().collect();
        report.failed.sort();

        let report = report.with_duration(start.elapsed());
        tracing::info!(
            transformed = report.transformed.len(),
            copied = report.copied.len(),
            errors = report.errors.len(),
            "pass finished in {:?}",
            report.duration
        );
        self.reporter.report(ProgressEvent::PassCompleted {
            success: report.is_success(),
            duration_ms: report.duration.as_millis() as u64,
            transformed: report.transformed.len(),
            copied: report.copied.len(),
            errors: report.errors.len(),
        });

        Ok(report)
    }

    fn walk_candidates(&self) -> Result<Vec<PathBuf>, BuildError> {
        let src = self.context.src_dir();
        if !src.is_dir() {
            return Err(BuildError::SourceMissing(src.to_path_buf()));
        }

        let out = self.context.out_dir();
        let nested_out = !self.context.is_in_place() && out.starts_with(src);
        Ok(SourceTree::new(src).files().filter(|f| !(nested_out && f.starts_with(out))).collect())
    }

    fn explicit_candidates(&self, files: &[PathBuf]) -> Vec<PathBuf> {
        let unique: BTreeSet<PathBuf> =
            files.iter().map(|f| self.context.resolve_path(f).clean()).collect();

        unique
            .into_iter()
            .filter(|file| {
                let exists = file.is_file();
                if !exists {
                    tracing::info!(file = %file.display(), "skipping missing file");
                }
                exists
            })
            .collect()
    }

    /// Drop writes that collide with another write or would overwrite their
    /// own source, recording an error for every owner involved.
    fn check_writes(
        &self,
        writes: Vec<PlannedWrite>,
        errors: &mut Vec<TransformError>,
        failed: &mut HashSet<PathBuf>,
    ) -> Vec<PlannedWrite> {
        let mut owners: BTreeMap<&Path, Vec<&Path>> = BTreeMap::new();
        for write in &writes {
            owners.entry(write.dest.as_path()).or_default().push(write.owner.as_path());
        }

        let colliding: HashSet<PathBuf> = owners
            .iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|(dest, _)| dest.to_path_buf())
            .collect();

        for (dest, claimants) in owners.iter().filter(|(_, o)| o.len() > 1) {
            let names: Vec<String> = claimants
                .iter()
                .map(|o| self.context.display_path(o).display().to_string())
                .collect();
            let unique: BTreeSet<&Path> = claimants.iter().copied().collect();
            for owner in unique {
                errors.push(TransformError::without_location(
                    self.context.display_path(owner),
                    format!(
                        "output {} is produced more than once ({})",
                        self.display_out(dest),
                        names.join(", ")
                    ),
                ));
                failed.insert(owner.to_path_buf());
            }
        }

        let mut kept = Vec::with_capacity(writes.len());
        for write in writes {
            if colliding.contains(&write.dest) {
                continue;
            }
            if write.dest == write.owner {
                errors.push(TransformError::without_location(
                    self.context.display_path(&write.owner),
                    "refusing to overwrite the source file with its own output",
                ));
                failed.insert(write.owner);
                continue;
            }
            kept.push(write);
        }
        kept
    }

    fn display_out(&self, dest: &Path) -> String {
        dest.strip_prefix(self.context.project_root()).unwrap_or(dest).display().to_string()
    }
}

fn write_output(write: &PlannedWrite) -> io::Result<()> {
    if let Some(parent) = write.dest.parent() {
        fs::create_dir_all(parent)?;
    }

    match &write.source {
        WriteSource::Buffer(contents) => fs::write(&write.dest, contents),
        WriteSource::Copy(from) => fs::copy(from, &write.dest).map(|_| ()),
    }
}
