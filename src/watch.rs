//! Watch mode for incremental rebuilds on file changes
//!
//! Provides file system watching with debouncing for the `quire build --watch`
//! command. Each change is resolved through the dependency index to the set
//! of entries that must be rebuilt, and the resulting passes run one at a
//! time.

use crate::build::{BuildError, BuildPipeline, PassReport};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(#[source] notify::Error),
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    Channel(String),
    /// Source directory not found
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File was created
    Added,
    /// File content changed
    Modified,
    /// File was deleted
    Removed,
}

/// A single file system change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Absolute path of the changed file
    pub path: PathBuf,
    /// Kind of change
    pub kind: ChangeKind,
}

impl FileChange {
    /// Create a change event.
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self { path: path.into(), kind }
    }

    /// Classify a debounced event by looking at the file system.
    ///
    /// The debouncer only reports that something happened to a path, so a
    /// path that still exists is treated as modified and a missing one as
    /// removed.
    pub fn detect(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = if path.exists() { ChangeKind::Modified } else { ChangeKind::Removed };
        Self { path, kind }
    }
}

/// Tracks files with errors across passes to report fixes.
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Files that had errors in an earlier pass
    files_with_errors: HashSet<PathBuf>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with a pass report, returns the files that were fixed.
    ///
    /// A scoped pass only says something about the files it processed;
    /// errors on files outside the pass are kept.
    pub fn update(&mut self, report: &PassReport) -> Vec<PathBuf> {
        let still_failing: HashSet<&PathBuf> = report.failed.iter().collect();

        let mut fixed: Vec<PathBuf> = self
            .files_with_errors
            .iter()
            .filter(|f| report.processed(f) && !still_failing.contains(f))
            .cloned()
            .collect();
        fixed.sort();

        for file in &fixed {
            self.files_with_errors.remove(file);
        }
        self.files_with_errors.extend(report.failed.iter().cloned());

        fixed
    }

    /// Forget a file, e.g. after it was deleted.
    pub fn forget(&mut self, file: &Path) {
        self.files_with_errors.remove(file);
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.files_with_errors.is_empty()
    }

    /// Get the number of files with errors
    pub fn error_count(&self) -> usize {
        self.files_with_errors.len()
    }
}

/// Whether a pass is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Waiting for changes
    Idle,
    /// A pass is in flight
    Building,
}

/// Outcome of one scheduled pass.
#[derive(Debug)]
pub struct WatchRun {
    /// Files the pass was scoped to
    pub files: Vec<PathBuf>,
    /// Pass result
    pub outcome: Result<PassReport, BuildError>,
    /// Files whose earlier errors are gone
    pub fixed: Vec<PathBuf>,
}

/// Turns file changes into scoped, serialized build passes.
///
/// The controller owns the pipeline for the whole session so the dependency
/// index recorded by one pass answers the queries of the next.
#[derive(Debug)]
pub struct WatchController {
    pipeline: BuildPipeline,
    state: WatchState,
    pending: VecDeque<Vec<PathBuf>>,
    errors: ErrorTracker,
}

impl WatchController {
    /// Create a controller around a pipeline.
    pub fn new(pipeline: BuildPipeline) -> Self {
        Self {
            pipeline,
            state: WatchState::Idle,
            pending: VecDeque::new(),
            errors: ErrorTracker::new(),
        }
    }

    /// The pipeline passes run on.
    pub fn pipeline(&self) -> &BuildPipeline {
        &self.pipeline
    }

    /// Current state.
    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Number of passes waiting to run.
    pub fn pending_runs(&self) -> usize {
        self.pending.len()
    }

    /// Error tracker fed by every pass.
    pub fn error_tracker(&self) -> &ErrorTracker {
        &self.errors
    }

    /// Run the startup pass over the whole tree or an explicit file list.
    pub fn initial_pass(&mut self, files: Option<&[PathBuf]>) -> WatchRun {
        self.execute(files.map(<[PathBuf]>::to_vec))
    }

    /// Whether an event for `path` should reach [`handle_change`](Self::handle_change).
    ///
    /// Drops directories, anything under the output directory when it is
    /// distinct from the source directory, vendor directories and `.git`.
    pub fn is_relevant(&self, path: &Path) -> bool {
        if path.is_dir() {
            return false;
        }

        let context = self.pipeline.context();
        if !context.is_in_place() && path.starts_with(context.out_dir()) {
            return false;
        }

        let vendor_dirs = context.vendor_dirs();
        let relative = path.strip_prefix(context.project_root()).unwrap_or(path);
        !relative.components().any(|component| match component {
            Component::Normal(name) => {
                name == ".git" || vendor_dirs.iter().any(|v| name.to_str() == Some(v.as_str()))
            }
            _ => false,
        })
    }

    /// Resolve a change to the entries it affects and queue a pass for them.
    ///
    /// Returns the scheduled file set, or `None` when nothing needs to be
    /// rebuilt.
    pub fn handle_change(&mut self, change: FileChange) -> Option<Vec<PathBuf>> {
        let path = change.path;
        let index = self.pipeline.index();

        self.pipeline.loader().forget(&path);
        let mut affected = index.affected_entries(&path);
        index.invalidate(&path);

        match change.kind {
            ChangeKind::Added | ChangeKind::Modified => {
                let in_src = path.starts_with(self.pipeline.context().src_dir());
                if in_src && !affected.contains(&path) && !index.is_dependency(&path) {
                    affected.insert(path.clone());
                }
            }
            ChangeKind::Removed => {
                affected.remove(&path);
                self.errors.forget(&path);
            }
        }

        if affected.is_empty() {
            tracing::debug!(file = %path.display(), "change affects no entries");
            return None;
        }

        let files: Vec<PathBuf> = affected.into_iter().collect();
        tracing::debug!(file = %path.display(), entries = files.len(), "scheduled rebuild");
        self.pending.push_back(files.clone());
        Some(files)
    }

    /// Run the next queued pass, if any.
    pub fn run_next(&mut self) -> Option<WatchRun> {
        let files = self.pending.pop_front()?;
        Some(self.execute(Some(files)))
    }

    /// Run every queued pass in order.
    ///
    /// A pass that fails does not stop the ones queued after it.
    pub fn run_pending(&mut self) -> Vec<WatchRun> {
        let mut runs = Vec::with_capacity(self.pending.len());
        while let Some(run) = self.run_next() {
            runs.push(run);
        }
        runs
    }

    fn execute(&mut self, files: Option<Vec<PathBuf>>) -> WatchRun {
        self.state = WatchState::Building;
        let outcome = self.pipeline.run_pass(files.as_deref());
        self.state = WatchState::Idle;

        let fixed = match &outcome {
            Ok(report) => self.errors.update(report),
            Err(e) => {
                tracing::error!(error = %e, "pass did not run");
                Vec::new()
            }
        };

        WatchRun { files: files.unwrap_or_default(), outcome, fixed }
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Watch the project and rebuild affected entries on every change.
///
/// Runs the startup pass first, then blocks until the event channel closes.
/// Pass errors are reported through the pipeline's reporter and never stop
/// the loop.
///
/// # Example
///
/// ```ignore
/// use quire::watch::{watch_and_rebuild, WatchController};
///
/// let controller = WatchController::new(pipeline);
/// watch_and_rebuild(controller, None)?;
/// ```
pub fn watch_and_rebuild(
    mut controller: WatchController,
    initial_files: Option<&[PathBuf]>,
) -> Result<(), WatchError> {
    let context = controller.pipeline().context().clone();
    if !context.src_dir().is_dir() {
        return Err(WatchError::SourceNotFound(context.src_dir().to_path_buf()));
    }
    let watch_config = &context.config().watch;

    // Create channel for debounced events
    let (tx, rx) = channel();

    let debounce_duration = Duration::from_millis(u64::from(watch_config.debounce_ms));
    let mut debouncer = new_debouncer(debounce_duration, tx).map_err(WatchError::WatcherInit)?;

    // Data files may live outside the source tree, so watch the whole project
    debouncer
        .watcher()
        .watch(context.project_root(), RecursiveMode::Recursive)
        .map_err(WatchError::WatchPath)?;

    if watch_config.clear_screen {
        clear_screen();
    }
    println!("[{}] Building...", timestamp());
    let run = controller.initial_pass(initial_files);
    print_run(&run);
    println!("[{}] Watching {} for changes...", timestamp(), context.project_root().display());

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let mut seen = BTreeSet::new();
                let changes: Vec<FileChange> = events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .filter(|e| seen.insert(e.path.clone()))
                    .filter(|e| controller.is_relevant(&e.path))
                    .map(|e| FileChange::detect(e.path))
                    .collect();

                let mut scheduled = false;
                for change in changes {
                    println!(
                        "[{}] Changed: {}",
                        timestamp(),
                        context.display_path(&change.path).display()
                    );
                    scheduled |= controller.handle_change(change).is_some();
                }
                if !scheduled {
                    continue;
                }

                if watch_config.clear_screen {
                    clear_screen();
                }
                for run in controller.run_pending() {
                    print_run(&run);
                }
                println!(
                    "[{}] Watching {} for changes...",
                    timestamp(),
                    context.project_root().display()
                );
            }
            Ok(Err(error)) => {
                // Watch error (non-fatal) - log but continue watching
                eprintln!("[{}] Watch error: {:?}", timestamp(), error);
                eprintln!("[{}] Continuing to watch...", timestamp());
            }
            Err(e) => {
                return Err(WatchError::Channel(e.to_string()));
            }
        }
    }
}

/// Print the watch-level outcome of a pass. Per-file errors are already
/// printed by the pipeline's reporter.
fn print_run(run: &WatchRun) {
    for fixed in &run.fixed {
        if let Some(name) = fixed.file_name() {
            println!("[{}] Fixed: {}", timestamp(), name.to_string_lossy());
        }
    }

    match &run.outcome {
        Ok(report) if report.is_success() => println!(
            "[{}] Build complete ({}) - Transformed: {} | Copied: {}",
            timestamp(),
            format_duration(report.duration),
            report.transformed.len(),
            report.copied.len()
        ),
        Ok(report) => {
            let error_count = report.errors.len();
            println!(
                "[{}] Build failed ({}) - {} error{}",
                timestamp(),
                format_duration(report.duration),
                error_count,
                if error_count == 1 { "" } else { "s" }
            );
        }
        Err(e) => eprintln!("[{}] Error: {}", timestamp(), e),
    }
}
