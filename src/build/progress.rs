//! Build progress reporting.
//!
//! Provides a flexible progress reporting system for build passes.
//! Supports console output (with colors), JSON lines, and a silent reporter.
//!
//! # Example
//!
//! ```ignore
//! use quire::build::progress::{ConsoleProgress, FileStatus, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::PassStarted { total_files: 2, scoped: false });
//! reporter.report(ProgressEvent::FileCompleted {
//!     file: "index.page".to_string(),
//!     status: FileStatus::Transformed,
//!     outputs: 1,
//! });
//! ```

use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// What happened to one candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Claimed and processed by a transformer
    Transformed,
    /// Copied verbatim
    Copied,
    /// Consumed as a dependency, not emitted on its own
    Skipped,
    /// Transform or write failed
    Failed,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Transformed => write!(f, "transformed"),
            FileStatus::Copied => write!(f, "copied"),
            FileStatus::Skipped => write!(f, "skipped"),
            FileStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Events that can be reported during a build pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A pass started
    PassStarted {
        /// Number of candidate files after ignore filtering
        total_files: usize,
        /// Whether the pass covers an explicit file list
        scoped: bool,
    },
    /// A candidate file was handled
    FileCompleted {
        /// Source-relative file path
        file: String,
        /// What happened to it
        status: FileStatus,
        /// Number of files written for it
        outputs: usize,
    },
    /// A pass completed
    PassCompleted {
        /// Whether the pass finished without errors
        success: bool,
        /// Total duration in milliseconds
        duration_ms: u64,
        /// Files handled by a transformer
        transformed: usize,
        /// Files copied verbatim
        copied: usize,
        /// Number of errors
        errors: usize,
    },
    /// A warning was generated
    Warning {
        /// File that generated the warning (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        /// Warning message
        message: String,
    },
    /// An error occurred
    Error {
        /// File that generated the error (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        /// Error message
        message: String,
    },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    /// Create a new null progress reporter.
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to show a line for every file
    verbose: bool,
    /// Files handled so far in the current pass
    current: AtomicUsize,
    /// Candidate files in the current pass
    total: AtomicUsize,
    /// Output writer (for testing)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a new console progress reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Set whether to use colors.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn bold(&self, text: &str) -> String {
        self.color(text, "\x1b[1m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::PassStarted { total_files, scoped } => {
                self.total.store(total_files, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                if total_files > 0 {
                    self.writeln(&format!(
                        "{} {} {} file{}...",
                        self.cyan("[build]"),
                        if scoped { "Rebuilding" } else { "Building" },
                        total_files,
                        if total_files == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::FileCompleted { file, status, outputs } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);

                if !self.verbose && status != FileStatus::Failed {
                    return;
                }

                let status_str = match status {
                    FileStatus::Transformed => self.green("ok"),
                    FileStatus::Copied => self.green("copied"),
                    FileStatus::Skipped => self.yellow("skipped"),
                    FileStatus::Failed => self.red("FAILED"),
                };
                let suffix = if outputs > 1 { format!(" ({} outputs)", outputs) } else { String::new() };

                self.writeln(&format!(
                    "{} [{}/{}] {} {}{}",
                    self.cyan("[build]"),
                    current,
                    total,
                    status_str,
                    file,
                    suffix
                ));
            }
            ProgressEvent::PassCompleted { success, duration_ms, transformed, copied, errors } => {
                let duration_str = format_duration(duration_ms);

                if success {
                    self.writeln(&format!(
                        "{} {} transformed, {} copied in {}",
                        self.green("[done]"),
                        self.bold(&transformed.to_string()),
                        copied,
                        duration_str
                    ));
                } else {
                    self.writeln(&format!(
                        "{} Build failed: {} {} in {}",
                        self.red("[error]"),
                        errors,
                        if errors == 1 { "error" } else { "errors" },
                        duration_str
                    ));
                }
            }
            ProgressEvent::Warning { file, message } => {
                let prefix = file.map(|f| format!("{}: ", f)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), prefix, message));
            }
            ProgressEvent::Error { file, message } => {
                let prefix = file.map(|f| format!("{}: ", f)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.red("[error]"), prefix, message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// JSON progress reporter for machine-readable output, one object per line.
pub struct JsonProgress {
    /// Output writer
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize progress event");
                return;
            }
        };
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", json);
        }
    }
}

/// Format a duration in milliseconds to a human-readable string.
fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn console() -> (ConsoleProgress, Arc<Mutex<Vec<u8>>>) {
        let output = Arc::new(Mutex::new(Vec::new()));
        let reporter = ConsoleProgress::with_output(TestWriter(Arc::clone(&output))).with_colors(false);
        (reporter, output)
    }

    fn text(output: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8_lossy(&output.lock().unwrap()).into_owned()
    }

    #[test]
    fn test_file_status_display() {
        assert_eq!(FileStatus::Transformed.to_string(), "transformed");
        assert_eq!(FileStatus::Skipped.to_string(), "skipped");
        assert_eq!(FileStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_null_progress() {
        let reporter = NullProgress::new();
        reporter.report(ProgressEvent::PassStarted { total_files: 10, scoped: false });
        assert!(!reporter.is_verbose());
    }

    #[test]
    fn test_console_pass_started() {
        let (reporter, output) = console();
        reporter.report(ProgressEvent::PassStarted { total_files: 5, scoped: false });
        assert!(text(&output).contains("Building 5 files"));

        reporter.report(ProgressEvent::PassStarted { total_files: 1, scoped: true });
        assert!(text(&output).contains("Rebuilding 1 file..."));
    }

    #[test]
    fn test_console_quiet_about_successful_files() {
        let (reporter, output) = console();
        reporter.report(ProgressEvent::PassStarted { total_files: 2, scoped: false });
        reporter.report(ProgressEvent::FileCompleted {
            file: "index.page".to_string(),
            status: FileStatus::Transformed,
            outputs: 1,
        });
        reporter.report(ProgressEvent::FileCompleted {
            file: "broken.page".to_string(),
            status: FileStatus::Failed,
            outputs: 0,
        });

        let text = text(&output);
        assert!(!text.contains("index.page"));
        assert!(text.contains("[2/2] FAILED broken.page"));
    }

    #[test]
    fn test_console_verbose_lists_every_file() {
        let (reporter, output) = console();
        let reporter = reporter.with_verbose(true);
        reporter.report(ProgressEvent::PassStarted { total_files: 1, scoped: false });
        reporter.report(ProgressEvent::FileCompleted {
            file: "gallery.page".to_string(),
            status: FileStatus::Transformed,
            outputs: 3,
        });

        assert!(reporter.is_verbose());
        assert!(text(&output).contains("[1/1] ok gallery.page (3 outputs)"));
    }

    #[test]
    fn test_console_pass_completed() {
        let (reporter, output) = console();
        reporter.report(ProgressEvent::PassCompleted {
            success: true,
            duration_ms: 1500,
            transformed: 4,
            copied: 2,
            errors: 0,
        });
        reporter.report(ProgressEvent::PassCompleted {
            success: false,
            duration_ms: 20,
            transformed: 1,
            copied: 0,
            errors: 1,
        });

        let text = text(&output);
        assert!(text.contains("[done] 4 transformed, 2 copied in 1.5s"));
        assert!(text.contains("[error] Build failed: 1 error in 20ms"));
    }

    #[test]
    fn test_console_warning() {
        let (reporter, output) = console();
        reporter.report(ProgressEvent::Warning {
            file: Some("logo.png".to_string()),
            message: "skipped missing file".to_string(),
        });

        let text = text(&output);
        assert!(text.contains("[warn] logo.png: skipped missing file"));
    }

    #[test]
    fn test_json_events() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let reporter = JsonProgress::with_output(TestWriter(Arc::clone(&output)));
        reporter.report(ProgressEvent::PassStarted { total_files: 10, scoped: false });
        reporter.report(ProgressEvent::FileCompleted {
            file: "a \"quoted\" name.page".to_string(),
            status: FileStatus::Copied,
            outputs: 1,
        });
        reporter.report(ProgressEvent::Error { file: None, message: "boom".to_string() });

        let text = text(&output);
        let lines: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "pass_started");
        assert_eq!(lines[0]["total_files"], 10);
        assert_eq!(lines[1]["status"], "copied");
        assert_eq!(lines[1]["file"], "a \"quoted\" name.page");
        assert_eq!(lines[2]["event"], "error");
        assert!(lines[2].get("file").is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(999), "999ms");
        assert_eq!(format_duration(1500), "1.5s");
        assert_eq!(format_duration(90000), "1m 30s");
    }

    struct TestWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
