//! Build result types.
//!
//! Contains types for representing the outcome of task runs.

use crate::build::Task;
use std::path::PathBuf;
use std::time::Duration;

/// Category of a task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskErrorKind {
    /// Stylesheet compilation or CSS processing failed
    StyleCompile,
    /// Script minification failed
    ScriptMinify,
    /// An image could not be decoded or re-encoded
    Image,
    /// An icon SVG could not be parsed or written
    Sprite,
    /// Filesystem error
    Io,
    /// A required input is missing
    NotFound,
    /// The configuration does not allow the operation
    Config,
}

impl std::fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskErrorKind::StyleCompile => "style compile error",
            TaskErrorKind::ScriptMinify => "script minify error",
            TaskErrorKind::Image => "image error",
            TaskErrorKind::Sprite => "sprite error",
            TaskErrorKind::Io => "IO error",
            TaskErrorKind::NotFound => "not found",
            TaskErrorKind::Config => "config error",
        };
        f.write_str(name)
    }
}

/// Structured error returned by a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// IO error annotated with the path being touched.
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        let kind = if err.kind() == std::io::ErrorKind::NotFound {
            TaskErrorKind::NotFound
        } else {
            TaskErrorKind::Io
        };
        Self::new(kind, format!("{}: {}", path.display(), err))
    }
}

/// Status of a single task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// Task produced fresh outputs
    Success,
    /// Task completed without producing outputs (nothing to do, or stale output kept)
    Skipped,
    /// Task failed with error
    Failed(TaskError),
}

impl BuildStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success | BuildStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, BuildStatus::Failed(_))
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::Success => write!(f, "success"),
            BuildStatus::Skipped => write!(f, "skipped"),
            BuildStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Task that ran
    pub task: Task,
    /// Run status
    pub status: BuildStatus,
    /// Files written
    pub outputs: Vec<PathBuf>,
    /// Run duration
    pub duration: Duration,
    /// Warning messages (if any)
    pub warnings: Vec<String>,
}

impl TaskResult {
    /// Create a successful result.
    pub fn success(task: Task, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { task, status: BuildStatus::Success, outputs, duration, warnings: vec![] }
    }

    /// Create a skipped result.
    pub fn skipped(task: Task, duration: Duration) -> Self {
        Self { task, status: BuildStatus::Skipped, outputs: vec![], duration, warnings: vec![] }
    }

    /// Create a failed result.
    pub fn failed(task: Task, error: TaskError, duration: Duration) -> Self {
        Self { task, status: BuildStatus::Failed(error), outputs: vec![], duration, warnings: vec![] }
    }

    /// Add warnings to the result.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The error, if the task failed.
    pub fn error(&self) -> Option<&TaskError> {
        match &self.status {
            BuildStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Result of a sequence of task runs.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each task, in run order
    pub tasks: Vec<TaskResult>,
    /// Total duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task result.
    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Get the number of successful tasks.
    pub fn success_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, BuildStatus::Success)).count()
    }

    /// Get the number of skipped tasks.
    pub fn skipped_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, BuildStatus::Skipped)).count()
    }

    /// Get the number of failed tasks.
    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the overall run succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Tasks in the order they ran.
    pub fn order(&self) -> Vec<Task> {
        self.tasks.iter().map(|r| r.task).collect()
    }

    /// Get all warnings.
    pub fn all_warnings(&self) -> Vec<&String> {
        self.tasks.iter().flat_map(|r| r.warnings.iter()).collect()
    }

    /// Get failed task results.
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Format a summary of the run.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.tasks.len();

        if failed > 0 {
            lines.push(format!(
                "Build failed: {} succeeded, {} skipped, {} failed ({} total)",
                success, skipped, failed, total
            ));
            for result in self.failures() {
                lines.push(format!("  - {}: {}", result.task, result.status));
            }
        } else {
            lines.push(format!(
                "Build succeeded: {} built, {} skipped ({} total) in {:?}",
                success, skipped, total, self.total_duration
            ));
        }

        let warnings = self.all_warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}): ", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}
