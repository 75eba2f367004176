//! Core logging types: environment entries, status, and the [`Log`] trait.

/// Per-environment result for summary reporting.
#[derive(Debug, Clone)]
pub struct EnvironmentEntry {
    /// Environment name.
    pub name: String,
    /// Final status of the environment.
    pub status: EnvironmentStatus,
    /// Optional detail message (e.g. error counts).
    pub message: Option<String>,
}

/// Status of a completed environment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentStatus {
    /// Every config converged.
    Ok,
    /// The run previewed changes without issuing requests.
    DryRun,
    /// Nothing applied to this environment (e.g. filtered out kinds only).
    Skipped,
    /// At least one config failed.
    Failed,
}

/// Abstraction over logging backends.
///
/// Both [`Logger`](super::logger::Logger) (direct output) and
/// [`BufferedLog`](super::buffered::BufferedLog) (deferred output for
/// parallel environment runs) implement this trait, so engine code logs
/// without knowing whether output is immediate or buffered.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record an environment result for the summary.
    fn record_environment(&self, name: &str, status: EnvironmentStatus, message: Option<&str>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_status_equality() {
        assert_eq!(EnvironmentStatus::Ok, EnvironmentStatus::Ok);
        assert_ne!(EnvironmentStatus::Ok, EnvironmentStatus::Failed);
        assert_ne!(EnvironmentStatus::DryRun, EnvironmentStatus::Skipped);
    }

    #[test]
    fn environment_entry_clone() {
        let entry = EnvironmentEntry {
            name: "prod".to_string(),
            status: EnvironmentStatus::Failed,
            message: Some("2 errors".to_string()),
        };
        let cloned = entry.clone();
        assert_eq!(cloned.name, entry.name);
        assert_eq!(cloned.status, entry.status);
        assert_eq!(cloned.message, entry.message);
    }
}
