//! Structured logger with dry-run awareness and summary collection.
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use super::types::{EnvironmentEntry, EnvironmentStatus, Log};
use super::utils::{file_logging_enabled, log_file_path, terminal_columns};

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
///
/// The `record_environment` method is **not** included because its signature
/// differs from the `fn(&self, &str)` pattern shared by the display methods.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and summary collection.
///
/// All messages go through tracing, so the console layer and (when enabled)
/// the persistent log file under `$XDG_CACHE_HOME/moncfg/<command>.log` see
/// the same stream.
#[derive(Debug)]
pub struct Logger {
    environments: Mutex<Vec<EnvironmentEntry>>,
    log_file: Option<PathBuf>,
    /// Serializes console output from parallel environment flushes.
    pub(super) flush_lock: Mutex<()>,
    /// Names of environments currently deploying in parallel.
    pub(super) active_environments: Mutex<Vec<String>>,
    /// Whether a progress line is currently displayed (`0` = no, `1` = yes).
    ///
    /// The progress line is always truncated to a single terminal row, so
    /// clearing it never needs cursor-up movement.
    pub(super) progress_rows: Mutex<u16>,
}

impl Logger {
    /// Create a new logger for `command`.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            environments: Mutex::new(Vec::new()),
            log_file: if file_logging_enabled() {
                log_file_path(command)
            } else {
                None
            },
            flush_lock: Mutex::new(()),
            active_environments: Mutex::new(Vec::new()),
            progress_rows: Mutex::new(0),
        }
    }

    /// Return a clone of all recorded environment entries (test-only).
    #[cfg(test)]
    pub(crate) fn environment_entries(&self) -> Vec<EnvironmentEntry> {
        self.environments
            .lock()
            .map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: "moncfg::stage", "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: "moncfg::dry_run", "{msg}");
    }

    /// Record an environment result for the summary.
    pub fn record_environment(
        &self,
        name: &str,
        status: EnvironmentStatus,
        message: Option<&str>,
    ) {
        if let Ok(mut guard) = self.environments.lock() {
            guard.push(EnvironmentEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// `true` if any recorded environment failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Count the number of failed environments.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.environments.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|e| e.status == EnvironmentStatus::Failed)
                .count()
        })
    }

    /// Print the summary of all recorded environments.
    pub fn print_summary(&self) {
        let environments = match self.environments.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        if environments.is_empty() {
            return;
        }

        println!();
        self.stage("Summary");

        let mut ok = 0u32;
        let mut skipped = 0u32;
        let mut dry_run = 0u32;
        let mut failed = 0u32;

        for entry in &environments {
            let (icon, color) = match entry.status {
                EnvironmentStatus::Ok => {
                    ok += 1;
                    ("✓", "\x1b[32m")
                }
                EnvironmentStatus::Skipped => {
                    skipped += 1;
                    ("○", "\x1b[33m")
                }
                EnvironmentStatus::DryRun => {
                    dry_run += 1;
                    ("~", "\x1b[37m")
                }
                EnvironmentStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };

            let suffix = entry
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", entry.name));
        }

        println!();
        let total = ok + skipped + dry_run + failed;
        self.info(&format!(
            "{total} environments: \x1b[32m{ok} ok\x1b[0m, \x1b[33m{skipped} skipped\x1b[0m, \x1b[37m{dry_run} dry-run\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }

    /// Erase the in-progress status line from the console.
    ///
    /// No-op if no progress line is currently shown.
    /// Must be called while holding `flush_lock`.
    pub(super) fn clear_progress(&self) {
        let mut guard = self
            .progress_rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *guard > 0 {
            print!("\r\x1b[K");
            std::io::stdout().flush().ok();
            *guard = 0;
        }
    }

    /// Print an in-progress status line to the console and mark it as shown.
    ///
    /// The environment-name list is truncated to a single terminal row.
    /// Must be called while holding `flush_lock`.
    pub(super) fn draw_progress(&self, names: &str) {
        let cols = terminal_columns();
        let prefix_width = 4;
        let max_name_chars = cols.saturating_sub(prefix_width);
        let display_names = if names.chars().count() > max_name_chars {
            let truncated: String = names
                .chars()
                .take(max_name_chars.saturating_sub(1))
                .collect();
            format!("{truncated}…")
        } else {
            names.to_string()
        };
        print!("  \x1b[2m▹ {display_names}\x1b[0m");
        std::io::stdout().flush().ok();
        let mut guard = self
            .progress_rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = 1;
    }

    /// Record that a parallel environment deployment has started.
    ///
    /// Acquires the flush lock, erases any previous progress line, adds the
    /// environment to the active set, and redraws the status line.
    pub fn notify_environment_start(&self, name: &str) {
        let _guard = self
            .flush_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.clear_progress();
        let names = self.active_environments.lock().map_or_else(
            |_| name.to_string(),
            |mut active| {
                active.push(name.to_string());
                active.join(", ")
            },
        );
        self.draw_progress(&names);
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_environment(
        &self,
        name: &str,
        status: EnvironmentStatus,
        message: Option<&str>,
    ) {
        self.record_environment(name, status, message);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn logger_starts_with_no_entries() {
        let log = Logger::new("test");
        assert!(log.environment_entries().is_empty());
        assert!(!log.has_failures());
    }

    #[test]
    fn record_environment_ok() {
        let log = Logger::new("test");
        log.record_environment("dev", EnvironmentStatus::Ok, None);
        let entries = log.environment_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "dev");
        assert_eq!(entries[0].status, EnvironmentStatus::Ok);
    }

    #[test]
    fn record_environment_with_message() {
        let log = Logger::new("test");
        log.record_environment("prod", EnvironmentStatus::Failed, Some("2 errors"));
        assert_eq!(
            log.environment_entries()[0].message,
            Some("2 errors".to_string())
        );
    }

    #[test]
    fn failure_count_counts_only_failed() {
        let log = Logger::new("test");
        log.record_environment("a", EnvironmentStatus::Ok, None);
        log.record_environment("b", EnvironmentStatus::Failed, None);
        log.record_environment("c", EnvironmentStatus::Failed, None);
        log.record_environment("d", EnvironmentStatus::DryRun, None);
        assert_eq!(log.failure_count(), 2);
        assert!(log.has_failures());
    }

    #[test]
    fn log_trait_delegates_to_logger() {
        let log = Logger::new("test");
        let log_ref: &dyn Log = &log;
        log_ref.record_environment("via-trait", EnvironmentStatus::Ok, None);
        assert_eq!(log.environment_entries().len(), 1);
    }

    #[test]
    fn notify_environment_start_tracks_active_set() {
        let log = Logger::new("test");
        log.notify_environment_start("dev");
        let active = log
            .active_environments
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        assert!(active.contains(&"dev".to_string()));
    }

    #[test]
    fn draw_progress_caps_rows_to_one() {
        let log = Logger::new("test");
        let long_names = "e".repeat(500);
        log.draw_progress(&long_names);
        let rows = *log
            .progress_rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(rows, 1);
    }
}
