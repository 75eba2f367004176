//! Tracing subscriber setup: console formatter, file layer, and initialisation.
use std::fs;
use std::io::Write as _;
use std::sync::Mutex;

use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;

use super::utils::{
    file_logging_enabled, format_utc_datetime, format_utc_time, log_file_path, strip_ansi,
};

/// Target suffix used by the logger for stage headers.
const STAGE_TARGET: &str = "moncfg::stage";
/// Target suffix used by the logger for dry-run actions.
const DRY_RUN_TARGET: &str = "moncfg::dry_run";

/// Extracts the `message` field from a [`tracing::Event`].
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// A layer that appends all engine events to the persistent log file with
/// timestamps and ANSI codes stripped.
///
/// Created by [`init_subscriber`] when file logging is enabled. Always
/// captures events at `DEBUG` and above regardless of console verbosity.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Open (or create) the log file for `command`, write a run header, and
    /// return a new `FileLayer` ready to receive events.
    ///
    /// Returns `None` if the cache directory cannot be created or the file
    /// cannot be opened.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let version = option_env!("MONCFG_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let header = format!(
            "==========================================\n\
             moncfg {version} {}\n\
             ==========================================\n",
            format_utc_datetime(),
        );
        fs::write(&path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(&path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let target = event.metadata().target();
        if !target.starts_with("moncfg") {
            return;
        }
        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);

        let level = *event.metadata().level();
        let tag = if target == STAGE_TARGET {
            "==>"
        } else if target == DRY_RUN_TARGET {
            "[dry run]"
        } else if level == tracing::Level::ERROR {
            "[error]"
        } else if level == tracing::Level::WARN {
            "[warn]"
        } else if level == tracing::Level::INFO {
            "[info]"
        } else {
            "[debug]"
        };

        if let Ok(mut file) = self.file.lock() {
            let line = format!(
                "{} {tag} {}\n",
                format_utc_time(),
                strip_ansi(&extractor.message)
            );
            let _ = file.write_all(line.as_bytes());
        }
    }
}

/// Console layer: styled stage headers, plain info, colored warnings and
/// errors, debug only in verbose mode.
#[derive(Debug)]
struct ConsoleLayer {
    verbose: bool,
}

impl<S: tracing::Subscriber> Layer<S> for ConsoleLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let target = event.metadata().target();
        if !target.starts_with("moncfg") {
            return;
        }
        let level = *event.metadata().level();
        if level == tracing::Level::DEBUG && !self.verbose {
            return;
        }
        if level == tracing::Level::TRACE {
            return;
        }

        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        let message = extractor.message;

        if target == STAGE_TARGET {
            println!("\x1b[1;34m==>\x1b[0m \x1b[1m{message}\x1b[0m");
        } else if target == DRY_RUN_TARGET {
            println!("\x1b[37m~ {message}\x1b[0m");
        } else if level == tracing::Level::ERROR {
            eprintln!("\x1b[31m{message}\x1b[0m");
        } else if level == tracing::Level::WARN {
            eprintln!("\x1b[33m{message}\x1b[0m");
        } else if level == tracing::Level::DEBUG {
            println!("\x1b[2m{message}\x1b[0m");
        } else {
            println!("{message}");
        }
    }
}

/// Install the global tracing subscriber.
///
/// The console layer is always present; the file layer joins when
/// `MONCFG_FEAT_LOG_FILE` is set. Safe to call more than once — later
/// calls keep the first subscriber.
pub fn init_subscriber(verbose: bool, command: &str) {
    let console = ConsoleLayer { verbose }.boxed();
    let mut layers: Vec<
        Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync + 'static>,
    > = vec![console];

    if file_logging_enabled()
        && let Some(file_layer) = FileLayer::new(command)
    {
        layers.push(file_layer.with_filter(LevelFilter::DEBUG).boxed());
    }

    let subscriber = tracing_subscriber::registry().with(layers);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn file_logging_disabled_by_default() {
        // The variable is not set in the test environment.
        if std::env::var(super::super::utils::LOG_FILE_VAR).is_err() {
            assert!(!file_logging_enabled());
        }
    }
}
