//! Log sink setup.
//!
//! rc writes one timestamped line per event to its log file. When the file
//! can't be opened the same lines go to stderr instead.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::format::{DefaultFields, Format, Full, Writer};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

/// Local time as `[YYYY-MM-DD HH:MM:SS]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "[{}]", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Where log lines ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    File,
    Stderr,
}

/// Open `path` for appending.
pub fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber, logging to `log_file` or stderr.
///
/// `RUST_LOG` selects the level, `info` by default.
pub fn init(log_file: &Path) -> LogTarget {
    match open_log_file(log_file) {
        Ok(file) => {
            // File writes are unbuffered, so every event lands as its own line.
            subscriber().with_writer(Mutex::new(file)).init();
            LogTarget::File
        }
        Err(e) => {
            eprintln!(
                "{} ERROR Failed to open log file {}, falling back to stderr: {}",
                Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                log_file.display(),
                e
            );
            init_stderr();
            LogTarget::Stderr
        }
    }
}

/// Install the global subscriber on stderr.
pub fn init_stderr() {
    subscriber().with_writer(std::io::stderr).init();
}

fn subscriber() -> SubscriberBuilder<DefaultFields, Format<Full, LocalTimestamp>, EnvFilter> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTimestamp)
        .with_target(false)
        .with_ansi(false)
}
