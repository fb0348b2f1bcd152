//! Error types for the rc service runner.

use nix::sys::signal::Signal;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a runlevel.
///
/// Only [`Error::Config`] and [`Error::Discovery`] abort a run. Everything
/// else is logged and the runner moves on to the next unit of work.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration (runlevel, config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Services directory could not be opened or listed
    #[error("Failed to read services directory {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory entry does not follow the service naming convention
    #[error("Invalid service filename {filename:?}: {reason}")]
    InvalidServiceName { filename: String, reason: ParseError },

    /// The service process could not be spawned
    #[error("Failed to launch service {service}: {source}")]
    LaunchFailed {
        service: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a spawned process failed
    #[error("Failed to wait for process {pid}: {reason}")]
    ReapFailed { pid: u32, reason: String },

    /// A shutdown broadcast could not be delivered
    #[error("Failed to send {signal} to all processes: {source}")]
    SignalSendFailed {
        signal: Signal,
        #[source]
        source: nix::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Reasons a service filename fails to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Name is not valid UTF-8
    #[error("filename is not valid UTF-8")]
    NotUtf8,

    /// Name starts with the separator instead of a runlevel group
    #[error("no runlevel groups before '-'")]
    NoRunlevels,

    /// A runlevel digit was expected
    #[error("expected runlevel digit at position {position}, found {found:?}")]
    ExpectedDigit { position: usize, found: char },

    /// A runlevel digit had no ordering letters after it
    #[error("runlevel {runlevel} at position {position} has no ordering letters")]
    MissingOrdering { position: usize, runlevel: u8 },

    /// No '-' separator after the runlevel groups
    #[error("missing '-' separator")]
    MissingSeparator,

    /// Nothing after the separator
    #[error("missing service name after '-'")]
    EmptyName,
}
