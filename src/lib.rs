//! Buckos rc - runlevel service runner.
//!
//! rc brings the system into a runlevel by running the matching scripts from
//! a services directory, one at a time, and broadcasting a shutdown to every
//! process when the runlevel is halt or reboot. Each invocation is a single
//! stateless pass:
//!
//! - Scripts are named `(<digit><letters>)+-<name>`, for example `3a-network`
//!   or `3a1b-network` for a script used by runlevels 3 and 1
//! - Scripts for the requested runlevel are sorted by their letters and run
//!   through `/bin/sh` with `RUNLEVEL` set
//! - SIGTERM/SIGINT stop further launches, let the running script finish, and
//!   trigger the shutdown broadcast
//! - Shutdown sends SIGTERM, waits 10 seconds, sends SIGKILL, waits 15 seconds
//!
//! # Architecture
//!
//! - **ServiceEntry**: parses the naming convention
//! - **ServiceCatalog**: discovers and orders the scripts for a runlevel
//! - **ServiceRunner**: launches a script and reaps it
//! - **ShutdownSequence**: the two-phase kill-all broadcast
//! - **Init**: drives one pass over the catalog
//!
//! # Example
//!
//! ```no_run
//! use buckos_rc::{Init, RcConfig, Runlevel};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let init = Init::new(RcConfig::default(), Runlevel::from_env()?);
//!     init.cancel_flag().listen_for_signals()?;
//!     init.run().await?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod init;
pub mod logging;
pub mod process;
pub mod runlevel;
pub mod service;
pub mod shutdown;

// Re-export main types
pub use catalog::{InvalidEntry, ServiceCatalog};
pub use config::RcConfig;
pub use error::{Error, ParseError, Result};
pub use init::{CancelFlag, Init, RunReport, ServiceOutcome};
pub use process::{ExitStatus, ServiceRunner, ShellRunner};
pub use runlevel::Runlevel;
pub use service::{ParseOutcome, ServiceEntry};
pub use shutdown::{
    KillAllBroadcaster, ShutdownConfig, ShutdownPhase, ShutdownReport, ShutdownSequence,
    SignalBroadcaster,
};
