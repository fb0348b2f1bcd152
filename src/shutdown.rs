//! System-wide shutdown broadcast.
//!
//! Shutdown signals every other process on the system in fixed phases,
//! SIGTERM then SIGKILL, sleeping a fixed grace window after each one. It is
//! best effort and bounded in time: a failed broadcast is logged and the next
//! phase runs anyway, and nothing checks whether processes actually exited.

use crate::error::{Error, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Grace window after SIGTERM.
pub const DEFAULT_TERM_GRACE: Duration = Duration::from_secs(10);

/// Grace window after SIGKILL.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(15);

/// Sends a signal to every process except the caller.
pub trait SignalBroadcaster: Send + Sync {
    fn broadcast(&self, signal: Signal) -> Result<()>;
}

/// Broadcasts with `kill(-1, sig)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KillAllBroadcaster;

impl SignalBroadcaster for KillAllBroadcaster {
    fn broadcast(&self, signal: Signal) -> Result<()> {
        // PID -1 reaches everything we may signal except ourselves.
        kill(Pid::from_raw(-1), signal).map_err(|source| Error::SignalSendFailed { signal, source })
    }
}

/// One escalation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownPhase {
    pub signal: Signal,
    pub grace: Duration,
}

/// Grace windows, as read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Seconds to wait after SIGTERM
    pub term_grace_secs: u64,
    /// Seconds to wait after SIGKILL
    pub kill_grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            term_grace_secs: DEFAULT_TERM_GRACE.as_secs(),
            kill_grace_secs: DEFAULT_KILL_GRACE.as_secs(),
        }
    }
}

/// Outcome of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseReport {
    pub signal: Signal,
    /// Whether the broadcast call succeeded
    pub delivered: bool,
}

/// Outcome of a shutdown sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub phases: Vec<PhaseReport>,
}

impl ShutdownReport {
    /// True when every broadcast went out.
    pub fn all_delivered(&self) -> bool {
        self.phases.iter().all(|p| p.delivered)
    }
}

/// The ordered escalation phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownSequence {
    phases: Vec<ShutdownPhase>,
}

impl Default for ShutdownSequence {
    fn default() -> Self {
        Self::from_config(&ShutdownConfig::default())
    }
}

impl ShutdownSequence {
    pub fn from_config(config: &ShutdownConfig) -> Self {
        Self {
            phases: vec![
                ShutdownPhase {
                    signal: Signal::SIGTERM,
                    grace: Duration::from_secs(config.term_grace_secs),
                },
                ShutdownPhase {
                    signal: Signal::SIGKILL,
                    grace: Duration::from_secs(config.kill_grace_secs),
                },
            ],
        }
    }

    pub fn phases(&self) -> &[ShutdownPhase] {
        &self.phases
    }

    /// Upper bound on how long [`run`](Self::run) sleeps.
    pub fn total_grace(&self) -> Duration {
        self.phases.iter().map(|p| p.grace).sum()
    }

    /// Run every phase. Never stops early and never fails.
    pub async fn run(&self, broadcaster: &dyn SignalBroadcaster) -> ShutdownReport {
        info!("Initiating system shutdown sequence");

        let mut report = ShutdownReport::default();
        for phase in &self.phases {
            info!(signal = %phase.signal, "Sending {} to all processes", phase.signal);
            let delivered = match broadcaster.broadcast(phase.signal) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Broadcast failed, continuing shutdown");
                    false
                }
            };
            report.phases.push(PhaseReport {
                signal: phase.signal,
                delivered,
            });

            info!(
                seconds = phase.grace.as_secs(),
                "Waiting {} seconds for processes to exit",
                phase.grace.as_secs()
            );
            tokio::time::sleep(phase.grace).await;
        }

        info!("Shutdown sequence complete");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records each broadcast and when it happened.
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(Signal, Instant)>>,
        fail_on: Option<Signal>,
    }

    impl SignalBroadcaster for Recorder {
        fn broadcast(&self, signal: Signal) -> Result<()> {
            self.sent.lock().unwrap().push((signal, Instant::now()));
            if self.fail_on == Some(signal) {
                return Err(Error::SignalSendFailed {
                    signal,
                    source: nix::Error::EPERM,
                });
            }
            Ok(())
        }
    }

    /// Paused clock: elapsed is `secs`, give or take a timer tick.
    fn within(elapsed: Duration, secs: u64) -> bool {
        elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs) + Duration::from_millis(100)
    }

    #[test]
    fn test_default_phases() {
        let seq = ShutdownSequence::default();
        assert_eq!(
            seq.phases(),
            [
                ShutdownPhase {
                    signal: Signal::SIGTERM,
                    grace: Duration::from_secs(10)
                },
                ShutdownPhase {
                    signal: Signal::SIGKILL,
                    grace: Duration::from_secs(15)
                },
            ]
        );
        assert_eq!(seq.total_grace(), Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_are_timed() {
        let recorder = Recorder::default();
        let start = Instant::now();

        let report = ShutdownSequence::default().run(&recorder).await;

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, Signal::SIGTERM);
        assert_eq!(sent[0].1 - start, Duration::ZERO);
        assert_eq!(sent[1].0, Signal::SIGKILL);
        assert!(within(sent[1].1 - start, 10));
        assert!(within(start.elapsed(), 25));
        assert!(report.all_delivered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_broadcast_continues() {
        let recorder = Recorder {
            fail_on: Some(Signal::SIGTERM),
            ..Default::default()
        };
        let start = Instant::now();

        let report = ShutdownSequence::default().run(&recorder).await;

        assert_eq!(recorder.sent.lock().unwrap().len(), 2);
        assert!(within(start.elapsed(), 25));
        assert_eq!(
            report.phases,
            [
                PhaseReport {
                    signal: Signal::SIGTERM,
                    delivered: false
                },
                PhaseReport {
                    signal: Signal::SIGKILL,
                    delivered: true
                },
            ]
        );
        assert!(!report.all_delivered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_grace() {
        let config = ShutdownConfig {
            term_grace_secs: 1,
            kill_grace_secs: 2,
        };
        let recorder = Recorder::default();
        let start = Instant::now();

        ShutdownSequence::from_config(&config).run(&recorder).await;

        assert!(within(start.elapsed(), 3));
    }
}
