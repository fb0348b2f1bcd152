//! Runlevel orchestration.
//!
//! One pass: discover the catalog, run every service to completion in order,
//! then broadcast a shutdown when the runlevel is terminal or a SIGTERM/SIGINT
//! asked us to stop.

use crate::catalog::ServiceCatalog;
use crate::config::RcConfig;
use crate::error::Result;
use crate::process::{ExitStatus, ServiceRunner, ShellRunner};
use crate::runlevel::Runlevel;
use crate::service::ServiceEntry;
use crate::shutdown::{KillAllBroadcaster, ShutdownReport, ShutdownSequence, SignalBroadcaster};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// Set when a stop was requested. Checked only between service launches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancel on SIGTERM or SIGINT.
    ///
    /// Handlers are registered before returning; the flag is set from a task,
    /// not from signal context.
    pub fn listen_for_signals(&self) -> Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let flag = self.clone();

        tokio::spawn(async move {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            flag.cancel();
            info!(signal = name, "Received {}, initiating graceful shutdown", name);
        });

        Ok(())
    }
}

/// What happened to one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// Ran and was reaped
    Completed(ExitStatus),
    /// Could not be started
    LaunchFailed(String),
    /// Started but waiting on it failed
    ReapFailed { pid: u32, reason: String },
}

/// Summary of one runlevel pass.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub runlevel: Runlevel,
    /// Services that were attempted, in order
    pub services: Vec<(ServiceEntry, ServiceOutcome)>,
    /// Services never launched because of cancellation
    pub skipped: usize,
    pub cancelled: bool,
    /// Set when the shutdown sequence ran
    pub shutdown: Option<ShutdownReport>,
}

impl RunReport {
    /// Count of services that ran and exited with status 0.
    pub fn succeeded(&self) -> usize {
        self.services
            .iter()
            .filter(|(_, o)| matches!(o, ServiceOutcome::Completed(s) if s.success()))
            .count()
    }
}

/// Runs one runlevel.
pub struct Init {
    config: RcConfig,
    runlevel: Runlevel,
    runner: Box<dyn ServiceRunner>,
    broadcaster: Box<dyn SignalBroadcaster>,
    shutdown: ShutdownSequence,
    cancel: CancelFlag,
}

impl Init {
    /// Create a runner that executes scripts with the configured shell and
    /// broadcasts shutdown to every process on the system.
    pub fn new(config: RcConfig, runlevel: Runlevel) -> Self {
        let runner = ShellRunner::with_shell(config.shell.clone(), runlevel);
        let shutdown = ShutdownSequence::from_config(&config.shutdown);
        Self {
            config,
            runlevel,
            runner: Box::new(runner),
            broadcaster: Box::new(KillAllBroadcaster),
            shutdown,
            cancel: CancelFlag::new(),
        }
    }

    /// Replace the service runner.
    pub fn with_runner(mut self, runner: impl ServiceRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// Replace the shutdown broadcaster.
    pub fn with_broadcaster(mut self, broadcaster: impl SignalBroadcaster + 'static) -> Self {
        self.broadcaster = Box::new(broadcaster);
        self
    }

    /// Share an existing cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn runlevel(&self) -> Runlevel {
        self.runlevel
    }

    /// Discover the catalog for this runlevel.
    pub fn discover(&self) -> Result<ServiceCatalog> {
        ServiceCatalog::discover(&self.config.services_dir, self.runlevel)
    }

    /// Run the runlevel. Fails only if discovery fails.
    pub async fn run(&self) -> Result<RunReport> {
        info!(runlevel = %self.runlevel, "Initializing for runlevel {}", self.runlevel);

        let catalog = self.discover().map_err(|e| {
            error!(error = %e, "Service discovery failed");
            e
        })?;

        let mut report = RunReport {
            runlevel: self.runlevel,
            services: Vec::with_capacity(catalog.len()),
            skipped: 0,
            cancelled: false,
            shutdown: None,
        };

        for (i, service) in catalog.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Shutdown requested, stopping service execution");
                report.skipped = catalog.len() - i;
                break;
            }

            let outcome = self.run_service(service).await;
            report.services.push((service.clone(), outcome));
        }

        info!(runlevel = %self.runlevel, "Runlevel {} initialization complete", self.runlevel);

        report.cancelled = self.cancel.is_cancelled();
        let terminal = self.config.is_terminal(self.runlevel);

        if terminal || report.cancelled {
            if terminal {
                info!(runlevel = %self.runlevel, "Terminal runlevel, initiating shutdown sequence");
            } else {
                info!("Performing graceful shutdown due to signal");
            }
            report.shutdown = Some(self.shutdown.run(self.broadcaster.as_ref()).await);
        }

        Ok(report)
    }

    /// Launch one service and wait for it.
    async fn run_service(&self, service: &ServiceEntry) -> ServiceOutcome {
        info!(service = %service.name, "Starting service: {}", service.name);

        let pid = match self.runner.launch(service).await {
            Ok(pid) => pid,
            Err(e) => {
                error!(service = %service.name, error = %e, "Failed to execute service");
                return ServiceOutcome::LaunchFailed(e.to_string());
            }
        };

        match self.runner.reap(pid).await {
            Ok(status) => {
                if status.success() {
                    info!(
                        service = %service.name,
                        pid = pid,
                        status = status.code,
                        "Service completed successfully: {}",
                        service.name
                    );
                } else {
                    error!(
                        service = %service.name,
                        pid = pid,
                        status = status.code,
                        "Service completed with error: {}",
                        service.name
                    );
                }
                ServiceOutcome::Completed(status)
            }
            Err(e) => {
                warn!(service = %service.name, pid = pid, error = %e, "Failed to wait for service");
                ServiceOutcome::ReapFailed {
                    pid,
                    reason: e.to_string(),
                }
            }
        }
    }
}
