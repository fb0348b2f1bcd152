//! Running service scripts.
//!
//! Launching and reaping are separate steps: [`ServiceRunner::launch`] hands
//! back the PID as soon as the child exists and [`ServiceRunner::reap`] blocks
//! until that one process is gone.

use crate::error::{Error, Result};
use crate::runlevel::{Runlevel, RUNLEVEL_ENV};
use crate::service::ServiceEntry;
use async_trait::async_trait;
use nix::errno::Errno;
use nix::libc;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use std::ffi::{CString, OsStr};
use std::os::raw::c_char;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::PathBuf;
use tracing::debug;

/// Default interpreter for service scripts.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Exit code reported when the termination state can't be classified.
pub const UNKNOWN_EXIT: i32 = -1;

/// Exit code of a child whose interpreter could not be found.
pub const NOT_FOUND_EXIT: i32 = 127;

/// Exit code of a child whose interpreter exists but could not be executed.
pub const NOT_EXECUTABLE_EXIT: i32 = 126;

/// Exit status of a reaped service process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Process ID
    pub pid: u32,
    /// Exit code, `128 + signal` if killed, or [`UNKNOWN_EXIT`]
    pub code: i32,
}

impl ExitStatus {
    /// Classify a wait status.
    pub fn from_wait_status(pid: u32, status: WaitStatus) -> Self {
        let code = match status {
            WaitStatus::Exited(_, code) => code,
            WaitStatus::Signaled(_, sig, _) => 128 + sig as i32,
            _ => UNKNOWN_EXIT,
        };
        Self { pid, code }
    }

    /// Check if the process exited successfully.
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Starts service processes and waits for them.
#[async_trait]
pub trait ServiceRunner: Send + Sync {
    /// Spawn the service and return its PID without waiting.
    async fn launch(&self, service: &ServiceEntry) -> Result<u32>;

    /// Wait for `pid` to terminate.
    async fn reap(&self, pid: u32) -> Result<ExitStatus>;
}

/// Runs each script through a shell with `RUNLEVEL` set.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
    runlevel: Runlevel,
}

impl ShellRunner {
    /// Create a runner using `/bin/sh`.
    pub fn new(runlevel: Runlevel) -> Self {
        Self::with_shell(DEFAULT_SHELL, runlevel)
    }

    /// Create a runner using a specific interpreter.
    pub fn with_shell(shell: impl Into<PathBuf>, runlevel: Runlevel) -> Self {
        Self {
            shell: shell.into(),
            runlevel,
        }
    }

    /// Child environment: ours, with `RUNLEVEL` replaced.
    fn environment(&self) -> std::io::Result<Vec<CString>> {
        let mut env = Vec::new();
        for (key, value) in std::env::vars_os() {
            if key == RUNLEVEL_ENV {
                continue;
            }
            let mut pair = key.into_vec();
            pair.push(b'=');
            pair.extend(value.into_vec());
            env.push(CString::new(pair)?);
        }
        env.push(CString::new(format!("{}={}", RUNLEVEL_ENV, self.runlevel))?);
        Ok(env)
    }

    /// Fork and exec `<shell> <script>`, returning the child's PID.
    ///
    /// Exec failures happen in the child and become its exit status, so the
    /// only errors seen here are from building arguments or from fork itself.
    fn spawn(&self, service: &ServiceEntry) -> std::io::Result<u32> {
        let shell = c_string(self.shell.as_os_str())?;
        let argv = [shell.clone(), c_string(service.path.as_os_str())?];
        let envp = self.environment()?;

        // Pointer tables are built before fork; the child must not allocate.
        let argv_ptrs = null_terminated(&argv);
        let envp_ptrs = null_terminated(&envp);

        // SAFETY: the child only calls execve and _exit, both async-signal-safe.
        match unsafe { fork() }? {
            ForkResult::Parent { child } => Ok(child.as_raw() as u32),
            ForkResult::Child => unsafe {
                libc::execve(shell.as_ptr(), argv_ptrs.as_ptr(), envp_ptrs.as_ptr());
                let code = match std::io::Error::last_os_error().raw_os_error() {
                    Some(libc::EACCES) | Some(libc::ENOEXEC) => NOT_EXECUTABLE_EXIT,
                    _ => NOT_FOUND_EXIT,
                };
                libc::_exit(code)
            },
        }
    }
}

fn c_string(value: &OsStr) -> std::io::Result<CString> {
    Ok(CString::new(value.as_bytes())?)
}

fn null_terminated(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

#[async_trait]
impl ServiceRunner for ShellRunner {
    async fn launch(&self, service: &ServiceEntry) -> Result<u32> {
        // A missing script is reported by the shell and a missing shell by the
        // child's exit status. Only bad arguments or a failed fork land here.
        let pid = self.spawn(service).map_err(|source| Error::LaunchFailed {
            service: service.name.clone(),
            source,
        })?;

        debug!(service = %service.name, pid = pid, shell = ?self.shell, "Spawned process");
        Ok(pid)
    }

    async fn reap(&self, pid: u32) -> Result<ExitStatus> {
        tokio::task::spawn_blocking(move || wait_for(pid))
            .await
            .map_err(|e| Error::ReapFailed {
                pid,
                reason: e.to_string(),
            })?
    }
}

/// Block until `pid` terminates.
fn wait_for(pid: u32) -> Result<ExitStatus> {
    let target = Pid::from_raw(pid as i32);
    loop {
        match waitpid(target, None) {
            Ok(status) => return Ok(ExitStatus::from_wait_status(pid, status)),
            Err(Errno::EINTR) => continue,
            Err(e) => {
                return Err(Error::ReapFailed {
                    pid,
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ParseOutcome;
    use nix::sys::signal::Signal;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn level(n: u8) -> Runlevel {
        Runlevel::new(n).unwrap()
    }

    fn script(dir: &Path, filename: &str, body: &str) -> ServiceEntry {
        let mut file = std::fs::File::create(dir.join(filename)).unwrap();
        writeln!(file, "{}", body).unwrap();
        match ServiceEntry::parse(filename, level(3), dir) {
            ParseOutcome::Matched(entry) => entry,
            other => panic!("{} did not match: {:?}", filename, other),
        }
    }

    async fn run(runner: &ShellRunner, service: &ServiceEntry) -> ExitStatus {
        let pid = runner.launch(service).await.unwrap();
        let status = runner.reap(pid).await.unwrap();
        assert_eq!(status.pid, pid);
        status
    }

    #[test]
    fn test_classify_exit() {
        let pid = Pid::from_raw(42);
        assert_eq!(
            ExitStatus::from_wait_status(42, WaitStatus::Exited(pid, 0)),
            ExitStatus { pid: 42, code: 0 }
        );
        assert_eq!(
            ExitStatus::from_wait_status(42, WaitStatus::Exited(pid, 255)).code,
            255
        );
    }

    #[test]
    fn test_classify_signal() {
        let pid = Pid::from_raw(42);
        let status = ExitStatus::from_wait_status(42, WaitStatus::Signaled(pid, Signal::SIGKILL, false));
        assert_eq!(status.code, 137);
        assert!(!status.success());

        let status = ExitStatus::from_wait_status(42, WaitStatus::Signaled(pid, Signal::SIGTERM, true));
        assert_eq!(status.code, 143);
    }

    #[test]
    fn test_classify_unknown() {
        let pid = Pid::from_raw(42);
        let status = ExitStatus::from_wait_status(42, WaitStatus::StillAlive);
        assert_eq!(status.code, UNKNOWN_EXIT);
        let status = ExitStatus::from_wait_status(42, WaitStatus::Stopped(pid, Signal::SIGSTOP));
        assert_eq!(status.code, UNKNOWN_EXIT);
    }

    #[tokio::test]
    async fn test_exit_code_reported() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::new(level(3));

        let ok = script(dir.path(), "3a-ok", "exit 0");
        assert!(run(&runner, &ok).await.success());

        let failing = script(dir.path(), "3b-fail", "exit 42");
        assert_eq!(run(&runner, &failing).await.code, 42);
    }

    #[tokio::test]
    async fn test_signal_exit_reported() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::new(level(3));

        let killed = script(dir.path(), "3a-killed", "kill -9 $$");
        assert_eq!(run(&runner, &killed).await.code, 128 + 9);
    }

    #[tokio::test]
    async fn test_runlevel_visible_to_child() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::new(level(3));

        let service = script(dir.path(), "3a-level", "exit $RUNLEVEL");
        assert_eq!(run(&runner, &service).await.code, 3);
    }

    #[tokio::test]
    async fn test_missing_script_is_child_failure() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::new(level(3));

        let gone = script(dir.path(), "3a-gone", "exit 0");
        std::fs::remove_file(&gone.path).unwrap();

        // The shell reports the missing file; the code varies by shell
        // (127 for bash, 2 for dash).
        let status = run(&runner, &gone).await;
        assert_ne!(status.code, 0);
        assert_ne!(status.code, UNKNOWN_EXIT);
    }

    #[tokio::test]
    async fn test_missing_shell_exits_not_found() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::with_shell(dir.path().join("no-such-shell"), level(3));
        let service = script(dir.path(), "3a-svc", "exit 0");

        let status = run(&runner, &service).await;
        assert_eq!(status.code, NOT_FOUND_EXIT);
    }

    #[tokio::test]
    async fn test_non_executable_shell_exits_not_executable() {
        let dir = TempDir::new().unwrap();
        let shell = dir.path().join("plain-file");
        std::fs::write(&shell, "not a program").unwrap();
        let runner = ShellRunner::with_shell(&shell, level(3));
        let service = script(dir.path(), "3a-svc", "exit 0");

        let status = run(&runner, &service).await;
        assert_eq!(status.code, NOT_EXECUTABLE_EXIT);
    }

    #[tokio::test]
    async fn test_nul_in_path_is_launch_failure() {
        let runner = ShellRunner::new(level(3));
        let mut service = match ServiceEntry::parse("3a-svc", level(3), Path::new("/tmp")) {
            ParseOutcome::Matched(entry) => entry,
            other => panic!("did not match: {:?}", other),
        };
        service.path = PathBuf::from("/tmp/bad\0name");

        let err = runner.launch(&service).await.unwrap_err();
        match err {
            Error::LaunchFailed { service, .. } => assert_eq!(service, "svc"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_reap_unknown_pid_fails() {
        let runner = ShellRunner::new(level(3));
        // Not our child, so waitpid reports ECHILD.
        let err = runner.reap(1).await.unwrap_err();
        assert!(matches!(err, Error::ReapFailed { pid: 1, .. }));
    }
}
