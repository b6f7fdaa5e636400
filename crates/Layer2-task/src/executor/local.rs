//! Local spawner - runs tasks as child processes of this server
//!
//! Features:
//! - Piped stdout/stderr handed back as independent streams
//! - Ambient environment plus per-task overrides
//! - Exit code and terminating signal reporting
//! - Signal delivery by pid (`kill(2)` on Unix)

use crate::executor::{ExitOutcome, OutputStream, ProcessSpawner, Signal, SpawnRequest, SpawnedProcess};
use futures::FutureExt;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Spawner backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct LocalSpawner;

impl LocalSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSpawner for LocalSpawner {
    fn spawn(&self, request: &SpawnRequest) -> io::Result<SpawnedProcess> {
        let mut cmd = Command::new(&request.command);
        cmd.args(&request.args)
            .current_dir(&request.cwd)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            "Spawning {} {:?} in {}",
            request.command,
            request.args,
            request.cwd.display()
        );

        let mut child = cmd.spawn()?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .map(|s| Box::pin(s) as OutputStream);
        let stderr = child
            .stderr
            .take()
            .map(|s| Box::pin(s) as OutputStream);

        let exit = async move {
            let status = child.wait().await?;
            Ok(exit_outcome(status))
        }
        .boxed();

        Ok(SpawnedProcess {
            pid,
            stdout,
            stderr,
            exit,
        })
    }

    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: Signal) -> io::Result<()> {
        let raw_pid = libc::pid_t::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

        // SAFETY: kill(2) only reads its integer arguments
        let rc = unsafe { libc::kill(raw_pid, signal.as_raw()) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        debug!("Sent {} to pid {}", signal, pid);
        Ok(())
    }

    #[cfg(not(unix))]
    fn signal(&self, pid: u32, signal: Signal) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("Cannot deliver {} to pid {} on this platform", signal, pid),
        ))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(unix)]
fn exit_outcome(status: ExitStatus) -> ExitOutcome {
    use std::os::unix::process::ExitStatusExt;

    ExitOutcome {
        code: status.code(),
        signal: status.signal().map(crate::executor::signal::raw_signal_name),
    }
}

#[cfg(not(unix))]
fn exit_outcome(status: ExitStatus) -> ExitOutcome {
    ExitOutcome {
        code: status.code(),
        signal: None,
    }
}
