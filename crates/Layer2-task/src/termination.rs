//! Stop escalation for a running process
//!
//! ```text
//! Running ──signal──▶ Grace ──(grace elapsed)──SIGKILL──▶ Force ──(force elapsed)──▶ Unresponsive
//!                       │                                   │
//!                       └──── exit ──▶ Exited               └──── exit ──▶ Exited
//! ```
//!
//! Each wait races the process's exit against a timer; the exit always
//! wins a tie.

use crate::executor::{ProcessSpawner, Signal};
use procq_foundation::{Error, Result};
use std::future::Future;
use std::io;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Timing for one stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPlan {
    /// First signal to send (SIGTERM unless the caller asked otherwise)
    pub signal: Signal,
    pub grace: Duration,
    pub force: Duration,
}

impl EscalationPlan {
    pub fn new(signal: Signal, grace_ms: u64, force_ms: u64) -> Self {
        Self {
            signal,
            grace: Duration::from_millis(grace_ms),
            force: Duration::from_millis(force_ms),
        }
    }
}

/// How the process ended up exiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationOutcome {
    /// Exited within the grace window
    Graceful,
    /// Needed SIGKILL
    Forced,
}

/// Signal `pid`, then escalate to SIGKILL if `exited` has not resolved
/// within the grace window. Fails with [`Error::Unresponsive`] when the
/// process outlives the force window too.
pub async fn escalate<F>(
    spawner: &dyn ProcessSpawner,
    pid: u32,
    plan: EscalationPlan,
    exited: F,
) -> Result<EscalationOutcome>
where
    F: Future<Output = ()>,
{
    tokio::pin!(exited);

    send(spawner, pid, plan.signal);
    tokio::select! {
        biased;
        _ = &mut exited => return Ok(EscalationOutcome::Graceful),
        _ = tokio::time::sleep(plan.grace) => {}
    }

    warn!(
        "Process {} still alive {}ms after {}, sending SIGKILL",
        pid,
        plan.grace.as_millis(),
        plan.signal
    );
    send(spawner, pid, Signal::Kill);
    tokio::select! {
        biased;
        _ = &mut exited => Ok(EscalationOutcome::Forced),
        _ = tokio::time::sleep(plan.force) => {
            error!(
                "Process {} did not exit {}ms after SIGKILL",
                pid,
                plan.force.as_millis()
            );
            Err(Error::Unresponsive { pid })
        }
    }
}

/// Best effort: a process that is already gone is not an error here,
/// the exit event will report it
fn send(spawner: &dyn ProcessSpawner, pid: u32, signal: Signal) {
    match spawner.signal(pid, signal) {
        Ok(()) => debug!("Sent {} to {}", signal, pid),
        Err(e) if is_gone(&e) => debug!("Process {} already gone ({})", pid, e),
        Err(e) => warn!("Failed to send {} to {}: {}", signal, pid, e),
    }
}

fn is_gone(e: &io::Error) -> bool {
    #[cfg(unix)]
    {
        if e.raw_os_error() == Some(libc::ESRCH) {
            return true;
        }
    }
    e.kind() == io::ErrorKind::NotFound
}
