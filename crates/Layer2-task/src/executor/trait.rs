//! Process spawner trait

use crate::executor::Signal;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Boxed output stream of a spawned process
pub type OutputStream = Pin<Box<dyn AsyncRead + Send>>;

/// Everything needed to start one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Overrides merged over the ambient environment
    pub env: HashMap<String, String>,
}

/// How a process ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
    pub signal: Option<String>,
}

impl ExitOutcome {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(signal: impl Into<String>) -> Self {
        Self {
            code: None,
            signal: Some(signal.into()),
        }
    }
}

/// A started process: its pid, both output streams, and its exit event
pub struct SpawnedProcess {
    pub pid: Option<u32>,
    pub stdout: Option<OutputStream>,
    pub stderr: Option<OutputStream>,
    /// Resolves once the OS reports the process gone
    pub exit: BoxFuture<'static, io::Result<ExitOutcome>>,
}

/// Process creation backend - implement to swap the OS for a test double
pub trait ProcessSpawner: Send + Sync {
    /// Start a process. Must be called from within a Tokio runtime.
    fn spawn(&self, request: &SpawnRequest) -> io::Result<SpawnedProcess>;

    /// Deliver a signal to a running process
    fn signal(&self, pid: u32, signal: Signal) -> io::Result<()>;

    /// Get spawner name
    fn name(&self) -> &'static str;
}
