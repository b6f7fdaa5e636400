//! Process launcher - admission, spawning, output capture, finalization
//!
//! Everything that mutates the registry runs synchronously under the
//! runner lock; the only suspension points are stream reads, the exit
//! event and the timeout timer, each in its own spawned future.

use crate::buffer::BufferLimits;
use crate::executor::{ExitOutcome, OutputStream, Signal, SpawnRequest, SpawnedProcess};
use crate::registry::RunnerState;
use crate::runner::RunnerShared;
use crate::task::{StreamKind, TaskId};
use procq_foundation::RunnerConfig;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Bytes requested per stream read
const READ_CHUNK: usize = 8 * 1024;

pub(crate) fn buffer_limits(config: &RunnerConfig) -> BufferLimits {
    BufferLimits::new(config.line_buffer_size, config.char_buffer_size)
}

impl RunnerShared {
    /// Start waiting tasks in FIFO order until the concurrency cap is hit
    pub(crate) fn admit_locked(self: &Arc<Self>, state: &mut RunnerState) {
        while state.running.len() < state.config.max_running {
            let Some(id) = state.waiting.pop_front() else {
                break;
            };
            match state.tasks.get(&id) {
                Some(task) if task.status.is_waiting() => self.launch_locked(state, id),
                _ => debug!("Skipping {}: no longer waiting", id),
            }
        }
    }

    fn launch_locked(self: &Arc<Self>, state: &mut RunnerState, id: TaskId) {
        let now = self.clock.now();
        let limits = buffer_limits(&state.config);
        let default_cwd = state.config.path.clone();
        let default_timeout = state.config.timeout;

        let Some(task) = state.tasks.get_mut(&id) else {
            return;
        };
        let request = SpawnRequest {
            command: task.command.clone(),
            args: task.args.clone(),
            cwd: task.cwd.clone().unwrap_or(default_cwd),
            env: task.env.clone(),
        };
        let timeout = task
            .timeout_ms
            .or(default_timeout)
            .map(Duration::from_millis);

        let spawned = Handle::try_current()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("no Tokio runtime: {}", e)))
            .and_then(|runtime| {
                self.spawner
                    .spawn(&request)
                    .map(|process| (runtime, process))
            });

        let pid = spawned.as_ref().ok().and_then(|(_, process)| process.pid);
        task.mark_running(pid, request.cwd.clone(), now);
        state.running.insert(id.clone());

        match spawned {
            Ok((runtime, process)) => {
                info!(
                    "Started task {} (pid {:?}): {} {:?}",
                    id, pid, request.command, request.args
                );
                runtime.spawn(supervise(Arc::clone(self), id, process, timeout));
            }
            Err(e) => {
                warn!("Failed to start task {}: {}", id, e);
                if let Some(task) = state.tasks.get_mut(&id) {
                    task.stderr
                        .append(&format!("Failed to start {}: {}", request.command, e), limits);
                }
                self.finalize_locked(state, &id, ExitOutcome::default());
            }
        }
    }

    /// Mark a task completed and move it into the history. Does not admit.
    pub(crate) fn finalize_locked(&self, state: &mut RunnerState, id: &TaskId, outcome: ExitOutcome) {
        let limits = buffer_limits(&state.config);
        let now = self.clock.now();

        let Some(task) = state.tasks.get_mut(id) else {
            debug!("Ignoring exit of unknown task {}", id);
            return;
        };
        if task.status.is_terminal() {
            return;
        }

        task.mark_completed(outcome.code, outcome.signal.clone(), limits, now);
        info!(
            "Task {} completed (exit code {:?}, signal {:?})",
            id, outcome.code, outcome.signal
        );
        state.record_completion(id);
    }

    fn finalize(self: &Arc<Self>, id: &TaskId, outcome: ExitOutcome) {
        let mut state = self.state.lock();
        self.finalize_locked(&mut state, id, outcome);
        self.admit_locked(&mut state);
    }

    /// Process-level error: record it in stderr, finalize with no exit code
    fn fail(self: &Arc<Self>, id: &TaskId, message: &str) {
        let mut state = self.state.lock();
        let limits = buffer_limits(&state.config);
        if let Some(task) = state.tasks.get_mut(id) {
            task.stderr.append(message, limits);
        }
        self.finalize_locked(&mut state, id, ExitOutcome::default());
        self.admit_locked(&mut state);
    }

    fn append_output(&self, id: &TaskId, stream: StreamKind, chunk: &[u8]) {
        let mut state = self.state.lock();
        let limits = buffer_limits(&state.config);
        if let Some(task) = state.tasks.get_mut(id) {
            task.buffer_mut(stream).append_bytes(chunk, limits);
        }
    }

    fn mark_exited(&self, id: &TaskId) {
        if let Some(task) = self.state.lock().get_mut(id) {
            debug!("Process of task {} exited", id);
            task.mark_exited();
        }
    }

    /// One-shot SIGTERM; the timeout path never escalates on its own
    fn on_timeout(&self, id: &TaskId, pid: Option<u32>, limit: Duration) {
        let alive = self
            .state
            .lock()
            .get(id)
            .map(|task| task.status.is_running() && !task.has_exited())
            .unwrap_or(false);
        if !alive {
            debug!("Task {} timed out after its process exited", id);
            return;
        }

        let Some(pid) = pid else {
            warn!("Task {} timed out but has no pid to signal", id);
            return;
        };
        warn!(
            "Task {} exceeded its {}ms timeout, sending SIGTERM to {}",
            id,
            limit.as_millis(),
            pid
        );
        if let Err(e) = self.spawner.signal(pid, Signal::Term) {
            warn!("Failed to signal timed out task {}: {}", id, e);
        }
    }
}

/// Drive one process to completion: drain both streams, await the exit,
/// arm the timeout, then finalize and admit the next task
async fn supervise(
    shared: Arc<RunnerShared>,
    id: TaskId,
    process: SpawnedProcess,
    timeout: Option<Duration>,
) {
    let SpawnedProcess {
        pid,
        stdout,
        stderr,
        exit,
    } = process;

    // Exit and EOF are separate events: a grandchild can keep the pipes
    // open after the process itself is gone
    let exited = async {
        let outcome = exit.await;
        shared.mark_exited(&id);
        outcome
    };
    let finished = async {
        let (outcome, (), ()) = tokio::join!(
            exited,
            pump(&shared, &id, StreamKind::Stdout, stdout),
            pump(&shared, &id, StreamKind::Stderr, stderr),
        );
        outcome
    };
    tokio::pin!(finished);

    let outcome = match timeout {
        Some(limit) => tokio::select! {
            outcome = &mut finished => outcome,
            _ = tokio::time::sleep(limit) => {
                shared.on_timeout(&id, pid, limit);
                finished.await
            }
        },
        None => finished.await,
    };

    match outcome {
        Ok(outcome) => shared.finalize(&id, outcome),
        Err(e) => {
            warn!("Task {} process error: {}", id, e);
            shared.fail(&id, &e.to_string());
        }
    }
}

/// Copy one stream into its buffer until EOF. Never applies backpressure
/// beyond the read itself; old content is evicted instead.
async fn pump(shared: &RunnerShared, id: &TaskId, stream: StreamKind, reader: Option<OutputStream>) {
    let Some(mut reader) = reader else {
        return;
    };

    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => shared.append_output(id, stream, &chunk[..n]),
            Err(e) => {
                warn!("Task {} {} read failed: {}", id, stream, e);
                let message = format!("{} stream error: {}\n", stream, e);
                shared.append_output(id, StreamKind::Stderr, message.as_bytes());
                break;
            }
        }
    }
}
