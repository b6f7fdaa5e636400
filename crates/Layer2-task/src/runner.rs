//! Task Runner - the shared context every operation goes through
//!
//! Features:
//! - FIFO admission under a `maxRunning` cap
//! - Bounded stdout/stderr capture with paging
//! - Stop with SIGTERM -> SIGKILL escalation
//! - Live config updates

use crate::clock::{Clock, SystemClock};
use crate::executor::{LocalSpawner, ProcessSpawner, Signal};
use crate::launcher::buffer_limits;
use crate::pagination::{self, PageResult, PageSelector};
use crate::registry::{QueueSnapshot, RunnerState, RunnerStats};
use crate::state::TaskStatus;
use crate::task::{EnqueueReceipt, StopOutcome, StreamKind, TaskId, TaskOptions, TaskSummary};
use crate::termination::{self, EscalationOutcome, EscalationPlan};
use parking_lot::Mutex;
use procq_foundation::{ConfigKey, Error, Result, RunnerConfig};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State and collaborators shared by the runner and its background futures
pub(crate) struct RunnerShared {
    pub(crate) state: Mutex<RunnerState>,
    pub(crate) spawner: Arc<dyn ProcessSpawner>,
    pub(crate) clock: Arc<dyn Clock>,
    /// Restored by [`TaskRunner::reset`]
    pub(crate) initial_config: RunnerConfig,
}

/// Process task runner
///
/// Cheap to clone; clones share the same queues and config. Methods that
/// start processes must be called from within a Tokio runtime, otherwise
/// the launch is recorded as a spawn failure.
#[derive(Clone)]
pub struct TaskRunner {
    shared: Arc<RunnerShared>,
}

impl TaskRunner {
    /// Runner backed by real OS processes
    pub fn new(config: RunnerConfig) -> Self {
        Self::with_spawner(config, Arc::new(LocalSpawner::new()))
    }

    pub fn with_spawner(config: RunnerConfig, spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self::with_parts(config, spawner, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: RunnerConfig,
        spawner: Arc<dyn ProcessSpawner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        debug!("Creating task runner with {} spawner", spawner.name());
        Self {
            shared: Arc::new(RunnerShared {
                state: Mutex::new(RunnerState::new(config.clone())),
                spawner,
                clock,
                initial_config: config,
            }),
        }
    }

    // ========== Config ==========

    pub fn config(&self) -> RunnerConfig {
        self.shared.state.lock().config.clone()
    }

    /// Change one config key. Raising `maxRunning` admits waiting tasks
    /// immediately; lowering it never stops running ones.
    pub fn update_config(&self, key: &str, value: &Value) -> Result<RunnerConfig> {
        let mut state = self.shared.state.lock();
        let key = state.config.apply(key, value)?;
        info!("Runner config updated: {} = {}", key, value);

        if key == ConfigKey::MaxRunning {
            self.shared.admit_locked(&mut state);
        }
        Ok(state.config.clone())
    }

    // ========== Queue ==========

    /// Register a waiting task without starting anything
    pub fn enqueue<I, S>(&self, command: &str, args: I, options: TaskOptions) -> Result<TaskSummary>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock();
        let id = state.enqueue(command, collect_args(args), options, now)?;
        summarize(&state, &id, now)
    }

    /// Start waiting tasks until the concurrency cap is reached
    pub fn admit_next(&self) {
        let mut state = self.shared.state.lock();
        self.shared.admit_locked(&mut state);
    }

    /// Enqueue then admit. `pid` is set when the task started right away.
    pub fn submit<I, S>(&self, command: &str, args: I, options: TaskOptions) -> Result<EnqueueReceipt>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock();
        let id = state.enqueue(command, collect_args(args), options, now)?;
        self.shared.admit_locked(&mut state);

        let task = state
            .get(&id)
            .ok_or_else(|| Error::Task(format!("Task {} vanished during admission", id)))?;
        Ok(EnqueueReceipt {
            id: task.id.clone(),
            name: task.name.clone(),
            pid: task.pid,
        })
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let now = self.shared.clock.now();
        self.shared.state.lock().snapshot(now)
    }

    /// Look up one task by id, pid or name
    pub fn task(&self, handle: &str) -> Result<TaskSummary> {
        let now = self.shared.clock.now();
        let state = self.shared.state.lock();
        let id = state.resolve(handle)?;
        summarize(&state, &id, now)
    }

    pub fn resolve(&self, handle: &str) -> Result<TaskId> {
        self.shared.state.lock().resolve(handle)
    }

    pub fn stats(&self) -> RunnerStats {
        self.shared.state.lock().stats()
    }

    // ========== Output Access ==========

    pub fn output_page(
        &self,
        handle: &str,
        stream: StreamKind,
        selector: PageSelector,
    ) -> Result<PageResult> {
        let state = self.shared.state.lock();
        let id = state.resolve(handle)?;
        let task = state
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("Task {} not found", id)))?;
        Ok(pagination::query(task.buffer(stream), selector))
    }

    pub fn stdout_page(&self, handle: &str, selector: PageSelector) -> Result<PageResult> {
        self.output_page(handle, StreamKind::Stdout, selector)
    }

    pub fn stderr_page(&self, handle: &str, selector: PageSelector) -> Result<PageResult> {
        self.output_page(handle, StreamKind::Stderr, selector)
    }

    /// Combined stdout+stderr tail, last `max_chars` characters
    pub fn tail(&self, handle: &str, max_chars: usize) -> Result<String> {
        let state = self.shared.state.lock();
        let id = state.resolve(handle)?;
        Ok(state
            .get(&id)
            .map(|task| task.tail(max_chars))
            .unwrap_or_default())
    }

    // ========== Termination ==========

    /// Stop a task.
    ///
    /// - waiting: dequeued and completed without ever spawning
    /// - running: `signal` (default SIGTERM), then SIGKILL after the grace
    ///   window; returns once the process has exited. The task completes
    ///   when its output pipes close, which a surviving grandchild can delay.
    /// - completed: nothing to do
    ///
    /// Returns the last `tail_chars` characters of combined output.
    pub async fn stop_task(
        &self,
        handle: &str,
        tail_chars: usize,
        signal: Option<&str>,
    ) -> Result<StopOutcome> {
        let signal = match signal {
            Some(name) => name.parse::<Signal>()?,
            None => Signal::Term,
        };

        let (id, pid, plan, mut exit_rx) = {
            let mut state = self.shared.state.lock();
            let id = state.resolve(handle)?;
            let status = state
                .get(&id)
                .map(|task| task.status)
                .ok_or_else(|| Error::not_found(format!("Task {} not found", id)))?;

            match status {
                TaskStatus::Waiting => {
                    let limits = buffer_limits(&state.config);
                    let now = self.shared.clock.now();
                    if let Some(task) = state.get_mut(&id) {
                        task.mark_completed(None, None, limits, now);
                    }
                    state.record_completion(&id);
                    info!("Stopped task {} before it started", id);
                    return Ok(StopOutcome::default());
                }
                TaskStatus::Completed => {
                    debug!("Task {} already completed", id);
                    let tail = state
                        .get(&id)
                        .map(|task| task.tail(tail_chars))
                        .unwrap_or_default();
                    return Ok(StopOutcome { tail });
                }
                TaskStatus::Running => {}
            }

            let task = state
                .get(&id)
                .ok_or_else(|| Error::not_found(format!("Task {} not found", id)))?;
            if task.has_exited() {
                debug!("Task {} already exited, output still draining", id);
                return Ok(StopOutcome {
                    tail: task.tail(tail_chars),
                });
            }
            let plan = EscalationPlan::new(
                signal,
                state.config.terminate_grace_ms,
                state.config.terminate_force_ms,
            );
            (id, task.pid, plan, task.subscribe_exited())
        };

        let exited = async move {
            let _ = exit_rx.wait_for(|gone| *gone).await;
        };

        match pid {
            Some(pid) => {
                info!("Stopping task {} (pid {}) with {}", id, pid, signal);
                let outcome =
                    termination::escalate(self.shared.spawner.as_ref(), pid, plan, exited).await?;
                match outcome {
                    EscalationOutcome::Graceful => info!("Task {} exited after {}", id, signal),
                    EscalationOutcome::Forced => warn!("Task {} needed SIGKILL to exit", id),
                }
            }
            None => {
                // nothing to signal; give the process the full window to go away
                warn!("Task {} has no pid to signal, waiting for it to exit", id);
                if tokio::time::timeout(plan.grace + plan.force, exited)
                    .await
                    .is_err()
                {
                    warn!(
                        "Task {} still running after {}ms",
                        id,
                        (plan.grace + plan.force).as_millis()
                    );
                }
            }
        }

        let tail = self.tail(id.as_str(), tail_chars).unwrap_or_default();
        Ok(StopOutcome { tail })
    }

    /// Wait until a task is completed
    pub async fn wait(&self, handle: &str) -> Result<TaskSummary> {
        let (id, mut done) = {
            let state = self.shared.state.lock();
            let id = state.resolve(handle)?;
            let done = state
                .get(&id)
                .map(|task| task.subscribe_done())
                .ok_or_else(|| Error::not_found(format!("Task {} not found", id)))?;
            (id, done)
        };

        if done.wait_for(|finished| *finished).await.is_err() {
            return Err(Error::Task(format!("Task {} was discarded", id)));
        }
        self.task(id.as_str())
    }

    // ========== Housekeeping ==========

    /// Keep only the newest `keep` completed tasks
    pub fn prune_completed(&self, keep: usize) -> usize {
        self.shared.state.lock().prune_completed(keep)
    }

    /// Kill every running process and forget all tasks. Config goes back
    /// to what the runner was created with.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        for id in &state.running {
            let Some(pid) = state.tasks.get(id).and_then(|task| task.pid) else {
                continue;
            };
            if let Err(e) = self.shared.spawner.signal(pid, Signal::Kill) {
                warn!("Failed to kill task {} during reset: {}", id, e);
            }
        }
        *state = RunnerState::new(self.shared.initial_config.clone());
        info!("Task runner reset");
    }
}

fn collect_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}

fn summarize(state: &RunnerState, id: &TaskId, now: chrono::DateTime<chrono::Utc>) -> Result<TaskSummary> {
    state
        .get(id)
        .map(|task| task.summary(now))
        .ok_or_else(|| Error::not_found(format!("Task {} not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::scripted::ScriptedSpawner;
    use serde_json::json;
    use std::time::Duration;

    fn runner_with(max_running: usize, spawner: Arc<ScriptedSpawner>) -> TaskRunner {
        let config = RunnerConfig {
            path: std::env::temp_dir(),
            max_running,
            terminate_grace_ms: 50,
            terminate_force_ms: 50,
            ..RunnerConfig::default()
        };
        TaskRunner::with_spawner(config, spawner)
    }

    fn no_args() -> Vec<String> {
        Vec::new()
    }

    #[tokio::test]
    async fn test_fifo_admission_under_cap() {
        let spawner = Arc::new(ScriptedSpawner::new());
        let runner = runner_with(1, spawner.clone());

        let a = runner.submit("a", no_args(), TaskOptions::new()).unwrap();
        let b = runner.submit("b", no_args(), TaskOptions::new()).unwrap();
        let c = runner.submit("c", no_args(), TaskOptions::new()).unwrap();

        assert!(a.pid.is_some());
        assert!(b.pid.is_none());
        assert_eq!(spawner.spawned_commands(), vec!["a"]);

        spawner.exit(a.pid.unwrap(), 0);
        runner.wait(a.id.as_str()).await.unwrap();
        assert_eq!(spawner.spawned_commands(), vec!["a", "b"]);

        let b_pid = runner.task(b.id.as_str()).unwrap().pid.unwrap();
        spawner.exit(b_pid, 0);
        runner.wait(b.id.as_str()).await.unwrap();
        assert_eq!(spawner.spawned_commands(), vec!["a", "b", "c"]);
        assert_eq!(runner.stats().running, 1);
        assert_eq!(runner.task(c.id.as_str()).unwrap().status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_running_never_exceeds_cap() {
        let spawner = Arc::new(ScriptedSpawner::new());
        let runner = runner_with(2, spawner.clone());

        for cmd in ["a", "b", "c", "d", "e"] {
            runner.submit(cmd, no_args(), TaskOptions::new()).unwrap();
            assert!(runner.stats().running <= 2);
        }

        let snapshot = runner.snapshot();
        assert_eq!(snapshot.running.len(), 2);
        assert_eq!(snapshot.waiting.len(), 3);
        assert_eq!(snapshot.waiting[0].command, "c");
    }

    #[tokio::test]
    async fn test_enqueue_does_not_start() {
        let spawner = Arc::new(ScriptedSpawner::new());
        let runner = runner_with(4, spawner.clone());

        let summary = runner.enqueue("a", ["x"], TaskOptions::new()).unwrap();
        assert_eq!(summary.status, TaskStatus::Waiting);
        assert_eq!(summary.args, vec!["x"]);
        assert!(spawner.spawned_commands().is_empty());

        runner.admit_next();
        assert_eq!(spawner.spawned_commands(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_raising_cap_backfills() {
        let spawner = Arc::new(ScriptedSpawner::new());
        let runner = runner_with(1, spawner.clone());
        for cmd in ["a", "b", "c"] {
            runner.submit(cmd, no_args(), TaskOptions::new()).unwrap();
        }
        assert_eq!(spawner.spawned_commands().len(), 1);

        let config = runner.update_config("maxRunning", &json!(3)).unwrap();
        assert_eq!(config.max_running, 3);
        assert_eq!(spawner.spawned_commands(), vec!["a", "b", "c"]);

        // lowering never stops anything
        runner.update_config("maxRunning", &json!(1)).unwrap();
        assert_eq!(runner.stats().running, 3);
    }

    #[tokio::test]
    async fn test_invalid_config_update_is_rejected() {
        let runner = runner_with(2, Arc::new(ScriptedSpawner::new()));
        assert!(runner.update_config("maxRunning", &json!(0)).is_err());
        assert!(runner.update_config("bogus", &json!(1)).is_err());
        assert_eq!(runner.config().max_running, 2);
    }

    #[tokio::test]
    async fn test_spawn_failure_completes_with_stderr() {
        let spawner = Arc::new(ScriptedSpawner::new().failing("ghost"));
        let runner = runner_with(1, spawner.clone());

        let failed = runner.submit("ghost", no_args(), TaskOptions::new()).unwrap();
        let next = runner.submit("real", no_args(), TaskOptions::new()).unwrap();

        let summary = runner.task(failed.id.as_str()).unwrap();
        assert_eq!(summary.status, TaskStatus::Completed);
        assert!(summary.exit_code.is_none());
        assert!(summary.pid.is_none());

        let page = runner
            .stderr_page(failed.id.as_str(), PageSelector::page(1, 10))
            .unwrap();
        assert!(page.logs.contains("ENOENT"));

        // admission moved on to the next task
        assert!(next.pid.is_some());
        assert_eq!(spawner.spawned_commands(), vec!["real"]);
    }

    #[test]
    fn test_launch_without_runtime_is_spawn_failure() {
        let spawner = Arc::new(ScriptedSpawner::new());
        let runner = runner_with(1, spawner.clone());

        let receipt = runner.submit("a", no_args(), TaskOptions::new()).unwrap();
        let summary = runner.task(receipt.id.as_str()).unwrap();
        assert_eq!(summary.status, TaskStatus::Completed);
        assert!(spawner.spawned_commands().is_empty());
        assert!(runner.tail(receipt.id.as_str(), 200).unwrap().contains("runtime"));
    }

    #[tokio::test]
    async fn test_output_is_captured() {
        let spawner = Arc::new(ScriptedSpawner::new().with_output("echo", "hello\nworld\n", "oops\n"));
        let runner = runner_with(1, spawner.clone());

        let receipt = runner
            .submit("echo", no_args(), TaskOptions::new().with_name("greeter"))
            .unwrap();
        spawner.exit(receipt.pid.unwrap(), 0);
        let summary = runner.wait("greeter").await.unwrap();
        assert_eq!(summary.exit_code, Some(0));

        let out = runner.stdout_page("greeter", PageSelector::page(1, 10)).unwrap();
        assert_eq!(out.logs, "hello\nworld");
        assert!(out.last_page);
        let err = runner.stderr_page("greeter", PageSelector::range(1, 5)).unwrap();
        assert_eq!(err.logs, "oops");
        assert_eq!(err.pagenumber, None);
    }

    #[tokio::test]
    async fn test_cwd_and_env_reach_spawn() {
        let spawner = Arc::new(ScriptedSpawner::new());
        let runner = runner_with(2, spawner.clone());

        runner.submit("a", no_args(), TaskOptions::new()).unwrap();
        runner
            .submit(
                "b",
                no_args(),
                TaskOptions::new().with_cwd("/srv").with_env("MODE", "test"),
            )
            .unwrap();

        let requests = spawner.spawned_requests();
        assert_eq!(requests[0].cwd, std::env::temp_dir());
        assert!(requests[0].env.is_empty());
        assert_eq!(requests[1].cwd, std::path::PathBuf::from("/srv"));
        assert_eq!(requests[1].env.get("MODE").map(String::as_str), Some("test"));
    }

    #[tokio::test]
    async fn test_timeout_sends_single_sigterm() {
        let spawner = Arc::new(ScriptedSpawner::new().ignoring(Signal::Term));
        let runner = runner_with(1, spawner.clone());

        let receipt = runner
            .submit("slow", no_args(), TaskOptions::new().with_timeout_ms(20))
            .unwrap();
        let pid = receipt.pid.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(spawner.signals(), vec![(pid, Signal::Term)]);
        assert_eq!(runner.task(receipt.id.as_str()).unwrap().status, TaskStatus::Running);

        spawner.exit(pid, 143);
        runner.wait(receipt.id.as_str()).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_waiting_task() {
        let spawner = Arc::new(ScriptedSpawner::new());
        let runner = runner_with(1, spawner.clone());

        runner.submit("a", no_args(), TaskOptions::new()).unwrap();
        let queued = runner.submit("b", no_args(), TaskOptions::new()).unwrap();

        let outcome = runner.stop_task(queued.id.as_str(), 100, None).await.unwrap();
        assert_eq!(outcome.tail, "");

        let snapshot = runner.snapshot();
        assert!(snapshot.waiting.is_empty());
        assert_eq!(snapshot.completed[0].id, queued.id);
        assert_eq!(spawner.spawned_commands(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_stop_running_task_is_idempotent() {
        let spawner = Arc::new(ScriptedSpawner::new().with_output("srv", "ready\n", ""));
        let runner = runner_with(1, spawner.clone());
        let receipt = runner.submit("srv", no_args(), TaskOptions::new()).unwrap();

        let first = runner.stop_task(receipt.id.as_str(), 100, None).await.unwrap();
        assert_eq!(first.tail, "ready\n");

        let summary = runner.wait(receipt.id.as_str()).await.unwrap();
        assert_eq!(summary.status, TaskStatus::Completed);
        assert_eq!(summary.signal.as_deref(), Some("SIGTERM"));

        let second = runner.stop_task(receipt.id.as_str(), 100, None).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(spawner.signals().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_escalates_and_custom_signal() {
        let spawner = Arc::new(ScriptedSpawner::new().ignoring(Signal::Int));
        let runner = runner_with(1, spawner.clone());
        let receipt = runner.submit("srv", no_args(), TaskOptions::new()).unwrap();
        let pid = receipt.pid.unwrap();

        runner
            .stop_task(receipt.id.as_str(), 100, Some("SIGINT"))
            .await
            .unwrap();
        assert_eq!(spawner.signals(), vec![(pid, Signal::Int), (pid, Signal::Kill)]);
        assert_eq!(
            runner.wait(receipt.id.as_str()).await.unwrap().signal.as_deref(),
            Some("SIGKILL")
        );
    }

    #[tokio::test]
    async fn test_stop_returns_on_exit_while_pipes_stay_open() {
        let spawner = Arc::new(
            ScriptedSpawner::new()
                .holding_pipes("srv")
                .ignoring(Signal::Term),
        );
        let runner = runner_with(1, spawner.clone());
        let receipt = runner.submit("srv", no_args(), TaskOptions::new()).unwrap();
        let pid = receipt.pid.unwrap();

        let stopped = tokio::time::timeout(
            Duration::from_secs(2),
            runner.stop_task(receipt.id.as_str(), 100, None),
        )
        .await
        .expect("stop should not wait for the pipes");
        assert!(stopped.is_ok());
        assert_eq!(spawner.signals(), vec![(pid, Signal::Term), (pid, Signal::Kill)]);

        // exited but not closed: still running until the pipe is released
        let summary = runner.task(receipt.id.as_str()).unwrap();
        assert_eq!(summary.status, TaskStatus::Running);
        assert_eq!(runner.stats().running, 1);

        // a second stop has nothing left to signal
        runner.stop_task(receipt.id.as_str(), 100, None).await.unwrap();
        assert_eq!(spawner.signals().len(), 2);

        assert!(spawner.release_pipes(pid));
        let summary = runner.wait(receipt.id.as_str()).await.unwrap();
        assert_eq!(summary.status, TaskStatus::Completed);
        assert_eq!(summary.signal.as_deref(), Some("SIGKILL"));
    }

    #[tokio::test]
    async fn test_timeout_after_exit_sends_nothing() {
        let spawner = Arc::new(ScriptedSpawner::new().holding_pipes("srv"));
        let runner = runner_with(1, spawner.clone());
        let receipt = runner
            .submit("srv", no_args(), TaskOptions::new().with_timeout_ms(30))
            .unwrap();
        let pid = receipt.pid.unwrap();

        spawner.exit(pid, 0);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(spawner.signals().is_empty());
        assert_eq!(runner.task(receipt.id.as_str()).unwrap().status, TaskStatus::Running);

        spawner.release_pipes(pid);
        let summary = runner.wait(receipt.id.as_str()).await.unwrap();
        assert_eq!(summary.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_stop_without_pid_waits_for_exit() {
        let spawner = Arc::new(ScriptedSpawner::new().without_pid("srv"));
        let runner = runner_with(1, spawner.clone());
        let receipt = runner.submit("srv", no_args(), TaskOptions::new()).unwrap();
        assert!(receipt.pid.is_none());
        let key = spawner.last_pid().unwrap();

        let background = spawner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            background.exit(key, 0);
        });

        runner.stop_task(receipt.id.as_str(), 100, None).await.unwrap();
        assert!(spawner.signals().is_empty());
        let summary = runner.wait(receipt.id.as_str()).await.unwrap();
        assert_eq!(summary.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_stop_rejects_unknown_signal() {
        let runner = runner_with(1, Arc::new(ScriptedSpawner::new()));
        let receipt = runner.submit("srv", no_args(), TaskOptions::new()).unwrap();
        let err = runner
            .stop_task(receipt.id.as_str(), 10, Some("SIGNOPE"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let runner = runner_with(1, Arc::new(ScriptedSpawner::new()));
        assert!(matches!(runner.task("nope"), Err(Error::NotFound(_))));
        assert!(matches!(
            runner.stop_task("nope", 10, None).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_kills_and_restores_config() {
        let spawner = Arc::new(ScriptedSpawner::new());
        let runner = runner_with(1, spawner.clone());
        let receipt = runner.submit("a", no_args(), TaskOptions::new()).unwrap();
        runner.submit("b", no_args(), TaskOptions::new()).unwrap();
        runner.update_config("lineBufferSize", &json!(5)).unwrap();

        runner.reset();

        assert_eq!(spawner.signals(), vec![(receipt.pid.unwrap(), Signal::Kill)]);
        assert_eq!(runner.stats(), RunnerStats::default());
        assert_eq!(runner.config().line_buffer_size, RunnerConfig::default().line_buffer_size);

        // the killed process exiting must not touch the fresh state
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runner.stats(), RunnerStats::default());
        assert!(runner.submit("c", no_args(), TaskOptions::new()).unwrap().pid.is_some());
    }

    #[tokio::test]
    async fn test_prune_completed() {
        let spawner = Arc::new(ScriptedSpawner::new());
        let runner = runner_with(3, spawner.clone());
        let mut ids = Vec::new();
        for cmd in ["a", "b", "c"] {
            let receipt = runner.submit(cmd, no_args(), TaskOptions::new()).unwrap();
            spawner.exit(receipt.pid.unwrap(), 0);
            runner.wait(receipt.id.as_str()).await.unwrap();
            ids.push(receipt.id);
        }

        assert_eq!(runner.prune_completed(1), 2);
        assert_eq!(runner.snapshot().completed.len(), 1);
        assert!(runner.task(ids[0].as_str()).is_err());
    }
}
