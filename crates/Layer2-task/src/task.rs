//! Task definition and types

use crate::buffer::{BufferLimits, OutputBuffer};
use crate::state::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::watch;
use uuid::Uuid;

/// Unique identifier for a task (`task-<seq>-<8 hex>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Build an id from the runner's monotonic counter
    pub(crate) fn generate(seq: u64) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        Self(format!("task-{}-{}", seq, &salt[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional per-task overrides supplied at enqueue time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOptions {
    /// Caller-chosen alias, not required to be unique
    #[serde(default)]
    pub name: Option<String>,

    /// Working directory; defaults to the runner's `path`
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Environment overrides merged over the ambient environment
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Per-task timeout overriding the runner default
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// One queued or executing command, owned by the registry
#[derive(Debug)]
pub struct Task {
    pub id: TaskId,

    /// Creation order, used to break name collisions
    pub seq: u64,

    pub command: String,
    pub args: Vec<String>,
    pub name: Option<String>,

    /// Override before launch, effective directory after
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout_ms: Option<u64>,

    pub status: TaskStatus,
    pub pid: Option<u32>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub exit_code: Option<i32>,
    pub signal: Option<String>,

    pub stdout: OutputBuffer,
    pub stderr: OutputBuffer,

    /// Flips to `true` once the OS reports the process gone
    exited: watch::Sender<bool>,

    /// Flips to `true` once the task is finalized
    done: watch::Sender<bool>,
}

impl Task {
    pub(crate) fn new(
        seq: u64,
        command: String,
        args: Vec<String>,
        options: TaskOptions,
        now: DateTime<Utc>,
    ) -> Self {
        let (exited, _) = watch::channel(false);
        let (done, _) = watch::channel(false);
        Self {
            id: TaskId::generate(seq),
            seq,
            command,
            args,
            name: options.name,
            cwd: options.cwd,
            env: options.env,
            timeout_ms: options.timeout_ms,
            status: TaskStatus::Waiting,
            pid: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            exit_code: None,
            signal: None,
            stdout: OutputBuffer::new(),
            stderr: OutputBuffer::new(),
            exited,
            done,
        }
    }

    /// Waiting -> Running
    pub(crate) fn mark_running(&mut self, pid: Option<u32>, cwd: PathBuf, now: DateTime<Utc>) {
        debug_assert!(self.status.can_transition_to(TaskStatus::Running));
        self.status = TaskStatus::Running;
        self.pid = pid;
        self.cwd = Some(cwd);
        self.started_at = Some(now);
    }

    /// -> Completed; flushes partial lines and wakes anyone waiting
    pub(crate) fn mark_completed(
        &mut self,
        exit_code: Option<i32>,
        signal: Option<String>,
        limits: BufferLimits,
        now: DateTime<Utc>,
    ) {
        debug_assert!(self.status.can_transition_to(TaskStatus::Completed));
        self.stdout.flush_remainder(limits);
        self.stderr.flush_remainder(limits);
        self.status = TaskStatus::Completed;
        self.exit_code = exit_code;
        self.signal = signal;
        self.completed_at = Some(now);
        self.exited.send_replace(true);
        self.done.send_replace(true);
    }

    /// The process is gone; its pipes may still be draining
    pub(crate) fn mark_exited(&mut self) {
        self.exited.send_replace(true);
    }

    /// Whether the pid can no longer be signalled safely
    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    pub fn buffer(&self, stream: StreamKind) -> &OutputBuffer {
        match stream {
            StreamKind::Stdout => &self.stdout,
            StreamKind::Stderr => &self.stderr,
        }
    }

    pub(crate) fn buffer_mut(&mut self, stream: StreamKind) -> &mut OutputBuffer {
        match stream {
            StreamKind::Stdout => &mut self.stdout,
            StreamKind::Stderr => &mut self.stderr,
        }
    }

    /// Receiver that observes finalization
    pub(crate) fn subscribe_done(&self) -> watch::Receiver<bool> {
        self.done.subscribe()
    }

    /// Receiver that observes the process exit, which can precede
    /// finalization while a grandchild still holds stdout/stderr open
    pub(crate) fn subscribe_exited(&self) -> watch::Receiver<bool> {
        self.exited.subscribe()
    }

    /// stdout tail followed by stderr tail, keeping the last `max_chars`
    pub fn tail(&self, max_chars: usize) -> String {
        let combined = format!("{}{}", self.stdout.tail(), self.stderr.tail());
        let total = combined.chars().count();
        if total <= max_chars {
            return combined;
        }
        combined.chars().skip(total - max_chars).collect()
    }

    /// Run time so far, or total run time once completed
    pub fn duration_ms(&self, now: DateTime<Utc>) -> Option<u64> {
        let start = self.started_at?;
        let end = self.completed_at.unwrap_or(now);
        Some((end - start).num_milliseconds().max(0) as u64)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            command: self.command.clone(),
            args: self.args.clone(),
            status: self.status,
            pid: self.pid,
            cwd: self.cwd.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            exit_code: self.exit_code,
            signal: self.signal.clone(),
            duration_ms: self.duration_ms(now),
        }
    }
}

/// Caller-facing view of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: Option<String>,
    pub command: String,
    pub args: Vec<String>,
    pub status: TaskStatus,
    pub pid: Option<u32>,
    pub cwd: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
    pub duration_ms: Option<u64>,
}

/// Result of submitting a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueReceipt {
    pub id: TaskId,
    pub name: Option<String>,
    pub pid: Option<u32>,
}

/// Result of stopping a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopOutcome {
    /// Combined stdout+stderr tail at the moment the stop returned
    pub tail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task() -> Task {
        Task::new(
            1,
            "echo".into(),
            vec!["hi".into()],
            TaskOptions::new().with_name("greeter"),
            Utc::now(),
        )
    }

    #[test]
    fn test_id_format() {
        let id = TaskId::generate(7);
        assert!(id.as_str().starts_with("task-7-"));
        assert_eq!(id.as_str().len(), "task-7-".len() + 8);
        assert_ne!(TaskId::generate(7), id);
    }

    #[test]
    fn test_new_task_is_waiting() {
        let task = task();
        assert_eq!(task.status, TaskStatus::Waiting);
        assert!(task.pid.is_none());
        assert!(task.completed_at.is_none());
        assert_eq!(task.name.as_deref(), Some("greeter"));
    }

    #[test]
    fn test_lifecycle_stamps() {
        let mut task = task();
        let start = Utc::now();
        task.mark_running(Some(42), PathBuf::from("/tmp"), start);
        assert_eq!(task.pid, Some(42));
        assert_eq!(task.started_at, Some(start));

        let done_rx = task.subscribe_done();
        assert!(!*done_rx.borrow());

        task.mark_exited();
        assert!(task.has_exited());
        assert!(!*done_rx.borrow());

        let end = start + Duration::milliseconds(250);
        task.mark_completed(Some(0), None, BufferLimits::new(10, 10), end);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_at, Some(end));
        assert_eq!(task.duration_ms(Utc::now()), Some(250));
        assert!(*done_rx.borrow());
    }

    #[test]
    fn test_completion_flushes_partial_lines() {
        let mut task = task();
        task.mark_running(Some(1), PathBuf::from("/tmp"), Utc::now());
        task.stdout.append("no newline", BufferLimits::new(10, 100));
        task.mark_completed(Some(0), None, BufferLimits::new(10, 100), Utc::now());
        assert_eq!(task.stdout.lines()[0], "no newline");
    }

    #[test]
    fn test_tail_concatenates_and_bounds() {
        let mut task = task();
        task.stdout.append("out\n", BufferLimits::new(10, 100));
        task.stderr.append("err\n", BufferLimits::new(10, 100));

        assert_eq!(task.tail(100), "out\nerr\n");
        assert_eq!(task.tail(5), "\nerr\n");
        assert_eq!(task.tail(0), "");
    }

    #[test]
    fn test_summary_camel_case() {
        let task = task();
        let value = serde_json::to_value(task.summary(Utc::now())).unwrap();
        assert_eq!(value["status"], "waiting");
        assert!(value.get("createdAt").is_some());
        assert!(value["durationMs"].is_null());
    }
}
