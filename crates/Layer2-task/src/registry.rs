//! Task registry - the single owner of every task record
//!
//! Holds the task map plus three ordered collections:
//! - `waiting`: FIFO admission queue
//! - `running`: currently executing
//! - `completed`: completion order (not enqueue order)

use crate::state::TaskStatus;
use crate::task::{Task, TaskId, TaskOptions, TaskSummary};
use chrono::{DateTime, Utc};
use procq_foundation::{Error, Result, RunnerConfig};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// One way of addressing a task
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskHandle {
    ById(String),
    ByPid(u32),
    ByName(String),
}

impl TaskHandle {
    /// Candidate interpretations of a raw handle, in precedence order:
    /// id, then pid (numeric only), then name
    pub fn candidates(raw: &str) -> Vec<TaskHandle> {
        let mut candidates = vec![TaskHandle::ById(raw.to_string())];
        if let Ok(pid) = raw.trim().parse::<u32>() {
            candidates.push(TaskHandle::ByPid(pid));
        }
        candidates.push(TaskHandle::ByName(raw.to_string()));
        candidates
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskHandle::ById(id) => write!(f, "id {}", id),
            TaskHandle::ByPid(pid) => write!(f, "pid {}", pid),
            TaskHandle::ByName(name) => write!(f, "name {}", name),
        }
    }
}

/// Point-in-time copy of the three queues
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub waiting: Vec<TaskSummary>,
    pub running: Vec<TaskSummary>,
    pub completed: Vec<TaskSummary>,
}

/// Task counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerStats {
    pub total: usize,
    pub waiting: usize,
    pub running: usize,
    pub completed: usize,
}

/// All runner state. Mutated only while the runner's lock is held.
#[derive(Debug)]
pub struct RunnerState {
    pub(crate) tasks: HashMap<TaskId, Task>,
    pub(crate) waiting: VecDeque<TaskId>,
    pub(crate) running: HashSet<TaskId>,
    pub(crate) completed: Vec<TaskId>,
    pub(crate) counter: u64,
    pub(crate) config: RunnerConfig,
}

impl RunnerState {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            tasks: HashMap::new(),
            waiting: VecDeque::new(),
            running: HashSet::new(),
            completed: Vec::new(),
            counter: 0,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Register a new waiting task at the back of the queue. Does not start it.
    pub fn enqueue(
        &mut self,
        command: &str,
        args: Vec<String>,
        options: TaskOptions,
        now: DateTime<Utc>,
    ) -> Result<TaskId> {
        if command.trim().is_empty() {
            return Err(Error::validation("command must not be empty"));
        }

        self.counter += 1;
        let task = Task::new(self.counter, command.to_string(), args, options, now);
        let id = task.id.clone();

        debug!("Enqueued task {}: {} {:?}", id, task.command, task.args);
        self.tasks.insert(id.clone(), task);
        self.waiting.push_back(id.clone());
        Ok(id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    /// Match one handle interpretation against the registry
    pub fn lookup(&self, handle: &TaskHandle) -> Option<TaskId> {
        match handle {
            TaskHandle::ById(id) => self
                .tasks
                .keys()
                .find(|key| key.as_str() == id)
                .cloned(),
            TaskHandle::ByPid(pid) => self
                .tasks
                .values()
                .filter(|task| task.pid == Some(*pid))
                .min_by_key(|task| task.seq)
                .map(|task| task.id.clone()),
            TaskHandle::ByName(name) => self
                .tasks
                .values()
                .filter(|task| task.name.as_deref() == Some(name.as_str()))
                .min_by_key(|task| task.seq)
                .map(|task| task.id.clone()),
        }
    }

    /// Resolve a raw handle string; first matching interpretation wins
    pub fn resolve(&self, raw: &str) -> Result<TaskId> {
        TaskHandle::candidates(raw)
            .iter()
            .find_map(|handle| self.lookup(handle))
            .ok_or_else(|| Error::not_found(format!("No task matches handle '{}'", raw)))
    }

    /// Move a finished task from running to the end of the history
    pub(crate) fn record_completion(&mut self, id: &TaskId) {
        self.running.remove(id);
        self.waiting.retain(|queued| queued != id);
        self.completed.push(id.clone());
    }

    /// Drop the oldest completed tasks beyond `keep`; returns how many went
    pub fn prune_completed(&mut self, keep: usize) -> usize {
        if self.completed.len() <= keep {
            return 0;
        }
        let excess = self.completed.len() - keep;
        for id in self.completed.drain(..excess) {
            self.tasks.remove(&id);
        }
        debug!("Pruned {} completed tasks", excess);
        excess
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> QueueSnapshot {
        let summarize = |ids: &mut dyn Iterator<Item = &TaskId>| -> Vec<TaskSummary> {
            ids.filter_map(|id| self.tasks.get(id))
                .map(|task| task.summary(now))
                .collect()
        };

        let mut running: Vec<&Task> = self
            .running
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .collect();
        running.sort_by_key(|task| task.seq);

        QueueSnapshot {
            waiting: summarize(&mut self.waiting.iter()),
            running: running.into_iter().map(|task| task.summary(now)).collect(),
            completed: summarize(&mut self.completed.iter()),
        }
    }

    pub fn stats(&self) -> RunnerStats {
        RunnerStats {
            total: self.tasks.len(),
            waiting: self
                .tasks
                .values()
                .filter(|task| task.status == TaskStatus::Waiting)
                .count(),
            running: self.running.len(),
            completed: self.completed.len(),
        }
    }
}
