//! # procq-task
//!
//! Process task runner for procq.
//! Queues shell commands, runs them under a concurrency cap and keeps
//! their output in bounded, pageable buffers.
//!
//! ## Features
//!
//! - FIFO admission with a live-adjustable `maxRunning` cap
//! - Per-stream line and character bounded output capture
//! - Page and range queries over absolute line numbers
//! - Stop with signal escalation (SIGTERM, then SIGKILL)
//! - Per-task timeouts, working directory and environment overrides

pub mod buffer;
pub mod clock;
pub mod executor;
mod launcher;
pub mod pagination;
pub mod registry;
pub mod runner;
pub mod state;
pub mod task;
pub mod termination;

// Runner
pub use runner::TaskRunner;
pub use registry::{QueueSnapshot, RunnerState, RunnerStats, TaskHandle};

// Tasks
pub use state::TaskStatus;
pub use task::{EnqueueReceipt, StopOutcome, StreamKind, Task, TaskId, TaskOptions, TaskSummary};

// Output
pub use buffer::{BufferLimits, OutputBuffer};
pub use pagination::{PageResult, PageSelector};

// Processes
pub use clock::{Clock, SystemClock};
pub use executor::{
    ExitOutcome, LocalSpawner, OutputStream, ProcessSpawner, Signal, SpawnRequest, SpawnedProcess,
};
pub use termination::{EscalationOutcome, EscalationPlan};
