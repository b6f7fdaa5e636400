//! Process spawners
//!
//! - `LocalSpawner` - real child processes via `tokio::process`
//! - `ProcessSpawner` - the seam the launcher and termination code use,
//!   so tests can substitute an in-memory double

pub mod local;
pub mod signal;
pub mod r#trait;

#[cfg(test)]
pub(crate) mod scripted;

pub use local::LocalSpawner;
pub use r#trait::{ExitOutcome, OutputStream, ProcessSpawner, SpawnRequest, SpawnedProcess};
pub use signal::Signal;
