//! Config - runner configuration
//!
//! - `runner.rs` - RunnerConfig defaults, file layers, validated updates

mod runner;

pub use runner::{
    ConfigKey, RunnerConfig, RunnerConfigFile, DEFAULT_CHAR_BUFFER_SIZE,
    DEFAULT_LINE_BUFFER_SIZE, DEFAULT_MAX_RUNNING, DEFAULT_TERMINATE_FORCE_MS,
    DEFAULT_TERMINATE_GRACE_MS, RUNNER_CONFIG_FILE,
};
