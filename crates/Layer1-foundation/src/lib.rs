//! # procq-foundation
//!
//! Foundation layer for procq:
//! - Error: shared error type and `Result` alias
//! - Storage: JsonStore (settings files)
//! - Config: RunnerConfig (defaults, file layers, validated runtime updates)

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;

// ============================================================================
// Config
// ============================================================================
pub use config::{ConfigKey, RunnerConfig, RunnerConfigFile, RUNNER_CONFIG_FILE};
