//! Error types for procq

use thiserror::Error;

/// Result alias used across procq crates
pub type Result<T> = std::result::Result<T, Error>;

/// procq error
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Task / process
    // ========================================================================
    #[error("Task error: {0}")]
    Task(String),

    /// The process survived SIGKILL and the force window
    #[error("Process {pid} did not exit after SIGKILL")]
    Unresponsive { pid: u32 },

    // ========================================================================
    // General
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // ========================================================================
    // External conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors the caller can fix by changing its request
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Validation(_))
    }

    /// Validation error helper
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Not-found error helper
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }
}
