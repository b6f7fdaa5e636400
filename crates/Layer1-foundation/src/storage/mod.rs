//! Storage module for procq
//!
//! - `json`: settings directories holding JSON files (read, atomic write)

mod json;

pub use json::{JsonStore, APP_DIR};
