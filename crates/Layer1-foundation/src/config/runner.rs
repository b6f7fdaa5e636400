//! Runner Config - validated runtime configuration for the task runner
//!
//! Sources, lowest to highest priority:
//! 1. built-in defaults
//! 2. global file (`<config_dir>/procq/runner.json`)
//! 3. project file (`./.procq/runner.json`)
//!
//! Runtime updates go through [`RunnerConfig::apply`], which validates one
//! key at a time and leaves the config untouched on failure.
//! [`RunnerConfig::persist`] runs the same check before writing a key into
//! one file layer.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Runner config file name
pub const RUNNER_CONFIG_FILE: &str = "runner.json";

pub const DEFAULT_MAX_RUNNING: usize = 4;
pub const DEFAULT_TERMINATE_GRACE_MS: u64 = 5_000;
pub const DEFAULT_TERMINATE_FORCE_MS: u64 = 2_000;
pub const DEFAULT_LINE_BUFFER_SIZE: usize = 10_000;
pub const DEFAULT_CHAR_BUFFER_SIZE: usize = 20_000;

/// Task runner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Default working directory for tasks without a `cwd` override
    pub path: PathBuf,

    /// Concurrency cap (>= 1)
    pub max_running: usize,

    /// Default per-task timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Wait after the stop signal before escalating to SIGKILL
    pub terminate_grace_ms: u64,

    /// Wait after SIGKILL before giving up on the process
    pub terminate_force_ms: u64,

    /// Retained lines per output stream (>= 1)
    pub line_buffer_size: usize,

    /// Retained raw tail characters per output stream (>= 1)
    pub char_buffer_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_running: DEFAULT_MAX_RUNNING,
            timeout: None,
            terminate_grace_ms: DEFAULT_TERMINATE_GRACE_MS,
            terminate_force_ms: DEFAULT_TERMINATE_FORCE_MS,
            line_buffer_size: DEFAULT_LINE_BUFFER_SIZE,
            char_buffer_size: DEFAULT_CHAR_BUFFER_SIZE,
        }
    }
}

/// Updatable config keys (camelCase on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Path,
    MaxRunning,
    Timeout,
    TerminateGraceMs,
    TerminateForceMs,
    LineBufferSize,
    CharBufferSize,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 7] = [
        ConfigKey::Path,
        ConfigKey::MaxRunning,
        ConfigKey::Timeout,
        ConfigKey::TerminateGraceMs,
        ConfigKey::TerminateForceMs,
        ConfigKey::LineBufferSize,
        ConfigKey::CharBufferSize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::Path => "path",
            ConfigKey::MaxRunning => "maxRunning",
            ConfigKey::Timeout => "timeout",
            ConfigKey::TerminateGraceMs => "terminateGraceMs",
            ConfigKey::TerminateForceMs => "terminateForceMs",
            ConfigKey::LineBufferSize => "lineBufferSize",
            ConfigKey::CharBufferSize => "charBufferSize",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ConfigKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = ConfigKey::ALL.iter().map(|k| k.as_str()).collect();
                Error::validation(format!(
                    "Unknown config key '{}' (expected one of: {})",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// On-disk layer; every field optional so files can override selectively
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_running: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminate_grace_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminate_force_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_buffer_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_buffer_size: Option<usize>,
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Merge global + project files over the defaults
    pub fn load() -> Result<Self> {
        let mut stores = Vec::with_capacity(2);
        if let Ok(global) = JsonStore::global() {
            stores.push(global);
        }
        stores.push(JsonStore::current_project()?);
        Self::load_from(&stores)
    }

    /// Merge the given stores in order (later wins) and validate the result
    pub fn load_from(stores: &[JsonStore]) -> Result<Self> {
        let mut config = Self::new();
        for store in stores {
            if let Some(layer) = store.read::<RunnerConfigFile>(RUNNER_CONFIG_FILE)? {
                debug!("Applying runner config from {}", store.dir().display());
                config.merge(layer, store.dir());
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay present fields; relative paths resolve against `base`
    pub fn merge(&mut self, layer: RunnerConfigFile, base: &Path) {
        if let Some(path) = layer.path {
            self.path = if path.is_absolute() {
                path
            } else {
                base.join(path)
            };
        }
        if let Some(v) = layer.max_running {
            self.max_running = v;
        }
        if let Some(v) = layer.timeout {
            self.timeout = Some(v);
        }
        if let Some(v) = layer.terminate_grace_ms {
            self.terminate_grace_ms = v;
        }
        if let Some(v) = layer.terminate_force_ms {
            self.terminate_force_ms = v;
        }
        if let Some(v) = layer.line_buffer_size {
            self.line_buffer_size = v;
        }
        if let Some(v) = layer.char_buffer_size {
            self.char_buffer_size = v;
        }
    }

    /// Check every invariant at once (used after file loading)
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::validation("path must not be empty"));
        }
        if self.max_running == 0 {
            return Err(Error::validation("maxRunning must be a positive integer"));
        }
        if self.timeout == Some(0) {
            return Err(Error::validation("timeout must be a positive number"));
        }
        if self.line_buffer_size == 0 {
            return Err(Error::validation("lineBufferSize must be a positive integer"));
        }
        if self.char_buffer_size == 0 {
            return Err(Error::validation("charBufferSize must be a positive integer"));
        }
        Ok(())
    }

    // ========================================================================
    // Runtime updates
    // ========================================================================

    /// Validate and apply one key. `Value::Null` clears `timeout`.
    ///
    /// Returns the key that changed so callers can react (e.g. backfill
    /// after `maxRunning` grows).
    pub fn apply(&mut self, key: &str, value: &Value) -> Result<ConfigKey> {
        let key: ConfigKey = key.parse()?;
        let mut next = self.clone();

        match key {
            ConfigKey::Path => next.path = parse_path(value)?,
            ConfigKey::MaxRunning => next.max_running = parse_positive_int(key, value)?,
            ConfigKey::Timeout => next.timeout = parse_timeout(value)?,
            ConfigKey::TerminateGraceMs => {
                next.terminate_grace_ms = parse_non_negative_int(key, value)?
            }
            ConfigKey::TerminateForceMs => {
                next.terminate_force_ms = parse_non_negative_int(key, value)?
            }
            ConfigKey::LineBufferSize => next.line_buffer_size = parse_positive_int(key, value)?,
            ConfigKey::CharBufferSize => next.char_buffer_size = parse_positive_int(key, value)?,
        }

        *self = next;
        Ok(key)
    }

    // ========================================================================
    // Persist
    // ========================================================================

    /// Validate one key like [`apply`](Self::apply) and write it into the
    /// store's file layer, keeping the layer's other keys. A `Null` timeout
    /// removes the key from the file. Returns the written file's path.
    pub fn persist(store: &JsonStore, key: &str, value: &Value) -> Result<PathBuf> {
        let mut layer = store
            .read::<RunnerConfigFile>(RUNNER_CONFIG_FILE)?
            .unwrap_or_default();

        let mut config = Self::new();
        config.merge(layer.clone(), store.dir());
        let key = config.apply(key, value)?;
        layer.set_from(key, &config);

        let path = store.write(RUNNER_CONFIG_FILE, &layer)?;
        info!("Saved {} to {}", key, path.display());
        Ok(path)
    }
}

impl RunnerConfigFile {
    /// Copy one key's value out of a full config
    pub fn set_from(&mut self, key: ConfigKey, config: &RunnerConfig) {
        match key {
            ConfigKey::Path => self.path = Some(config.path.clone()),
            ConfigKey::MaxRunning => self.max_running = Some(config.max_running),
            ConfigKey::Timeout => self.timeout = config.timeout,
            ConfigKey::TerminateGraceMs => {
                self.terminate_grace_ms = Some(config.terminate_grace_ms)
            }
            ConfigKey::TerminateForceMs => {
                self.terminate_force_ms = Some(config.terminate_force_ms)
            }
            ConfigKey::LineBufferSize => self.line_buffer_size = Some(config.line_buffer_size),
            ConfigKey::CharBufferSize => self.char_buffer_size = Some(config.char_buffer_size),
        }
    }
}

fn parse_path(value: &Value) -> Result<PathBuf> {
    let raw = value
        .as_str()
        .ok_or_else(|| Error::validation("path must be a string"))?;
    if raw.trim().is_empty() {
        return Err(Error::validation("path must not be empty"));
    }

    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::Config(format!("Cannot get current directory: {}", e)))?;
    Ok(cwd.join(path))
}

fn parse_positive_int(key: ConfigKey, value: &Value) -> Result<usize> {
    match value.as_u64() {
        Some(n) if n > 0 => usize::try_from(n)
            .map_err(|_| Error::validation(format!("{} is out of range", key))),
        _ => Err(Error::validation(format!(
            "{} must be a positive integer, got {}",
            key, value
        ))),
    }
}

fn parse_non_negative_int(key: ConfigKey, value: &Value) -> Result<u64> {
    value.as_u64().ok_or_else(|| {
        Error::validation(format!(
            "{} must be a non-negative integer, got {}",
            key, value
        ))
    })
}

fn parse_timeout(value: &Value) -> Result<Option<u64>> {
    if value.is_null() {
        return Ok(None);
    }
    match value.as_f64() {
        Some(ms) if ms > 0.0 && ms.is_finite() => Ok(Some(ms.ceil() as u64)),
        _ => Err(Error::validation(format!(
            "timeout must be a positive number, got {}",
            value
        ))),
    }
}
