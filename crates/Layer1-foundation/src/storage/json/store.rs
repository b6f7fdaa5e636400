//! Settings directory holding JSON files
//!
//! A missing file is not an error: callers get `None` and fall back to
//! defaults. Writes go through a sibling temp file and a rename so a
//! reader never sees a half-written file.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used for both global and project settings
pub const APP_DIR: &str = "procq";

/// One settings directory (global or per project)
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<config_dir>/procq/`
    pub fn global() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))?;
        Ok(Self::new(dir.join(APP_DIR)))
    }

    /// `<root>/.procq/`
    pub fn project(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(format!(".{}", APP_DIR)))
    }

    pub fn current_project() -> Result<Self> {
        Ok(Self::project(std::env::current_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Parse `file`, or `None` when it does not exist
    pub fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.dir.join(file);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!("Read {}", path.display());
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Replace `file` with the pretty-printed value; returns its path
    pub fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(value)?;

        let path = self.dir.join(file);
        let staging = self.dir.join(format!(".{}.tmp", file));
        std::fs::write(&staging, content)?;
        std::fs::rename(&staging, &path)?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }
}
