//! Files under `source/_notion` that carry state between runs.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SyncError;
use crate::fsutil::write_atomic;
use crate::tree::TreeSnapshot;

/// Bump when rendered output changes shape so every page is rewritten.
pub const CONVERTER_VERSION: u32 = 1;

const TREE_FILE: &str = "tree.yml";
const STATE_FILE: &str = "state.yml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterState {
    #[serde(default)]
    pub converter_version: u32,
}

impl ConverterState {
    pub fn current() -> Self {
        Self {
            converter_version: CONVERTER_VERSION,
        }
    }

    pub fn is_outdated(&self) -> bool {
        self.converter_version < CONVERTER_VERSION
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn tree_path(&self) -> PathBuf {
        self.dir.join(TREE_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Previous generation; empty when absent or unreadable.
    pub fn load_snapshot(&self) -> TreeSnapshot {
        load_or_default(&self.tree_path(), "tree snapshot")
    }

    pub fn save_snapshot(&self, snapshot: &TreeSnapshot) -> Result<(), SyncError> {
        save(&self.tree_path(), snapshot)
    }

    pub fn load_converter(&self) -> ConverterState {
        load_or_default(&self.state_path(), "converter state")
    }

    pub fn save_converter(&self, state: &ConverterState) -> Result<(), SyncError> {
        save(&self.state_path(), state)
    }
}

fn load_or_default<T: Default + for<'de> Deserialize<'de>>(path: &Path, what: &str) -> T {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No previous {what}, starting empty");
            return T::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read {what}, starting empty");
            return T::default();
        }
    };
    serde_yaml::from_str(&text).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Corrupt {what}, starting empty");
        T::default()
    })
}

fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), SyncError> {
    let to_state_error = |source| SyncError::State {
        path: path.to_path_buf(),
        source,
    };
    let text = serde_yaml::to_string(value).map_err(|e| to_state_error(io::Error::other(e)))?;
    write_atomic(path, text.as_bytes()).map_err(to_state_error)
}
