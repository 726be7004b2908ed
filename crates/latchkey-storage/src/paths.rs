//! File system paths for the profile directory.

use std::fs;
use std::path::PathBuf;

use crate::{StorageError, StorageResult};

/// Filesystem layout for the profile directory.
///
/// All persistent state lives under a single base directory, `~/.latchkey`
/// by default. Tests point this at a temporary directory instead.
#[derive(Debug, Clone)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Creates paths rooted at the default base directory.
    pub fn new() -> StorageResult<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            StorageError::Unavailable("Could not determine home directory".to_string())
        })?;
        Ok(Self {
            base_dir: home.join(".latchkey"),
        })
    }

    /// Creates paths rooted at a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// The base directory holding all persistent state.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// The session store document.
    pub fn store_file(&self) -> PathBuf {
        self.base_dir.join("session-store.json")
    }

    /// The engine configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Creates the base directory if it does not exist.
    pub fn ensure_dirs(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().expect("Failed to determine home directory")
    }
}
