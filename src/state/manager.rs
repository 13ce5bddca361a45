//! Checkpoint manager implementation
//!
//! Keeps named [`StateBlob`]s in a JSON file with atomic writes.

use super::blob::StateBlob;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// On-disk checkpoint file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoints {
    /// Exported states by name
    #[serde(default)]
    pub listings: BTreeMap<String, JsonValue>,
}

/// Checkpoint manager for persisting and loading exported states
#[derive(Debug)]
pub struct StateManager {
    /// Path to the checkpoint file
    path: PathBuf,
    /// Current checkpoints (cached)
    checkpoints: Arc<RwLock<Checkpoints>>,
    /// Whether to save on every update
    auto_save: bool,
}

impl StateManager {
    /// Create a new manager with the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            checkpoints: Arc::new(RwLock::new(Checkpoints::default())),
            auto_save: true,
        }
    }

    /// Create a manager with auto-save disabled
    pub fn without_auto_save(path: impl AsRef<Path>) -> Self {
        Self {
            auto_save: false,
            ..Self::new(path)
        }
    }

    /// Create an in-memory manager (no file persistence)
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            checkpoints: Arc::new(RwLock::new(Checkpoints::default())),
            auto_save: false,
        }
    }

    /// Create a manager from a file, loading existing checkpoints if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let checkpoints = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read checkpoint file: {e}")))?;
            parse_checkpoints(&contents)?
        } else {
            Checkpoints::default()
        };

        Ok(Self {
            path,
            checkpoints: Arc::new(RwLock::new(checkpoints)),
            auto_save: true,
        })
    }

    /// Reload checkpoints from file
    pub async fn load(&self) -> Result<()> {
        if self.is_in_memory() || !self.path.exists() {
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to read checkpoint file: {e}")))?;
        let loaded = parse_checkpoints(&contents)?;

        *self.checkpoints.write().await = loaded;
        Ok(())
    }

    /// Save current checkpoints to file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        let contents = {
            let checkpoints = self.checkpoints.read().await;
            serde_json::to_string_pretty(&*checkpoints)
                .map_err(|e| Error::state(format!("Failed to serialize checkpoints: {e}")))?
        };

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write checkpoint file: {e}")))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename checkpoint file: {e}")))?;

        debug!(path = %self.path.display(), "Saved checkpoints");
        Ok(())
    }

    /// Store an exported state under a name, replacing any previous one
    pub async fn put(&self, name: &str, blob: &StateBlob) -> Result<()> {
        let value = blob.to_value()?;
        self.checkpoints
            .write()
            .await
            .listings
            .insert(name.to_string(), value);

        if self.auto_save {
            self.save().await?;
        }
        Ok(())
    }

    /// Exported state stored under a name
    pub async fn get(&self, name: &str) -> Result<Option<StateBlob>> {
        let checkpoints = self.checkpoints.read().await;
        checkpoints
            .listings
            .get(name)
            .map(StateBlob::from_value)
            .transpose()
    }

    /// Remove a checkpoint, returning whether it existed
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let removed = self
            .checkpoints
            .write()
            .await
            .listings
            .remove(name)
            .is_some();

        if removed && self.auto_save {
            self.save().await?;
        }
        Ok(removed)
    }

    /// Names of all checkpoints, sorted
    pub async fn names(&self) -> Vec<String> {
        self.checkpoints
            .read()
            .await
            .listings
            .keys()
            .cloned()
            .collect()
    }

    /// Remove every checkpoint
    pub async fn clear(&self) -> Result<()> {
        *self.checkpoints.write().await = Checkpoints::default();

        if self.auto_save {
            self.save().await?;
        }
        Ok(())
    }

    /// Get the checkpoint file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            checkpoints: Arc::clone(&self.checkpoints),
            auto_save: self.auto_save,
        }
    }
}

fn parse_checkpoints(contents: &str) -> Result<Checkpoints> {
    serde_json::from_str(contents)
        .map_err(|e| Error::state(format!("Failed to parse checkpoint file: {e}")))
}
