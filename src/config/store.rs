//! Persisted settings
//!
//! A tiny key-value store for values the user changes from inside the chat.
//! Only the webhook URL lives here today.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::{Error, Result};

/// Key holding the user's webhook URL
pub const WEBHOOK_URL_KEY: &str = "tax-assistant-webhook-url";

/// Key-value storage for user settings
pub trait SettingsStore: Send + Sync {
    /// Read a value
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be read
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be written
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be written
    fn remove(&self, key: &str) -> Result<()>;
}

/// Settings kept as a JSON object in a file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Use `path` as the backing file; it is created on first write
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `settings.json` inside `data_dir`
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("settings.json"))
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::Storage(format!("{} is not a settings file: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(values)?)?;
        Ok(())
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)?;
        tracing::debug!(key, path = %self.path.display(), "saved setting");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
            tracing::debug!(key, "removed setting");
        }
        Ok(())
    }
}

/// Settings held in memory only
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
