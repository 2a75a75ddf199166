//! File loading and atomic persistence for the configuration store.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use super::types::StoreFile;
use super::{check_id, ConfigStore};
use crate::error::ConfigError;
use crate::storage::atomic_write;

impl ConfigStore {
    /// Opens the store at `path`.
    ///
    /// A missing file yields an empty store (first run). A file that cannot
    /// be read or parsed, that repeats an id or holds an id unusable as a
    /// history file name, is a `CorruptStore` error;
    /// octool never overwrites a file it could not understand.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, starting empty");
            return Ok(Self {
                path,
                file: StoreFile::default(),
            });
        }

        let contents = fs::read_to_string(&path).map_err(|e| ConfigError::CorruptStore {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let mut file: StoreFile =
            toml::from_str(&contents).map_err(|e| ConfigError::CorruptStore {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let mut seen = HashSet::new();
        for cfg in &file.configs {
            if let Err(e) = check_id(&cfg.id) {
                return Err(ConfigError::CorruptStore {
                    path,
                    reason: e.to_string(),
                });
            }
            if !seen.insert(cfg.id.as_str()) {
                return Err(ConfigError::CorruptStore {
                    path,
                    reason: format!("duplicate configuration id '{}'", cfg.id),
                });
            }
        }

        if let Some(ref default) = file.default_config {
            if !file.configs.iter().any(|c| &c.id == default) {
                tracing::warn!(default = %default, "default configuration does not exist, ignoring");
                file.default_config = None;
            }
        }

        tracing::debug!(path = %path.display(), configs = file.configs.len(), "loaded configuration store");
        Ok(Self { path, file })
    }

    /// Writes `next` to disk and adopts it only once the write succeeded.
    pub(super) fn commit(&mut self, next: StoreFile) -> Result<(), ConfigError> {
        let text =
            toml::to_string_pretty(&next).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        atomic_write(&self.path, text.as_bytes())?;
        self.file = next;
        Ok(())
    }
}
