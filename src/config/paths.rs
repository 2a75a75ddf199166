//! XDG path resolution for octool configuration, data and cache directories.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::constants::{
    APP_NAME, ARCHIVE_DIRNAME, CONFIG_FILENAME, HISTORY_DIRNAME, HOME_ENV_VAR,
    READLINE_HISTORY_FILENAME,
};

/// Every on-disk location octool touches.
#[derive(Debug, Clone, PartialEq)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Paths {
    /// Resolves directories from `OCTOOL_HOME` when set, otherwise the
    /// platform's XDG locations (`~/.config/octool`, `~/.local/share/octool`,
    /// `~/.cache/octool` on Linux).
    ///
    /// # Errors
    ///
    /// Returns an error if a platform directory cannot be determined.
    pub fn resolve() -> Result<Self> {
        if let Some(root) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(Self::under(Path::new(&root)));
        }
        Ok(Self {
            config_dir: dirs::config_dir()
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
                .join(APP_NAME),
            data_dir: dirs::data_dir()
                .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
                .join(APP_NAME),
            cache_dir: dirs::cache_dir()
                .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
                .join(APP_NAME),
        })
    }

    /// Lays all three directories out under a single root.
    pub fn under(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
        }
    }

    /// `config.toml` inside the config directory.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }

    /// Directory holding one JSONL log per configuration.
    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join(HISTORY_DIRNAME)
    }

    /// Durable history log for a configuration id.
    pub fn history_file(&self, config_id: &str) -> PathBuf {
        self.history_dir().join(format!("{config_id}.jsonl"))
    }

    /// Where `/new` moves retired logs.
    pub fn archive_dir(&self) -> PathBuf {
        self.history_dir().join(ARCHIVE_DIRNAME)
    }

    /// Readline input history.
    pub fn readline_history(&self) -> PathBuf {
        self.cache_dir.join(READLINE_HISTORY_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_root() {
        let paths = Paths::under(Path::new("/tmp/oc"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/oc/config/config.toml"));
        assert_eq!(
            paths.history_file("Prompt_000"),
            PathBuf::from("/tmp/oc/data/history/Prompt_000.jsonl")
        );
        assert_eq!(paths.archive_dir(), PathBuf::from("/tmp/oc/data/history/archive"));
        assert_eq!(
            paths.readline_history(),
            PathBuf::from("/tmp/oc/cache/input_history.txt")
        );
    }
}
