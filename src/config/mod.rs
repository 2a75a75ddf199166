//! Configuration store for octool.
//!
//! octool keeps every named configuration in one TOML file at the platform's
//! XDG config path (e.g. `~/.config/octool/config.toml` on Linux). The store
//! hands out clones, so callers never hold a reference into its state, and
//! every mutation rewrites the whole file atomically before it is adopted in
//! memory.

mod loader;
mod paths;
mod resolve;
mod types;


pub use paths::Paths;
pub use resolve::resolve_str;
pub use types::{
    parse_aliases, parse_flag, parse_token_value, CompactionConfig, ConfigPatch, Configuration,
    Settings, StoreFile,
};

use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_ID_LIMIT, CONFIG_ID_PREFIX};
use crate::error::ConfigError;
use crate::i18n;
use crate::provider::{CompletionProvider, CredentialStatus, ModelConfig};

/// The persisted set of configurations.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    file: StoreFile,
}

impl ConfigStore {
    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.file.configs.is_empty()
    }

    pub fn settings(&self) -> &Settings {
        &self.file.settings
    }

    /// Every configuration, in insertion order.
    pub fn list(&self) -> Vec<Configuration> {
        self.file.configs.clone()
    }

    /// Looks a configuration up by id, then by alias.
    pub fn get(&self, id_or_alias: &str) -> Result<Configuration, ConfigError> {
        self.find(id_or_alias)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(id_or_alias.to_string()))
    }

    fn find(&self, id_or_alias: &str) -> Option<&Configuration> {
        self.file
            .configs
            .iter()
            .find(|c| c.id == id_or_alias)
            .or_else(|| {
                self.file
                    .configs
                    .iter()
                    .find(|c| c.aliases.iter().any(|a| a == id_or_alias))
            })
    }

    /// Id of the default configuration, if one is set.
    pub fn default_id(&self) -> Option<&str> {
        self.file.default_config.as_deref()
    }

    /// The default configuration, falling back to the first one stored.
    pub fn default_config(&self) -> Option<Configuration> {
        self.default_id()
            .and_then(|id| self.find(id))
            .or_else(|| self.file.configs.first())
            .cloned()
    }

    /// First free `Prompt_NNN` id.
    pub fn next_id(&self) -> Result<String, ConfigError> {
        (0..CONFIG_ID_LIMIT)
            .map(|n| format!("{CONFIG_ID_PREFIX}{n:03}"))
            .find(|id| self.find(id).is_none())
            .ok_or_else(|| ConfigError::Validation("no free configuration id left".to_string()))
    }

    /// Validates and stores a new configuration.
    ///
    /// An empty `draft.id` is replaced with [`ConfigStore::next_id`]. The
    /// first configuration created becomes the default.
    pub fn create(&mut self, mut draft: Configuration) -> Result<Configuration, ConfigError> {
        if draft.id.trim().is_empty() {
            draft.id = self.next_id()?;
        }
        self.check_new(&draft)?;

        let mut next = self.file.clone();
        if next.default_config.is_none() {
            next.default_config = Some(draft.id.clone());
        }
        next.configs.push(draft.clone());
        self.commit(next)?;
        tracing::info!(id = %draft.id, "configuration created");
        Ok(draft)
    }

    /// Applies `patch` to the configuration named by `id` (or alias).
    pub fn update(&mut self, id: &str, patch: &ConfigPatch) -> Result<Configuration, ConfigError> {
        let current = self.get(id)?;
        let mut updated = current.clone();
        patch.apply(&mut updated);
        self.validate(&updated, Some(&current.id))?;

        let mut next = self.file.clone();
        if let Some(slot) = next.configs.iter_mut().find(|c| c.id == current.id) {
            *slot = updated.clone();
        }
        self.commit(next)?;
        tracing::info!(id = %updated.id, "configuration updated");
        Ok(updated)
    }

    /// Removes a configuration.
    ///
    /// `active` is the id of the session's configuration; deleting it
    /// requires a `replacement` that exists and differs from `id`.
    pub fn delete(
        &mut self,
        id: &str,
        active: Option<&str>,
        replacement: Option<&str>,
    ) -> Result<(), ConfigError> {
        let target = self.get(id)?;
        let replacement = match replacement {
            Some(r) => {
                let r = self.get(r)?;
                if r.id == target.id {
                    return Err(ConfigError::Validation(
                        "replacement must differ from the deleted configuration".to_string(),
                    ));
                }
                Some(r.id)
            }
            None => None,
        };
        if active == Some(target.id.as_str()) && replacement.is_none() {
            return Err(ConfigError::InUse(target.id));
        }

        let mut next = self.file.clone();
        next.configs.retain(|c| c.id != target.id);
        if next.default_config.as_deref() == Some(target.id.as_str()) {
            next.default_config = replacement
                .clone()
                .or_else(|| next.configs.first().map(|c| c.id.clone()));
        }
        self.commit(next)?;
        tracing::info!(id = %target.id, replacement = ?replacement, "configuration deleted");
        Ok(())
    }

    /// Makes `id` (or alias) the default configuration.
    pub fn set_default(&mut self, id: &str) -> Result<Configuration, ConfigError> {
        let cfg = self.get(id)?;
        let mut next = self.file.clone();
        next.default_config = Some(cfg.id.clone());
        self.commit(next)?;
        Ok(cfg)
    }

    /// Checks `cfg`'s credential against the provider.
    pub async fn validate_credential(
        &self,
        cfg: &Configuration,
        provider: &dyn CompletionProvider,
    ) -> CredentialStatus {
        let model = ModelConfig::from_configuration(cfg);
        let status =
            CredentialStatus::from(provider.validate_credential(&model, self.settings().timeout()).await);
        tracing::info!(id = %cfg.id, status = ?status, "credential validation");
        status
    }

    /// Checks a configuration about to be created without storing it.
    pub fn check_new(&self, cfg: &Configuration) -> Result<(), ConfigError> {
        if self.file.configs.iter().any(|c| c.id == cfg.id) {
            return Err(ConfigError::Validation(format!("id '{}' already exists", cfg.id)));
        }
        self.validate(cfg, None)
    }

    /// Checks that `aliases` are well formed and collide with no other
    /// configuration's id or alias. `id` is the owner's id.
    pub fn check_aliases(&self, id: &str, aliases: &[String]) -> Result<(), ConfigError> {
        self.check_names(id, aliases, Some(id))
    }

    /// Checks required fields, URL shape and id/alias uniqueness.
    ///
    /// `exclude` is the id of the configuration being replaced, which must
    /// not collide with itself.
    fn validate(&self, cfg: &Configuration, exclude: Option<&str>) -> Result<(), ConfigError> {
        check_id(&cfg.id)?;
        for (field, value) in [
            ("endpoint", &cfg.endpoint),
            ("credential", &cfg.credential),
            ("model", &cfg.model),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{field} is required")));
            }
        }
        check_endpoint(&cfg.resolved_endpoint())?;
        if cfg.max_tokens == 0 {
            return Err(ConfigError::Validation("max_tokens must be positive".to_string()));
        }
        if !i18n::is_supported(&cfg.language) {
            return Err(ConfigError::Validation(format!(
                "unsupported language '{}'",
                cfg.language
            )));
        }
        self.check_names(&cfg.id, &cfg.aliases, exclude)
    }

    fn check_names(
        &self,
        id: &str,
        aliases: &[String],
        exclude: Option<&str>,
    ) -> Result<(), ConfigError> {
        let others: Vec<&Configuration> = self
            .file
            .configs
            .iter()
            .filter(|c| Some(c.id.as_str()) != exclude)
            .collect();
        if others.iter().any(|c| c.aliases.iter().any(|a| a == id)) {
            return Err(ConfigError::Validation(format!(
                "id '{id}' is already used as an alias"
            )));
        }
        for (i, alias) in aliases.iter().enumerate() {
            if alias.is_empty() || alias.chars().any(char::is_whitespace) {
                return Err(ConfigError::Validation(format!("invalid alias '{alias}'")));
            }
            if alias == id || aliases[..i].contains(alias) {
                return Err(ConfigError::Validation(format!("alias '{alias}' is repeated")));
            }
            if others.iter().any(|c| c.matches(alias)) {
                return Err(ConfigError::Validation(format!(
                    "alias '{alias}' is already in use"
                )));
            }
        }
        Ok(())
    }
}

/// Checks that `id` is usable as a file name inside the history directory:
/// ASCII letters, digits, `_`, `-` and `.`, not starting with a dot.
pub fn check_id(id: &str) -> Result<(), ConfigError> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "invalid id '{id}': use letters, digits, '_', '-' or '.', not starting with '.'"
        )))
    }
}

/// Checks that `endpoint` is an http(s) URL.
pub fn check_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    match reqwest::Url::parse(endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(ConfigError::Validation(format!(
            "endpoint scheme '{}' is not http(s)",
            url.scheme()
        ))),
        Err(e) => Err(ConfigError::Validation(format!(
            "endpoint '{endpoint}' is not a URL: {e}"
        ))),
    }
}
