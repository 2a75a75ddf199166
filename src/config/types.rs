//! Struct definitions and serde defaults for octool configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AI_NAME, DEFAULT_ENDPOINT, DEFAULT_LANGUAGE, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
};
use crate::error::ConfigError;

/// Root of `config.toml`: the default selector, global settings, and every
/// named configuration in insertion order.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct StoreFile {
    /// Id of the configuration used when no selector is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_config: Option<String>,
    /// Settings shared by all configurations.
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub configs: Vec<Configuration>,
}

/// Settings that apply regardless of the active configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    /// Bound on a single provider call, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// History compression settings.
    #[serde(default)]
    pub compaction: CompactionConfig,
}

/// Configuration for LLM-based history compression.
///
/// Controls when and how octool summarizes old turns to keep the outgoing
/// context under the configuration's token budget.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompactionConfig {
    /// Whether automatic compression is enabled at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    /// Fraction (0.0–1.0) of the context budget at which compression triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Number of most-recent turns kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_recent: Option<usize>,
}

/// A named set of credentials, model, and preferences.
///
/// An empty `id` marks a draft; the store assigns the next free
/// `Prompt_NNN` id on create.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Configuration {
    #[serde(default)]
    pub id: String,
    /// Fallback display name when no per-language name matches.
    #[serde(default)]
    pub name: String,
    /// API key, may contain `{env:VAR}` placeholders.
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub model: String,
    /// Preferred UI language code (e.g. `en-US`).
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Name the assistant is shown under.
    #[serde(default = "default_ai_name")]
    pub ai_name: String,
    #[serde(default)]
    pub system_prompt: String,
    /// Persist turns to the durable history log.
    #[serde(default = "default_true")]
    pub history: bool,
    /// Compress history automatically when the budget fills up.
    #[serde(default = "default_true")]
    pub summary: bool,
    /// Context budget in tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Render replies with markdown-lite formatting.
    #[serde(default = "default_true")]
    pub markdown: bool,
    /// Print replies as they arrive instead of all at once.
    #[serde(default = "default_true")]
    pub stream: bool,
    /// Display name per language code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub names: BTreeMap<String, String>,
    /// Welcome message per language code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub welcome: BTreeMap<String, String>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_ai_name() -> String {
    DEFAULT_AI_NAME.to_string()
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_true() -> bool {
    true
}

impl Configuration {
    /// Creates a draft with the required fields set and everything else defaulted.
    pub fn draft(
        credential: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            credential: credential.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            language: default_language(),
            aliases: Vec::new(),
            ai_name: default_ai_name(),
            system_prompt: String::new(),
            history: true,
            summary: true,
            max_tokens: DEFAULT_MAX_TOKENS,
            markdown: true,
            stream: true,
            names: BTreeMap::new(),
            welcome: BTreeMap::new(),
        }
    }

    /// Display name for `language`: per-language name, then `name`, then `None`.
    pub fn display_name(&self, language: &str) -> Option<&str> {
        self.names
            .get(language)
            .map(String::as_str)
            .or_else(|| Some(self.name.as_str()))
            .filter(|n| !n.is_empty())
    }

    /// Welcome message for `language`, if one was configured.
    pub fn welcome_message(&self, language: &str) -> Option<&str> {
        self.welcome
            .get(language)
            .or_else(|| self.welcome.values().next())
            .map(String::as_str)
            .filter(|w| !w.is_empty())
    }

    /// Whether `selector` names this configuration by id or alias.
    pub fn matches(&self, selector: &str) -> bool {
        self.id == selector || self.aliases.iter().any(|a| a == selector)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::draft("", DEFAULT_ENDPOINT, DEFAULT_MODEL)
    }
}

/// Partial update applied by `ConfigStore::update`.
///
/// `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub name: Option<String>,
    pub credential: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub aliases: Option<Vec<String>>,
    pub ai_name: Option<String>,
    pub system_prompt: Option<String>,
    pub history: Option<bool>,
    pub summary: Option<bool>,
    pub max_tokens: Option<usize>,
    pub markdown: Option<bool>,
    pub stream: Option<bool>,
    /// `(language, text)` pair stored in `welcome`.
    pub welcome: Option<(String, String)>,
}

impl ConfigPatch {
    /// Field names accepted by [`ConfigPatch::from_field`].
    pub const FIELDS: &'static [&'static str] = &[
        "name",
        "credential",
        "endpoint",
        "model",
        "language",
        "aliases",
        "ai_name",
        "system_prompt",
        "history",
        "summary",
        "max_tokens",
        "markdown",
        "stream",
        "welcome",
    ];

    /// Builds a single-field patch from `/config edit` arguments.
    ///
    /// `language` keys the per-language `welcome` entry.
    pub fn from_field(field: &str, value: &str, language: &str) -> Result<Self, ConfigError> {
        let mut patch = Self::default();
        match field {
            "name" => patch.name = Some(value.to_string()),
            "credential" => patch.credential = Some(value.to_string()),
            "endpoint" => patch.endpoint = Some(value.to_string()),
            "model" => patch.model = Some(value.to_string()),
            "language" => patch.language = Some(value.to_string()),
            "aliases" => patch.aliases = Some(parse_aliases(value)),
            "ai_name" => patch.ai_name = Some(value.to_string()),
            "system_prompt" => patch.system_prompt = Some(value.to_string()),
            "history" => patch.history = Some(parse_flag(field, value)?),
            "summary" => patch.summary = Some(parse_flag(field, value)?),
            "markdown" => patch.markdown = Some(parse_flag(field, value)?),
            "stream" => patch.stream = Some(parse_flag(field, value)?),
            "max_tokens" => {
                patch.max_tokens = Some(parse_token_value(value).ok_or_else(|| {
                    ConfigError::Validation(format!("max_tokens: not a token count: {value}"))
                })?)
            }
            "welcome" => patch.welcome = Some((language.to_string(), value.to_string())),
            other => {
                return Err(ConfigError::Validation(format!(
                    "unknown field '{}' (expected one of: {})",
                    other,
                    Self::FIELDS.join(", ")
                )))
            }
        }
        Ok(patch)
    }

    /// Applies the patch in place.
    pub fn apply(&self, cfg: &mut Configuration) {
        if let Some(ref v) = self.name {
            cfg.name = v.clone();
        }
        if let Some(ref v) = self.credential {
            cfg.credential = v.clone();
        }
        if let Some(ref v) = self.endpoint {
            cfg.endpoint = v.clone();
        }
        if let Some(ref v) = self.model {
            cfg.model = v.clone();
        }
        if let Some(ref v) = self.language {
            cfg.language = v.clone();
        }
        if let Some(ref v) = self.aliases {
            cfg.aliases = v.clone();
        }
        if let Some(ref v) = self.ai_name {
            cfg.ai_name = v.clone();
        }
        if let Some(ref v) = self.system_prompt {
            cfg.system_prompt = v.clone();
        }
        if let Some(v) = self.history {
            cfg.history = v;
        }
        if let Some(v) = self.summary {
            cfg.summary = v;
        }
        if let Some(v) = self.max_tokens {
            cfg.max_tokens = v;
        }
        if let Some(v) = self.markdown {
            cfg.markdown = v;
        }
        if let Some(v) = self.stream {
            cfg.stream = v;
        }
        if let Some((ref lang, ref text)) = self.welcome {
            cfg.welcome.insert(lang.clone(), text.clone());
        }
    }
}

/// Splits a comma-separated alias list, dropping blanks.
pub fn parse_aliases(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

/// Parses a token count, accepting a `K`/`k` suffix (`64K` = 64000, `1.5k` = 1500).
pub fn parse_token_value(input: &str) -> Option<usize> {
    let input = input.trim().to_uppercase();
    if let Some(number) = input.strip_suffix('K') {
        let value: f64 = number.trim().parse().ok()?;
        if value.is_finite() && value > 0.0 {
            return Some((value * 1000.0) as usize);
        }
        return None;
    }
    input.parse().ok().filter(|v| *v > 0)
}

/// Parses yes/no style flags used by `/config edit` and the setup wizard.
pub fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "y" | "1" => Ok(true),
        "off" | "false" | "no" | "n" | "0" => Ok(false),
        other => Err(ConfigError::Validation(format!(
            "{field}: expected on/off, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_value() {
        assert_eq!(parse_token_value("64K"), Some(64_000));
        assert_eq!(parse_token_value("1.5k"), Some(1_500));
        assert_eq!(parse_token_value(" 4096 "), Some(4_096));
        assert_eq!(parse_token_value("0"), None);
        assert_eq!(parse_token_value("lots"), None);
        assert_eq!(parse_token_value("-2k"), None);
    }

    #[test]
    fn test_parse_aliases_drops_blanks() {
        assert_eq!(parse_aliases("ds, work ,,"), vec!["ds", "work"]);
        assert!(parse_aliases("  ").is_empty());
    }

    #[test]
    fn test_display_name_prefers_language_then_name() {
        let mut cfg = Configuration::draft("k", DEFAULT_ENDPOINT, DEFAULT_MODEL);
        assert_eq!(cfg.display_name("en-US"), None);
        cfg.name = "Work".into();
        assert_eq!(cfg.display_name("en-US"), Some("Work"));
        cfg.names.insert("zh-CN".into(), "工作".into());
        assert_eq!(cfg.display_name("zh-CN"), Some("工作"));
        assert_eq!(cfg.display_name("en-US"), Some("Work"));
    }

    #[test]
    fn test_patch_from_field() {
        let patch = ConfigPatch::from_field("max_tokens", "32k", "en-US").unwrap();
        assert_eq!(patch.max_tokens, Some(32_000));

        let patch = ConfigPatch::from_field("aliases", "a,b", "en-US").unwrap();
        let mut cfg = Configuration::default();
        patch.apply(&mut cfg);
        assert_eq!(cfg.aliases, vec!["a", "b"]);

        let patch = ConfigPatch::from_field("welcome", "Hi!", "en-US").unwrap();
        patch.apply(&mut cfg);
        assert_eq!(cfg.welcome_message("en-US"), Some("Hi!"));

        assert!(matches!(
            ConfigPatch::from_field("colour", "red", "en-US"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            ConfigPatch::from_field("markdown", "maybe", "en-US"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_configuration_toml_defaults() {
        let cfg: Configuration = toml::from_str(
            r#"
id = "Prompt_000"
credential = "sk-test"
endpoint = "https://api.example.com"
model = "m"
"#,
        )
        .unwrap();
        assert_eq!(cfg.language, DEFAULT_LANGUAGE);
        assert_eq!(cfg.ai_name, DEFAULT_AI_NAME);
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(cfg.history && cfg.summary && cfg.markdown && cfg.stream);
    }
}
