//! UI string packs.
//!
//! Packs are JSON documents compiled into the binary, addressed with dotted
//! keys (`config.switched`) and interpolated with `{name}` placeholders.
//! A key missing from the active pack falls back to `en-US`, then to the
//! key itself.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::Value;

/// Language used when a key is missing from the active pack.
pub const FALLBACK_LANGUAGE: &str = "en-US";

/// Every bundled pack: `(code, source)`.
const SOURCES: &[(&str, &str)] = &[
    ("en-US", include_str!("en-US.json")),
    ("zh-CN", include_str!("zh-CN.json")),
];

static PACKS: LazyLock<HashMap<&'static str, Value>> = LazyLock::new(|| {
    SOURCES
        .iter()
        .map(|(code, source)| {
            let value = serde_json::from_str(source).unwrap_or_else(|e| {
                tracing::warn!(language = code, error = %e, "language pack failed to parse");
                Value::Null
            });
            (*code, value)
        })
        .collect()
});

/// Codes of all bundled packs with their native names, in display order.
pub fn available() -> Vec<(&'static str, String)> {
    SOURCES
        .iter()
        .map(|(code, _)| {
            let pack = LanguagePack { code: *code };
            (*code, pack.t("language.name"))
        })
        .collect()
}

/// Whether `code` names a bundled pack (case-insensitive).
pub fn is_supported(code: &str) -> bool {
    LanguagePack::load(code).is_some()
}

/// Handle on one bundled language pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguagePack {
    code: &'static str,
}

impl LanguagePack {
    /// Loads the pack for `code`, matched case-insensitively.
    pub fn load(code: &str) -> Option<Self> {
        SOURCES
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(code.trim()))
            .map(|(c, _)| Self { code: *c })
    }

    /// Loads `code`, or the fallback pack when `code` is unknown.
    pub fn load_or_fallback(code: &str) -> Self {
        Self::load(code).unwrap_or_else(|| {
            tracing::warn!(language = code, "unknown language, using {}", FALLBACK_LANGUAGE);
            Self::fallback()
        })
    }

    pub fn fallback() -> Self {
        Self {
            code: FALLBACK_LANGUAGE,
        }
    }

    /// Canonical code, e.g. `zh-CN`.
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Translates `key`.
    pub fn t(&self, key: &str) -> String {
        lookup(self.code, key)
            .or_else(|| lookup(FALLBACK_LANGUAGE, key))
            .unwrap_or_else(|| key.to_string())
    }

    /// Translates `key` and substitutes `{name}` placeholders.
    pub fn tf(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut text = self.t(key);
        for (name, value) in args {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }

    /// Weekday names, Monday first.
    pub fn weekdays(&self) -> [String; 7] {
        [
            "monday",
            "tuesday",
            "wednesday",
            "thursday",
            "friday",
            "saturday",
            "sunday",
        ]
        .map(|day| self.t(&format!("weekdays.{day}")))
    }
}

impl Default for LanguagePack {
    fn default() -> Self {
        Self::fallback()
    }
}

fn lookup(code: &str, key: &str) -> Option<String> {
    let mut node = PACKS.get(code)?;
    for part in key.split('.') {
        node = node.get(part)?;
    }
    node.as_str().map(String::from)
}
