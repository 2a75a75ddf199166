//! Environment variable substitution and settings accessors.

use std::time::Duration;

use super::types::{Configuration, Settings};

use crate::constants::{
    COMPACTION_AUTO_DEFAULT, COMPACTION_KEEP_RECENT_DEFAULT, COMPACTION_THRESHOLD_DEFAULT,
    DEFAULT_TIMEOUT_SECS,
};

/// Replace `{env:VAR}` with the environment variable value.
///
/// Unset variables resolve to an empty string; an unterminated placeholder
/// is left as-is.
pub fn resolve_str(s: &str) -> String {
    let mut result = s.to_string();
    let mut from = 0;
    while let Some(offset) = result[from..].find("{env:") {
        let start = from + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 5..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
        from = start + value.len();
    }
    result
}

impl Configuration {
    /// The credential with `{env:VAR}` placeholders substituted.
    ///
    /// Resolution happens at read time so the file keeps the placeholder.
    pub fn resolved_credential(&self) -> String {
        resolve_str(&self.credential)
    }

    /// The endpoint with `{env:VAR}` placeholders substituted.
    pub fn resolved_endpoint(&self) -> String {
        resolve_str(&self.endpoint)
    }
}

impl Settings {
    /// Bound on a single provider call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1))
    }

    /// Whether automatic history compression is enabled globally.
    pub fn compaction_auto_enabled(&self) -> bool {
        self.compaction.auto.unwrap_or(COMPACTION_AUTO_DEFAULT)
    }

    /// Usage ratio at which auto-compression triggers, clamped to (0, 1].
    pub fn compaction_threshold(&self) -> f64 {
        let t = self
            .compaction
            .threshold
            .unwrap_or(COMPACTION_THRESHOLD_DEFAULT);
        if t > 0.0 && t <= 1.0 {
            t
        } else {
            COMPACTION_THRESHOLD_DEFAULT
        }
    }

    /// Number of recent turns kept verbatim during compression.
    pub fn compaction_keep_recent(&self) -> usize {
        self.compaction
            .keep_recent
            .unwrap_or(COMPACTION_KEEP_RECENT_DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_env_placeholder() {
        std::env::set_var("OCTOOL_TEST_RESOLVE_KEY", "sk-from-env");
        assert_eq!(resolve_str("{env:OCTOOL_TEST_RESOLVE_KEY}"), "sk-from-env");
        assert_eq!(
            resolve_str("Bearer {env:OCTOOL_TEST_RESOLVE_KEY}!"),
            "Bearer sk-from-env!"
        );
        std::env::remove_var("OCTOOL_TEST_RESOLVE_KEY");
    }

    #[test]
    fn test_resolve_unset_and_unterminated() {
        assert_eq!(resolve_str("{env:OCTOOL_TEST_SURELY_UNSET}"), "");
        assert_eq!(resolve_str("plain"), "plain");
        assert_eq!(resolve_str("{env:OPEN"), "{env:OPEN");
    }

    #[test]
    fn test_settings_defaults_and_clamping() {
        let mut settings = Settings::default();
        assert_eq!(settings.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(settings.compaction_auto_enabled());
        assert_eq!(settings.compaction_threshold(), COMPACTION_THRESHOLD_DEFAULT);

        settings.compaction.threshold = Some(3.0);
        assert_eq!(settings.compaction_threshold(), COMPACTION_THRESHOLD_DEFAULT);
        settings.compaction.threshold = Some(0.5);
        assert_eq!(settings.compaction_threshold(), 0.5);
        settings.timeout_secs = Some(0);
        assert_eq!(settings.timeout(), Duration::from_secs(1));
    }
}
