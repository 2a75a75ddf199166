//! Centralized constants for octool.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "octool";

/// Version shown by `/version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Project repository shown by `/version`.
pub const REPOSITORY: &str = "https://github.com/octool/octool-cli";

/// Environment variable that relocates config, data and cache under one root.
pub const HOME_ENV_VAR: &str = "OCTOOL_HOME";

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Readline history filename.
pub const READLINE_HISTORY_FILENAME: &str = "input_history.txt";

/// Directory (under the data dir) holding per-configuration history logs.
pub const HISTORY_DIRNAME: &str = "history";

/// Directory (under the history dir) receiving logs retired by `/new`.
pub const ARCHIVE_DIRNAME: &str = "archive";

/// Prefix character that marks a line as a command.
pub const COMMAND_PREFIX: char = '/';

// --- Configuration defaults ---

/// Prefix for auto-generated configuration ids (`Prompt_000`, ...).
pub const CONFIG_ID_PREFIX: &str = "Prompt_";

/// Upper bound on auto-generated configuration ids.
pub const CONFIG_ID_LIMIT: usize = 1000;

/// Default API endpoint offered by the setup wizard.
pub const DEFAULT_ENDPOINT: &str = "https://api.deepseek.com";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Default assistant display name.
pub const DEFAULT_AI_NAME: &str = "AI";

/// Default UI language.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Default context budget in tokens for a configuration.
pub const DEFAULT_MAX_TOKENS: usize = 64_000;

// --- Provider ---

/// Default bound on a single provider call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Maximum characters of an error body echoed back to the user.
pub const ERROR_BODY_PREVIEW: usize = 300;

// --- Token counting ---

/// Approximate token overhead per message (role markers, etc.).
pub const TOKENS_PER_MESSAGE_OVERHEAD: usize = 4;

/// Characters per token used when the BPE tokenizer is unavailable.
pub const CHARS_PER_TOKEN_FALLBACK: usize = 4;

// --- Compaction defaults ---

/// Default: auto-compaction enabled.
pub const COMPACTION_AUTO_DEFAULT: bool = true;

/// Default fraction of the context budget that triggers compaction (80%).
pub const COMPACTION_THRESHOLD_DEFAULT: f64 = 0.80;

/// Default number of recent turns kept verbatim during compaction.
pub const COMPACTION_KEEP_RECENT_DEFAULT: usize = 3;

/// Sampling temperature for summarization requests.
pub const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Output cap for summarization requests.
pub const SUMMARY_MAX_OUTPUT_TOKENS: u32 = 1000;
