//! Error taxonomy for octool.
//!
//! Each subsystem owns one enum; [`AppError`] folds them together at the
//! session controller boundary so command handlers can use `?` freely.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the configuration store.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// User-supplied configuration data is missing or inconsistent.
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("configuration not found: {0}")]
    NotFound(String),

    /// The configuration is active and no replacement was given.
    #[error("configuration '{0}' is in use")]
    InUse(String),

    #[error("configuration file {path:?} is unreadable: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
}

/// Errors returned by the completion provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Credential rejected (HTTP 401/403).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Connection could not be established or was dropped.
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimit(String),

    /// Any other failure reported by the provider.
    #[error("provider error: {0}")]
    Provider(String),
}

impl ProviderError {
    /// Whether the failure is about reachability rather than the request itself.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Errors raised by the history manager and its durable store.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("invalid turn role: {0}")]
    InvalidRole(String),

    /// Summary turns are produced by compression only.
    #[error("summary turns cannot be appended directly")]
    SummaryNotAppendable,

    #[error("history file {path:?} is unreadable: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize turn: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("summarization failed: {0}")]
    Summarization(#[from] ProviderError),
}

/// Errors raised while parsing or resolving a command line.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("unknown subcommand for {command}: {sub}")]
    UnknownSubcommand { command: String, sub: String },

    #[error("{command} requires <{arg}>")]
    MissingArgument { command: String, arg: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unterminated quote in command line")]
    UnterminatedQuote,
}

/// Umbrella error at the session controller boundary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Command(#[from] CommandError),

    /// Terminal or prompt I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether the session must stop. Only storage corruption and terminal
    /// failures are fatal; everything else is reported and the loop goes on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Io(_)
                | AppError::Config(ConfigError::CorruptStore { .. })
                | AppError::History(HistoryError::CorruptStore { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_network_classification() {
        assert!(ProviderError::Timeout(Duration::from_secs(5)).is_network());
        assert!(ProviderError::Network("refused".into()).is_network());
        assert!(!ProviderError::Auth("bad key".into()).is_network());
        assert!(!ProviderError::RateLimit("slow down".into()).is_network());
    }

    #[test]
    fn test_only_storage_and_io_errors_are_fatal() {
        let corrupt = AppError::from(ConfigError::CorruptStore {
            path: PathBuf::from("config.toml"),
            reason: "bad".into(),
        });
        assert!(corrupt.is_fatal());
        assert!(!AppError::from(ConfigError::NotFound("x".into())).is_fatal());
        assert!(!AppError::from(CommandError::UnknownCommand("/x".into())).is_fatal());
        assert!(!AppError::from(ProviderError::Auth("no".into())).is_fatal());
    }

    #[test]
    fn test_timeout_message_mentions_seconds() {
        let err = ProviderError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "request timed out after 30s");
    }
}
