//! Entry point for octool, a multi-configuration chat client for the terminal.
//!
//! This binary loads environment variables, sets up logging, parses CLI
//! arguments via [`cli`], and dispatches to the chosen mode.

mod chat;
mod cli;
mod commands;
mod config;
mod constants;
mod error;
mod format;
mod history;
mod i18n;
mod message;
mod output;
mod provider;
mod session;
mod storage;
mod template;
mod tokens;

use std::process::ExitCode;

use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::error::{AppError, ConfigError, ProviderError};

/// Runs the octool CLI.
///
/// Loads `.env` files (silently ignored if absent), parses command-line
/// arguments into a [`cli::Cli`] struct, and dispatches via [`cli::run`].
/// Errors are printed once and mapped to an exit status.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = cli::parse();
    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Logs go to stderr at `warn` unless `RUST_LOG` says otherwise.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// `1` for configuration problems, `2` for provider and network failures,
/// `1` for anything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(app) = cause.downcast_ref::<AppError>() {
            return match app {
                AppError::Provider(_) => 2,
                _ => 1,
            };
        }
        if cause.downcast_ref::<ProviderError>().is_some() {
            return 2;
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return 1;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes() {
        let provider = anyhow::Error::from(ProviderError::Auth("401".into()));
        assert_eq!(exit_code(&provider), 2);

        let wrapped = Err::<(), _>(AppError::from(ProviderError::Network("down".into())))
            .context("chat failed")
            .unwrap_err();
        assert_eq!(exit_code(&wrapped), 2);

        let config = anyhow::Error::from(ConfigError::NotFound("x".into()));
        assert_eq!(exit_code(&config), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 1);
    }
}
