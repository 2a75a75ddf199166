//! Command-line interface definition and dispatch for octool.
//!
//! Uses [`clap`] for argument parsing with derive macros. Running without a
//! subcommand starts the interactive chat; `ask` and `list` serve scripts.

mod list;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::chat;
use crate::config::{check_endpoint, ConfigStore, Configuration, Paths};
use crate::error::ConfigError;
use crate::output::{Line, Output, Renderer, StdoutRenderer};
use crate::provider::{CompletionProvider, ModelConfig, OpenAiProvider};
use crate::session::Session;
use crate::tokens;

/// Top-level CLI structure for octool.
#[derive(Parser)]
#[command(
    name = "octool",
    version,
    about = "Chat with OpenAI-compatible models using named configurations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration id or alias to start with
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,
}

/// Available subcommands for the octool CLI.
///
/// The `///` doc comments on variants double as `--help` text rendered by clap.
#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session (the default)
    Chat {
        /// Configuration id or alias
        #[arg(short = 'c', long = "config")]
        config: Option<String>,
    },
    /// Ask a one-shot question
    Ask {
        /// The question to ask
        prompt: Vec<String>,
        /// API key (overrides the configuration)
        #[arg(long)]
        key: Option<String>,
        /// API endpoint (overrides the configuration)
        #[arg(long)]
        endpoint: Option<String>,
        /// Model to use (overrides the configuration)
        #[arg(short, long)]
        model: Option<String>,
        /// Configuration id or alias
        #[arg(short = 'c', long = "config")]
        config: Option<String>,
        /// Print only the reply text
        #[arg(long)]
        raw: bool,
    },
    /// List stored configurations
    List,
}

/// Flags of `octool ask`.
struct AskArgs {
    prompt: String,
    key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    config: Option<String>,
    raw: bool,
}

/// Parses command-line arguments into a [`Cli`] struct.
///
/// Delegates to [`clap::Parser::parse`], which exits the process on invalid input.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli) -> Result<()> {
    let paths = Paths::resolve()?;
    match cli.command {
        None => chat::run_chat(paths, cli.config).await,
        Some(Commands::Chat { config }) => chat::run_chat(paths, config.or(cli.config)).await,
        Some(Commands::Ask {
            prompt,
            key,
            endpoint,
            model,
            config,
            raw,
        }) => {
            let args = AskArgs {
                prompt: prompt.join(" "),
                key,
                endpoint,
                model,
                config: config.or(cli.config),
                raw,
            };
            ask(&paths, args).await
        }
        Some(Commands::List) => list::config_list(&paths),
    }
}

/// One-shot question without history.
///
/// Starts from the selected (or default) configuration, applies the command
/// line overrides and sends a single turn.
async fn ask(paths: &Paths, args: AskArgs) -> Result<()> {
    if args.prompt.trim().is_empty() {
        anyhow::bail!("No prompt provided. Usage: octool ask \"your question here\"");
    }

    let store = ConfigStore::open(paths.config_file())?;
    let mut cfg = match args.config {
        Some(ref selector) => store.get(selector)?,
        None => store.default_config().unwrap_or_default(),
    };
    apply_overrides(&mut cfg, &args);
    if cfg.resolved_credential().trim().is_empty() {
        return Err(ConfigError::Validation(
            "no credential: pass --key or run `octool` to set up a configuration".to_string(),
        )
        .into());
    }
    check_endpoint(&cfg.resolved_endpoint())?;

    let session = Session::ephemeral(cfg, store.settings());
    let provider = OpenAiProvider::new()?;
    let messages = session.outgoing(&args.prompt);
    let model = ModelConfig::from_configuration(&session.config);
    let reply = provider
        .complete(&messages, &model, store.settings().timeout())
        .await?;

    if args.raw {
        println!("{reply}");
        return Ok(());
    }

    let mut out = Output::new();
    out.push(Line::Reply {
        speaker: session.config.ai_name.clone(),
        text: reply.clone(),
        markdown: session.config.markdown,
        streamed: false,
    });
    StdoutRenderer::new().render(&out);
    let usage = tokens::format_token_usage(tokens::count_tokens(&reply), session.config.max_tokens);
    println!("{}", session.lang.tf("app.tokens", &[("usage", &usage)]).dimmed());
    Ok(())
}

fn apply_overrides(cfg: &mut Configuration, args: &AskArgs) {
    if let Some(ref key) = args.key {
        cfg.credential = key.clone();
    }
    if let Some(ref endpoint) = args.endpoint {
        cfg.endpoint = endpoint.clone();
    }
    if let Some(ref model) = args.model {
        cfg.model = model.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_invocation_is_chat() {
        let cli = Cli::try_parse_from(["octool", "-c", "ds"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config.as_deref(), Some("ds"));
    }

    #[test]
    fn test_ask_flags() {
        let cli = Cli::try_parse_from([
            "octool", "ask", "--key", "sk-x", "--raw", "-m", "m-2", "what", "time",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ask {
                prompt,
                key,
                model,
                raw,
                ..
            }) => {
                assert_eq!(prompt.join(" "), "what time");
                assert_eq!(key.as_deref(), Some("sk-x"));
                assert_eq!(model.as_deref(), Some("m-2"));
                assert!(raw);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_overrides_replace_fields() {
        let mut cfg = Configuration::default();
        let args = AskArgs {
            prompt: "hi".into(),
            key: Some("sk-cli".into()),
            endpoint: None,
            model: Some("m-cli".into()),
            config: None,
            raw: false,
        };
        apply_overrides(&mut cfg, &args);
        assert_eq!(cfg.credential, "sk-cli");
        assert_eq!(cfg.model, "m-cli");
        assert_eq!(cfg.endpoint, Configuration::default().endpoint);
    }
}
