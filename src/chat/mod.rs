//! Interactive chat REPL for octool.
//!
//! Reads lines with [`rustyline`] (history, line editing) and hands each one
//! to the [`SessionController`]. The controller decides whether the line is a
//! command or a chat turn; this loop only renders what comes back.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::config::{ConfigStore, Paths};
use crate::output::{Renderer, StdoutRenderer};
use crate::provider::{CompletionProvider, OpenAiProvider};
use crate::session::{Flow, SessionController, StdinPrompter};

/// Runs the interactive chat REPL.
///
/// Opens the config store (running first-time setup when it is empty),
/// selects the configuration named by `selector` or the default one, and
/// loops until `/exit` or Ctrl+D.
///
/// # Readline behavior
///
/// - **Ctrl+C**: cancels current input, stays in REPL
/// - **Ctrl+D**: saves history and exits
/// - Readline history is persisted to the cache directory
pub async fn run_chat(paths: Paths, selector: Option<String>) -> Result<()> {
    let store = ConfigStore::open(paths.config_file())?;
    let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiProvider::new()?);
    let mut renderer = StdoutRenderer::new();

    let (controller, banner) = SessionController::start(
        store,
        paths.clone(),
        provider,
        Box::new(StdinPrompter::new()),
        selector.as_deref(),
    )
    .await?;
    let mut controller = controller.with_stream_sink(Box::new(StdoutRenderer::new()));
    renderer.render(&banner);
    println!();

    let mut rl = DefaultEditor::new()?;
    let history_path = paths.readline_history();
    if history_path.exists() {
        let _ = rl.load_history(&history_path);
    }

    loop {
        let readline = rl.readline(&format!("{} ", ">".green().bold()));

        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                let reply = controller.handle_line(&line).await?;
                renderer.render(&reply.output);
                if reply.flow == Flow::Exit {
                    break;
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => {
                controller.shutdown()?;
                println!("{}", controller.session().lang.t("app.goodbye").dimmed());
                break;
            }
            Err(e) => {
                controller.shutdown()?;
                return Err(e).context("failed to read input");
            }
        }
    }

    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}
