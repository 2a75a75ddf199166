//! Session controller for octool.
//!
//! A [`Session`] binds one configuration to its history, language pack and
//! template resolver. The [`SessionController`] owns the active session plus
//! the config store and provider, and turns each input line into a [`Reply`]:
//! commands go through the router, everything else is a chat turn.

mod handlers;
mod setup;


pub use setup::{Prompter, SetupWizard, StdinPrompter};

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::commands::{self, Command};
use crate::config::{ConfigStore, Configuration, Paths, Settings};
use crate::error::{AppError, CommandError, ConfigError, HistoryError, ProviderError};
use crate::history::{
    CompactionResult, CompressionPolicy, HistoryManager, HistoryStore, ProviderSummarizer,
};
use crate::i18n::LanguagePack;
use crate::message::{ChatMessage, Turn};
use crate::output::{Line, Output, StreamSink};
use crate::provider::{CompletionProvider, ModelConfig};
use crate::template::{ensure_datetime, TemplateResolver};

/// What the REPL should do after rendering a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Result of handling one input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub output: Output,
    pub flow: Flow,
}

impl Reply {
    fn proceed(output: Output) -> Self {
        Self {
            output,
            flow: Flow::Continue,
        }
    }
}

/// State bound to the active configuration.
pub struct Session {
    /// Random id, regenerated by `/new`.
    pub id: String,
    pub config: Configuration,
    pub history: HistoryManager,
    pub lang: LanguagePack,
    templates: TemplateResolver,
}

impl Session {
    /// Opens a session for `config`, resuming its durable history when the
    /// configuration keeps one.
    pub fn open(
        config: Configuration,
        settings: &Settings,
        paths: &Paths,
    ) -> Result<Self, HistoryError> {
        let policy = policy_for(&config, settings);
        let history = if config.history {
            HistoryManager::open(HistoryStore::new(paths.history_file(&config.id)), policy)?
        } else {
            HistoryManager::in_memory(policy)
        };
        Ok(Self::with_history(config, history))
    }

    /// A session whose history lives in memory only.
    pub fn ephemeral(config: Configuration, settings: &Settings) -> Self {
        let policy = policy_for(&config, settings);
        Self::with_history(config, HistoryManager::in_memory(policy))
    }

    fn with_history(config: Configuration, history: HistoryManager) -> Self {
        let lang = LanguagePack::load_or_fallback(&config.language);
        let id = Uuid::new_v4().to_string();
        tracing::info!(session = %id, config = %config.id, turns = history.turns().len(), "session opened");
        Self {
            id,
            templates: TemplateResolver::new().with_weekday_names(lang.weekdays()),
            config,
            history,
            lang,
        }
    }

    /// Switches the UI language for everything rendered from now on.
    pub fn set_language(&mut self, lang: LanguagePack) {
        self.lang = lang;
        self.templates = TemplateResolver::new().with_weekday_names(lang.weekdays());
    }

    /// Resolves template tokens against the current time.
    pub fn resolve(&self, text: &str) -> String {
        self.templates.resolve(text)
    }

    /// System prompt with a time line guaranteed and tokens resolved.
    pub fn system_prompt(&self) -> String {
        let prompt = ensure_datetime(&self.config.system_prompt, &self.lang.t("template.current_time"));
        self.resolve(&prompt)
    }

    /// Messages sent for a chat turn: system prompt, summary, tail, then `input`.
    pub fn outgoing(&self, input: &str) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.system_prompt())];
        messages.extend(self.history.build_outgoing().into_iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(input));
        messages
    }

    /// Display name in the current language.
    pub fn display_name(&self) -> String {
        self.config
            .display_name(self.lang.code())
            .map(String::from)
            .unwrap_or_else(|| self.lang.t("config.default_name"))
    }
}

/// Compression policy for a configuration under the global settings.
pub fn policy_for(config: &Configuration, settings: &Settings) -> CompressionPolicy {
    CompressionPolicy::for_budget(
        config.max_tokens,
        settings.compaction_threshold(),
        settings.compaction_keep_recent(),
        settings.compaction_auto_enabled() && config.summary,
    )
}

fn summarizer<'a>(
    provider: &'a dyn CompletionProvider,
    session: &Session,
    timeout: Duration,
) -> ProviderSummarizer<'a> {
    ProviderSummarizer::new(
        provider,
        ModelConfig::from_configuration(&session.config),
        session.lang,
        timeout,
    )
}

/// Orchestrates the active session, the config store and the provider.
pub struct SessionController {
    store: ConfigStore,
    paths: Paths,
    provider: Arc<dyn CompletionProvider>,
    prompter: Box<dyn Prompter>,
    session: Session,
    /// Where streamed replies are printed. Without one, replies arrive whole.
    sink: Option<Box<dyn StreamSink>>,
}

impl SessionController {
    /// Starts a controller.
    ///
    /// An empty store runs the guided setup first. A `selector` that names
    /// no configuration falls back to the default with a warning.
    pub async fn start(
        mut store: ConfigStore,
        paths: Paths,
        provider: Arc<dyn CompletionProvider>,
        mut prompter: Box<dyn Prompter>,
        selector: Option<&str>,
    ) -> Result<(Self, Output), AppError> {
        let mut output = Output::new();

        if store.is_empty() {
            let draft = SetupWizard::new(&store, provider.as_ref(), prompter.as_mut())
                .run(None, true)
                .await?;
            let created = store.create(draft)?;
            let lang = LanguagePack::load_or_fallback(&created.language);
            output.success(lang.tf("config.created", &[("id", &created.id)]));
        }

        let fallback = store
            .default_config()
            .ok_or_else(|| ConfigError::NotFound("default".to_string()))?;
        let config = match selector {
            Some(sel) => match store.get(sel) {
                Ok(cfg) => cfg,
                Err(ConfigError::NotFound(_)) => {
                    let lang = LanguagePack::load_or_fallback(&fallback.language);
                    output.warning(lang.tf(
                        "config.selector_not_found",
                        &[("selector", sel), ("id", &fallback.id)],
                    ));
                    fallback
                }
                Err(e) => return Err(e.into()),
            },
            None => fallback,
        };

        let session = Session::open(config, store.settings(), &paths)?;
        let controller = Self {
            store,
            paths,
            provider,
            prompter,
            session,
            sink: None,
        };
        output.extend(controller.welcome());
        Ok((controller, output))
    }

    /// Wraps an already opened session.
    pub fn new(
        store: ConfigStore,
        paths: Paths,
        provider: Arc<dyn CompletionProvider>,
        prompter: Box<dyn Prompter>,
        session: Session,
    ) -> Self {
        Self {
            store,
            paths,
            provider,
            prompter,
            session,
            sink: None,
        }
    }

    /// Prints replies of configurations with `stream` on as they arrive.
    pub fn with_stream_sink(mut self, sink: Box<dyn StreamSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    fn timeout(&self) -> Duration {
        self.store.settings().timeout()
    }

    /// Banner shown at start, after `/clear` and after switching.
    pub fn welcome(&self) -> Output {
        let s = &self.session;
        let mut out = Output::new();
        out.heading(s.lang.tf("app.welcome", &[("name", &s.display_name())]));
        out.info(s.lang.tf(
            "app.session_info",
            &[("id", &s.config.id), ("model", &s.config.model)],
        ));
        if let Some(message) = s.config.welcome_message(s.lang.code()) {
            out.plain(s.resolve(message));
        }
        let restored = s.history.build_outgoing().len();
        if restored > 0 {
            out.info(s.lang.tf("history.restored", &[("count", &restored.to_string())]));
        }
        out.info(s.lang.t("app.help_hint"));
        out
    }

    /// Handles one line of input.
    ///
    /// Only fatal errors (storage corruption, terminal I/O) are returned;
    /// everything else is rendered into the reply and the session goes on.
    pub async fn handle_line(&mut self, line: &str) -> Result<Reply, AppError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Reply::proceed(Output::new()));
        }

        let result = match commands::parse(line) {
            Ok(Some(parsed)) => {
                tracing::debug!(command = %parsed.name, args = parsed.args.len(), "dispatching command");
                match Command::resolve(&parsed) {
                    Ok(command) => self.dispatch(command).await,
                    Err(e) => Err(e.into()),
                }
            }
            Ok(None) => self.chat(line).await.map(Reply::proceed),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(reply) => Ok(reply),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "reported to user");
                Ok(Reply::proceed(self.describe_error(&e)))
            }
        }
    }

    /// Sends one chat turn.
    ///
    /// The exchange is appended only after the provider answered, so a failed
    /// call leaves the history untouched and the same input can simply be
    /// sent again. A reply that could not be saved is still shown.
    async fn chat(&mut self, input: &str) -> Result<Output, AppError> {
        let messages = self.session.outgoing(input);
        let model = ModelConfig::from_configuration(&self.session.config);
        let provider = Arc::clone(&self.provider);
        let timeout = self.timeout();
        let speaker = self.session.config.ai_name.clone();

        let (reply, streamed) = match (self.sink.as_mut(), self.session.config.stream) {
            (Some(sink), true) => {
                let mut started = false;
                let result = provider
                    .complete_streaming(&messages, &model, timeout, &mut |text: &str| {
                        if !started {
                            sink.begin(&speaker);
                            started = true;
                        }
                        sink.chunk(text);
                    })
                    .await;
                if started {
                    sink.end();
                }
                (result?, started)
            }
            _ => (provider.complete(&messages, &model, timeout).await?, false),
        };

        let mut out = Output::new();
        out.push(Line::Reply {
            speaker,
            text: reply.clone(),
            markdown: self.session.config.markdown,
            streamed,
        });

        if let Err(e) = self
            .session
            .history
            .append_exchange(Turn::user(input), Turn::assistant(reply))
        {
            let e = AppError::from(e);
            if e.is_fatal() {
                return Err(e);
            }
            tracing::warn!(error = %e, "reply not saved to history");
            out.error(
                self.session
                    .lang
                    .tf("history.save_failed", &[("detail", &e.to_string())]),
            );
            return Ok(out);
        }

        let summarizer = summarizer(self.provider.as_ref(), &self.session, self.timeout());
        match self.session.history.compress_if_needed(&summarizer).await {
            Ok(CompactionResult::Compacted {
                turns_replaced,
                tokens_before,
                tokens_after,
            }) => {
                out.success(self.session.lang.tf(
                    "history.compressed",
                    &[
                        ("turns", &turns_replaced.to_string()),
                        ("before", &tokens_before.to_string()),
                        ("after", &tokens_after.to_string()),
                    ],
                ));
            }
            Ok(CompactionResult::NothingToCompact) => {}
            // The reply is already stored; a failed compression only delays it.
            Err(e) => {
                out.warning(
                    self.session
                        .lang
                        .tf("history.compress_failed", &[("detail", &e.to_string())]),
                );
            }
        }
        Ok(out)
    }

    /// Flushes the active history. Called on exit.
    pub fn shutdown(&mut self) -> Result<(), AppError> {
        self.session.history.flush()?;
        tracing::info!(session = %self.session.id, "session closed");
        Ok(())
    }

    /// Localized rendering of a non-fatal error.
    fn describe_error(&self, err: &AppError) -> Output {
        let lang = &self.session.lang;
        let mut out = Output::new();
        match err {
            AppError::Config(ConfigError::Validation(m)) => {
                out.error(lang.tf("error.validation", &[("detail", m)]))
            }
            AppError::Config(ConfigError::NotFound(id)) => {
                out.error(lang.tf("error.config_not_found", &[("id", id)]))
            }
            AppError::Config(ConfigError::InUse(id)) => {
                out.error(lang.tf("error.config_in_use", &[("id", id)]))
            }
            AppError::Provider(e) => out.error(describe_provider_error(lang, e)),
            AppError::History(HistoryError::Summarization(e)) => out.error(lang.tf(
                "history.compress_failed",
                &[("detail", &describe_provider_error(lang, e))],
            )),
            AppError::Command(CommandError::UnknownCommand(name)) => out
                .error(lang.tf("error.unknown_command", &[("command", name)]))
                .info(lang.t("app.help_hint")),
            AppError::Command(CommandError::UnknownSubcommand { command, sub }) => out
                .error(lang.tf(
                    "error.unknown_subcommand",
                    &[("command", command), ("sub", sub)],
                ))
                .info(lang.t("app.help_hint")),
            AppError::Command(CommandError::MissingArgument { command, arg }) => out.error(
                lang.tf("error.missing_argument", &[("command", command), ("arg", arg)]),
            ),
            AppError::Command(CommandError::InvalidArgument(m)) => {
                out.error(lang.tf("error.invalid_argument", &[("detail", m)]))
            }
            AppError::Command(CommandError::UnterminatedQuote) => {
                out.error(lang.t("error.unterminated_quote"))
            }
            other => out.error(other.to_string()),
        };
        out
    }
}

/// Localized message for a provider failure.
pub fn describe_provider_error(lang: &LanguagePack, err: &ProviderError) -> String {
    match err {
        ProviderError::Auth(d) => lang.tf("error.auth", &[("detail", d)]),
        ProviderError::Network(d) => lang.tf("error.network", &[("detail", d)]),
        ProviderError::Timeout(t) => {
            lang.tf("error.timeout", &[("secs", &t.as_secs().to_string())])
        }
        ProviderError::RateLimit(d) => lang.tf("error.rate_limit", &[("detail", d)]),
        ProviderError::Provider(d) => lang.tf("error.provider", &[("detail", d)]),
    }
}
