//! Slash command handlers.

use std::io;

use uuid::Uuid;

use super::setup::SetupWizard;
use super::{policy_for, summarizer, Flow, Reply, Session, SessionController};
use crate::commands::{Command, ConfigCommand, HistoryCommand, LangCommand, COMMANDS};
use crate::config::{ConfigPatch, Configuration};
use crate::constants::{APP_NAME, REPOSITORY, VERSION};
use crate::error::{AppError, CommandError, ConfigError, HistoryError};
use crate::format::format_turn;
use crate::history::CompactionResult;
use crate::i18n::{self, LanguagePack};
use crate::output::Output;
use crate::provider::CredentialStatus;
use crate::tokens::{format_number, format_token_usage};

impl SessionController {
    pub(super) async fn dispatch(&mut self, command: Command) -> Result<Reply, AppError> {
        let output = match command {
            Command::Help => self.help(),
            Command::Clear => {
                let mut out = self.welcome();
                out.clear_screen = true;
                out
            }
            Command::Exit => {
                self.shutdown()?;
                let mut out = Output::new();
                out.info(self.session.lang.t("app.goodbye"));
                return Ok(Reply {
                    output: out,
                    flow: Flow::Exit,
                });
            }
            Command::New => self.new_session()?,
            Command::Version => version(),
            Command::Markdown(value) => self.markdown(value)?,
            Command::Stream(value) => self.stream(value)?,
            Command::Config(cmd) => self.config(cmd).await?,
            Command::History(cmd) => self.history(cmd).await?,
            Command::Lang(cmd) => self.lang(cmd)?,
        };
        Ok(Reply::proceed(output))
    }

    fn help(&self) -> Output {
        let lang = &self.session.lang;
        let mut out = Output::new();
        out.heading(lang.t("help.title"));
        for (name, key) in COMMANDS {
            out.plain(format!("  {name:<10} {}", lang.t(key)));
        }
        out.plain("");
        out.plain(format!("  /config   {}", lang.t("help.config_usage")));
        out.plain(format!("  /history  {}", lang.t("help.history_usage")));
        out.plain(format!("  /lang     {}", lang.t("help.lang_usage")));
        out.plain(format!(
            "  {}: {}",
            lang.t("help.fields"),
            ConfigPatch::FIELDS.join(", ")
        ));
        let variables: Vec<String> = self
            .session
            .templates
            .variables()
            .into_iter()
            .map(|v| format!("{{{{{v}}}}}"))
            .collect();
        out.info(lang.tf("help.templates", &[("variables", &variables.join(" "))]));
        out
    }

    /// Archives the current log and starts a fresh session id.
    fn new_session(&mut self) -> Result<Output, AppError> {
        let archived = self.session.history.archive(&self.paths.archive_dir())?;
        self.session.id = Uuid::new_v4().to_string();
        tracing::info!(session = %self.session.id, archived = ?archived, "new session");

        let lang = self.session.lang;
        let mut out = Output::new();
        match archived {
            Some(path) => out.success(lang.tf(
                "history.archived",
                &[("path", &path.display().to_string())],
            )),
            None => out.info(lang.t("history.nothing_archived")),
        };
        out.info(lang.tf("app.new_session", &[("id", &self.session.id)]));
        Ok(out)
    }

    fn markdown(&mut self, value: Option<bool>) -> Result<Output, AppError> {
        let enabled = value.unwrap_or(!self.session.config.markdown);
        let patch = ConfigPatch {
            markdown: Some(enabled),
            ..Default::default()
        };
        let updated = self.store.update(&self.session.config.id, &patch)?;
        self.adopt(updated);

        let lang = self.session.lang;
        let mut out = Output::new();
        out.success(if enabled {
            lang.t("markdown.on")
        } else {
            lang.t("markdown.off")
        });
        Ok(out)
    }

    fn stream(&mut self, value: Option<bool>) -> Result<Output, AppError> {
        let lang = self.session.lang;
        let mut out = Output::new();
        let Some(enabled) = value else {
            let state = if self.session.config.stream {
                lang.t("common.on")
            } else {
                lang.t("common.off")
            };
            out.info(lang.tf("stream.status", &[("state", &state)]));
            return Ok(out);
        };
        let patch = ConfigPatch {
            stream: Some(enabled),
            ..Default::default()
        };
        let updated = self.store.update(&self.session.config.id, &patch)?;
        self.adopt(updated);
        out.success(if enabled {
            lang.t("stream.on")
        } else {
            lang.t("stream.off")
        });
        Ok(out)
    }

    /// Takes over a stored change to the active configuration.
    fn adopt(&mut self, updated: Configuration) {
        let language_changed = updated.language != self.session.config.language;
        self.session
            .history
            .set_policy(policy_for(&updated, self.store.settings()));
        self.session.config = updated;
        if language_changed {
            self.session
                .set_language(LanguagePack::load_or_fallback(&self.session.config.language));
        }
    }

    async fn config(&mut self, cmd: ConfigCommand) -> Result<Output, AppError> {
        match cmd {
            ConfigCommand::List => Ok(self.config_list()),
            ConfigCommand::Current => Ok(self.config_current()),
            ConfigCommand::Switch(selector) => self.switch_to(&selector),
            ConfigCommand::New(id) => self.config_new(id).await,
            ConfigCommand::Edit { id, field, value } => self.config_edit(&id, &field, &value),
            ConfigCommand::Delete { id, replacement } => {
                self.config_delete(&id, replacement.as_deref())
            }
            ConfigCommand::Default(id) => {
                let cfg = self.store.set_default(&id)?;
                let mut out = Output::new();
                out.success(self.session.lang.tf("config.default_set", &[("id", &cfg.id)]));
                Ok(out)
            }
            ConfigCommand::Check(selector) => self.config_check(selector.as_deref()).await,
        }
    }

    fn config_list(&self) -> Output {
        let lang = &self.session.lang;
        let mut out = Output::new();
        out.heading(lang.t("config.list_title"));
        for cfg in self.store.list() {
            let marker = if cfg.id == self.session.config.id { "*" } else { " " };
            let mut line = format!(
                "{marker} {:<12} {}",
                cfg.id,
                cfg.display_name(lang.code()).unwrap_or("-")
            );
            if !cfg.aliases.is_empty() {
                line.push_str(&format!(" [{}]", cfg.aliases.join(", ")));
            }
            line.push_str(&format!("  {}", cfg.model));
            if self.store.default_id() == Some(cfg.id.as_str()) {
                line.push_str(&format!("  ({})", lang.t("config.default_marker")));
            }
            out.plain(line);
        }
        out
    }

    fn config_current(&self) -> Output {
        let lang = &self.session.lang;
        let cfg = &self.session.config;
        let flag = |on: bool| if on { lang.t("common.on") } else { lang.t("common.off") };

        let mut out = Output::new();
        out.heading(lang.tf("config.current_title", &[("id", &cfg.id)]));
        let rows = [
            ("name", self.session.display_name()),
            ("aliases", cfg.aliases.join(", ")),
            ("endpoint", cfg.endpoint.clone()),
            ("model", cfg.model.clone()),
            ("credential", mask_credential(&cfg.credential)),
            ("language", cfg.language.clone()),
            ("ai_name", cfg.ai_name.clone()),
            ("max_tokens", format_number(cfg.max_tokens)),
            ("history", flag(cfg.history)),
            ("summary", flag(cfg.summary)),
            ("markdown", flag(cfg.markdown)),
            ("stream", flag(cfg.stream)),
            ("system_prompt", cfg.system_prompt.clone()),
        ];
        for (field, value) in rows {
            out.plain(format!("  {field:<14} {value}"));
        }
        out
    }

    /// Makes `selector` the active configuration.
    ///
    /// The current history is flushed first. A selector that names nothing
    /// leaves the session untouched.
    fn switch_to(&mut self, selector: &str) -> Result<Output, AppError> {
        let target = self.store.get(selector)?;
        if target.id == self.session.config.id {
            let mut out = Output::new();
            out.info(self.session.lang.tf("config.already_active", &[("id", &target.id)]));
            return Ok(out);
        }
        match self.open_session(target)? {
            Ok(next) => Ok(self.enter(next)),
            Err(out) => Ok(out),
        }
    }

    /// Flushes the active history and opens a session for `target`.
    ///
    /// A corrupt log for `target` comes back as a rendered error; the active
    /// session is untouched either way.
    fn open_session(&mut self, target: Configuration) -> Result<Result<Session, Output>, AppError> {
        self.session.history.flush()?;
        match Session::open(target, self.store.settings(), &self.paths) {
            Ok(session) => Ok(Ok(session)),
            Err(e @ HistoryError::CorruptStore { .. }) => {
                tracing::warn!(error = %e, "switch aborted");
                let mut out = Output::new();
                out.error(
                    self.session
                        .lang
                        .tf("config.switch_failed", &[("detail", &e.to_string())]),
                );
                Ok(Err(out))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Makes an opened session the active one.
    fn enter(&mut self, next: Session) -> Output {
        tracing::info!(from = %self.session.config.id, to = %next.config.id, "configuration switched");
        self.session = next;

        let mut out = Output::new();
        out.success(self.session.lang.tf(
            "config.switched",
            &[
                ("name", &self.session.display_name()),
                ("id", &self.session.config.id),
            ],
        ));
        out.extend(self.welcome());
        out
    }

    /// Runs the wizard and stores the result. Closing the input (Ctrl+D)
    /// cancels the wizard without ending the session.
    async fn config_new(&mut self, id: Option<String>) -> Result<Output, AppError> {
        let lang = self.session.lang;
        let mut out = Output::new();
        let wizard = SetupWizard::new(&self.store, self.provider.as_ref(), self.prompter.as_mut())
            .with_language(lang)
            .run(id, false)
            .await;
        let draft = match wizard {
            Ok(draft) => draft,
            Err(AppError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                tracing::info!("setup cancelled");
                out.info(lang.t("setup.cancelled"));
                return Ok(out);
            }
            Err(e) => return Err(e),
        };
        let created = self.store.create(draft)?;

        out.success(lang.tf("config.created", &[("id", &created.id)]));
        let switch_now = match self
            .prompter
            .confirm(&lang.tf("config.switch_now", &[("id", &created.id)]), false)
        {
            Ok(answer) => answer,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
            Err(e) => return Err(e.into()),
        };
        if switch_now {
            out.extend(self.switch_to(&created.id)?);
        }
        Ok(out)
    }

    fn config_edit(&mut self, id: &str, field: &str, value: &str) -> Result<Output, AppError> {
        let patch = ConfigPatch::from_field(field, value, self.session.lang.code())?;
        let updated = self.store.update(id, &patch)?;

        let mut out = Output::new();
        let active = updated.id == self.session.config.id;
        let updated_id = updated.id.clone();
        if active {
            self.adopt(updated);
        }
        let lang = self.session.lang;
        out.success(lang.tf("config.updated", &[("id", &updated_id), ("field", field)]));
        if active && field == "history" {
            out.info(lang.t("config.history_on_switch"));
        }
        Ok(out)
    }

    /// Deletes a configuration. The active one goes only once its
    /// replacement has been opened.
    fn config_delete(&mut self, id: &str, replacement: Option<&str>) -> Result<Output, AppError> {
        let target = self.store.get(id)?;
        let active = self.session.config.id.clone();
        let mut out = Output::new();

        if target.id != active {
            self.store.delete(&target.id, Some(&active), replacement)?;
            out.success(self.session.lang.tf("config.deleted", &[("id", &target.id)]));
            return Ok(out);
        }

        let Some(replacement) = replacement else {
            return Err(ConfigError::InUse(target.id).into());
        };
        let next = self.store.get(replacement)?;
        if next.id == target.id {
            return Err(ConfigError::Validation(
                "replacement must differ from the deleted configuration".to_string(),
            )
            .into());
        }
        let next = match self.open_session(next)? {
            Ok(session) => session,
            Err(failed) => return Ok(failed),
        };
        self.store
            .delete(&target.id, Some(&active), Some(&next.config.id))?;

        out.success(self.session.lang.tf("config.deleted", &[("id", &target.id)]));
        out.extend(self.enter(next));
        Ok(out)
    }

    async fn config_check(&mut self, selector: Option<&str>) -> Result<Output, AppError> {
        let cfg = match selector {
            Some(sel) => self.store.get(sel)?,
            None => self.session.config.clone(),
        };
        let status = self
            .store
            .validate_credential(&cfg, self.provider.as_ref())
            .await;

        let lang = self.session.lang;
        let mut out = Output::new();
        match status {
            CredentialStatus::Valid => out.success(lang.t("credential.valid")),
            CredentialStatus::Invalid(detail) => {
                out.error(lang.tf("credential.invalid", &[("detail", &detail)]))
            }
            CredentialStatus::NetworkUnavailable(detail) => {
                out.warning(lang.tf("credential.unreachable", &[("detail", &detail)]))
            }
        };
        Ok(out)
    }

    async fn history(&mut self, cmd: HistoryCommand) -> Result<Output, AppError> {
        let lang = self.session.lang;
        let mut out = Output::new();
        match cmd {
            HistoryCommand::Stats => {
                let stats = self.session.history.stats();
                let storage = match self.session.history.store_path() {
                    Some(path) => path.display().to_string(),
                    None => lang.t("history.memory_only"),
                };
                out.heading(lang.t("history.stats_title"));
                out.plain(lang.tf("history.stats_turns", &[("count", &stats.turn_count.to_string())]));
                out.plain(lang.tf(
                    "history.stats_tokens",
                    &[(
                        "usage",
                        &format_token_usage(stats.token_estimate, stats.threshold_tokens),
                    )],
                ));
                out.plain(lang.tf(
                    "history.stats_compressions",
                    &[("count", &stats.compression_count.to_string())],
                ));
                out.plain(lang.tf("history.stats_storage", &[("path", &storage)]));
            }
            HistoryCommand::Show => {
                let turns = self.session.history.build_outgoing();
                if turns.is_empty() {
                    out.info(lang.t("history.empty"));
                }
                let you = lang.t("history.you");
                let summary = lang.t("history.summary_label");
                let cfg = &self.session.config;
                for turn in turns {
                    out.plain(format_turn(turn, &you, &cfg.ai_name, &summary, cfg.markdown));
                }
            }
            HistoryCommand::Compress => {
                let summarizer = summarizer(self.provider.as_ref(), &self.session, self.timeout());
                match self.session.history.compress(&summarizer).await? {
                    CompactionResult::Compacted {
                        turns_replaced,
                        tokens_before,
                        tokens_after,
                    } => out.success(lang.tf(
                        "history.compressed",
                        &[
                            ("turns", &turns_replaced.to_string()),
                            ("before", &tokens_before.to_string()),
                            ("after", &tokens_after.to_string()),
                        ],
                    )),
                    CompactionResult::NothingToCompact => {
                        out.info(lang.t("history.nothing_to_compress"))
                    }
                };
            }
            HistoryCommand::Summary => match self.session.history.summary() {
                Some(turn) => {
                    out.heading(lang.t("history.summary_title"));
                    out.plain(turn.content.clone());
                    if let Some(ref meta) = turn.summary {
                        out.info(lang.tf(
                            "history.summary_meta",
                            &[
                                ("original", &meta.original_tokens.to_string()),
                                ("summarized", &meta.summarized_tokens.to_string()),
                                ("ratio", &format!("{:.2}", meta.compression_ratio())),
                                ("model", &meta.model),
                            ],
                        ));
                    }
                }
                None => {
                    out.info(lang.t("history.no_summary"));
                }
            },
        }
        Ok(out)
    }

    fn lang(&mut self, cmd: LangCommand) -> Result<Output, AppError> {
        let mut out = Output::new();
        match cmd {
            LangCommand::List => {
                out.heading(self.session.lang.t("lang.list_title"));
                for (code, name) in i18n::available() {
                    let marker = if code == self.session.lang.code() { "*" } else { " " };
                    out.plain(format!("{marker} {code:<8} {name}"));
                }
            }
            LangCommand::Switch(code) => {
                let pack = LanguagePack::load(&code).ok_or_else(|| {
                    CommandError::InvalidArgument(
                        self.session.lang.tf("lang.unsupported", &[("code", &code)]),
                    )
                })?;
                let patch = ConfigPatch {
                    language: Some(pack.code().to_string()),
                    ..Default::default()
                };
                let updated = self.store.update(&self.session.config.id, &patch)?;
                self.adopt(updated);
                self.session.set_language(pack);
                out.success(
                    pack.tf("lang.switched", &[("name", &pack.t("language.name"))]),
                );
            }
        }
        Ok(out)
    }
}

fn version() -> Output {
    let mut out = Output::new();
    out.plain(format!("{APP_NAME} {VERSION}"));
    out.info(REPOSITORY);
    out
}

/// Hides all but the first characters of a literal credential. Environment
/// placeholders are shown as written.
fn mask_credential(credential: &str) -> String {
    if credential.starts_with("{env:") {
        return credential.to_string();
    }
    let visible: String = credential.chars().take(4).collect();
    if credential.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_credential() {
        assert_eq!(mask_credential("sk-1234567890"), "sk-1****");
        assert_eq!(mask_credential("short"), "****");
        assert_eq!(mask_credential("{env:DEEPSEEK_KEY}"), "{env:DEEPSEEK_KEY}");
    }

    #[test]
    fn test_version_output() {
        let out = version();
        assert!(out.to_plain_text().starts_with(&format!("{APP_NAME} {VERSION}")));
    }
}
