//! Guided configuration setup.

use std::io::{self, Write};

use crate::config::{
    check_endpoint, parse_aliases, parse_token_value, resolve_str, ConfigStore, Configuration,
};
use crate::constants::{DEFAULT_AI_NAME, DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::error::AppError;
use crate::i18n::{self, LanguagePack};
use crate::output::{Output, Renderer, StdoutRenderer};
use crate::provider::{CompletionProvider, CredentialStatus, ModelConfig};

/// Interactive question/answer channel used by the setup wizard and by
/// confirmations inside commands.
pub trait Prompter: Send {
    /// Asks for a line of text. Empty input yields `default` when one is given.
    fn ask(&mut self, question: &str, default: Option<&str>) -> io::Result<String>;

    /// Asks a yes/no question.
    fn confirm(&mut self, question: &str, default: bool) -> io::Result<bool>;

    /// Shows output between questions.
    fn show(&mut self, output: &Output);
}

/// Prompts on stderr and reads answers from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompter {
    renderer: StdoutRenderer,
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_answer(prompt: &str) -> io::Result<String> {
        eprint!("{prompt}");
        io::stderr().flush()?;
        let mut response = String::new();
        if io::stdin().read_line(&mut response)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(response.trim().to_string())
    }
}

impl Prompter for StdinPrompter {
    fn ask(&mut self, question: &str, default: Option<&str>) -> io::Result<String> {
        let prompt = match default {
            Some(d) if !d.is_empty() => format!("{question} [{d}]: "),
            _ => format!("{question}: "),
        };
        let answer = Self::read_answer(&prompt)?;
        match default {
            Some(d) if answer.is_empty() => Ok(d.to_string()),
            _ => Ok(answer),
        }
    }

    fn confirm(&mut self, question: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let answer = Self::read_answer(&format!("{question} [{hint}] "))?;
            match answer.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => continue,
            }
        }
    }

    fn show(&mut self, output: &Output) {
        self.renderer.render(output);
    }
}

/// Walks the user through creating one configuration.
pub struct SetupWizard<'a> {
    store: &'a ConfigStore,
    provider: &'a dyn CompletionProvider,
    prompter: &'a mut dyn Prompter,
    lang: LanguagePack,
}

impl<'a> SetupWizard<'a> {
    pub fn new(
        store: &'a ConfigStore,
        provider: &'a dyn CompletionProvider,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            store,
            provider,
            prompter,
            lang: LanguagePack::fallback(),
        }
    }

    /// Language used for the wizard's own questions.
    pub fn with_language(mut self, lang: LanguagePack) -> Self {
        self.lang = lang;
        self
    }

    /// Collects a validated draft. The caller stores it.
    ///
    /// `first_run` adds the language choice. A given `id` must be free.
    pub async fn run(mut self, id: Option<String>, first_run: bool) -> Result<Configuration, AppError> {
        let mut draft = Configuration::default();
        draft.id = match id {
            Some(id) => {
                let mut candidate = Configuration::draft("-", DEFAULT_ENDPOINT, "-");
                candidate.id = id.clone();
                self.store.check_new(&candidate)?;
                id
            }
            None => self.store.next_id()?,
        };

        if first_run {
            self.note_heading(self.lang.t("setup.first_run"));
            self.lang = self.ask_language()?;
        }
        draft.language = self.lang.code().to_string();
        self.note_heading(self.lang.tf("setup.title", &[("id", &draft.id)]));

        self.ask_connection(&mut draft).await?;

        let name = self.prompter.ask(&self.lang.t("setup.name"), Some(""))?;
        if !name.is_empty() {
            draft.names.insert(draft.language.clone(), name.clone());
            draft.name = name;
        }
        draft.aliases = self.ask_aliases(&draft.id)?;
        draft.ai_name = self
            .prompter
            .ask(&self.lang.t("setup.ai_name"), Some(DEFAULT_AI_NAME))?;
        draft.system_prompt = self.prompter.ask(&self.lang.t("setup.system_prompt"), Some(""))?;
        let welcome = self.prompter.ask(&self.lang.t("setup.welcome"), Some(""))?;
        if !welcome.is_empty() {
            draft.welcome.insert(draft.language.clone(), welcome);
        }
        draft.history = self.prompter.confirm(&self.lang.t("setup.history"), true)?;
        draft.summary = draft.history && self.prompter.confirm(&self.lang.t("setup.summary"), true)?;
        draft.stream = self.prompter.confirm(&self.lang.t("setup.stream"), true)?;
        draft.max_tokens = self.ask_max_tokens()?;

        self.store.check_new(&draft)?;
        Ok(draft)
    }

    fn ask_language(&mut self) -> Result<LanguagePack, AppError> {
        let mut out = Output::new();
        for (code, name) in i18n::available() {
            out.plain(format!("  {code:<8} {name}"));
        }
        self.prompter.show(&out);
        loop {
            let code = self
                .prompter
                .ask(&self.lang.t("setup.language"), Some(self.lang.code()))?;
            match LanguagePack::load(&code) {
                Some(pack) => return Ok(pack),
                None => self.note_error(self.lang.tf("lang.unsupported", &[("code", &code)])),
            }
        }
    }

    /// Credential, endpoint and model, checked against the provider until the
    /// user accepts the result.
    async fn ask_connection(&mut self, draft: &mut Configuration) -> Result<(), AppError> {
        let mut endpoint_default = DEFAULT_ENDPOINT.to_string();
        let mut model_default = DEFAULT_MODEL.to_string();
        loop {
            draft.credential = self.ask_required("setup.credential")?;
            draft.endpoint = loop {
                let endpoint = self
                    .prompter
                    .ask(&self.lang.t("setup.endpoint"), Some(endpoint_default.as_str()))?;
                match check_endpoint(&resolve_str(&endpoint)) {
                    Ok(()) => break endpoint,
                    Err(e) => self.note_error(e.to_string()),
                }
            };
            draft.model = self
                .prompter
                .ask(&self.lang.t("setup.model"), Some(model_default.as_str()))?;
            endpoint_default = draft.endpoint.clone();
            model_default = draft.model.clone();

            self.note_info(self.lang.t("setup.checking"));
            let model = ModelConfig::from_configuration(draft);
            let status = CredentialStatus::from(
                self.provider
                    .validate_credential(&model, self.store.settings().timeout())
                    .await,
            );
            tracing::info!(status = ?status, "setup credential check");
            match status {
                CredentialStatus::Valid => {
                    self.note_success(self.lang.t("credential.valid"));
                    return Ok(());
                }
                CredentialStatus::Invalid(detail) => {
                    self.note_error(self.lang.tf("credential.invalid", &[("detail", &detail)]));
                }
                CredentialStatus::NetworkUnavailable(detail) => {
                    self.note_warning(self.lang.tf("credential.unreachable", &[("detail", &detail)]));
                    if self.prompter.confirm(&self.lang.t("setup.keep_unverified"), true)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn ask_required(&mut self, key: &str) -> Result<String, AppError> {
        loop {
            let answer = self.prompter.ask(&self.lang.t(key), None)?;
            if !answer.trim().is_empty() {
                return Ok(answer.trim().to_string());
            }
            self.note_error(self.lang.t("setup.required"));
        }
    }

    fn ask_aliases(&mut self, id: &str) -> Result<Vec<String>, AppError> {
        loop {
            let answer = self.prompter.ask(&self.lang.t("setup.aliases"), Some(""))?;
            let aliases = parse_aliases(&answer);
            match self.store.check_aliases(id, &aliases) {
                Ok(()) => return Ok(aliases),
                Err(e) => self.note_error(e.to_string()),
            }
        }
    }

    fn ask_max_tokens(&mut self) -> Result<usize, AppError> {
        let default = DEFAULT_MAX_TOKENS.to_string();
        loop {
            let answer = self
                .prompter
                .ask(&self.lang.t("setup.max_tokens"), Some(default.as_str()))?;
            match parse_token_value(&answer) {
                Some(n) if n > 0 => return Ok(n),
                _ => self.note_error(self.lang.tf("setup.bad_tokens", &[("value", &answer)])),
            }
        }
    }

    fn note_heading(&mut self, text: String) {
        let mut out = Output::new();
        out.heading(text);
        self.prompter.show(&out);
    }

    fn note_info(&mut self, text: String) {
        let mut out = Output::new();
        out.info(text);
        self.prompter.show(&out);
    }

    fn note_success(&mut self, text: String) {
        let mut out = Output::new();
        out.success(text);
        self.prompter.show(&out);
    }

    fn note_warning(&mut self, text: String) {
        let mut out = Output::new();
        out.warning(text);
        self.prompter.show(&out);
    }

    fn note_error(&mut self, text: String) {
        let mut out = Output::new();
        out.error(text);
        self.prompter.show(&out);
    }
}
