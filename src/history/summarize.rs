//! Summarization seam used by history compression.

use std::time::Duration;

use async_trait::async_trait;

use crate::constants::{SUMMARY_MAX_OUTPUT_TOKENS, SUMMARY_TEMPERATURE};
use crate::error::ProviderError;
use crate::i18n::LanguagePack;
use crate::message::{ChatMessage, Role, Turn};
use crate::provider::{CompletionProvider, ModelConfig};

/// Produces the text of a summary turn.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarizes `turns`, folding in the `previous` summary if there is one.
    async fn summarize(
        &self,
        previous: Option<&Turn>,
        turns: &[Turn],
    ) -> Result<String, ProviderError>;

    /// Model recorded in the summary metadata.
    fn model(&self) -> &str;
}

/// Summarizes through the active configuration's completion provider.
pub struct ProviderSummarizer<'a> {
    provider: &'a dyn CompletionProvider,
    model: ModelConfig,
    lang: LanguagePack,
    timeout: Duration,
}

impl<'a> ProviderSummarizer<'a> {
    pub fn new(
        provider: &'a dyn CompletionProvider,
        model: ModelConfig,
        lang: LanguagePack,
        timeout: Duration,
    ) -> Self {
        let model = model
            .with_temperature(SUMMARY_TEMPERATURE)
            .with_max_output_tokens(SUMMARY_MAX_OUTPUT_TOKENS);
        Self {
            provider,
            model,
            lang,
            timeout,
        }
    }

    /// Renders turns as a plain transcript for the summarization request.
    fn transcript(&self, previous: Option<&Turn>, turns: &[Turn]) -> String {
        let mut out = String::new();
        if let Some(prev) = previous {
            out.push_str(&self.lang.t("summary.previous"));
            out.push('\n');
            out.push_str(&prev.content);
            out.push_str("\n\n");
        }
        for turn in turns {
            let speaker = match turn.role {
                Role::User => self.lang.t("summary.role_user"),
                Role::Assistant => self.lang.t("summary.role_assistant"),
                Role::Summary => self.lang.t("summary.role_summary"),
            };
            out.push_str(&format!(
                "[{}] {}: {}\n\n",
                turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
                speaker,
                turn.content
            ));
        }
        out.trim_end().to_string()
    }
}

#[async_trait]
impl Summarizer for ProviderSummarizer<'_> {
    async fn summarize(
        &self,
        previous: Option<&Turn>,
        turns: &[Turn],
    ) -> Result<String, ProviderError> {
        let prompt = self.lang.tf(
            "summary.prompt",
            &[("conversation", &self.transcript(previous, turns))],
        );
        let messages = [
            ChatMessage::system(self.lang.t("summary.instruction")),
            ChatMessage::user(prompt),
        ];
        let text = self
            .provider
            .complete(&messages, &self.model, self.timeout)
            .await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::Provider("empty summary".to_string()));
        }
        Ok(format!("{}{}", self.lang.t("summary.context_prefix"), text))
    }

    fn model(&self) -> &str {
        &self.model.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SummaryMeta;
    use crate::provider::testing::ScriptedProvider;
    use crate::message::ChatRole;

    fn model() -> ModelConfig {
        ModelConfig {
            endpoint: "https://x.test".into(),
            credential: "k".into(),
            model: "summary-model".into(),
            max_output_tokens: None,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn test_sends_transcript_and_prefixes_reply() {
        let provider = ScriptedProvider::new();
        provider.push_reply(Ok("  talked about rust  ".into()));
        let lang = LanguagePack::fallback();
        let summarizer =
            ProviderSummarizer::new(&provider, model(), lang, Duration::from_secs(5));

        let previous = Turn::summary(
            "older context",
            SummaryMeta {
                original_tokens: 10,
                summarized_tokens: 2,
                turns_replaced: 2,
                ordinal: 1,
                model: "m".into(),
            },
        );
        let turns = vec![Turn::user("what is rust?"), Turn::assistant("a language")];
        let text = summarizer.summarize(Some(&previous), &turns).await.unwrap();

        assert_eq!(
            text,
            format!("{}talked about rust", lang.t("summary.context_prefix"))
        );
        assert_eq!(summarizer.model(), "summary-model");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0].role, ChatRole::System);
        let body = &requests[0][1].content;
        assert!(body.contains("older context"));
        assert!(body.contains("what is rust?"));
        assert!(body.contains("a language"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_an_error() {
        let provider = ScriptedProvider::new();
        provider.push_reply(Ok("   ".into()));
        let summarizer = ProviderSummarizer::new(
            &provider,
            model(),
            LanguagePack::fallback(),
            Duration::from_secs(5),
        );
        let err = summarizer
            .summarize(None, &[Turn::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Provider(_)));
    }
}
