//! Completion provider abstraction for octool.
//!
//! The session controller and history compressor talk to a
//! [`CompletionProvider`]; [`OpenAiProvider`] implements it over any
//! OpenAI-compatible `/chat/completions` endpoint, either in one response or
//! as a server-sent event stream. Every call takes an explicit timeout and
//! returns a typed [`ProviderError`].

mod client;
#[cfg(test)]
pub mod testing;

pub use client::OpenAiProvider;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Configuration;
use crate::error::ProviderError;
use crate::message::ChatMessage;

/// Everything a provider needs to address one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub endpoint: String,
    pub credential: String,
    pub model: String,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ModelConfig {
    /// Builds a model config from a stored configuration, resolving
    /// `{env:VAR}` placeholders.
    pub fn from_configuration(cfg: &Configuration) -> Self {
        Self {
            endpoint: cfg.resolved_endpoint(),
            credential: cfg.resolved_credential(),
            model: cfg.model.clone(),
            max_output_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A remote service that turns an ordered message list into a reply.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Sends `messages` and returns the assistant's reply text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &ModelConfig,
        timeout: Duration,
    ) -> Result<String, ProviderError>;

    /// Like [`complete`](Self::complete), but hands each piece of the reply
    /// to `on_chunk` as it arrives and returns the whole reply at the end.
    ///
    /// Providers that cannot stream deliver the reply as a single chunk.
    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        model: &ModelConfig,
        timeout: Duration,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<String, ProviderError> {
        let reply = self.complete(messages, model, timeout).await?;
        on_chunk(&reply);
        Ok(reply)
    }

    /// Checks the endpoint accepts the configured credential.
    async fn validate_credential(
        &self,
        model: &ModelConfig,
        timeout: Duration,
    ) -> Result<(), ProviderError>;
}

/// Outcome of a credential check, as presented to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialStatus {
    Valid,
    /// The provider rejected the credential or the request.
    Invalid(String),
    /// The provider could not be reached; the credential is unverified.
    NetworkUnavailable(String),
}

impl From<Result<(), ProviderError>> for CredentialStatus {
    fn from(result: Result<(), ProviderError>) -> Self {
        match result {
            Ok(()) => CredentialStatus::Valid,
            // Being throttled still proves the key was accepted.
            Err(ProviderError::RateLimit(_)) => CredentialStatus::Valid,
            Err(e) if e.is_network() => CredentialStatus::NetworkUnavailable(e.to_string()),
            Err(e) => CredentialStatus::Invalid(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_status_classification() {
        assert_eq!(CredentialStatus::from(Ok(())), CredentialStatus::Valid);
        assert_eq!(
            CredentialStatus::from(Err(ProviderError::RateLimit("slow".into()))),
            CredentialStatus::Valid
        );
        assert!(matches!(
            CredentialStatus::from(Err(ProviderError::Auth("bad key".into()))),
            CredentialStatus::Invalid(_)
        ));
        assert!(matches!(
            CredentialStatus::from(Err(ProviderError::Timeout(Duration::from_secs(3)))),
            CredentialStatus::NetworkUnavailable(_)
        ));
        assert!(matches!(
            CredentialStatus::from(Err(ProviderError::Network("refused".into()))),
            CredentialStatus::NetworkUnavailable(_)
        ));
    }

    #[test]
    fn test_model_config_resolves_env_credential() {
        std::env::set_var("OCTOOL_TEST_MODEL_KEY", "sk-env");
        let mut cfg = Configuration::draft("{env:OCTOOL_TEST_MODEL_KEY}", "https://x.test", "m");
        cfg.id = "Prompt_000".into();
        let model = ModelConfig::from_configuration(&cfg).with_temperature(0.3);
        assert_eq!(model.credential, "sk-env");
        assert_eq!(model.temperature, Some(0.3));
        std::env::remove_var("OCTOOL_TEST_MODEL_KEY");
    }
}
