//! HTTP client for OpenAI-compatible chat completion endpoints.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{CompletionProvider, ModelConfig};
use crate::constants::{APP_NAME, ERROR_BODY_PREVIEW, VERSION};
use crate::error::ProviderError;
use crate::message::ChatMessage;

/// A reqwest-backed [`CompletionProvider`].
///
/// One HTTP client is shared across calls; the timeout is applied per
/// request so summarization and chat can use different bounds.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    http: Client,
}

impl OpenAiProvider {
    /// Creates a provider with a shared connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Provider`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, ProviderError> {
        let http = Client::builder()
            .user_agent(format!("{APP_NAME}/{VERSION}"))
            .build()
            .map_err(|e| ProviderError::Provider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    fn url(endpoint: &str, path: &str) -> String {
        format!("{}/{}", endpoint.trim_end_matches('/'), path)
    }

    async fn post_completion(
        &self,
        messages: &[ChatMessage],
        model: &ModelConfig,
        timeout: Duration,
        stream: bool,
    ) -> Result<Response, ProviderError> {
        let url = Self::url(&model.endpoint, "chat/completions");
        let request = ChatCompletionRequest {
            model: &model.model,
            messages,
            max_tokens: model.max_output_tokens,
            temperature: model.temperature,
            stream,
        };

        tracing::debug!(url = %url, model = %model.model, messages = messages.len(), stream, "sending chat completion");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&model.credential)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = response.status();
        tracing::debug!(status = %status, "chat completion response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }
        Ok(response)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// One `data:` event of a streamed completion.
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChoiceMessage,
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &ModelConfig,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let response = self.post_completion(messages, model, timeout, false).await?;
        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Provider("response contained no message".to_string()))
    }

    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        model: &ModelConfig,
        timeout: Duration,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<String, ProviderError> {
        let response = self.post_completion(messages, model, timeout, true).await?;
        let mut stream = response.bytes_stream();
        // Bytes, not text: a multi-byte character may straddle two chunks.
        let mut buffer: Vec<u8> = Vec::new();
        let mut reply = String::new();

        'events: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_transport_error(e, timeout))?;
            buffer.extend_from_slice(&chunk);

            while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=line_end).collect();
                let line = String::from_utf8_lossy(&line);
                let Some(data) = line.trim().strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data == "[DONE]" {
                    break 'events;
                }
                if let Some(text) = parse_chunk(data)? {
                    on_chunk(&text);
                    reply.push_str(&text);
                }
            }
        }

        tracing::debug!(chars = reply.chars().count(), "stream finished");
        if reply.is_empty() {
            return Err(ProviderError::Provider("response contained no message".to_string()));
        }
        Ok(reply)
    }

    async fn validate_credential(
        &self,
        model: &ModelConfig,
        timeout: Duration,
    ) -> Result<(), ProviderError> {
        let url = Self::url(&model.endpoint, "models");
        tracing::debug!(url = %url, "validating credential");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&model.credential)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = response.status();
        match status {
            s if s.is_success() => Ok(()),
            // Some compatible servers do not list models; the key was not rejected.
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => {
                tracing::debug!(status = %status, "model listing unsupported, treating credential as valid");
                Ok(())
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(map_status(status, &body))
            }
        }
    }
}

/// Classifies a reqwest failure that happened before a status was received,
/// or while reading the body.
fn map_transport_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else if err.is_connect() || err.is_request() {
        ProviderError::Network(err.to_string())
    } else if err.is_decode() {
        ProviderError::Provider(format!("unexpected response body: {err}"))
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Extracts the content delta of one stream event, if it carries any.
fn parse_chunk(data: &str) -> Result<Option<String>, ProviderError> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| ProviderError::Provider(format!("unexpected stream event: {e}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty()))
}

/// Maps a non-success HTTP status to a typed error.
fn map_status(status: StatusCode, body: &str) -> ProviderError {
    let preview = preview(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Auth(format!("{status}: {preview}"))
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimit(preview),
        _ => ProviderError::Provider(format!("HTTP {status}: {preview}")),
    }
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > ERROR_BODY_PREVIEW {
        let cut: String = trimmed.chars().take(ERROR_BODY_PREVIEW).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
