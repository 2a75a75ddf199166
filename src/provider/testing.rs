//! In-process provider double for controller and history tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CompletionProvider, ModelConfig};
use crate::error::ProviderError;
use crate::message::ChatMessage;

/// Replays queued results in order and records every request it saw.
///
/// An exhausted queue answers with a [`ProviderError::Provider`] so a test
/// that makes an unexpected call fails loudly.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    validations: Mutex<VecDeque<Result<(), ProviderError>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a completion result.
    pub fn push_reply(&self, reply: Result<String, ProviderError>) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Queues a credential validation result.
    pub fn push_validation(&self, result: Result<(), ProviderError>) -> &Self {
        self.validations.lock().unwrap().push_back(result);
        self
    }

    /// Message lists passed to `complete`, oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _model: &ModelConfig,
        _timeout: Duration,
    ) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Provider("no scripted reply".into())))
    }

    /// Delivers the scripted reply word by word.
    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        model: &ModelConfig,
        timeout: Duration,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<String, ProviderError> {
        let reply = self.complete(messages, model, timeout).await?;
        for piece in reply.split_inclusive(' ') {
            on_chunk(piece);
        }
        Ok(reply)
    }

    async fn validate_credential(
        &self,
        _model: &ModelConfig,
        _timeout: Duration,
    ) -> Result<(), ProviderError> {
        self.validations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}
