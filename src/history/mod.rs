//! Conversation history and compression for octool.
//!
//! The [`HistoryManager`] owns the turns of the active session as an optional
//! summary followed by a verbatim tail. When the running token estimate
//! crosses the policy threshold it enters `CompressionPending`; compression
//! folds everything except the most recent turns into a single summary turn
//! produced by a [`Summarizer`].

mod store;
mod summarize;

#[cfg(test)]
mod tests;

pub use store::{HistoryStore, Replay};
pub use summarize::{ProviderSummarizer, Summarizer};

use std::path::{Path, PathBuf};

use crate::error::HistoryError;
use crate::message::{Role, SummaryMeta, Turn};

/// Where the manager is in its compression cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryState {
    Accumulating,
    /// The token estimate crossed the threshold; compression should run.
    CompressionPending,
    /// Compression just ran and no turn has been appended since.
    Compressed,
}

/// When and how much to compress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionPolicy {
    /// Token estimate at which compression becomes pending.
    pub threshold_tokens: usize,
    /// Most recent turns always kept verbatim.
    pub recency_window: usize,
    /// Whether crossing the threshold schedules compression at all.
    pub auto: bool,
}

impl CompressionPolicy {
    /// Threshold as a fraction of a context budget.
    pub fn for_budget(max_tokens: usize, ratio: f64, recency_window: usize, auto: bool) -> Self {
        Self {
            threshold_tokens: ((max_tokens as f64) * ratio).max(1.0) as usize,
            recency_window,
            auto,
        }
    }
}

/// Result of a compression attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CompactionResult {
    /// The tail is already within the recency window, or nothing changed
    /// since the last compression.
    NothingToCompact,
    /// Older turns were replaced by a summary.
    Compacted {
        /// Turns folded into the summary, including a previous summary.
        turns_replaced: usize,
        /// Token estimate before compression.
        tokens_before: usize,
        /// Token estimate after compression.
        tokens_after: usize,
    },
}

/// Figures shown by `/history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStats {
    /// Turns in the outgoing context, counting the summary.
    pub turn_count: usize,
    pub token_estimate: usize,
    pub compression_count: usize,
    pub threshold_tokens: usize,
}

/// Ordered turns of one session.
#[derive(Debug)]
pub struct HistoryManager {
    summary: Option<Turn>,
    tail: Vec<Turn>,
    token_estimate: usize,
    state: HistoryState,
    policy: CompressionPolicy,
    compression_count: usize,
    store: Option<HistoryStore>,
}

impl HistoryManager {
    /// A history that lives in memory only.
    pub fn in_memory(policy: CompressionPolicy) -> Self {
        Self {
            summary: None,
            tail: Vec::new(),
            token_estimate: 0,
            state: HistoryState::Accumulating,
            policy,
            compression_count: 0,
            store: None,
        }
    }

    /// Resumes from a durable store.
    pub fn open(store: HistoryStore, policy: CompressionPolicy) -> Result<Self, HistoryError> {
        let Replay { summary, tail } = store.load()?;
        let compression_count = summary
            .as_ref()
            .and_then(|s| s.summary.as_ref())
            .map(|m| m.ordinal)
            .unwrap_or(0);
        let mut manager = Self {
            summary,
            tail,
            token_estimate: 0,
            state: HistoryState::Accumulating,
            policy,
            compression_count,
            store: Some(store),
        };
        manager.token_estimate = manager.recount();
        manager.state = manager.state_for_estimate();
        Ok(manager)
    }

    pub fn state(&self) -> HistoryState {
        self.state
    }

    pub fn policy(&self) -> CompressionPolicy {
        self.policy
    }

    /// Replaces the policy; the state is re-evaluated against the new threshold.
    pub fn set_policy(&mut self, policy: CompressionPolicy) {
        self.policy = policy;
        if self.state != HistoryState::Compressed {
            self.state = self.state_for_estimate();
        }
    }

    pub fn summary(&self) -> Option<&Turn> {
        self.summary.as_ref()
    }

    /// Verbatim turns after the summary.
    pub fn turns(&self) -> &[Turn] {
        &self.tail
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.tail.is_empty()
    }

    /// Backing file, if the history is durable.
    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_ref().map(HistoryStore::path)
    }

    /// Appends a user or assistant turn.
    ///
    /// The turn is written to the durable log before it becomes visible.
    pub fn append(&mut self, turn: Turn) -> Result<(), HistoryError> {
        self.append_all(vec![turn])
    }

    /// Appends a question and its reply together: both reach the log in one
    /// write, or neither is kept.
    pub fn append_exchange(&mut self, user: Turn, assistant: Turn) -> Result<(), HistoryError> {
        if user.role != Role::User {
            return Err(HistoryError::InvalidRole(user.role.to_string()));
        }
        if assistant.role != Role::Assistant {
            return Err(HistoryError::InvalidRole(assistant.role.to_string()));
        }
        self.append_all(vec![user, assistant])
    }

    fn append_all(&mut self, turns: Vec<Turn>) -> Result<(), HistoryError> {
        if turns.iter().any(Turn::is_summary) {
            return Err(HistoryError::SummaryNotAppendable);
        }
        if let Some(ref store) = self.store {
            store.append(&turns)?;
        }
        for turn in turns {
            self.token_estimate += turn.tokens;
            self.tail.push(turn);
        }
        self.state = self.state_for_estimate();
        if self.state == HistoryState::CompressionPending {
            tracing::debug!(
                tokens = self.token_estimate,
                threshold = self.policy.threshold_tokens,
                "history compression pending"
            );
        }
        Ok(())
    }

    /// The summary (if any) followed by the verbatim tail, oldest first.
    pub fn build_outgoing(&self) -> Vec<&Turn> {
        self.summary.iter().chain(self.tail.iter()).collect()
    }

    /// Whether the threshold was crossed since the last compression.
    pub fn needs_compression(&self) -> bool {
        self.state == HistoryState::CompressionPending
    }

    /// Runs the compression protocol regardless of the threshold.
    ///
    /// On summarizer failure nothing changes and the state drops back to
    /// `Accumulating`; the next threshold crossing retries.
    pub async fn compress(
        &mut self,
        summarizer: &dyn Summarizer,
    ) -> Result<CompactionResult, HistoryError> {
        let window = self.policy.recency_window;
        if self.state == HistoryState::Compressed || self.tail.len() <= window {
            if self.state == HistoryState::CompressionPending {
                self.state = HistoryState::Accumulating;
            }
            return Ok(CompactionResult::NothingToCompact);
        }

        let cut = self.tail.len() - window;
        let older = &self.tail[..cut];
        let text = match summarizer.summarize(self.summary.as_ref(), older).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "history compression failed, continuing uncompressed");
                self.state = HistoryState::Accumulating;
                return Err(HistoryError::Summarization(e));
            }
        };

        let previous_tokens = self.summary.as_ref().map(|s| s.tokens).unwrap_or(0);
        let original_tokens = previous_tokens + older.iter().map(|t| t.tokens).sum::<usize>();
        let turns_replaced = cut + usize::from(self.summary.is_some());
        let meta = SummaryMeta {
            original_tokens,
            summarized_tokens: 0,
            turns_replaced,
            ordinal: self.compression_count + 1,
            model: summarizer.model().to_string(),
        };
        let mut summary = Turn::summary(text, meta);
        // Sits where the replaced turns were, so the sequence stays chronological.
        summary.timestamp = older[cut - 1].timestamp;
        if let Some(ref mut m) = summary.summary {
            m.summarized_tokens = summary.tokens;
        }

        let kept = self.tail[cut..].to_vec();
        if let Some(ref store) = self.store {
            if let Err(e) = store.rewrite(Some(&summary), &kept) {
                self.state = HistoryState::Accumulating;
                return Err(e);
            }
        }

        let tokens_before = self.token_estimate;
        self.summary = Some(summary);
        self.tail = kept;
        self.token_estimate = self.recount();
        self.compression_count += 1;
        self.state = HistoryState::Compressed;

        tracing::info!(
            turns_replaced,
            tokens_before,
            tokens_after = self.token_estimate,
            ordinal = self.compression_count,
            "history compressed"
        );
        Ok(CompactionResult::Compacted {
            turns_replaced,
            tokens_before,
            tokens_after: self.token_estimate,
        })
    }

    /// Compresses only when the threshold was crossed.
    pub async fn compress_if_needed(
        &mut self,
        summarizer: &dyn Summarizer,
    ) -> Result<CompactionResult, HistoryError> {
        if !self.needs_compression() {
            return Ok(CompactionResult::NothingToCompact);
        }
        self.compress(summarizer).await
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            turn_count: self.tail.len() + usize::from(self.summary.is_some()),
            token_estimate: self.token_estimate,
            compression_count: self.compression_count,
            threshold_tokens: self.policy.threshold_tokens,
        }
    }

    /// Rewrites the durable log from memory.
    pub fn flush(&self) -> Result<(), HistoryError> {
        if let Some(ref store) = self.store {
            store.rewrite(self.summary.as_ref(), &self.tail)?;
            tracing::debug!(path = %store.path().display(), "history flushed");
        }
        Ok(())
    }

    /// Archives the durable log and empties the history.
    pub fn archive(&mut self, archive_dir: &Path) -> Result<Option<PathBuf>, HistoryError> {
        let archived = match self.store {
            Some(ref store) => store.archive(archive_dir)?,
            None => None,
        };
        self.summary = None;
        self.tail.clear();
        self.token_estimate = 0;
        self.compression_count = 0;
        self.state = HistoryState::Accumulating;
        Ok(archived)
    }

    fn recount(&self) -> usize {
        self.build_outgoing().iter().map(|t| t.tokens).sum()
    }

    fn state_for_estimate(&self) -> HistoryState {
        if self.policy.auto && self.token_estimate >= self.policy.threshold_tokens {
            HistoryState::CompressionPending
        } else {
            HistoryState::Accumulating
        }
    }
}
