//! Token counting for octool.
//!
//! Uses tiktoken-rs cl100k_base as a model-agnostic approximation. When the
//! BPE tables cannot be loaded the count falls back to a characters-per-token
//! heuristic, so estimation never fails.

use std::sync::LazyLock;

use tiktoken_rs::CoreBPE;

use crate::constants::{CHARS_PER_TOKEN_FALLBACK, TOKENS_PER_MESSAGE_OVERHEAD};

static BPE: LazyLock<Option<CoreBPE>> = LazyLock::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        tracing::warn!(error = %e, "cl100k_base tokenizer unavailable, using character estimate");
        None
    }
});

/// Count tokens for a text string.
pub fn count_tokens(text: &str) -> usize {
    match BPE.as_ref() {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => text.chars().count() / CHARS_PER_TOKEN_FALLBACK + 1,
    }
}

/// Tokens a single message contributes, including role markers.
pub fn message_tokens(text: &str) -> usize {
    count_tokens(text) + TOKENS_PER_MESSAGE_OVERHEAD
}

/// Format a token count for display. Example: "1,234 / 128,000"
pub fn format_token_usage(used: usize, limit: usize) -> String {
    format!("{} / {}", format_number(used), format_number(limit))
}

/// Groups digits by thousands. Example: `12345` → `"12,345"`.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
        assert_eq!(format_token_usage(1_234, 64_000), "1,234 / 64,000");
    }

    #[test]
    fn test_counts_grow_with_text() {
        let short = count_tokens("hello");
        let long = count_tokens("hello there, this sentence is clearly a fair bit longer");
        assert!(short > 0);
        assert!(long > short);
        assert_eq!(message_tokens("hello"), short + TOKENS_PER_MESSAGE_OVERHEAD);
    }
}
