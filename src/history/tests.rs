use super::*;
use crate::error::ProviderError;
use crate::message::Role;
use async_trait::async_trait;
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

/// Summarizer that returns queued results and counts calls.
struct FakeSummarizer {
    results: Mutex<Vec<Result<String, ProviderError>>>,
    calls: Mutex<Vec<(Option<String>, Vec<String>)>>,
}

impl FakeSummarizer {
    fn new(results: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().rev().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(
        &self,
        previous: Option<&Turn>,
        turns: &[Turn],
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push((
            previous.map(|p| p.content.clone()),
            turns.iter().map(|t| t.content.clone()).collect(),
        ));
        self.results
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(ProviderError::Provider("unexpected call".into())))
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

fn policy(threshold: usize, window: usize) -> CompressionPolicy {
    CompressionPolicy {
        threshold_tokens: threshold,
        recency_window: window,
        auto: true,
    }
}

fn turn(i: usize) -> Turn {
    let role = if i % 2 == 1 { Role::User } else { Role::Assistant };
    Turn::new(role, format!("turn {i}")).with_tokens(10)
}

fn contents(manager: &HistoryManager) -> Vec<String> {
    manager
        .build_outgoing()
        .iter()
        .map(|t| t.content.clone())
        .collect()
}

#[test]
fn test_append_accumulates_and_orders_turns() {
    let mut history = HistoryManager::in_memory(policy(1_000, 2));
    for i in 1..=4 {
        history.append(turn(i)).unwrap();
    }

    assert_eq!(contents(&history), vec!["turn 1", "turn 2", "turn 3", "turn 4"]);
    assert_eq!(history.state(), HistoryState::Accumulating);
    let stats = history.stats();
    assert_eq!(stats.turn_count, 4);
    assert_eq!(stats.token_estimate, 40);
    assert_eq!(stats.compression_count, 0);

    let out = history.build_outgoing();
    assert!(out.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_summary_turns_cannot_be_appended() {
    let mut history = HistoryManager::in_memory(policy(1_000, 2));
    let meta = SummaryMeta {
        original_tokens: 1,
        summarized_tokens: 1,
        turns_replaced: 1,
        ordinal: 1,
        model: String::new(),
    };
    let err = history.append(Turn::summary("x", meta)).unwrap_err();
    assert!(matches!(err, HistoryError::SummaryNotAppendable));
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_window_two_compresses_first_three_turns() {
    let mut history = HistoryManager::in_memory(policy(50, 2));
    for i in 1..=4 {
        history.append(turn(i)).unwrap();
        assert!(!history.needs_compression());
    }
    history.append(turn(5)).unwrap();
    assert_eq!(history.state(), HistoryState::CompressionPending);

    let summarizer = FakeSummarizer::new(vec![Ok("summary of 1-3".into())]);
    let result = history.compress_if_needed(&summarizer).await.unwrap();

    assert_eq!(
        contents(&history),
        vec!["summary of 1-3", "turn 4", "turn 5"]
    );
    let out = history.build_outgoing();
    assert_eq!(out[0].role, Role::Summary);
    assert!(out.iter().skip(1).all(|t| !t.is_summary()));
    assert!(out.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let summary_tokens = out[0].tokens;
    assert_eq!(
        result,
        CompactionResult::Compacted {
            turns_replaced: 3,
            tokens_before: 50,
            tokens_after: summary_tokens + 20,
        }
    );
    assert_eq!(history.state(), HistoryState::Compressed);
    assert_eq!(history.stats().compression_count, 1);

    let meta = out[0].summary.as_ref().unwrap();
    assert_eq!(meta.original_tokens, 30);
    assert_eq!(meta.turns_replaced, 3);
    assert_eq!(meta.ordinal, 1);
    assert_eq!(meta.model, "fake-model");
    assert_eq!(summarizer.calls.lock().unwrap()[0].1, vec!["turn 1", "turn 2", "turn 3"]);
}

#[tokio::test]
async fn test_compress_without_new_turns_is_a_no_op() {
    let mut history = HistoryManager::in_memory(policy(50, 2));
    for i in 1..=5 {
        history.append(turn(i)).unwrap();
    }
    let summarizer = FakeSummarizer::new(vec![Ok("s".into())]);
    history.compress(&summarizer).await.unwrap();
    let before = contents(&history);
    let stats_before = history.stats();

    let again = history.compress(&summarizer).await.unwrap();

    assert_eq!(again, CompactionResult::NothingToCompact);
    assert_eq!(summarizer.call_count(), 1);
    assert_eq!(contents(&history), before);
    assert_eq!(history.stats(), stats_before);
    assert_eq!(history.state(), HistoryState::Compressed);
}

#[tokio::test]
async fn test_second_compression_folds_previous_summary() {
    let mut history = HistoryManager::in_memory(policy(50, 2));
    for i in 1..=5 {
        history.append(turn(i)).unwrap();
    }
    let summarizer = FakeSummarizer::new(vec![Ok("first".into()), Ok("second".into())]);
    history.compress(&summarizer).await.unwrap();

    history.append(turn(6)).unwrap();
    history.append(turn(7)).unwrap();
    history.compress(&summarizer).await.unwrap();

    assert_eq!(contents(&history), vec!["second", "turn 6", "turn 7"]);
    let calls = summarizer.calls.lock().unwrap();
    assert_eq!(calls[1].0.as_deref(), Some("first"));
    assert_eq!(calls[1].1, vec!["turn 4", "turn 5"]);
    drop(calls);

    let meta = history.summary().unwrap().summary.clone().unwrap();
    assert_eq!(meta.ordinal, 2);
    assert_eq!(meta.turns_replaced, 3);
    assert_eq!(history.build_outgoing().iter().filter(|t| t.is_summary()).count(), 1);
}

#[tokio::test]
async fn test_failed_summarization_leaves_history_unchanged() {
    let mut history = HistoryManager::in_memory(policy(50, 2));
    for i in 1..=5 {
        history.append(turn(i)).unwrap();
    }
    let before = contents(&history);
    let summarizer = FakeSummarizer::new(vec![
        Err(ProviderError::Network("down".into())),
        Ok("recovered".into()),
    ]);

    let err = history.compress_if_needed(&summarizer).await.unwrap_err();
    assert!(matches!(err, HistoryError::Summarization(ProviderError::Network(_))));
    assert_eq!(contents(&history), before);
    assert_eq!(history.state(), HistoryState::Accumulating);
    assert_eq!(history.stats().compression_count, 0);

    // The next threshold crossing retries.
    history.append(turn(6)).unwrap();
    assert!(history.needs_compression());
    history.compress_if_needed(&summarizer).await.unwrap();
    assert_eq!(contents(&history), vec!["recovered", "turn 5", "turn 6"]);
}

#[tokio::test]
async fn test_short_tail_has_nothing_to_compact() {
    let mut history = HistoryManager::in_memory(policy(5, 3));
    history.append(turn(1)).unwrap();
    assert!(history.needs_compression());

    let summarizer = FakeSummarizer::new(vec![]);
    let result = history.compress_if_needed(&summarizer).await.unwrap();
    assert_eq!(result, CompactionResult::NothingToCompact);
    assert_eq!(summarizer.call_count(), 0);
    assert_eq!(history.state(), HistoryState::Accumulating);
}

#[test]
fn test_disabled_auto_never_schedules_compression() {
    let mut p = policy(10, 1);
    p.auto = false;
    let mut history = HistoryManager::in_memory(p);
    for i in 1..=5 {
        history.append(turn(i)).unwrap();
    }
    assert!(!history.needs_compression());
}

#[tokio::test]
async fn test_durable_round_trip_reconstructs_summary_and_tail() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::new(dir.path().join("Prompt_000.jsonl"));
    let mut history = HistoryManager::open(store.clone(), policy(50, 2)).unwrap();
    for i in 1..=5 {
        history.append(turn(i)).unwrap();
    }
    let summarizer = FakeSummarizer::new(vec![Ok("summary".into())]);
    history.compress(&summarizer).await.unwrap();
    history.append(turn(6)).unwrap();

    let reloaded = HistoryManager::open(store, policy(50, 2)).unwrap();

    let original: Vec<Turn> = history.build_outgoing().into_iter().cloned().collect();
    let replayed: Vec<Turn> = reloaded.build_outgoing().into_iter().cloned().collect();
    assert_eq!(original, replayed);
    assert_eq!(reloaded.stats().compression_count, 1);
    assert_eq!(reloaded.stats().token_estimate, history.stats().token_estimate);
}

#[test]
fn test_replay_resets_at_summary_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("h.jsonl");
    let meta = SummaryMeta {
        original_tokens: 20,
        summarized_tokens: 5,
        turns_replaced: 2,
        ordinal: 1,
        model: "m".into(),
    };
    let lines = [
        turn(1),
        turn(2),
        Turn::summary("s1", meta.clone()),
        turn(3),
        Turn::summary("s2", SummaryMeta { ordinal: 2, ..meta }),
        turn(4),
    ];
    let mut text = String::new();
    for t in &lines {
        text.push_str(&serde_json::to_string(t).unwrap());
        text.push('\n');
    }
    fs::write(&path, text).unwrap();

    let replay = HistoryStore::new(&path).load().unwrap();
    assert_eq!(replay.summary.unwrap().content, "s2");
    let tail: Vec<&str> = replay.tail.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(tail, vec!["turn 4"]);
}

#[test]
fn test_truncated_final_line_is_dropped_and_repaired() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("h.jsonl");
    let good = serde_json::to_string(&turn(1)).unwrap();
    fs::write(&path, format!("{good}\n{{\"role\":\"assis")).unwrap();

    let store = HistoryStore::new(&path);
    let replay = store.load().unwrap();
    assert_eq!(replay.tail.len(), 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), format!("{good}\n"));

    // Appending after repair yields a clean log.
    store.append(&[turn(2)]).unwrap();
    assert_eq!(store.load().unwrap().tail.len(), 2);
}

#[test]
fn test_corrupt_middle_line_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("h.jsonl");
    let good = serde_json::to_string(&turn(1)).unwrap();
    fs::write(&path, format!("not json\n{good}\n")).unwrap();

    let err = HistoryManager::open(HistoryStore::new(&path), policy(50, 2)).unwrap_err();
    assert!(matches!(err, HistoryError::CorruptStore { .. }));
}

#[test]
fn test_archive_moves_log_and_resets() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::new(dir.path().join("Prompt_000.jsonl"));
    let mut history = HistoryManager::open(store.clone(), policy(50, 2)).unwrap();
    history.append(turn(1)).unwrap();

    let archived = history
        .archive(&dir.path().join("archive"))
        .unwrap()
        .unwrap();

    assert!(archived.exists());
    assert!(!store.path().exists());
    assert!(history.is_empty());
    assert_eq!(history.stats().token_estimate, 0);
}

#[test]
fn test_in_memory_history_writes_nothing() {
    let mut history = HistoryManager::in_memory(policy(50, 2));
    history.append(turn(1)).unwrap();
    history.flush().unwrap();
    assert!(history.store_path().is_none());
}

#[test]
fn test_append_exchange_checks_roles() {
    let mut history = HistoryManager::in_memory(policy(1_000, 2));
    let err = history
        .append_exchange(Turn::assistant("a"), Turn::assistant("b"))
        .unwrap_err();
    assert!(matches!(err, HistoryError::InvalidRole(ref r) if r == "assistant"));
    assert!(history.is_empty());

    history
        .append_exchange(Turn::user("q"), Turn::assistant("a"))
        .unwrap();
    assert_eq!(contents(&history), vec!["q", "a"]);
}

#[test]
fn test_failed_exchange_write_keeps_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("h.jsonl");
    let mut history = HistoryManager::open(HistoryStore::new(&path), policy(1_000, 2)).unwrap();
    // A directory where the log should be makes every append fail.
    fs::create_dir_all(&path).unwrap();

    let err = history
        .append_exchange(Turn::user("q"), Turn::assistant("a"))
        .unwrap_err();
    assert!(matches!(err, HistoryError::Io(_)));
    assert!(history.is_empty());
    assert_eq!(history.stats().token_estimate, 0);
}

#[test]
fn test_exchange_reaches_the_log_as_two_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("h.jsonl");
    let mut history = HistoryManager::open(HistoryStore::new(&path), policy(1_000, 2)).unwrap();
    history
        .append_exchange(Turn::user("q"), Turn::assistant("a"))
        .unwrap();

    let replay = HistoryStore::new(&path).load().unwrap();
    let roles: Vec<Role> = replay.tail.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
}
