//! Durable history log.
//!
//! Each configuration has one JSONL file under `<data>/history/`. Turns are
//! appended as single flushed lines; compression and explicit flushes rewrite
//! the whole file atomically. Replay treats a summary line as a reset point,
//! so the reconstructed sequence is always "summary + tail".

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::HistoryError;
use crate::message::Turn;
use crate::storage::atomic_write;

/// What a replay of the log reconstructs.
#[derive(Debug, Default, PartialEq)]
pub struct Replay {
    pub summary: Option<Turn>,
    pub tail: Vec<Turn>,
}

/// One configuration's history file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replays the log.
    ///
    /// A final line without a trailing newline that fails to parse is the
    /// remains of an interrupted append: it is dropped with a warning and the
    /// file is repaired. Any other unparsable line is `CorruptStore`.
    pub fn load(&self) -> Result<Replay, HistoryError> {
        if !self.path.exists() {
            return Ok(Replay::default());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.corrupt(e.to_string()))?;
        let lines: Vec<&str> = contents.lines().collect();
        let complete = contents.ends_with('\n');

        let mut replay = Replay::default();
        let mut truncated = false;
        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let turn: Turn = match serde_json::from_str(line) {
                Ok(turn) => turn,
                Err(e) if i + 1 == lines.len() && !complete => {
                    tracing::warn!(path = %self.path.display(), error = %e, "dropping truncated history line");
                    truncated = true;
                    break;
                }
                Err(e) => return Err(self.corrupt(format!("line {}: {}", i + 1, e))),
            };
            if turn.is_summary() {
                replay.tail.clear();
                replay.summary = Some(turn);
            } else {
                replay.tail.push(turn);
            }
        }

        if truncated {
            self.rewrite(replay.summary.as_ref(), &replay.tail)?;
        }
        tracing::debug!(
            path = %self.path.display(),
            turns = replay.tail.len(),
            summary = replay.summary.is_some(),
            "replayed history"
        );
        Ok(replay)
    }

    /// Appends `turns` with a single write and flushes it.
    pub fn append(&self, turns: &[Turn]) -> Result<(), HistoryError> {
        let mut lines = String::new();
        for turn in turns {
            lines.push_str(&serde_json::to_string(turn)?);
            lines.push('\n');
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(lines.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Atomically replaces the log with `summary` followed by `tail`.
    pub fn rewrite(&self, summary: Option<&Turn>, tail: &[Turn]) -> Result<(), HistoryError> {
        let mut out = String::new();
        for turn in summary.into_iter().chain(tail) {
            out.push_str(&serde_json::to_string(turn)?);
            out.push('\n');
        }
        atomic_write(&self.path, out.as_bytes())?;
        Ok(())
    }

    /// Moves the log into `archive_dir` under a timestamped name.
    ///
    /// Returns the new location, or `None` when there was nothing to archive.
    pub fn archive(&self, archive_dir: &Path) -> Result<Option<PathBuf>, HistoryError> {
        if !self.path.exists() {
            return Ok(None);
        }
        fs::create_dir_all(archive_dir)?;
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history".to_string());
        let target = archive_dir.join(format!(
            "{}_{}.jsonl",
            stem,
            Utc::now().format("%Y%m%d_%H%M%S%3f")
        ));
        fs::rename(&self.path, &target)?;
        tracing::info!(from = %self.path.display(), to = %target.display(), "archived history");
        Ok(Some(target))
    }

    fn corrupt(&self, reason: String) -> HistoryError {
        HistoryError::CorruptStore {
            path: self.path.clone(),
            reason,
        }
    }
}
