//! Unknown-term recording
//!
//! Words that no span covers are reported to an [`UnknownTermSink`] so lexicon
//! curators can find new slang. Recording is fire-and-forget: sinks never block
//! a translation and never fail it.

use super::disambiguation::context_window;
use crate::error::EngineResult;
use crate::matcher::Span;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Common words never reported
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "but", "by", "can", "can't", "could", "did", "do", "does", "don't", "for",
    "from", "get", "got", "had", "has", "have", "he", "her", "here", "him", "his", "how", "i",
    "i'm", "if", "in", "is", "it", "it's", "its", "just", "like", "me", "my", "no", "not", "now",
    "of", "on", "one", "or", "our", "out", "really", "she", "so", "some", "than", "that",
    "that's", "the", "their", "them", "then", "there", "these", "they", "this", "those", "to",
    "too", "up", "us", "very", "was", "we", "were", "what", "when", "where", "which", "who", "why",
    "will", "with", "would", "yes", "you", "your",
];

/// One unmatched word with where it was seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownTerm {
    /// Lowercased word
    pub term: String,
    pub context: String,
    pub lexicon_version: String,
    pub observed_at: DateTime<Utc>,
}

/// Receiver of unknown terms; implementations must not block
pub trait UnknownTermSink: Send + Sync {
    fn record_unknown(&self, term: UnknownTerm);
}

/// Logs unknown terms at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUnknownTermSink;

impl UnknownTermSink for TracingUnknownTermSink {
    fn record_unknown(&self, term: UnknownTerm) {
        tracing::debug!(
            term = %term.term,
            context = %term.context,
            lexicon_version = %term.lexicon_version,
            "unknown term"
        );
    }
}

/// Append-only in-memory log
#[derive(Debug, Default)]
pub struct MemoryUnknownTermLog {
    entries: Mutex<Vec<UnknownTerm>>,
}

impl MemoryUnknownTermLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<UnknownTerm> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UnknownTermSink for MemoryUnknownTermLog {
    fn record_unknown(&self, term: UnknownTerm) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(term);
    }
}

/// Forwards unknown terms to a channel drained elsewhere
#[derive(Debug, Clone)]
pub struct ChannelUnknownTermSink {
    sender: mpsc::UnboundedSender<UnknownTerm>,
}

impl ChannelUnknownTermSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UnknownTerm>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl UnknownTermSink for ChannelUnknownTermSink {
    fn record_unknown(&self, term: UnknownTerm) {
        if let Err(err) = self.sender.send(term) {
            tracing::debug!(term = %err.0.term, "unknown-term channel closed, dropping");
        }
    }
}

/// Drain `receiver` into a JSON-lines file until every sender is dropped
///
/// Resolves to the number of records written. Individual write failures are
/// logged and skipped.
pub fn spawn_jsonl_writer(
    mut receiver: mpsc::UnboundedReceiver<UnknownTerm>,
    path: PathBuf,
) -> JoinHandle<EngineResult<usize>> {
    tokio::spawn(async move {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut written = 0;
        while let Some(term) = receiver.recv().await {
            let mut line = match serde_json::to_string(&term) {
                Ok(line) => line,
                Err(err) => {
                    tracing::warn!(error = %err, "could not serialize unknown term");
                    continue;
                }
            };
            line.push('\n');
            match file.write_all(line.as_bytes()).await {
                Ok(()) => written += 1,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not write unknown term")
                }
            }
        }
        file.flush().await?;
        Ok(written)
    })
}

/// Words of `original` not covered by `spans`, once each, with their context
pub fn collect_unknown(original: &str, spans: &[Span], radius: usize) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for range in word_ranges(original) {
        if spans.iter().any(|s| range.start < s.end && s.start < range.end) {
            continue;
        }
        let word = &original[range.clone()];
        if word.chars().filter(|c| c.is_alphabetic()).count() < 2 {
            continue;
        }
        let term = word.to_lowercase().replace('\u{2019}', "'");
        if STOPWORDS.contains(&term.as_str()) || !seen.insert(term.clone()) {
            continue;
        }
        out.push((term, context_window(original, range, radius)));
    }
    out
}

/// Maximal runs of letters and inner apostrophes
fn word_ranges(text: &str) -> Vec<Range<usize>> {
    let is_word = |c: char| c.is_alphabetic() || c == '\'' || c == '\u{2019}';
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        match (is_word(ch), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(s..text.len());
    }

    // apostrophes only count inside a word
    out.into_iter()
        .filter_map(|range| {
            let word = &text[range.clone()];
            let trimmed = word.trim_matches(|c| c == '\'' || c == '\u{2019}');
            if trimmed.is_empty() {
                return None;
            }
            let offset = word.find(trimmed).unwrap_or(0);
            let start = range.start + offset;
            Some(start..start + trimmed.len())
        })
        .collect()
}
