//! Mock embedding provider for testing
//!
//! Deterministic, network-free embeddings for exercising disambiguation and
//! quality scoring.
//!
//! # Example
//!
//! ```ignore
//! use slangshift::engine::{EmbeddingProvider, MockEmbedder, MockMode};
//!
//! #[tokio::test]
//! async fn test_embedding() {
//!     let mock = MockEmbedder::new(MockMode::Fixed(vec![1.0, 0.0]));
//!     assert_eq!(mock.embed("anything").await.unwrap(), vec![1.0, 0.0]);
//! }
//! ```

use super::embedding::EmbeddingProvider;
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mock embedding modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Same vector for every text
    Fixed(Vec<f32>),

    /// Sum of the vectors of keywords present in the text; all ones when
    /// no keyword occurs
    Keywords(HashMap<String, Vec<f32>>),

    /// Bag-of-words feature hashing into `dims` buckets
    Hashed { dims: usize },

    /// Simulate provider errors
    Error(String),
}

/// Mock embedder that simulates various provider behaviours
#[derive(Debug)]
pub struct MockEmbedder {
    mode: MockMode,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(mode: MockMode) -> Self {
        Self::with_delay(mode, 0)
    }

    /// Create a MockEmbedder with simulated network delay
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            mode,
            delay_ms,
            calls: AtomicUsize::new(0),
        }
    }

    /// Keyword mode from `(keyword, vector)` pairs
    pub fn keywords<'a>(pairs: impl IntoIterator<Item = (&'a str, Vec<f32>)>) -> Self {
        let table = pairs
            .into_iter()
            .map(|(word, vector)| (word.to_lowercase(), vector))
            .collect();
        Self::new(MockMode::Keywords(table))
    }

    /// Number of `embed` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn apply_embedding(&self, text: &str) -> EngineResult<Vec<f32>> {
        match &self.mode {
            MockMode::Fixed(vector) => Ok(vector.clone()),
            MockMode::Keywords(table) => {
                let dims = table.values().map(Vec::len).max().unwrap_or(0);
                if dims == 0 {
                    return Err(EngineError::Embedding("empty keyword table".to_string()));
                }
                let mut sum = vec![0.0f32; dims];
                let mut hit = false;
                for word in words(text) {
                    if let Some(vector) = table.get(&word) {
                        hit = true;
                        for (acc, x) in sum.iter_mut().zip(vector) {
                            *acc += x;
                        }
                    }
                }
                if !hit {
                    sum.fill(1.0);
                }
                Ok(sum)
            }
            MockMode::Hashed { dims } => {
                if *dims == 0 {
                    return Err(EngineError::Embedding("zero dimensions".to_string()));
                }
                let mut vector = vec![0.0f32; *dims];
                for word in words(text) {
                    let mut hasher = DefaultHasher::new();
                    word.hash(&mut hasher);
                    let bucket = (hasher.finish() % *dims as u64) as usize;
                    vector[bucket] += 1.0;
                }
                if vector.iter().all(|x| *x == 0.0) {
                    vector.fill(1.0);
                }
                Ok(vector)
            }
            MockMode::Error(msg) => Err(EngineError::Embedding(msg.clone())),
        }
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        self.apply_embedding(text)
    }

    fn provider_name(&self) -> &str {
        "Mock Embedder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_mode() {
        let mock = MockEmbedder::new(MockMode::Fixed(vec![0.5, 0.5]));
        assert_eq!(mock.embed("a").await.unwrap(), vec![0.5, 0.5]);
        assert_eq!(mock.embed("b").await.unwrap(), vec![0.5, 0.5]);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_keyword_mode_sums_hits() {
        let mock = MockEmbedder::keywords([
            ("party", vec![1.0, 0.0]),
            ("Drunk", vec![0.0, 1.0]),
        ]);
        assert_eq!(mock.embed("the party").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(mock.embed("party, drunk!").await.unwrap(), vec![1.0, 1.0]);
        assert_eq!(mock.embed("nothing here").await.unwrap(), vec![1.0, 1.0]);
    }

    #[tokio::test]
    async fn test_hashed_mode_is_deterministic() {
        let mock = MockEmbedder::new(MockMode::Hashed { dims: 8 });
        let a = mock.embed("that party was lit").await.unwrap();
        let b = mock.embed("That party was LIT").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_eq!(a.iter().sum::<f32>(), 4.0);
    }

    #[tokio::test]
    async fn test_error_mode() {
        let mock = MockEmbedder::new(MockMode::Error("provider down".to_string()));
        match mock.embed("x").await {
            Err(EngineError::Embedding(msg)) => assert_eq!(msg, "provider down"),
            other => panic!("Expected Embedding error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delay() {
        let mock = MockEmbedder::with_delay(MockMode::Fixed(vec![1.0]), 30);
        let start = std::time::Instant::now();
        mock.embed("x").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(mock.provider_name(), "Mock Embedder");
    }
}
