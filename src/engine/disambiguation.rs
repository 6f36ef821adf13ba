//! Sense disambiguation for multi-sense terms
//!
//! The context around a span is embedded and compared with each sense's
//! precomputed vector. When the provider fails, times out, or returns a vector
//! the senses cannot be compared with, the sense with the highest static
//! confidence is used instead and the failure is reported as a degradation.

use super::embedding::{EmbeddingProvider, cosine_similarity, embed_with_timeout};
use super::result::DisambiguationFailure;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::lexicon::LexiconEntry;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

/// Chosen sense, plus the failure that forced the static fallback if any
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub sense_index: usize,
    pub degradation: Option<DisambiguationFailure>,
}

impl Resolution {
    fn chosen(sense_index: usize) -> Self {
        Self {
            sense_index,
            degradation: None,
        }
    }
}

pub struct Disambiguator {
    provider: Arc<dyn EmbeddingProvider>,
    radius: usize,
    epsilon: f32,
    timeout: Duration,
}

impl Disambiguator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            radius: config.context_radius,
            epsilon: config.ambiguity_epsilon,
            timeout: config.embedding_timeout(),
        }
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Up to `radius` whitespace tokens on each side of `span`, plus the span itself
    pub fn context_window(&self, original: &str, span: Range<usize>) -> String {
        context_window(original, span, self.radius)
    }

    /// Pick the sense of `entry` meant in `context`
    ///
    /// Single-sense entries return immediately without calling the provider.
    pub async fn resolve(&self, entry: &LexiconEntry, context: &str) -> Resolution {
        if entry.senses.len() <= 1 {
            return Resolution::chosen(0);
        }

        let outcome = match embed_with_timeout(self.provider.as_ref(), context, self.timeout).await {
            Ok(vector) => choose_sense(entry, &vector, self.epsilon),
            Err(EngineError::EmbeddingTimeout(after)) => Err(DisambiguationFailure::Timeout {
                after_ms: after.as_millis() as u64,
            }),
            Err(err) => Err(DisambiguationFailure::ProviderError {
                message: err.to_string(),
            }),
        };

        match outcome {
            Ok(sense_index) => {
                tracing::debug!(term = %entry.term, sense_index, "disambiguated");
                Resolution::chosen(sense_index)
            }
            Err(failure) => {
                let sense_index = entry.most_confident_sense();
                tracing::warn!(
                    kind = "DisambiguationDegraded",
                    term = %entry.term,
                    provider = self.provider.provider_name(),
                    reason = %failure,
                    sense_index,
                    "falling back to static sense confidence"
                );
                Resolution {
                    sense_index,
                    degradation: Some(failure),
                }
            }
        }
    }
}

/// Whitespace tokens around `span`, joined by single spaces
pub fn context_window(original: &str, span: Range<usize>, radius: usize) -> String {
    let tokens = token_ranges(original);
    let before: Vec<&Range<usize>> = tokens.iter().filter(|t| t.end <= span.start).collect();
    let after = tokens.iter().filter(|t| t.start >= span.end).take(radius);

    let mut parts: Vec<&str> = before[before.len().saturating_sub(radius)..]
        .iter()
        .map(|t| &original[(*t).clone()])
        .collect();
    parts.push(original[span.clone()].trim());
    parts.extend(after.map(|t| &original[t.clone()]));
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

fn token_ranges(text: &str) -> Vec<Range<usize>> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                tokens.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push(s..text.len());
    }
    tokens
}

/// Argmax of cosine similarity; within `epsilon` of the runner-up the higher
/// static confidence wins
fn choose_sense(
    entry: &LexiconEntry,
    context: &[f32],
    epsilon: f32,
) -> Result<usize, DisambiguationFailure> {
    let mut scores = Vec::with_capacity(entry.senses.len());
    for (i, sense) in entry.senses.iter().enumerate() {
        if sense.embedding.is_empty() {
            return Err(DisambiguationFailure::MissingEmbedding { sense_index: i });
        }
        if sense.embedding.len() != context.len() {
            return Err(DisambiguationFailure::DimensionMismatch {
                expected: sense.embedding.len(),
                found: context.len(),
            });
        }
        let score = cosine_similarity(context, &sense.embedding).ok_or_else(|| {
            DisambiguationFailure::ProviderError {
                message: "zero-magnitude vector".to_string(),
            }
        })?;
        scores.push(score);
    }

    let mut ranked: Vec<usize> = (0..scores.len()).collect();
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    let (best, runner_up) = (ranked[0], ranked[1]);

    if scores[best] - scores[runner_up] < epsilon
        && entry.senses[runner_up].confidence > entry.senses[best].confidence
    {
        return Ok(runner_up);
    }
    Ok(best)
}
