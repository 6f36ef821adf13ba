//! The translation engine
//!
//! [`SlangEngine`] owns the served lexicon snapshot and runs both pipelines
//! against it. Each call takes one snapshot reference up front and uses it
//! throughout, so a concurrent [`SlangEngine::reload_lexicon`] never mixes two
//! lexicon versions inside one result.
//!
//! # Example
//!
//! ```ignore
//! use slangshift::{EngineConfig, LexiconStore, RenderMode, SlangEngine};
//! use slangshift::engine::DisabledEmbeddings;
//! use slangshift::lexicon::source::StaticLexiconSource;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = LexiconStore::new(Arc::new(StaticLexiconSource::bundled()));
//!     let engine = SlangEngine::start(EngineConfig::default(), store, Arc::new(DisabledEmbeddings)).await?;
//!     let result = engine.translate_to_plain("that's fire 🔥", RenderMode::Clean).await?;
//!     println!("{}", result.translated);
//!     Ok(())
//! }
//! ```

use super::disambiguation::Disambiguator;
use super::embedding::EmbeddingProvider;
use super::grammar::{GrammarOutput, rewrite};
use super::quality::QualityAssessor;
use super::result::{
    Degradation, Direction, RenderMode, SlangConfig, SpanAnnotation, TranslationResult,
};
use super::reverse::realize;
use super::substitute::{Replacement, render_gloss, splice};
use super::unknown_terms::{TracingUnknownTermSink, UnknownTerm, UnknownTermSink, collect_unknown};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::lexicon::store::{LexiconSnapshot, LexiconStore, SnapshotCell};
use crate::lexicon::Lexicon;
use crate::matcher::{Span, coverage, find_spans};
use crate::normalizer::normalize;
use chrono::Utc;
use std::sync::Arc;

/// Forward pipeline stages, in the only order they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    Normalized,
    Matched,
    Disambiguated,
    Substituted,
    Polished,
    Done,
}

/// Tracks the stage of one call; stages only move forward
#[derive(Debug)]
struct Progress {
    stage: Stage,
}

impl Progress {
    fn start() -> Self {
        Self {
            stage: Stage::Start,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "{:?} after {:?}", next, self.stage);
        tracing::debug!(from = ?self.stage, to = ?next, "pipeline stage");
        self.stage = next;
    }
}

/// Reject `text` unless it is non-empty, printable and within `max_chars`
pub fn validate_input(text: &str, max_chars: usize) -> EngineResult<()> {
    if text.trim().is_empty() {
        return Err(EngineError::InvalidInput("text is empty".to_string()));
    }
    if let Some(ch) = text
        .chars()
        .find(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return Err(EngineError::InvalidInput(format!(
            "text contains control character U+{:04X}",
            ch as u32
        )));
    }
    let length = text.chars().count();
    if length > max_chars {
        return Err(EngineError::InvalidInput(format!(
            "text has {} characters, limit is {}",
            length, max_chars
        )));
    }
    Ok(())
}

/// Decode raw input bytes as UTF-8 text
pub fn decode_input(bytes: &[u8]) -> EngineResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| {
        EngineError::InvalidInput(format!("text is not valid UTF-8 ({})", e))
    })
}

/// Slang translation engine
pub struct SlangEngine {
    config: EngineConfig,
    store: LexiconStore,
    snapshot: SnapshotCell,
    disambiguator: Disambiguator,
    quality: QualityAssessor,
    unknown_terms: Arc<dyn UnknownTermSink>,
}

impl SlangEngine {
    /// Create an engine with no lexicon loaded yet
    ///
    /// Translations fail with `LexiconUnavailable` until
    /// [`reload_lexicon`](Self::reload_lexicon) succeeds.
    pub fn new(
        config: EngineConfig,
        store: LexiconStore,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            disambiguator: Disambiguator::new(provider.clone(), &config),
            quality: QualityAssessor::new(provider, &config),
            unknown_terms: Arc::new(TracingUnknownTermSink),
            snapshot: SnapshotCell::new(),
            store,
            config,
        }
    }

    /// Create an engine and load the configured lexicon version
    pub async fn start(
        config: EngineConfig,
        store: LexiconStore,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let version = config.lexicon.version.clone();
        let engine = Self::new(config, store, provider);
        engine.reload_lexicon(version.as_deref()).await?;
        Ok(engine)
    }

    /// Replace the sink receiving unmatched words
    pub fn with_unknown_sink(mut self, sink: Arc<dyn UnknownTermSink>) -> Self {
        self.unknown_terms = sink;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Version of the lexicon currently served
    pub fn current_version(&self) -> Option<String> {
        self.snapshot.current().map(|s| s.version().to_string())
    }

    /// The lexicon currently served
    pub fn lexicon(&self) -> Option<Arc<Lexicon>> {
        self.snapshot.current().map(|s| s.lexicon.clone())
    }

    /// Load `version` (or the latest) and swap it in
    ///
    /// On failure the previously served snapshot stays in place.
    pub async fn reload_lexicon(&self, version: Option<&str>) -> EngineResult<()> {
        let snapshot = match self.store.load_snapshot(version).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(
                    requested = version.unwrap_or("latest"),
                    serving = self.current_version().as_deref().unwrap_or("none"),
                    error = %err,
                    "lexicon reload failed"
                );
                return Err(err);
            }
        };

        let next = snapshot.version().to_string();
        let previous = self.snapshot.publish(snapshot);
        tracing::info!(
            version = %next,
            previous = previous.as_ref().map(|s| s.version()).unwrap_or("none"),
            "lexicon published"
        );
        Ok(())
    }

    fn require_snapshot(&self) -> EngineResult<Arc<LexiconSnapshot>> {
        self.snapshot.current().ok_or_else(|| {
            EngineError::LexiconUnavailable("no lexicon has been loaded".to_string())
        })
    }

    /// Translate slang in `text` to plain language
    pub async fn translate_to_plain(
        &self,
        text: &str,
        mode: RenderMode,
    ) -> EngineResult<TranslationResult> {
        validate_input(text, self.config.max_input_chars)?;
        let snapshot = self.require_snapshot()?;
        let lexicon = snapshot.lexicon.as_ref();
        let mut progress = Progress::start();

        let normalized = normalize(text, lexicon);
        progress.advance(Stage::Normalized);

        let mut spans: Vec<Span> = find_spans(&normalized, &snapshot.automaton)
            .into_iter()
            .filter(|span| lexicon.entry(span.entry_ref).is_some())
            .collect();
        let original = normalized.original.as_str();
        self.record_unknown(original, &spans, snapshot.version());
        progress.advance(Stage::Matched);

        let mut degradations = lexicon_degradation(&snapshot);
        for span in spans.iter_mut() {
            let Some(entry) = lexicon.entry(span.entry_ref) else {
                continue;
            };
            if !entry.is_ambiguous() {
                span.chosen_sense_index = Some(0);
                continue;
            }
            let context = self.disambiguator.context_window(original, span.range());
            let resolution = self.disambiguator.resolve(entry, &context).await;
            span.chosen_sense_index = Some(resolution.sense_index);
            if let Some(reason) = resolution.degradation {
                degradations.push(Degradation::DisambiguationDegraded {
                    term: entry.term.clone(),
                    reason,
                });
            }
        }
        progress.advance(Stage::Disambiguated);

        let replacements: Vec<Replacement> = spans
            .iter()
            .filter_map(|span| {
                let entry = lexicon.entry(span.entry_ref)?;
                Some(Replacement {
                    range: span.range(),
                    text: render_gloss(entry, span, span.surface(original)),
                })
            })
            .collect();
        let substituted = splice(original, &replacements);
        progress.advance(Stage::Substituted);

        let grammar = rewrite(&substituted);
        let covered = coverage(original, &spans);
        let (quality, polish_recommended) = self
            .quality
            .assess(original, &grammar.text, &grammar, covered, degradations)
            .await;
        progress.advance(Stage::Polished);

        let annotations = match mode {
            RenderMode::Clean => None,
            RenderMode::Annotated => Some(annotate(lexicon, original, &spans)),
        };
        progress.advance(Stage::Done);

        tracing::debug!(
            spans = spans.len(),
            coverage = covered,
            grammar_score = quality.grammar_score,
            polish_recommended,
            "translated to plain"
        );
        Ok(TranslationResult {
            input: normalized.original.clone(),
            translated: grammar.text,
            direction: Direction::ToPlain,
            lexicon_version: snapshot.version().to_string(),
            spans,
            coverage: covered,
            quality,
            polish_recommended,
            annotations,
        })
    }

    /// Rewrite plain `text` with slang realizations allowed by `config`
    ///
    /// The output is scored but not polished; slang is informal on purpose.
    pub async fn translate_to_slang(
        &self,
        text: &str,
        config: &SlangConfig,
    ) -> EngineResult<TranslationResult> {
        validate_input(text, self.config.max_input_chars)?;
        let snapshot = self.require_snapshot()?;
        let lexicon = snapshot.lexicon.as_ref();

        let normalized = normalize(text, lexicon);
        let realization = realize(&normalized, lexicon, &snapshot.automaton, config);

        let scan = rewrite(&realization.text);
        let grammar = GrammarOutput {
            text: realization.text.clone(),
            violations: scan.violations,
            tokens: scan.tokens,
        };
        let covered = coverage(&normalized.original, &realization.spans);
        let (quality, polish_recommended) = self
            .quality
            .assess(
                &normalized.original,
                &realization.text,
                &grammar,
                covered,
                lexicon_degradation(&snapshot),
            )
            .await;

        tracing::debug!(
            concepts = realization.concepts,
            replaced = realization.spans.len(),
            "translated to slang"
        );
        Ok(TranslationResult {
            input: normalized.original,
            translated: realization.text,
            direction: Direction::ToSlang,
            lexicon_version: snapshot.version().to_string(),
            spans: realization.spans,
            coverage: covered,
            quality,
            polish_recommended,
            annotations: None,
        })
    }

    fn record_unknown(&self, original: &str, spans: &[Span], version: &str) {
        for (term, context) in collect_unknown(original, spans, self.config.context_radius) {
            self.unknown_terms.record_unknown(UnknownTerm {
                term,
                context,
                lexicon_version: version.to_string(),
                observed_at: Utc::now(),
            });
        }
    }
}

fn lexicon_degradation(snapshot: &LexiconSnapshot) -> Vec<Degradation> {
    snapshot
        .degraded
        .iter()
        .map(|reason| Degradation::LexiconDegraded {
            reason: reason.clone(),
        })
        .collect()
}

fn annotate(lexicon: &Lexicon, original: &str, spans: &[Span]) -> Vec<SpanAnnotation> {
    spans
        .iter()
        .filter_map(|span| {
            let entry = lexicon.entry(span.entry_ref)?;
            let sense_index = span.chosen_sense_index.unwrap_or(0);
            let sense = entry.senses.get(sense_index)?;
            Some(SpanAnnotation {
                start: span.start,
                end: span.end,
                surface: span.surface(original).to_string(),
                variant: span.matched_variant.clone(),
                term: entry.term.clone(),
                sense_index,
                gloss: sense.gloss.clone(),
                category: entry.concept_of(sense_index).map(str::to_string),
                confidence: span.match_confidence,
                kind: span.kind,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_ordered() {
        assert!(Stage::Start < Stage::Normalized);
        assert!(Stage::Substituted < Stage::Polished);
        assert!(Stage::Polished < Stage::Done);

        let mut progress = Progress::start();
        progress.advance(Stage::Normalized);
        progress.advance(Stage::Done);
        assert_eq!(progress.stage, Stage::Done);
    }

    #[test]
    fn test_validate_input() {
        assert!(validate_input("that's fire", 100).is_ok());
        assert!(validate_input("line one\nline two\ttabbed\r\n", 100).is_ok());

        for bad in ["", "   \n\t", "nul\0byte", "bell\u{7}"] {
            assert!(matches!(
                validate_input(bad, 100),
                Err(EngineError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            validate_input("🔥🔥🔥", 2),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(validate_input("🔥🔥", 2).is_ok());
    }

    #[test]
    fn test_decode_input() {
        assert_eq!(decode_input("no cap".as_bytes()).unwrap(), "no cap");
        assert!(matches!(
            decode_input(&[0x66, 0xff, 0x69]),
            Err(EngineError::InvalidInput(_))
        ));
    }
}
