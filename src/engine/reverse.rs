//! Plain-to-slang realization
//!
//! Gloss phrases in plain text are found with the automaton's concept trie.
//! Each concept has at most one realization: the most confident entry allowed
//! by the caller's age ceiling and content exclusions. Density then decides
//! which of the realizable concepts, counted in text order, are replaced.

use super::result::SlangConfig;
use super::substitute::{Replacement, match_case, splice};
use crate::automaton::Automaton;
use crate::lexicon::{EntryId, Lexicon, LexiconEntry};
use crate::matcher::{MatchKind, Span, on_word_boundary};
use crate::normalizer::NormalizedText;
use std::collections::HashMap;

/// A gloss phrase found in plain text
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptSpan {
    pub start: usize,
    pub end: usize,
    pub concept: String,
    pub phrase: String,
}

/// Output of [`realize`]
#[derive(Debug, Clone, PartialEq)]
pub struct Realization {
    pub text: String,
    /// Replaced regions of the input, with the realizing entry
    pub spans: Vec<Span>,
    /// Concepts found, replaced or not
    pub concepts: usize,
}

/// Non-overlapping concept phrases in `text`, sorted by start
pub fn find_concepts(text: &NormalizedText, automaton: &Automaton) -> Vec<ConceptSpan> {
    let form = &text.primary;
    let chars = form.chars();
    let mut candidates: Vec<(usize, usize, ConceptSpan)> = automaton
        .concepts()
        .find_overlapping(chars)
        .into_iter()
        .filter(|m| on_word_boundary(chars, m.start, m.end))
        .map(|m| {
            let range = form.origin(m.start..m.end);
            let span = ConceptSpan {
                start: range.start,
                end: range.end,
                concept: m.value.concept.clone(),
                phrase: m.value.phrase.clone(),
            };
            (m.start, m.end, span)
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then((b.1 - b.0).cmp(&(a.1 - a.0)))
            .then_with(|| a.2.concept.cmp(&b.2.concept))
    });

    let mut selected: Vec<ConceptSpan> = Vec::new();
    let mut last_end = 0;
    for (start, end, span) in candidates {
        if selected.is_empty() || start >= last_end {
            last_end = end;
            selected.push(span);
        }
    }
    selected
}

/// The entry realizing each concept under `config`
///
/// Template entries never realize a concept. Highest confidence wins, ties go
/// to the alphabetically first term.
pub fn realizations(lexicon: &Lexicon, config: &SlangConfig) -> HashMap<String, EntryId> {
    let mut best: HashMap<String, EntryId> = HashMap::new();

    for (i, entry) in lexicon.entries().iter().enumerate() {
        if entry.is_template() || !entry.is_allowed(config.age_ceiling, &config.excluded_flags) {
            continue;
        }
        for concept in concepts_of(entry) {
            let id = EntryId(i);
            let replace = match best.get(concept).and_then(|current| lexicon.entry(*current)) {
                None => true,
                Some(current) => outranks(entry, current),
            };
            if replace {
                best.insert(concept.to_string(), id);
            }
        }
    }
    best
}

fn concepts_of(entry: &LexiconEntry) -> Vec<&str> {
    let mut concepts: Vec<&str> = (0..entry.senses.len())
        .filter_map(|i| entry.concept_of(i))
        .chain(entry.categories.iter().map(String::as_str))
        .collect();
    concepts.sort_unstable();
    concepts.dedup();
    concepts
}

fn outranks(candidate: &LexiconEntry, current: &LexiconEntry) -> bool {
    candidate
        .confidence
        .total_cmp(&current.confidence)
        .then_with(|| current.term.cmp(&candidate.term))
        .is_gt()
}

/// Rewrite the concepts of `text` as slang
pub fn realize(
    text: &NormalizedText,
    lexicon: &Lexicon,
    automaton: &Automaton,
    config: &SlangConfig,
) -> Realization {
    let concepts = find_concepts(text, automaton);
    let candidates = realizations(lexicon, config);
    let stride = config.density.stride();

    let mut replacements = Vec::new();
    let mut spans = Vec::new();
    let eligible = concepts.iter().filter_map(|concept| {
        let id = *candidates.get(&concept.concept)?;
        Some((concept, id, lexicon.entry(id)?))
    });

    for (i, (concept, id, entry)) in eligible.enumerate() {
        if i % stride != 0 {
            continue;
        }
        let surface = &text.original[concept.start..concept.end];
        replacements.push(Replacement {
            range: concept.start..concept.end,
            text: match_case(surface, &entry.term),
        });
        spans.push(Span {
            start: concept.start,
            end: concept.end,
            matched_variant: concept.phrase.clone(),
            entry_ref: id,
            chosen_sense_index: Some(sense_for(entry, &concept.concept)),
            match_confidence: entry.confidence,
            kind: MatchKind::Exact,
            slot: None,
        });
    }

    tracing::debug!(
        concepts = concepts.len(),
        replaced = spans.len(),
        density = ?config.density,
        "realized concepts"
    );
    Realization {
        text: splice(&text.original, &replacements),
        spans,
        concepts: concepts.len(),
    }
}

fn sense_for(entry: &LexiconEntry, concept: &str) -> usize {
    (0..entry.senses.len())
        .find(|&i| entry.concept_of(i) == Some(concept))
        .unwrap_or(0)
}
