//! Span discovery over normalized text
//!
//! Matching runs in passes, each only allowed to fill what the previous ones
//! left uncovered:
//!
//! 1. the variant trie over the primary normalized form
//! 2. the same trie over the repeated-letter collapsed form
//! 3. template regexes over the remaining gaps of the primary form
//!
//! Within a pass, overlaps are resolved greedily: earliest start, then longest,
//! then most confident, then by variant string. Span offsets are byte offsets
//! into the NFC original.

use crate::automaton::{Automaton, TemplatePattern};
use crate::lexicon::EntryId;
use crate::normalizer::{Hashtag, NormalizedForm, NormalizedText, is_word_char};
use serde::Serialize;
use std::ops::Range;

/// Confidence factor for matches found only in the collapsed form
pub const COLLAPSED_FACTOR: f32 = 0.9;
/// Confidence factor for template matches
pub const TEMPLATE_FACTOR: f32 = 0.85;

/// How a span was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Collapsed,
    Template,
}

/// A matched region of the input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    /// Byte offset into the NFC input
    pub start: usize,
    pub end: usize,
    /// Lexicon variant that produced the match
    pub matched_variant: String,
    pub entry_ref: EntryId,
    /// Set once disambiguation has run
    pub chosen_sense_index: Option<usize>,
    pub match_confidence: f32,
    pub kind: MatchKind,
    /// Slot filler of a template match, in original casing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

impl Span {
    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The matched text as it appears in `original`
    pub fn surface<'a>(&self, original: &'a str) -> &'a str {
        &original[self.range()]
    }
}

/// Find the final, non-overlapping spans of `text`, sorted by start
pub fn find_spans(text: &NormalizedText, automaton: &Automaton) -> Vec<Span> {
    let mut selected = resolve_overlaps(trie_candidates(
        &text.primary,
        automaton,
        MatchKind::Exact,
        1.0,
    ));

    if let Some(collapsed) = &text.collapsed {
        let candidates = trie_candidates(collapsed, automaton, MatchKind::Collapsed, COLLAPSED_FACTOR);
        selected = merge(selected, candidates);
    }

    let templates = template_candidates(text, automaton, &selected);
    selected = merge(selected, templates);

    widen_hashtags(&mut selected, &text.hashtags);
    tracing::debug!(spans = selected.len(), "matched spans");
    selected
}

/// Greedy overlap resolution; the result is sorted by start
pub fn resolve_overlaps(mut candidates: Vec<Span>) -> Vec<Span> {
    candidates.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.len().cmp(&a.len()))
            .then(b.match_confidence.total_cmp(&a.match_confidence))
            .then_with(|| a.matched_variant.cmp(&b.matched_variant))
    });

    let mut selected: Vec<Span> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if selected.last().is_none_or(|last| candidate.start >= last.end) {
            selected.push(candidate);
        }
    }
    selected
}

/// Fraction of the characters of `original` covered by `spans`
pub fn coverage(original: &str, spans: &[Span]) -> f32 {
    let total = original.chars().count();
    if total == 0 {
        return 0.0;
    }
    let covered: usize = spans
        .iter()
        .map(|span| span.surface(original).chars().count())
        .sum();
    (covered as f32 / total as f32).clamp(0.0, 1.0)
}

fn trie_candidates(
    form: &NormalizedForm,
    automaton: &Automaton,
    kind: MatchKind,
    factor: f32,
) -> Vec<Span> {
    let chars = form.chars();
    automaton
        .variants()
        .find_overlapping(chars)
        .into_iter()
        .filter(|m| on_word_boundary(chars, m.start, m.end))
        .map(|m| {
            let range = form.origin(m.start..m.end);
            Span {
                start: range.start,
                end: range.end,
                matched_variant: m.value.variant.clone(),
                entry_ref: m.value.entry,
                chosen_sense_index: None,
                match_confidence: m.value.confidence * factor,
                kind,
                slot: None,
            }
        })
        .collect()
}

/// A match edge that is a word character must not touch another word character
pub(crate) fn on_word_boundary(chars: &[char], start: usize, end: usize) -> bool {
    let left = start == 0 || !is_word_char(chars[start]) || !is_word_char(chars[start - 1]);
    let right =
        end == chars.len() || !is_word_char(chars[end - 1]) || !is_word_char(chars[end]);
    left && right
}

/// Add the candidates that avoid every selected span, resolved among themselves
fn merge(selected: Vec<Span>, candidates: Vec<Span>) -> Vec<Span> {
    if candidates.is_empty() {
        return selected;
    }
    let free: Vec<Span> = candidates
        .into_iter()
        .filter(|c| !selected.iter().any(|s| s.overlaps(c)))
        .collect();

    let mut merged = selected;
    merged.extend(resolve_overlaps(free));
    merged.sort_by_key(|span| span.start);
    merged
}

fn template_candidates(
    text: &NormalizedText,
    automaton: &Automaton,
    selected: &[Span],
) -> Vec<Span> {
    let form = &text.primary;
    if automaton.templates().is_empty() || form.is_empty() {
        return Vec::new();
    }

    let chars = form.chars();
    let covered: Vec<bool> = (0..chars.len())
        .map(|i| {
            let origin = form.origin(i..i + 1);
            selected
                .iter()
                .any(|s| origin.start < s.end && s.start < origin.end)
        })
        .collect();

    let mut candidates = Vec::new();
    for gap in gaps(&covered) {
        let gap_text: String = chars[gap.clone()].iter().collect();
        let to_char = |byte: usize| gap.start + gap_text[..byte].chars().count();

        for template in automaton.templates() {
            for caps in template.regex.captures_iter(&gap_text) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                let (start, end) = (to_char(whole.start()), to_char(whole.end()));
                if start == end || !on_word_boundary(chars, start, end) {
                    continue;
                }

                let slot = caps
                    .name(TemplatePattern::SLOT_GROUP)
                    .filter(|m| !m.is_empty())
                    .map(|m| {
                        let range = form.origin(to_char(m.start())..to_char(m.end()));
                        text.original[range].to_string()
                    });
                let range = form.origin(start..end);
                candidates.push(Span {
                    start: range.start,
                    end: range.end,
                    matched_variant: template.variant.clone(),
                    entry_ref: template.entry,
                    chosen_sense_index: None,
                    match_confidence: template.confidence * TEMPLATE_FACTOR,
                    kind: MatchKind::Template,
                    slot,
                });
            }
        }
    }
    candidates
}

/// Maximal runs of uncovered positions
fn gaps(covered: &[bool]) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, &is_covered) in covered.iter().enumerate() {
        match (is_covered, start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                out.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(s..covered.len());
    }
    out
}

fn widen_hashtags(spans: &mut [Span], hashtags: &[Hashtag]) {
    for span in spans.iter_mut() {
        if let Some(tag) = hashtags.iter().find(|h| h.tag.start == span.start) {
            span.start = tag.marker;
        }
    }
}
