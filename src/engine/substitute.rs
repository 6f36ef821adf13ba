//! Splicing replacements into the input text
//!
//! Both directions end the same way: a list of non-overlapping byte ranges of
//! the original, each with its replacement. The surrounding text is copied
//! through unchanged.

use crate::lexicon::{LexiconEntry, SLOT_MARKER};
use crate::matcher::Span;
use crate::normalizer::is_word_char;
use std::ops::Range;

/// One range of the original and what replaces it
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub range: Range<usize>,
    pub text: String,
}

/// Replace `replacements` (sorted, non-overlapping) inside `original`
///
/// A space is inserted wherever a replacement would fuse with an adjacent
/// word character.
pub fn splice(original: &str, replacements: &[Replacement]) -> String {
    let mut out = String::with_capacity(original.len());
    let mut cursor = 0;

    for replacement in replacements {
        let range = &replacement.range;
        if range.start < cursor || range.end > original.len() {
            continue;
        }
        out.push_str(&original[cursor..range.start]);

        let text = replacement.text.as_str();
        if needs_space(out.chars().next_back(), text.chars().next()) {
            out.push(' ');
        }
        out.push_str(text);
        if needs_space(text.chars().next_back(), original[range.end..].chars().next()) {
            out.push(' ');
        }
        cursor = range.end;
    }
    out.push_str(&original[cursor..]);
    out
}

fn needs_space(before: Option<char>, after: Option<char>) -> bool {
    matches!((before, after), (Some(b), Some(a)) if is_word_char(b) && is_word_char(a))
}

/// Gloss text for a forward span: the chosen sense, slot filled, cased like the surface
pub fn render_gloss(entry: &LexiconEntry, span: &Span, surface: &str) -> String {
    let sense_index = span.chosen_sense_index.unwrap_or(0);
    let gloss = entry
        .senses
        .get(sense_index)
        .map(|s| s.gloss.as_str())
        .unwrap_or(entry.term.as_str());

    let filled = match &span.slot {
        Some(slot) => fill_slot(gloss, slot),
        None => gloss.to_string(),
    };
    match_case(surface, &filled)
}

/// Replace each standalone slot marker in `gloss` with `slot`
pub fn fill_slot(gloss: &str, slot: &str) -> String {
    let mut out = String::with_capacity(gloss.len() + slot.len());
    let mut word = String::new();
    for ch in gloss.chars() {
        if is_word_char(ch) {
            word.push(ch);
            continue;
        }
        flush_word(&mut out, &mut word, slot);
        out.push(ch);
    }
    flush_word(&mut out, &mut word, slot);
    out
}

fn flush_word(out: &mut String, word: &mut String, slot: &str) {
    if word == SLOT_MARKER {
        out.push_str(slot);
    } else {
        out.push_str(word);
    }
    word.clear();
}

/// Carry the casing of `surface` over to `replacement`
///
/// An all-caps surface of two or more letters upper-cases the replacement; a
/// capitalized surface capitalizes it; anything else leaves it as written.
pub fn match_case(surface: &str, replacement: &str) -> String {
    let letters: Vec<char> = surface.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase()) {
        return replacement.to_uppercase();
    }
    match (letters.first(), surface.chars().find(|c| c.is_alphanumeric())) {
        (Some(first), Some(lead)) if first.is_uppercase() && lead == *first => {
            capitalize(replacement)
        }
        _ => replacement.to_string(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{AgeRating, EntryId, Sense};
    use crate::matcher::MatchKind;
    use std::collections::BTreeSet;

    fn entry(term: &str, glosses: &[&str]) -> LexiconEntry {
        LexiconEntry {
            term: term.to_string(),
            variants: vec![term.to_string()],
            senses: glosses
                .iter()
                .map(|g| Sense {
                    gloss: g.to_string(),
                    embedding: Vec::new(),
                    category: None,
                    confidence: 0.5,
                })
                .collect(),
            confidence: 0.5,
            age_rating: AgeRating::E,
            content_flags: BTreeSet::new(),
            categories: Vec::new(),
        }
    }

    fn span(sense: Option<usize>, slot: Option<&str>) -> Span {
        Span {
            start: 0,
            end: 0,
            matched_variant: String::new(),
            entry_ref: EntryId(0),
            chosen_sense_index: sense,
            match_confidence: 1.0,
            kind: MatchKind::Exact,
            slot: slot.map(str::to_string),
        }
    }

    fn replace(range: Range<usize>, text: &str) -> Replacement {
        Replacement {
            range,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_splice() {
        let text = "that's fire tbh";
        let out = splice(text, &[replace(7..11, "excellent")]);
        assert_eq!(out, "that's excellent tbh");
        assert_eq!(splice(text, &[]), text);
    }

    #[test]
    fn test_splice_inserts_spaces_between_fused_words() {
        let text = "fire🔥";
        let out = splice(text, &[replace(0..4, "excellent"), replace(4..8, "excellent")]);
        assert_eq!(out, "excellent excellent");

        let out = splice("🔥fr", &[replace(0..4, "excellent")]);
        assert_eq!(out, "excellent fr");
    }

    #[test]
    fn test_splice_skips_overlapping_replacements() {
        let out = splice("abc def", &[replace(0..3, "x"), replace(2..5, "y")]);
        assert_eq!(out, "x def");
    }

    #[test]
    fn test_match_case() {
        assert_eq!(match_case("fire", "excellent"), "excellent");
        assert_eq!(match_case("Fire", "excellent"), "Excellent");
        assert_eq!(match_case("FIRE", "excellent"), "EXCELLENT");
        assert_eq!(match_case("🔥", "excellent"), "excellent");
        assert_eq!(match_case("#Slay", "excellent"), "Excellent");
        assert_eq!(match_case("I", "me"), "Me");
    }

    #[test]
    fn test_fill_slot() {
        assert_eq!(fill_slot("extremely X", "cringe"), "extremely cringe");
        assert_eq!(fill_slot("X-ish", "tired"), "tired-ish");
        assert_eq!(fill_slot("Xylophone X", "loud"), "Xylophone loud");
    }

    #[test]
    fn test_render_gloss() {
        let lit = entry("lit", &["exciting", "intoxicated"]);
        assert_eq!(render_gloss(&lit, &span(Some(1), None), "Lit"), "Intoxicated");
        assert_eq!(render_gloss(&lit, &span(None, None), "lit"), "exciting");

        let af = entry("X af", &["extremely X"]);
        assert_eq!(
            render_gloss(&af, &span(Some(0), Some("cringe")), "cringe af"),
            "extremely cringe"
        );
        assert_eq!(
            render_gloss(&af, &span(Some(0), Some("CRINGE")), "CRINGE AF"),
            "EXTREMELY CRINGE"
        );
    }
}
