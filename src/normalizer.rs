//! Input canonicalization for lexicon matching
//!
//! [`normalize`] turns raw text into the forms the matcher scans:
//!
//! 1. Unicode NFC (the NFC string is kept as the *original* text, spans are
//!    reported against it)
//! 2. lowercase copy, with whitespace runs collapsed to one space and curly
//!    apostrophes folded to `'`
//! 3. emoji mapped to word tokens through a fixed table (`🔥` → `fire`)
//! 4. hashtag markers dropped (`#slay` → `slay`), recorded as [`Hashtag`]
//! 5. leetspeak digits replaced, but only inside mixed tokens that become a
//!    lexicon term afterwards
//! 6. runs of three or more identical letters collapsed to two, as a secondary
//!    form scanned where the primary form found nothing
//!
//! Every normalized character keeps the byte range of the original character(s)
//! it came from, so matches map back to original coordinates.

use std::collections::HashSet;
use std::ops::Range;
use unicode_normalization::UnicodeNormalization;

/// Emoji with a slang reading, mapped to the word token the lexicon uses
const EMOJI_TOKENS: &[(char, &str)] = &[
    ('🔥', "fire"),
    ('💀', "dead"),
    ('😭', "crying"),
    ('🐐', "goat"),
    ('🧢', "cap"),
    ('💅', "slay"),
    ('💯', "hundo"),
    ('🤡', "clown"),
    ('🙌', "yass"),
    ('😂', "lol"),
    ('🤣', "lmao"),
    ('👀', "eyes"),
    ('🍵', "tea"),
    ('☕', "tea"),
    ('🫡', "salute"),
];

/// Leetspeak digits and the letter they stand for
const LEET_DIGITS: &[(char, char)] = &[('4', 'a'), ('3', 'e'), ('1', 'i'), ('0', 'o')];

/// Source of valid lexicon terms, consulted by the leetspeak step
pub trait Vocabulary {
    /// Whether `normalized` (lowercase, emoji mapped) is a known variant or a
    /// word of a multi-word variant
    fn contains_term(&self, normalized: &str) -> bool;
}

/// A vocabulary that knows no terms; disables leetspeak substitution
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVocabulary;

impl Vocabulary for NoVocabulary {
    fn contains_term(&self, _normalized: &str) -> bool {
        false
    }
}

impl Vocabulary for HashSet<String> {
    fn contains_term(&self, normalized: &str) -> bool {
        self.contains(normalized)
    }
}

/// A hashtag found in the original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hashtag {
    /// Byte offset of the `#` marker
    pub marker: usize,
    /// Byte range of the tag text after the marker
    pub tag: Range<usize>,
}

/// One normalized character and the original bytes it stands for
#[derive(Debug, Clone)]
struct Unit {
    ch: char,
    origin: Range<usize>,
}

impl Unit {
    fn new(ch: char, origin: Range<usize>) -> Self {
        Self { ch, origin }
    }
}

/// A normalized rendering of the input with a per-character offset map
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedForm {
    text: String,
    chars: Vec<char>,
    origins: Vec<Range<usize>>,
}

impl NormalizedForm {
    fn from_units(units: &[Unit]) -> Self {
        Self {
            text: units.iter().map(|u| u.ch).collect(),
            chars: units.iter().map(|u| u.ch).collect(),
            origins: units.iter().map(|u| u.origin.clone()).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Number of normalized characters
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Original byte range covered by a non-empty range of normalized characters
    pub fn origin(&self, chars: Range<usize>) -> Range<usize> {
        debug_assert!(chars.start < chars.end && chars.end <= self.origins.len());
        self.origins[chars.start].start..self.origins[chars.end - 1].end
    }
}

/// Output of [`normalize`]
#[derive(Debug, Clone)]
pub struct NormalizedText {
    /// The input in NFC, original casing; spans index into this string
    pub original: String,
    /// Primary lowercase form scanned by the matcher
    pub primary: NormalizedForm,
    /// Repeated-letter collapsed form, present only when it differs from `primary`
    pub collapsed: Option<NormalizedForm>,
    /// Hashtags whose marker was stripped
    pub hashtags: Vec<Hashtag>,
}

/// Normalize `text` for matching against the terms in `vocabulary`
pub fn normalize<V: Vocabulary + ?Sized>(text: &str, vocabulary: &V) -> NormalizedText {
    let original: String = text.nfc().collect();
    let (mut units, hashtags) = map_characters(&original);
    substitute_leetspeak(&mut units, vocabulary);
    let collapsed = collapse_repeats(&units).map(|u| NormalizedForm::from_units(&u));

    NormalizedText {
        primary: NormalizedForm::from_units(&units),
        collapsed,
        hashtags,
        original,
    }
}

/// Canonical key for a lexicon variant or gloss phrase
///
/// Runs the same character mapping as [`normalize`] so that keys and scanned
/// text agree: `"🔥"`, `"FIRE"` and `"#fire"` all produce `"fire"`.
pub fn normalize_key(variant: &str) -> String {
    normalize(variant, &NoVocabulary)
        .primary
        .as_str()
        .trim()
        .to_string()
}

/// The word token an emoji maps to, if it has one
pub fn emoji_token(ch: char) -> Option<&'static str> {
    EMOJI_TOKENS
        .iter()
        .find(|(emoji, _)| *emoji == ch)
        .map(|(_, word)| *word)
}

/// Characters that form words for boundary checks
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn is_emoji_modifier(ch: char) -> bool {
    matches!(ch, '\u{FE0E}' | '\u{FE0F}' | '\u{1F3FB}'..='\u{1F3FF}')
}

fn leet_letter(ch: char) -> Option<char> {
    LEET_DIGITS
        .iter()
        .find(|(digit, _)| *digit == ch)
        .map(|(_, letter)| *letter)
}

fn map_characters(original: &str) -> (Vec<Unit>, Vec<Hashtag>) {
    let chars: Vec<(usize, char)> = original.char_indices().collect();
    let mut units: Vec<Unit> = Vec::with_capacity(chars.len());
    let mut hashtags = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, ch) = chars[i];
        let end = start + ch.len_utf8();

        if ch.is_whitespace() {
            match units.last_mut() {
                Some(last) if last.ch == ' ' => last.origin.end = end,
                _ => units.push(Unit::new(' ', start..end)),
            }
            i += 1;
            continue;
        }

        if ch == '#' {
            let after_word = i > 0 && is_word_char(chars[i - 1].1);
            let before_word = chars.get(i + 1).is_some_and(|&(_, c)| c.is_alphanumeric());
            if !after_word && before_word {
                let mut j = i + 1;
                while j < chars.len() && is_word_char(chars[j].1) {
                    j += 1;
                }
                let tag_end = chars.get(j).map_or(original.len(), |&(pos, _)| pos);
                hashtags.push(Hashtag {
                    marker: start,
                    tag: end..tag_end,
                });
                i += 1;
                continue;
            }
        }

        if let Some(word) = emoji_token(ch) {
            let mut j = i + 1;
            let mut emoji_end = end;
            while let Some(&(pos, c)) = chars.get(j) {
                if !is_emoji_modifier(c) {
                    break;
                }
                emoji_end = pos + c.len_utf8();
                j += 1;
            }
            let origin = start..emoji_end;

            if units.last().is_some_and(|u| is_word_char(u.ch)) {
                units.push(Unit::new(' ', origin.clone()));
            }
            units.extend(word.chars().map(|c| Unit::new(c, origin.clone())));
            if chars
                .get(j)
                .is_some_and(|&(_, c)| is_word_char(c) || emoji_token(c).is_some())
            {
                units.push(Unit::new(' ', origin.clone()));
            }
            i = j;
            continue;
        }

        let folded = match ch {
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        };
        units.extend(folded.to_lowercase().map(|lower| Unit::new(lower, start..end)));
        i += 1;
    }

    (units, hashtags)
}

fn substitute_leetspeak<V: Vocabulary + ?Sized>(units: &mut [Unit], vocabulary: &V) {
    let mut i = 0;
    while i < units.len() {
        if !units[i].ch.is_alphanumeric() {
            i += 1;
            continue;
        }
        let start = i;
        while i < units.len() && units[i].ch.is_alphanumeric() {
            i += 1;
        }

        let token = &units[start..i];
        let has_letter = token.iter().any(|u| u.ch.is_alphabetic());
        let has_leet = token.iter().any(|u| leet_letter(u.ch).is_some());
        if !has_letter || !has_leet {
            continue;
        }

        let candidate: String = token
            .iter()
            .map(|u| leet_letter(u.ch).unwrap_or(u.ch))
            .collect();
        if vocabulary.contains_term(&candidate) {
            for unit in &mut units[start..i] {
                if let Some(letter) = leet_letter(unit.ch) {
                    unit.ch = letter;
                }
            }
        }
    }
}

fn collapse_repeats(units: &[Unit]) -> Option<Vec<Unit>> {
    let mut out: Vec<Unit> = Vec::with_capacity(units.len());
    let mut run = 0usize;
    let mut changed = false;

    for unit in units {
        if let Some(last) = out.last_mut() {
            if unit.ch.is_alphabetic() && last.ch == unit.ch {
                run += 1;
                if run >= 2 {
                    // the kept character absorbs the dropped one's bytes
                    last.origin.end = unit.origin.end;
                    changed = true;
                    continue;
                }
            } else {
                run = 0;
            }
        }
        out.push(unit.clone());
    }

    changed.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(terms: &[&str]) -> HashSet<String> {
        terms.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_nfc_and_lowercase() {
        let normalized = normalize("Cafe\u{301} IS Lit", &NoVocabulary);
        assert_eq!(normalized.original, "Café IS Lit");
        assert_eq!(normalized.primary.as_str(), "café is lit");
    }

    #[test]
    fn test_offsets_map_back_to_original() {
        let normalized = normalize("That's LIT", &NoVocabulary);
        let lit_start = normalized.primary.as_str().find("lit").unwrap();
        let range = normalized.primary.origin(lit_start..lit_start + 3);
        assert_eq!(&normalized.original[range], "LIT");
    }

    #[test]
    fn test_emoji_maps_to_token() {
        let normalized = normalize("that's fire 🔥", &NoVocabulary);
        assert_eq!(normalized.primary.as_str(), "that's fire fire");

        let chars = normalized.primary.len();
        let range = normalized.primary.origin(chars - 4..chars);
        assert_eq!(&normalized.original[range], "🔥");
    }

    #[test]
    fn test_emoji_padding_against_words() {
        let normalized = normalize("fire🔥🔥ok", &NoVocabulary);
        assert_eq!(normalized.primary.as_str(), "fire fire fire ok");
    }

    #[test]
    fn test_emoji_modifiers_fold_into_emoji() {
        let normalized = normalize("💅\u{1F3FD} yes", &NoVocabulary);
        assert_eq!(normalized.primary.as_str(), "slay yes");
        let range = normalized.primary.origin(0..4);
        assert_eq!(&normalized.original[range], "💅\u{1F3FD}");
    }

    #[test]
    fn test_unmapped_emoji_passes_through() {
        let normalized = normalize("ok 🦀", &NoVocabulary);
        assert_eq!(normalized.primary.as_str(), "ok 🦀");
    }

    #[test]
    fn test_hashtag_stripping() {
        let normalized = normalize("she did #Slay today", &NoVocabulary);
        assert_eq!(normalized.primary.as_str(), "she did slay today");
        assert_eq!(normalized.hashtags.len(), 1);

        let tag = &normalized.hashtags[0];
        assert_eq!(&normalized.original[tag.marker..tag.marker + 1], "#");
        assert_eq!(&normalized.original[tag.tag.clone()], "Slay");
    }

    #[test]
    fn test_hash_inside_word_is_kept() {
        let normalized = normalize("c# and #1", &NoVocabulary);
        assert_eq!(normalized.primary.as_str(), "c# and 1");
        assert_eq!(normalized.hashtags.len(), 1);
    }

    #[test]
    fn test_leetspeak_only_for_known_terms() {
        let terms = vocab(&["goat", "leet"]);
        let normalized = normalize("g0at l33t h4x0r", &terms);
        assert_eq!(normalized.primary.as_str(), "goat leet h4x0r");
    }

    #[test]
    fn test_leetspeak_never_touches_numbers() {
        let terms = vocab(&["io"]);
        let normalized = normalize("call 10 now", &terms);
        assert_eq!(normalized.primary.as_str(), "call 10 now");
    }

    #[test]
    fn test_repeated_letters_collapse_to_two() {
        let normalized = normalize("Soooo gooood", &NoVocabulary);
        let collapsed = normalized.collapsed.expect("collapsed form");
        assert_eq!(collapsed.as_str(), "soo good");
        assert_eq!(normalized.primary.as_str(), "soooo gooood");

        let range = collapsed.origin(0..3);
        assert_eq!(&normalized.original[range], "Soooo");
    }

    #[test]
    fn test_no_collapsed_form_without_runs() {
        let normalized = normalize("all good", &NoVocabulary);
        assert!(normalized.collapsed.is_none());
    }

    #[test]
    fn test_whitespace_and_apostrophes() {
        let normalized = normalize("it\u{2019}s   giving\n\nvibes", &NoVocabulary);
        assert_eq!(normalized.primary.as_str(), "it's giving vibes");
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("🔥"), "fire");
        assert_eq!(normalize_key("FIRE"), "fire");
        assert_eq!(normalize_key("#fire"), "fire");
        assert_eq!(normalize_key("  No   Cap "), "no cap");
    }

    #[test]
    fn test_deterministic() {
        let terms = vocab(&["goat"]);
        let a = normalize("the G0AT 🐐 #goat", &terms);
        let b = normalize("the G0AT 🐐 #goat", &terms);
        assert_eq!(a.primary, b.primary);
        assert_eq!(a.hashtags, b.hashtags);
    }
}
