//! Slang lexicon: entries, senses and the variant index
//!
//! A [`Lexicon`] is immutable once built. It is produced from a versioned JSON
//! document by [`document::parse`], fetched through a [`source::LexiconSource`],
//! and published to translation calls by the [`store`] together with its
//! compiled automaton.

pub mod document;
pub mod source;
pub mod store;

use crate::error::LexiconError;
use crate::normalizer::{Vocabulary, normalize_key};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Slot marker used by template variants such as `"X af"`
pub const SLOT_MARKER: &str = "X";

/// Audience rating of a term, ordered from least to most restricted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AgeRating {
    E,
    T13,
    T16,
    M18,
}

impl FromStr for AgeRating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "E" | "EVERYONE" => Ok(AgeRating::E),
            "T13" | "13+" => Ok(AgeRating::T13),
            "T16" | "16+" => Ok(AgeRating::T16),
            "M18" | "18+" => Ok(AgeRating::M18),
            other => Err(format!("unknown age rating '{}'", other)),
        }
    }
}

impl fmt::Display for AgeRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgeRating::E => "E",
            AgeRating::T13 => "T13",
            AgeRating::T16 => "T16",
            AgeRating::M18 => "M18",
        };
        f.write_str(label)
    }
}

impl<'de> Deserialize<'de> for AgeRating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Content warning attached to a term
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFlag {
    Sexual,
    Violent,
    Drugs,
    Alcohol,
    Profanity,
    Slur,
    /// Any flag this build does not know about
    Other,
}

impl ContentFlag {
    /// Map a document label to a flag; unknown labels become [`ContentFlag::Other`]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "sexual" => ContentFlag::Sexual,
            "violent" | "violence" => ContentFlag::Violent,
            "drugs" => ContentFlag::Drugs,
            "alcohol" => ContentFlag::Alcohol,
            "profanity" => ContentFlag::Profanity,
            "slur" => ContentFlag::Slur,
            _ => ContentFlag::Other,
        }
    }
}

impl FromStr for ContentFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match ContentFlag::from_label(s) {
            ContentFlag::Other if !s.trim().eq_ignore_ascii_case("other") => {
                Err(format!("unknown content flag '{}'", s))
            }
            flag => Ok(flag),
        }
    }
}

impl<'de> Deserialize<'de> for ContentFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ContentFlag::from_label(&raw))
    }
}

/// One meaning of a term
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sense {
    /// Plain-language meaning substituted for the term
    pub gloss: String,
    /// Precomputed embedding; empty when the lexicon ships none
    pub embedding: Vec<f32>,
    /// Disambiguation hint and reverse-direction concept
    pub category: Option<String>,
    /// Static confidence, used when context cannot decide
    pub confidence: f32,
}

/// Index of an entry inside its lexicon
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EntryId(pub usize);

/// A slang term with its variants and senses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexiconEntry {
    pub term: String,
    /// Surface forms, always starting with `term`
    pub variants: Vec<String>,
    pub senses: Vec<Sense>,
    pub confidence: f32,
    pub age_rating: AgeRating,
    pub content_flags: BTreeSet<ContentFlag>,
    pub categories: Vec<String>,
}

impl LexiconEntry {
    /// Whether the entry needs context to pick a sense
    pub fn is_ambiguous(&self) -> bool {
        self.senses.len() > 1
    }

    /// Whether the entry is a slot-filler template like `"X af"`
    pub fn is_template(&self) -> bool {
        self.variants.iter().any(|v| is_template_variant(v))
    }

    /// Index of the sense with the highest static confidence (lowest index on ties)
    pub fn most_confident_sense(&self) -> usize {
        let mut best = 0;
        for (i, sense) in self.senses.iter().enumerate().skip(1) {
            if sense.confidence > self.senses[best].confidence {
                best = i;
            }
        }
        best
    }

    /// Concept a sense expresses: its own category, else the entry's first category
    pub fn concept_of(&self, sense_index: usize) -> Option<&str> {
        self.senses
            .get(sense_index)
            .and_then(|s| s.category.as_deref())
            .or_else(|| self.categories.first().map(String::as_str))
    }

    /// Whether the entry passes an age ceiling and a content-flag exclusion set
    pub fn is_allowed(&self, ceiling: AgeRating, excluded: &BTreeSet<ContentFlag>) -> bool {
        self.age_rating <= ceiling && self.content_flags.is_disjoint(excluded)
    }
}

/// Whether a variant contains the standalone slot marker
pub fn is_template_variant(variant: &str) -> bool {
    variant
        .split(|c: char| c.is_whitespace() || c == '-')
        .any(|word| word == SLOT_MARKER)
}

/// An immutable, indexed lexicon version
#[derive(Debug)]
pub struct Lexicon {
    version: String,
    generated_at: DateTime<Utc>,
    entries: Vec<LexiconEntry>,
    index: HashMap<String, EntryId>,
    /// Words of multi-word variants, for the leetspeak gate
    phrase_words: HashSet<String>,
    embedding_dim: Option<usize>,
    fingerprint: u64,
}

impl Lexicon {
    pub(crate) fn from_parts(
        version: String,
        generated_at: DateTime<Utc>,
        entries: Vec<LexiconEntry>,
        index: HashMap<String, EntryId>,
        embedding_dim: Option<usize>,
        fingerprint: u64,
    ) -> Self {
        let phrase_words = index
            .keys()
            .filter(|key| key.contains(' '))
            .flat_map(|key| key.split(' '))
            .filter(|word| !word.eq_ignore_ascii_case(SLOT_MARKER))
            .map(str::to_string)
            .collect();
        Self {
            version,
            generated_at,
            entries,
            index,
            phrase_words,
            embedding_dim,
            fingerprint,
        }
    }

    /// Parse and validate a lexicon document
    pub fn from_json(raw: &str) -> Result<Self, LexiconError> {
        document::parse(raw)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LexiconEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&LexiconEntry> {
        self.entries.get(id.0)
    }

    /// O(1) lookup of the entry owning a variant, in any surface form
    pub fn get_entry(&self, variant: &str) -> Option<&LexiconEntry> {
        self.lookup(variant).and_then(|id| self.entry(id))
    }

    /// O(1) lookup of the id of the entry owning a variant
    pub fn lookup(&self, variant: &str) -> Option<EntryId> {
        self.index.get(&normalize_key(variant)).copied()
    }

    /// Normalized variant keys and their entries
    pub fn variant_keys(&self) -> impl Iterator<Item = (&str, EntryId)> {
        self.index.iter().map(|(key, id)| (key.as_str(), *id))
    }

    /// Dimensionality shared by all sense embeddings, if any are present
    pub fn embedding_dim(&self) -> Option<usize> {
        self.embedding_dim
    }

    /// Hash of the source document, distinguishing republished versions
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

impl Vocabulary for Lexicon {
    fn contains_term(&self, normalized: &str) -> bool {
        self.index.contains_key(normalized) || self.phrase_words.contains(normalized)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    /// Build a lexicon document from items, filling in the envelope fields
    pub fn document(version: &str, items: Vec<Value>) -> String {
        json!({
            "version": version,
            "generated_at": "2024-06-01T00:00:00Z",
            "count": items.len(),
            "items": items,
        })
        .to_string()
    }

    /// A small lexicon covering single-sense, ambiguous and template entries
    pub fn sample_document(version: &str) -> String {
        document(
            version,
            vec![
                json!({
                    "term": "fire", "variants": ["fire", "🔥"], "gloss": "excellent",
                    "confidence": 0.95, "age_rating": "E", "categories": ["excellence"]
                }),
                json!({
                    "term": "lit", "confidence": 0.8, "age_rating": "T13",
                    "categories": ["excitement"],
                    "senses": [
                        {"gloss": "exciting", "embedding": [1.0, 0.0, 0.0], "category": "excitement", "confidence": 0.8},
                        {"gloss": "intoxicated", "embedding": [0.0, 1.0, 0.0], "category": "intoxication", "confidence": 0.4}
                    ]
                }),
                json!({
                    "term": "goat", "variants": ["goat", "🐐", "g.o.a.t"],
                    "gloss": "greatest of all time", "confidence": 0.9, "age_rating": "E",
                    "categories": ["excellence"]
                }),
                json!({
                    "term": "no cap", "variants": ["no cap", "nocap"], "gloss": "no lie",
                    "confidence": 0.9, "age_rating": "E", "categories": ["honesty"]
                }),
                json!({
                    "term": "bet", "gloss": "okay", "confidence": 0.7, "age_rating": "E",
                    "categories": ["agreement"]
                }),
                json!({
                    "term": "so", "variants": ["so"], "gloss": "very", "confidence": 0.3,
                    "age_rating": "E", "categories": ["intensity"]
                }),
                json!({
                    "term": "X af", "variants": ["X af", "X-af"], "gloss": "extremely X",
                    "confidence": 0.85, "age_rating": "T13", "content_flags": ["profanity"],
                    "categories": ["intensity"]
                }),
                json!({
                    "term": "smash", "gloss": "excellent", "confidence": 0.5,
                    "age_rating": "M18", "content_flags": ["sexual"], "categories": ["excellence"]
                }),
                json!({
                    "term": "slaps", "gloss": "is excellent", "confidence": 0.75,
                    "age_rating": "E", "categories": ["excellence"]
                }),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Lexicon {
        Lexicon::from_json(&fixtures::sample_document("test-1")).unwrap()
    }

    #[test]
    fn test_get_entry_by_any_surface_form() {
        let lexicon = sample();
        assert_eq!(lexicon.get_entry("fire").unwrap().term, "fire");
        assert_eq!(lexicon.get_entry("FIRE").unwrap().term, "fire");
        assert_eq!(lexicon.get_entry("🔥").unwrap().term, "fire");
        assert_eq!(lexicon.get_entry("#fire").unwrap().term, "fire");
        assert!(lexicon.get_entry("water").is_none());
    }

    #[test]
    fn test_variants_include_term() {
        let lexicon = sample();
        for entry in lexicon.entries() {
            assert_eq!(entry.variants[0], entry.term);
        }
        assert_eq!(lexicon.get_entry("bet").unwrap().variants, vec!["bet"]);
    }

    #[test]
    fn test_entry_metadata() {
        let lexicon = sample();
        assert_eq!(lexicon.version(), "test-1");
        assert_eq!(lexicon.len(), 9);
        assert_eq!(lexicon.embedding_dim(), Some(3));

        let lit = lexicon.get_entry("lit").unwrap();
        assert!(lit.is_ambiguous());
        assert_eq!(lit.most_confident_sense(), 0);
        assert_eq!(lit.concept_of(1), Some("intoxication"));

        let af = lexicon.get_entry("x af").unwrap();
        assert!(af.is_template());
        assert!(!lexicon.get_entry("fire").unwrap().is_template());
    }

    #[test]
    fn test_is_allowed() {
        let lexicon = sample();
        let none = BTreeSet::new();
        let smash = lexicon.get_entry("smash").unwrap();
        assert!(!smash.is_allowed(AgeRating::T16, &none));
        assert!(smash.is_allowed(AgeRating::M18, &none));

        let sexual: BTreeSet<ContentFlag> = [ContentFlag::Sexual].into_iter().collect();
        assert!(!smash.is_allowed(AgeRating::M18, &sexual));
    }

    #[test]
    fn test_vocabulary_uses_normalized_keys() {
        let lexicon = sample();
        assert!(lexicon.contains_term("goat"));
        assert!(lexicon.contains_term("no cap"));
        assert!(!lexicon.contains_term("GOAT"));
    }

    #[test]
    fn test_vocabulary_knows_phrase_words() {
        let lexicon = sample();
        assert!(lexicon.contains_term("no"));
        assert!(lexicon.contains_term("af"));
        assert!(!lexicon.contains_term("x"));
        assert!(!lexicon.contains_term("nope"));
    }

    #[test]
    fn test_age_rating_parsing_and_order() {
        assert_eq!("t13".parse::<AgeRating>().unwrap(), AgeRating::T13);
        assert_eq!("18+".parse::<AgeRating>().unwrap(), AgeRating::M18);
        assert!("PG".parse::<AgeRating>().is_err());
        assert!(AgeRating::E < AgeRating::T13);
        assert!(AgeRating::T16 < AgeRating::M18);
        assert_eq!(AgeRating::T16.to_string(), "T16");
    }

    #[test]
    fn test_content_flag_labels() {
        assert_eq!(ContentFlag::from_label("Violence"), ContentFlag::Violent);
        assert_eq!(ContentFlag::from_label("gambling"), ContentFlag::Other);
        assert!("gambling".parse::<ContentFlag>().is_err());
        assert_eq!("other".parse::<ContentFlag>().unwrap(), ContentFlag::Other);
    }

    #[test]
    fn test_template_variant_detection() {
        assert!(is_template_variant("X af"));
        assert!(is_template_variant("X-af"));
        assert!(is_template_variant("it's giving X"));
        assert!(!is_template_variant("xanax"));
        assert!(!is_template_variant("x af"));
    }
}
