//! Lexicon document schema and validation
//!
//! The document shape:
//!
//! ```json
//! {
//!     "version": "2024.06",
//!     "generated_at": "2024-06-01T00:00:00Z",
//!     "count": 2,
//!     "items": [
//!         { "term": "fire", "variants": ["🔥"], "gloss": "excellent",
//!           "confidence": 0.95, "age_rating": "E", "categories": ["excellence"] },
//!         { "term": "lit", "confidence": 0.8, "age_rating": "T13",
//!           "senses": [ { "gloss": "exciting", "embedding": [1.0, 0.0] } ] }
//!     ]
//! }
//! ```
//!
//! Validation is all-or-nothing: one bad item rejects the whole document.

use super::{AgeRating, ContentFlag, EntryId, Lexicon, LexiconEntry, Sense};
use crate::error::LexiconError;
use crate::normalizer::normalize_key;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

/// Top-level lexicon document
#[derive(Debug, Clone, Deserialize)]
pub struct LexiconDocument {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub count: usize,
    pub items: Vec<LexiconItem>,
}

/// One term as it appears in the document
#[derive(Debug, Clone, Deserialize)]
pub struct LexiconItem {
    pub term: String,
    #[serde(default)]
    pub variants: Vec<String>,
    /// Shorthand for a single sense
    #[serde(default)]
    pub gloss: Option<String>,
    #[serde(default)]
    pub senses: Vec<SenseItem>,
    pub confidence: f32,
    pub age_rating: AgeRating,
    #[serde(default)]
    pub content_flags: Vec<ContentFlag>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenseItem {
    pub gloss: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub category: Option<String>,
    /// Defaults to the item's confidence
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Parse and validate a raw lexicon document
pub fn parse(raw: &str) -> Result<Lexicon, LexiconError> {
    let document: LexiconDocument = serde_json::from_str(raw)?;
    build(document, fingerprint(raw))
}

/// Stable hash of the raw document text
pub fn fingerprint(raw: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    raw.hash(&mut hasher);
    hasher.finish()
}

fn build(document: LexiconDocument, fingerprint: u64) -> Result<Lexicon, LexiconError> {
    let version = document.version.trim().to_string();
    if version.is_empty() {
        return Err(LexiconError::EmptyVersion);
    }
    if document.count != document.items.len() {
        return Err(LexiconError::CountMismatch {
            declared: document.count,
            actual: document.items.len(),
        });
    }

    let mut entries: Vec<LexiconEntry> = Vec::with_capacity(document.items.len());
    let mut index: HashMap<String, EntryId> = HashMap::new();
    let mut embedding_dim: Option<usize> = None;

    for (position, item) in document.items.into_iter().enumerate() {
        let term = item.term.trim().to_string();
        if term.is_empty() {
            return Err(LexiconError::EmptyTerm { index: position });
        }
        check_confidence(&term, item.confidence)?;

        let categories = dedup(item.categories.iter().map(|c| c.trim()));
        let senses = build_senses(&term, &item, &categories)?;

        for sense in senses.iter().filter(|s| !s.embedding.is_empty()) {
            match embedding_dim {
                None => embedding_dim = Some(sense.embedding.len()),
                Some(expected) if expected != sense.embedding.len() => {
                    return Err(LexiconError::EmbeddingDimension {
                        term,
                        expected,
                        found: sense.embedding.len(),
                    });
                }
                Some(_) => {}
            }
        }

        let variants = dedup(
            std::iter::once(term.as_str()).chain(item.variants.iter().map(|v| v.trim())),
        );

        let id = EntryId(entries.len());
        for variant in &variants {
            let key = normalize_key(variant);
            if key.is_empty() {
                continue;
            }
            match index.get(&key) {
                Some(&owner) if owner != id => {
                    return Err(LexiconError::DuplicateVariant {
                        variant: key,
                        first: entries[owner.0].term.clone(),
                        second: term,
                    });
                }
                Some(_) => {}
                None => {
                    index.insert(key, id);
                }
            }
        }

        entries.push(LexiconEntry {
            term,
            variants,
            senses,
            confidence: item.confidence,
            age_rating: item.age_rating,
            content_flags: item.content_flags.iter().copied().collect::<BTreeSet<_>>(),
            categories,
        });
    }

    Ok(Lexicon::from_parts(
        version,
        document.generated_at,
        entries,
        index,
        embedding_dim,
        fingerprint,
    ))
}

fn build_senses(
    term: &str,
    item: &LexiconItem,
    categories: &[String],
) -> Result<Vec<Sense>, LexiconError> {
    if !item.senses.is_empty() {
        return item
            .senses
            .iter()
            .map(|sense| {
                let gloss = sense.gloss.trim();
                if gloss.is_empty() {
                    return Err(LexiconError::MissingGloss {
                        term: term.to_string(),
                    });
                }
                let confidence = sense.confidence.unwrap_or(item.confidence);
                check_confidence(term, confidence)?;
                Ok(Sense {
                    gloss: gloss.to_string(),
                    embedding: sense.embedding.clone(),
                    category: sense.category.clone(),
                    confidence,
                })
            })
            .collect();
    }

    match item.gloss.as_deref().map(str::trim) {
        Some(gloss) if !gloss.is_empty() => Ok(vec![Sense {
            gloss: gloss.to_string(),
            embedding: Vec::new(),
            category: categories.first().cloned(),
            confidence: item.confidence,
        }]),
        _ => Err(LexiconError::MissingGloss {
            term: term.to_string(),
        }),
    }
}

fn check_confidence(term: &str, value: f32) -> Result<(), LexiconError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LexiconError::InvalidConfidence {
            term: term.to_string(),
            value,
        })
    }
}

/// Non-empty strings in first-seen order
fn dedup<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !value.is_empty() && !out.iter().any(|v| v == value) {
            out.push(value.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::fixtures::{document, sample_document};
    use serde_json::json;

    fn item(term: &str) -> serde_json::Value {
        json!({ "term": term, "gloss": "meaning", "confidence": 0.5, "age_rating": "E" })
    }

    #[test]
    fn test_parse_sample() {
        let lexicon = parse(&sample_document("v1")).unwrap();
        assert_eq!(lexicon.len(), 9);
        let goat = lexicon.get_entry("g.o.a.t").unwrap();
        assert_eq!(goat.variants, vec!["goat", "🐐", "g.o.a.t"]);
        assert_eq!(goat.senses[0].category.as_deref(), Some("excellence"));
    }

    #[test]
    fn test_sense_confidence_defaults_to_item() {
        let raw = document(
            "v1",
            vec![json!({
                "term": "tea", "confidence": 0.6, "age_rating": "E",
                "senses": [{"gloss": "gossip"}, {"gloss": "tea", "confidence": 0.2}]
            })],
        );
        let lexicon = parse(&raw).unwrap();
        let tea = lexicon.get_entry("tea").unwrap();
        assert_eq!(tea.senses[0].confidence, 0.6);
        assert_eq!(tea.senses[1].confidence, 0.2);
        assert_eq!(lexicon.embedding_dim(), None);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(parse("{ nope"), Err(LexiconError::Parse(_))));
    }

    #[test]
    fn test_rejects_empty_version() {
        let raw = document("  ", vec![item("fire")]);
        assert!(matches!(parse(&raw), Err(LexiconError::EmptyVersion)));
    }

    #[test]
    fn test_rejects_count_mismatch() {
        let raw = json!({
            "version": "v1", "generated_at": "2024-06-01T00:00:00Z",
            "count": 3, "items": [item("fire")]
        })
        .to_string();
        assert!(matches!(
            parse(&raw),
            Err(LexiconError::CountMismatch {
                declared: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_rejects_empty_term() {
        let raw = document("v1", vec![item("fire"), item(" ")]);
        assert!(matches!(
            parse(&raw),
            Err(LexiconError::EmptyTerm { index: 1 })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        let raw = document(
            "v1",
            vec![json!({ "term": "fire", "gloss": "x", "confidence": 1.5, "age_rating": "E" })],
        );
        assert!(matches!(
            parse(&raw),
            Err(LexiconError::InvalidConfidence { .. })
        ));

        let raw = document(
            "v1",
            vec![json!({
                "term": "lit", "confidence": 0.5, "age_rating": "E",
                "senses": [{"gloss": "exciting", "confidence": -0.1}]
            })],
        );
        assert!(matches!(
            parse(&raw),
            Err(LexiconError::InvalidConfidence { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_gloss() {
        let raw = document(
            "v1",
            vec![json!({ "term": "fire", "confidence": 0.5, "age_rating": "E" })],
        );
        assert!(matches!(parse(&raw), Err(LexiconError::MissingGloss { .. })));
    }

    #[test]
    fn test_rejects_duplicate_variant_across_entries() {
        let mut flame = item("flame");
        flame["variants"] = json!(["FIRE"]);
        let raw = document("v1", vec![item("fire"), flame]);
        match parse(&raw) {
            Err(LexiconError::DuplicateVariant {
                variant,
                first,
                second,
            }) => {
                assert_eq!(variant, "fire");
                assert_eq!(first, "fire");
                assert_eq!(second, "flame");
            }
            other => panic!("expected duplicate variant, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_variant_within_entry_is_fine() {
        let mut fire = item("fire");
        fire["variants"] = json!(["fire", "Fire", "🔥"]);
        let lexicon = parse(&document("v1", vec![fire])).unwrap();
        assert_eq!(lexicon.get_entry("fire").unwrap().variants.len(), 3);
    }

    #[test]
    fn test_rejects_embedding_dimension_mismatch() {
        let raw = document(
            "v1",
            vec![json!({
                "term": "lit", "confidence": 0.5, "age_rating": "E",
                "senses": [
                    {"gloss": "exciting", "embedding": [1.0, 0.0]},
                    {"gloss": "drunk", "embedding": [1.0, 0.0, 0.0]}
                ]
            })],
        );
        assert!(matches!(
            parse(&raw),
            Err(LexiconError::EmbeddingDimension {
                expected: 2,
                found: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_content_flag_becomes_other() {
        let mut fire = item("fire");
        fire["content_flags"] = json!(["gambling", "profanity"]);
        let lexicon = parse(&document("v1", vec![fire])).unwrap();
        let flags = &lexicon.get_entry("fire").unwrap().content_flags;
        assert!(flags.contains(&ContentFlag::Other));
        assert!(flags.contains(&ContentFlag::Profanity));
    }

    #[test]
    fn test_unknown_age_rating_is_rejected() {
        let mut fire = item("fire");
        fire["age_rating"] = json!("PG");
        assert!(matches!(
            parse(&document("v1", vec![fire])),
            Err(LexiconError::Parse(_))
        ));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = parse(&document("v1", vec![item("fire")])).unwrap();
        let b = parse(&document("v1", vec![item("lit")])).unwrap();
        assert_eq!(a.version(), b.version());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
