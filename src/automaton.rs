//! Multi-pattern automaton compiled from a lexicon
//!
//! [`MultiPatternTrie`] is an Aho–Corasick trie: a character trie with failure
//! links, scanned once per text and reporting every (possibly overlapping)
//! pattern occurrence. An [`Automaton`] bundles three compiled views of one
//! lexicon version:
//!
//! - a trie over every normalized non-template variant (forward matching)
//! - slot-filler regexes for template variants such as `"X af"`
//! - a trie over sense glosses mapped to their concept (reverse matching)
//!
//! Compilation goes through a process-wide cache so each
//! `(version, fingerprint)` is built at most once, even under concurrent
//! requests for it.

use crate::lexicon::{EntryId, Lexicon, SLOT_MARKER, is_template_variant};
use crate::normalizer::normalize_key;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock, Mutex, OnceLock};

const ROOT: u32 = 0;

/// Trie node with a failure link and the patterns ending here
#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: HashMap<char, u32>,
    fail: u32,
    /// Pattern ending exactly at this node
    terminal: Option<u32>,
    /// Patterns recognized at this node, including via failure links
    outputs: Vec<u32>,
}

/// One occurrence reported by [`MultiPatternTrie::find_overlapping`]
#[derive(Debug, Clone, PartialEq)]
pub struct TrieMatch<'a, T> {
    /// Character index of the first matched character
    pub start: usize,
    /// Character index one past the last matched character
    pub end: usize,
    pub value: &'a T,
}

/// Aho–Corasick automaton over `char` patterns
#[derive(Debug, Clone)]
pub struct MultiPatternTrie<T> {
    nodes: Vec<TrieNode>,
    /// Pattern length in chars, and its payload
    patterns: Vec<(usize, T)>,
}

impl<T> MultiPatternTrie<T> {
    /// Build from `(key, value)` pairs; when a key repeats the first value wins
    pub fn build<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
    {
        let mut trie = Self {
            nodes: vec![TrieNode::default()],
            patterns: Vec::new(),
        };
        for (key, value) in pairs {
            trie.insert(key.as_ref(), value);
        }
        trie.link();
        trie
    }

    fn insert(&mut self, key: &str, value: T) {
        if key.is_empty() {
            return;
        }
        let mut current = ROOT;
        let mut len = 0;
        for ch in key.chars() {
            len += 1;
            current = match self.nodes[current as usize].children.get(&ch) {
                Some(&next) => next,
                None => {
                    let next = self.nodes.len() as u32;
                    self.nodes.push(TrieNode::default());
                    self.nodes[current as usize].children.insert(ch, next);
                    next
                }
            };
        }

        let node = &mut self.nodes[current as usize];
        if node.terminal.is_none() {
            node.terminal = Some(self.patterns.len() as u32);
            self.patterns.push((len, value));
        }
    }

    /// Compute failure links and merged outputs, breadth first
    fn link(&mut self) {
        let mut queue = VecDeque::new();
        let root_children: Vec<u32> = self.nodes[ROOT as usize].children.values().copied().collect();
        for child in root_children {
            self.nodes[child as usize].fail = ROOT;
            queue.push_back(child);
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = queue.pop_front() {
            order.push(node);
            let children: Vec<(char, u32)> = self.nodes[node as usize]
                .children
                .iter()
                .map(|(&ch, &child)| (ch, child))
                .collect();

            for (ch, child) in children {
                let mut state = self.nodes[node as usize].fail;
                let fail = loop {
                    if let Some(&next) = self.nodes[state as usize].children.get(&ch) {
                        break next;
                    }
                    if state == ROOT {
                        break ROOT;
                    }
                    state = self.nodes[state as usize].fail;
                };
                self.nodes[child as usize].fail = fail;
                queue.push_back(child);
            }
        }

        // breadth-first order visits every fail target before the nodes pointing at it
        for node in order {
            let fail = self.nodes[node as usize].fail;
            let mut outputs: Vec<u32> = self.nodes[node as usize].terminal.into_iter().collect();
            outputs.extend(self.nodes[fail as usize].outputs.iter().copied());
            self.nodes[node as usize].outputs = outputs;
        }
    }

    /// Number of distinct patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every pattern occurrence in `text`, in order of end position
    pub fn find_overlapping(&self, text: &[char]) -> Vec<TrieMatch<'_, T>> {
        let mut matches = Vec::new();
        if self.patterns.is_empty() {
            return matches;
        }

        let mut state = ROOT;
        for (i, ch) in text.iter().enumerate() {
            state = loop {
                if let Some(&next) = self.nodes[state as usize].children.get(ch) {
                    break next;
                }
                if state == ROOT {
                    break ROOT;
                }
                state = self.nodes[state as usize].fail;
            };

            for &pattern in &self.nodes[state as usize].outputs {
                let (len, value) = &self.patterns[pattern as usize];
                matches.push(TrieMatch {
                    start: i + 1 - len,
                    end: i + 1,
                    value,
                });
            }
        }
        matches
    }
}

/// Payload of a forward pattern
#[derive(Debug, Clone, PartialEq)]
pub struct PatternTarget {
    pub entry: EntryId,
    /// Variant as written in the lexicon
    pub variant: String,
    pub confidence: f32,
}

/// A compiled template variant
#[derive(Debug, Clone)]
pub struct TemplatePattern {
    pub regex: Regex,
    pub entry: EntryId,
    pub variant: String,
    pub confidence: f32,
}

impl TemplatePattern {
    /// Name of the capture group holding the slot filler
    pub const SLOT_GROUP: &'static str = "slot";
}

/// Payload of a reverse (gloss phrase) pattern
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptTarget {
    pub concept: String,
    /// Gloss the phrase came from
    pub phrase: String,
}

/// Compiled matching structures for one lexicon version
#[derive(Debug)]
pub struct Automaton {
    version: String,
    fingerprint: u64,
    variants: MultiPatternTrie<PatternTarget>,
    templates: Vec<TemplatePattern>,
    concepts: MultiPatternTrie<ConceptTarget>,
}

impl Automaton {
    /// Compile a lexicon without consulting the cache
    pub fn compile(lexicon: &Lexicon) -> Self {
        let mut patterns = Vec::new();
        let mut templates = Vec::new();
        let mut phrases = Vec::new();

        for (i, entry) in lexicon.entries().iter().enumerate() {
            let id = EntryId(i);
            for variant in &entry.variants {
                if is_template_variant(variant) {
                    match compile_template(variant) {
                        Some(regex) => templates.push(TemplatePattern {
                            regex,
                            entry: id,
                            variant: variant.clone(),
                            confidence: entry.confidence,
                        }),
                        None => tracing::warn!(%variant, "skipping uncompilable template"),
                    }
                    continue;
                }
                patterns.push((
                    normalize_key(variant),
                    PatternTarget {
                        entry: id,
                        variant: variant.clone(),
                        confidence: entry.confidence,
                    },
                ));
            }

            if entry.is_template() {
                continue;
            }
            for (sense_index, sense) in entry.senses.iter().enumerate() {
                if let Some(concept) = entry.concept_of(sense_index) {
                    phrases.push((
                        normalize_key(&sense.gloss),
                        ConceptTarget {
                            concept: concept.to_string(),
                            phrase: sense.gloss.clone(),
                        },
                    ));
                }
            }
        }

        let automaton = Self {
            version: lexicon.version().to_string(),
            fingerprint: lexicon.fingerprint(),
            variants: MultiPatternTrie::build(patterns),
            templates,
            concepts: MultiPatternTrie::build(phrases),
        };
        tracing::debug!(
            version = %automaton.version,
            patterns = automaton.variants.len(),
            templates = automaton.templates.len(),
            concepts = automaton.concepts.len(),
            "compiled automaton"
        );
        automaton
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Forward trie over normalized variants
    pub fn variants(&self) -> &MultiPatternTrie<PatternTarget> {
        &self.variants
    }

    pub fn templates(&self) -> &[TemplatePattern] {
        &self.templates
    }

    /// Reverse trie over normalized gloss phrases
    pub fn concepts(&self) -> &MultiPatternTrie<ConceptTarget> {
        &self.concepts
    }
}

const SLOT: &str = r"(?P<slot>[\p{L}\p{N}']+)";
const TRAILING_SLOT: &str = r"(?P<slot>[\p{L}\p{N}']+(?:\s[\p{L}\p{N}']+){0,2})";
const SEPARATOR: &str = r"[\s\-]+";

/// Compile a template variant into a regex over the primary normalized form
///
/// Literal words are normalized like every other key. The slot matches one
/// word, or up to three when it ends the template (`"it's giving X"`).
fn compile_template(variant: &str) -> Option<Regex> {
    let words: Vec<&str> = variant
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty())
        .collect();
    if words.iter().filter(|w| **w == SLOT_MARKER).count() != 1 {
        return None;
    }

    let last = words.len() - 1;
    let mut parts = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        if *word == SLOT_MARKER {
            parts.push(if i == last && i > 0 { TRAILING_SLOT } else { SLOT }.to_string());
            continue;
        }
        let key = normalize_key(word);
        if !key.is_empty() {
            parts.push(escape_literal(&key));
        }
    }
    if parts.len() < 2 {
        return None;
    }

    Regex::new(&format!(r"\b{}\b", parts.join(SEPARATOR))).ok()
}

/// Escape a literal word, making apostrophes optional
fn escape_literal(word: &str) -> String {
    word.split('\'')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("'?")
}

const CACHE_CAPACITY: usize = 8;

type CacheKey = (String, u64);

/// Process-wide automaton cache with one initialization cell per key
struct AutomatonCache {
    slots: Mutex<Vec<(CacheKey, Arc<OnceLock<Arc<Automaton>>>)>>,
}

impl AutomatonCache {
    fn cell(&self, key: CacheKey) -> Arc<OnceLock<Arc<Automaton>>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = slots.iter().position(|(k, _)| *k == key) {
            // most recently used goes last
            let slot = slots.remove(pos);
            let cell = slot.1.clone();
            slots.push(slot);
            return cell;
        }

        let cell = Arc::new(OnceLock::new());
        slots.push((key, cell.clone()));
        while slots.len() > CACHE_CAPACITY {
            // automata still held by a snapshot or a builder are never evicted
            match slots.iter().position(|(_, c)| !in_use(c)) {
                Some(pos) => {
                    slots.remove(pos);
                }
                None => break,
            }
        }
        cell
    }
}

fn in_use(cell: &Arc<OnceLock<Arc<Automaton>>>) -> bool {
    Arc::strong_count(cell) > 1 || cell.get().is_some_and(|a| Arc::strong_count(a) > 1)
}

static CACHE: LazyLock<AutomatonCache> = LazyLock::new(|| AutomatonCache {
    slots: Mutex::new(Vec::new()),
});

/// Compiled automaton for `lexicon`, built at most once per `(version, fingerprint)`
///
/// Concurrent callers asking for the same key block on a single build and share
/// its result.
pub fn build_automaton(lexicon: &Lexicon) -> Arc<Automaton> {
    let key = (lexicon.version().to_string(), lexicon.fingerprint());
    let cell = CACHE.cell(key);
    cell.get_or_init(|| Arc::new(Automaton::compile(lexicon)))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::fixtures::{document, sample_document};
    use serde_json::json;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn found<'a>(trie: &'a MultiPatternTrie<&'static str>, text: &str) -> Vec<(usize, usize, &'a str)> {
        trie.find_overlapping(&chars(text))
            .into_iter()
            .map(|m| (m.start, m.end, *m.value))
            .collect()
    }

    #[test]
    fn test_trie_reports_overlapping_matches() {
        let trie = MultiPatternTrie::build([("he", "he"), ("she", "she"), ("his", "his"), ("hers", "hers")]);
        let mut matches = found(&trie, "ushers");
        matches.sort();
        assert_eq!(matches, vec![(1, 4, "she"), (2, 4, "he"), (2, 6, "hers")]);
    }

    #[test]
    fn test_trie_failure_links_across_words() {
        let trie = MultiPatternTrie::build([("no cap", "no cap"), ("cap", "cap")]);
        let matches = found(&trie, "no no cap");
        assert!(matches.contains(&(3, 9, "no cap")));
        assert!(matches.contains(&(6, 9, "cap")));
    }

    #[test]
    fn test_trie_first_value_wins() {
        let trie = MultiPatternTrie::build([("fire", "first"), ("fire", "second")]);
        assert_eq!(trie.len(), 1);
        assert_eq!(found(&trie, "fire"), vec![(0, 4, "first")]);
    }

    #[test]
    fn test_trie_empty() {
        let trie: MultiPatternTrie<&str> = MultiPatternTrie::build(Vec::<(&str, &str)>::new());
        assert!(trie.is_empty());
        assert!(found(&trie, "anything").is_empty());
    }

    #[test]
    fn test_trie_non_ascii() {
        let trie = MultiPatternTrie::build([("café", "cafe")]);
        assert_eq!(found(&trie, "le café"), vec![(3, 7, "cafe")]);
    }

    #[test]
    fn test_compile_splits_templates_from_patterns() {
        let lexicon = Lexicon::from_json(&sample_document("auto-1")).unwrap();
        let automaton = Automaton::compile(&lexicon);

        assert_eq!(automaton.version(), "auto-1");
        assert_eq!(automaton.templates().len(), 2);
        let text = chars("fire no cap");
        let variants: Vec<&str> = automaton
            .variants()
            .find_overlapping(&text)
            .iter()
            .map(|m| m.value.variant.as_str())
            .collect();
        assert!(variants.contains(&"fire"));
        assert!(variants.contains(&"no cap"));
    }

    #[test]
    fn test_template_regex() {
        let regex = compile_template("X af").unwrap();
        let caps = regex.captures("this is cringe af").unwrap();
        assert_eq!(&caps["slot"], "cringe");

        let regex = compile_template("X-af").unwrap();
        assert!(regex.is_match("cringe-af"));

        let regex = compile_template("it's giving X").unwrap();
        let caps = regex.captures("its giving main character energy").unwrap();
        assert_eq!(&caps["slot"], "main character energy");
    }

    #[test]
    fn test_template_requires_literal_and_single_slot() {
        assert!(compile_template("X").is_none());
        assert!(compile_template("X or X").is_none());
        assert!(compile_template("no slot").is_none());
    }

    #[test]
    fn test_concepts_trie() {
        let lexicon = Lexicon::from_json(&sample_document("auto-2")).unwrap();
        let automaton = Automaton::compile(&lexicon);
        let text = chars("that was exciting");
        let concepts: Vec<&str> = automaton
            .concepts()
            .find_overlapping(&text)
            .iter()
            .map(|m| m.value.concept.as_str())
            .collect();
        assert_eq!(concepts, vec!["excitement"]);
    }

    #[test]
    fn test_cache_builds_once_per_key() {
        let raw = sample_document("cache-1");
        let a = Lexicon::from_json(&raw).unwrap();
        let b = Lexicon::from_json(&raw).unwrap();
        let first = build_automaton(&a);
        assert!(Arc::ptr_eq(&first, &build_automaton(&b)));
    }

    #[test]
    fn test_cache_distinguishes_fingerprints() {
        let item = |term: &str| {
            json!({ "term": term, "gloss": "meaning", "confidence": 0.5, "age_rating": "E" })
        };
        let a = Lexicon::from_json(&document("cache-2", vec![item("fire")])).unwrap();
        let b = Lexicon::from_json(&document("cache-2", vec![item("lit")])).unwrap();
        let built_a = build_automaton(&a);
        let built_b = build_automaton(&b);
        assert!(!Arc::ptr_eq(&built_a, &built_b));
        assert_eq!(built_b.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_cache_single_flight_across_threads() {
        let raw = sample_document("cache-3");
        let lexicon = Arc::new(Lexicon::from_json(&raw).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lexicon = lexicon.clone();
                std::thread::spawn(move || build_automaton(&lexicon))
            })
            .collect();
        let built: Vec<Arc<Automaton>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(built.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
