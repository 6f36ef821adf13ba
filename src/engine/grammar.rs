//! Grammar polishing for substituted text
//!
//! Four token-level rules run in a fixed order, each over the previous rule's
//! output:
//!
//! 1. whitespace: runs collapse to one space (or one/two newlines), detached
//!    punctuation re-attaches to the preceding word, ends are trimmed
//! 2. informal verbs: a small table (`gonna` → `going to`, `he don't` →
//!    `he doesn't`, `they is` → `they are`)
//! 3. articles: `a`/`an` agree with the sound of the next word
//! 4. capitalization: sentence starts and the standalone pronoun `I`
//!
//! No rule produces input another rule rewrites, so [`rewrite`] is idempotent.
//! Every change counts as one violation.

/// Characters that attach to the word before them
const ATTACHING_PUNCTUATION: &[char] = &[',', '.', '!', '?', ';', ':'];
const SENTENCE_END: &[char] = &['.', '!', '?'];

/// Contractions rewritten to their full form
const EXPANSIONS: &[(&str, &str)] = &[
    ("gonna", "going to"),
    ("wanna", "want to"),
    ("gotta", "got to"),
    ("tryna", "trying to"),
    ("finna", "about to"),
];

/// (subjects, informal verb forms, agreeing form)
const AGREEMENT: &[(&[&str], &[&str], &str)] = &[
    (&["i"], &["is", "are", "be"], "am"),
    (&["you", "we", "they"], &["is", "am", "be"], "are"),
    (&["he", "she"], &["are", "am", "be"], "is"),
    (&["it"], &["are", "am"], "is"),
    (&["he", "she", "it"], &["don't", "dont"], "doesn't"),
];

/// Vowel-initial words pronounced with a consonant sound
const CONSONANT_SOUND_PREFIXES: &[&str] = &["uni", "use", "usu", "usa", "uti", "ure", "eu", "ewe"];
const CONSONANT_SOUND_WORDS: &[&str] = &["one", "once", "ones"];
/// Words starting with a silent `h`
const SILENT_H_PREFIXES: &[&str] = &["hour", "honest", "honor", "honour", "heir"];

const PRONOUN_I: &[&str] = &["i", "i'm", "i've", "i'll", "i'd"];

/// Output of [`rewrite`]
#[derive(Debug, Clone, PartialEq)]
pub struct GrammarOutput {
    pub text: String,
    /// Number of rule applications
    pub violations: usize,
    /// Tokens after whitespace normalization
    pub tokens: usize,
}

impl GrammarOutput {
    /// `1 - violations / tokens`, clamped to [0, 1]
    pub fn grammar_score(&self) -> f32 {
        grammar_score(self.violations, self.tokens)
    }
}

pub fn grammar_score(violations: usize, tokens: usize) -> f32 {
    if tokens == 0 {
        return 1.0;
    }
    (1.0 - violations as f32 / tokens as f32).clamp(0.0, 1.0)
}

/// Apply every rule to `text`
pub fn rewrite(text: &str) -> GrammarOutput {
    let mut violations = 0;
    let mut tokens = normalize_whitespace(text, &mut violations);
    let token_count = tokens.len();

    normalize_verbs(&mut tokens, &mut violations);
    fix_articles(&mut tokens, &mut violations);
    capitalize(&mut tokens, &mut violations);

    GrammarOutput {
        text: tokens
            .iter()
            .flat_map(|t| [t.sep.as_str(), t.text.as_str()])
            .collect(),
        violations,
        tokens: token_count,
    }
}

/// Number of violations in `text`, without keeping the rewrite
pub fn count_violations(text: &str) -> usize {
    rewrite(text).violations
}

#[derive(Debug, Clone)]
struct Token {
    /// Whitespace before the token; empty for the first one
    sep: String,
    text: String,
}

/// Leading punctuation, word core, trailing punctuation
struct Parts {
    lead: String,
    core: String,
    trail: String,
}

impl Parts {
    fn of(token: &str) -> Self {
        let start = token
            .char_indices()
            .find(|(_, c)| c.is_alphanumeric())
            .map_or(token.len(), |(i, _)| i);
        let end = token
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_alphanumeric())
            .map_or(start, |(i, c)| i + c.len_utf8())
            .max(start);
        Self {
            lead: token[..start].to_string(),
            core: token[start..end].to_string(),
            trail: token[end..].to_string(),
        }
    }

    fn key(&self) -> String {
        word_key(&self.core)
    }

    fn join(&self, core: &str) -> String {
        format!("{}{}{}", self.lead, core, self.trail)
    }
}

fn word_key(word: &str) -> String {
    word.to_lowercase().replace('\u{2019}', "'")
}

/// Give `replacement` the casing pattern of `original`
fn match_case(replacement: &str, original: &str) -> String {
    let letters: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase()) {
        return replacement.to_uppercase();
    }
    if original.chars().next().is_some_and(char::is_uppercase) {
        return capitalize_first(replacement);
    }
    replacement.to_string()
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn normalize_whitespace(text: &str, violations: &mut usize) -> Vec<Token> {
    let mut raw: Vec<(String, String)> = Vec::new();
    let mut sep = String::new();
    let mut word = String::new();
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !word.is_empty() {
                raw.push((std::mem::take(&mut sep), std::mem::take(&mut word)));
            }
            sep.push(ch);
        } else {
            word.push(ch);
        }
    }
    if !word.is_empty() {
        raw.push((std::mem::take(&mut sep), word));
    }
    if !sep.is_empty() && !raw.is_empty() {
        *violations += 1;
    }

    let mut tokens: Vec<Token> = Vec::with_capacity(raw.len());
    for (raw_sep, text) in raw {
        let is_punctuation = text.chars().all(|c| ATTACHING_PUNCTUATION.contains(&c));
        if let (true, Some(previous)) = (is_punctuation, tokens.last_mut()) {
            previous.text.push_str(&text);
            *violations += 1;
            continue;
        }

        let canonical = if tokens.is_empty() {
            ""
        } else {
            match raw_sep.chars().filter(|c| *c == '\n').count() {
                0 => " ",
                1 => "\n",
                _ => "\n\n",
            }
        };
        if raw_sep != canonical {
            *violations += 1;
        }
        tokens.push(Token {
            sep: canonical.to_string(),
            text,
        });
    }
    tokens
}

fn normalize_verbs(tokens: &mut Vec<Token>, violations: &mut usize) {
    let mut i = 0;
    while i < tokens.len() {
        let parts = Parts::of(&tokens[i].text);
        let key = parts.key();

        if let Some((_, expansion)) = EXPANSIONS.iter().find(|(short, _)| *short == key) {
            let expanded = match_case(expansion, &parts.core);
            if let Some((first, second)) = expanded.split_once(' ') {
                tokens[i].text = format!("{}{}", parts.lead, first);
                tokens.insert(
                    i + 1,
                    Token {
                        sep: " ".to_string(),
                        text: format!("{}{}", second, parts.trail),
                    },
                );
                *violations += 1;
                i += 2;
                continue;
            }
        }

        if parts.trail.is_empty() && i + 1 < tokens.len() {
            let next = Parts::of(&tokens[i + 1].text);
            let next_key = next.key();
            let rule = AGREEMENT.iter().find(|(subjects, verbs, _)| {
                subjects.contains(&key.as_str()) && verbs.contains(&next_key.as_str())
            });
            if let Some((_, _, agreeing)) = rule {
                tokens[i + 1].text = next.join(&match_case(agreeing, &next.core));
                *violations += 1;
            }
        }
        i += 1;
    }
}

/// Whether `word` takes `an`; `None` when the sound cannot be judged
fn needs_an(word: &str) -> Option<bool> {
    let first = word.chars().next()?;
    if !first.is_alphabetic() {
        return None;
    }
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase()) {
        // acronyms are read letter by letter
        return None;
    }

    let lower = word_key(word);
    if SILENT_H_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return Some(true);
    }
    if CONSONANT_SOUND_WORDS.contains(&lower.as_str())
        || CONSONANT_SOUND_PREFIXES.iter().any(|p| lower.starts_with(p))
    {
        return Some(false);
    }
    Some(matches!(
        lower.chars().next(),
        Some('a' | 'e' | 'i' | 'o' | 'u')
    ))
}

fn fix_articles(tokens: &mut [Token], violations: &mut usize) {
    for i in 0..tokens.len().saturating_sub(1) {
        let parts = Parts::of(&tokens[i].text);
        let key = parts.key();
        if (key != "a" && key != "an") || !parts.trail.is_empty() {
            continue;
        }

        let next = Parts::of(&tokens[i + 1].text);
        let Some(an) = needs_an(&next.core) else {
            continue;
        };
        let expected = if an { "an" } else { "a" };
        if key != expected {
            tokens[i].text = parts.join(&match_case(expected, &parts.core));
            *violations += 1;
        }
    }
}

fn capitalize(tokens: &mut [Token], violations: &mut usize) {
    let mut sentence_start = true;
    for token in tokens.iter_mut() {
        let parts = Parts::of(&token.text);
        if parts.core.is_empty() {
            if token.text.contains(SENTENCE_END) {
                sentence_start = true;
            }
            continue;
        }

        if sentence_start || PRONOUN_I.contains(&parts.key().as_str()) {
            let capitalized = capitalize_first(&parts.core);
            if capitalized != parts.core {
                token.text = parts.join(&capitalized);
                *violations += 1;
            }
        }
        sentence_start = parts.trail.contains(SENTENCE_END);
    }
}
