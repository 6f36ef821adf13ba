//! Result and mode types shared by both translation directions

use crate::lexicon::{AgeRating, ContentFlag};
use crate::matcher::{MatchKind, Span};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How forward output is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Plain translated text only
    #[default]
    Clean,
    /// Translated text plus per-span annotations
    Annotated,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clean" => Ok(RenderMode::Clean),
            "annotated" => Ok(RenderMode::Annotated),
            other => Err(format!("unknown render mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ToPlain,
    ToSlang,
}

/// Share of eligible concepts rewritten as slang
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Light,
    #[default]
    Medium,
    Heavy,
}

impl Density {
    /// Every `stride()`-th eligible concept is replaced
    pub fn stride(self) -> usize {
        match self {
            Density::Light => 3,
            Density::Medium => 2,
            Density::Heavy => 1,
        }
    }
}

impl FromStr for Density {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Density::Light),
            "medium" => Ok(Density::Medium),
            "heavy" => Ok(Density::Heavy),
            other => Err(format!("unknown density '{}'", other)),
        }
    }
}

fn default_age_ceiling() -> AgeRating {
    AgeRating::T13
}

/// Caller settings for plain-to-slang translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlangConfig {
    /// Most restricted rating a realization may carry
    #[serde(default = "default_age_ceiling")]
    pub age_ceiling: AgeRating,
    #[serde(default)]
    pub excluded_flags: BTreeSet<ContentFlag>,
    #[serde(default)]
    pub density: Density,
}

impl Default for SlangConfig {
    fn default() -> Self {
        Self {
            age_ceiling: default_age_ceiling(),
            excluded_flags: BTreeSet::new(),
            density: Density::default(),
        }
    }
}

/// Why disambiguation could not use embeddings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum DisambiguationFailure {
    ProviderError { message: String },
    Timeout { after_ms: u64 },
    DimensionMismatch { expected: usize, found: usize },
    MissingEmbedding { sense_index: usize },
}

impl fmt::Display for DisambiguationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisambiguationFailure::ProviderError { message } => {
                write!(f, "provider error: {}", message)
            }
            DisambiguationFailure::Timeout { after_ms } => {
                write!(f, "timed out after {}ms", after_ms)
            }
            DisambiguationFailure::DimensionMismatch { expected, found } => {
                write!(f, "context vector has {} dimensions, senses have {}", found, expected)
            }
            DisambiguationFailure::MissingEmbedding { sense_index } => {
                write!(f, "sense {} has no embedding", sense_index)
            }
        }
    }
}

/// A soft failure absorbed during a call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Degradation {
    /// Served from the fallback lexicon
    LexiconDegraded { reason: String },
    /// A multi-sense term was resolved by static confidence
    DisambiguationDegraded {
        term: String,
        reason: DisambiguationFailure,
    },
    /// Similarity could not be computed
    SimilarityUnavailable { reason: String },
}

/// Post-substitution quality scores, all in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub grammar_score: f32,
    /// Absent when the embedding provider failed
    pub similarity: Option<f32>,
    pub fluency_score: f32,
    pub degradations: Vec<Degradation>,
}

/// Per-span detail added in annotated mode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanAnnotation {
    pub start: usize,
    pub end: usize,
    /// Matched text as written in the input
    pub surface: String,
    pub variant: String,
    pub term: String,
    pub sense_index: usize,
    pub gloss: String,
    pub category: Option<String>,
    pub confidence: f32,
    pub kind: MatchKind,
}

/// Outcome of one translation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResult {
    /// Input in NFC; span offsets index into it
    pub input: String,
    pub translated: String,
    pub direction: Direction,
    pub lexicon_version: String,
    pub spans: Vec<Span>,
    pub coverage: f32,
    pub quality: QualityMetrics,
    pub polish_recommended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<SpanAnnotation>>,
}

impl TranslationResult {
    /// Whether any soft failure affected this result
    pub fn is_degraded(&self) -> bool {
        !self.quality.degradations.is_empty()
    }
}
