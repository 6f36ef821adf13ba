//! Error types for the slang translation engine
//!
//! Two layers, mirroring how the engine is assembled:
//!
//! - [`LexiconError`] describes why a lexicon document was rejected. It never
//!   reaches a translation caller directly; the store folds it into
//!   [`EngineError::LexiconUnavailable`] once every source has been tried.
//! - [`EngineError`] is the public error. Only [`EngineError::InvalidInput`] and
//!   [`EngineError::LexiconUnavailable`] are returned from translation calls; the
//!   provider variants are produced by adapters and downgraded to soft
//!   degradations by the pipeline.

use std::time::Duration;
use thiserror::Error;

/// Reasons a lexicon document fails validation
#[derive(Error, Debug)]
pub enum LexiconError {
    /// The document is not valid JSON or does not match the schema
    #[error("malformed lexicon document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document has no version string
    #[error("lexicon document has an empty version")]
    EmptyVersion,

    /// `count` disagrees with the number of items
    #[error("lexicon declares {declared} items but contains {actual}")]
    CountMismatch { declared: usize, actual: usize },

    /// An item has an empty term
    #[error("item {index} has an empty term")]
    EmptyTerm { index: usize },

    /// A confidence value outside [0, 1]
    #[error("term '{term}' has confidence {value} outside [0, 1]")]
    InvalidConfidence { term: String, value: f32 },

    /// An item has neither a gloss nor any senses
    #[error("term '{term}' has no gloss and no senses")]
    MissingGloss { term: String },

    /// Two entries claim the same normalized variant
    #[error("variant '{variant}' is claimed by both '{first}' and '{second}'")]
    DuplicateVariant {
        variant: String,
        first: String,
        second: String,
    },

    /// Sense embeddings disagree on dimensionality
    #[error("term '{term}' has a {found}-dimensional embedding, expected {expected}")]
    EmbeddingDimension {
        term: String,
        expected: usize,
        found: usize,
    },

    /// An explicit version was requested but the document carries another one
    #[error("requested lexicon version '{requested}' but source returned '{found}'")]
    VersionMismatch { requested: String, found: String },
}

/// Public engine error
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or empty request, rejected before any processing
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No lexicon could be loaded; the engine cannot serve translations
    #[error("lexicon unavailable: {0}")]
    LexiconUnavailable(String),

    /// The embedding provider returned an error or an unusable payload
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// The embedding provider did not answer within the configured bound
    #[error("embedding provider timed out after {0:?}")]
    EmbeddingTimeout(Duration),

    /// Transport-level failure talking to an external collaborator
    #[error("network error: {0}")]
    Network(String),

    /// Invalid engine or provider configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Local I/O failure (lexicon files, unknown-term logs)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Network(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
