//! Slang translation engine
//!
//! Translates informal slang to plain language and back. Input is normalized
//! (emoji, hashtags, leetspeak, stretched letters), scanned with a multi-pattern
//! automaton built from a versioned lexicon, disambiguated with context
//! embeddings, substituted and polished.
//!
//! ```ignore
//! use slangshift::{EngineConfig, LexiconStore, RenderMode, SlangEngine};
//! use slangshift::engine::MockEmbedder;
//! use slangshift::engine::MockMode;
//! use slangshift::lexicon::source::StaticLexiconSource;
//! use std::sync::Arc;
//!
//! let store = LexiconStore::new(Arc::new(StaticLexiconSource::bundled()));
//! let provider = Arc::new(MockEmbedder::new(MockMode::Hashed { dims: 4 }));
//! let engine = SlangEngine::start(EngineConfig::default(), store, provider).await?;
//!
//! let result = engine.translate_to_plain("no cap that's fire 🔥", RenderMode::Clean).await?;
//! assert_eq!(result.translated, "No lie that's excellent excellent");
//! ```

pub mod automaton;
pub mod config;
pub mod engine;
pub mod error;
pub mod lexicon;
pub mod matcher;
pub mod normalizer;

pub use automaton::{Automaton, build_automaton};
pub use config::EngineConfig;
pub use engine::{RenderMode, SlangConfig, SlangEngine, TranslationResult};
pub use error::{EngineError, EngineResult, LexiconError};
pub use lexicon::store::{LexiconSnapshot, LexiconStore};
pub use lexicon::{AgeRating, ContentFlag, Lexicon, LexiconEntry, Sense};
pub use matcher::{MatchKind, Span, find_spans};
pub use normalizer::{NormalizedText, normalize};
