//! Loading lexicons and publishing them with their automaton
//!
//! [`LexiconStore::load`] tries the primary source, then the fallback. A
//! document is accepted whole or not at all. [`SnapshotCell`] holds the
//! lexicon/automaton pair currently served; replacing it is a single reference
//! swap, so a reader sees either the old pair or the new one.

use super::Lexicon;
use super::source::LexiconSource;
use crate::automaton::{Automaton, build_automaton};
use crate::error::{EngineError, EngineResult, LexiconError};
use std::sync::{Arc, RwLock};

/// A lexicon accepted by the store
#[derive(Debug)]
pub struct LoadedLexicon {
    pub lexicon: Lexicon,
    /// Description of the source that supplied it
    pub source: String,
    /// Why the primary source was not used, when served from the fallback
    pub degraded: Option<String>,
}

/// Loads and validates lexicon documents from a primary and a fallback source
#[derive(Clone)]
pub struct LexiconStore {
    primary: Arc<dyn LexiconSource>,
    fallback: Option<Arc<dyn LexiconSource>>,
}

impl LexiconStore {
    pub fn new(primary: Arc<dyn LexiconSource>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// Source consulted when the primary one cannot supply a valid document
    pub fn with_fallback(mut self, fallback: Arc<dyn LexiconSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Load `version` (or the latest), falling back when the primary fails
    ///
    /// A pinned version must match the primary document's version. The
    /// fallback is accepted whatever version it carries.
    pub async fn load(&self, version: Option<&str>) -> EngineResult<LoadedLexicon> {
        let primary_error = match fetch_and_parse(self.primary.as_ref(), version).await {
            Ok(lexicon) => {
                tracing::info!(
                    version = lexicon.version(),
                    entries = lexicon.len(),
                    source = %self.primary.describe(),
                    "loaded lexicon"
                );
                return Ok(LoadedLexicon {
                    lexicon,
                    source: self.primary.describe(),
                    degraded: None,
                });
            }
            Err(err) => err,
        };

        let Some(fallback) = &self.fallback else {
            tracing::error!(source = %self.primary.describe(), error = %primary_error, "lexicon load failed");
            return Err(EngineError::LexiconUnavailable(primary_error));
        };

        match fetch_and_parse(fallback.as_ref(), None).await {
            Ok(lexicon) => {
                tracing::warn!(
                    kind = "LexiconDegraded",
                    version = lexicon.version(),
                    entries = lexicon.len(),
                    source = %fallback.describe(),
                    reason = %primary_error,
                    "serving fallback lexicon"
                );
                Ok(LoadedLexicon {
                    lexicon,
                    source: fallback.describe(),
                    degraded: Some(primary_error),
                })
            }
            Err(fallback_error) => {
                tracing::error!(
                    primary = %primary_error,
                    fallback = %fallback_error,
                    "lexicon load failed"
                );
                Err(EngineError::LexiconUnavailable(format!(
                    "{}; fallback: {}",
                    primary_error, fallback_error
                )))
            }
        }
    }

    /// Load a lexicon and compile its automaton off the async threads
    pub async fn load_snapshot(&self, version: Option<&str>) -> EngineResult<LexiconSnapshot> {
        let loaded = self.load(version).await?;
        let lexicon = Arc::new(loaded.lexicon);

        let for_build = lexicon.clone();
        let automaton = tokio::task::spawn_blocking(move || build_automaton(&for_build))
            .await
            .map_err(|e| {
                EngineError::LexiconUnavailable(format!("automaton build failed: {}", e))
            })?;

        Ok(LexiconSnapshot {
            lexicon,
            automaton,
            source: loaded.source,
            degraded: loaded.degraded,
        })
    }
}

async fn fetch_and_parse(
    source: &dyn LexiconSource,
    version: Option<&str>,
) -> Result<Lexicon, String> {
    let describe = || source.describe();
    let raw = source
        .fetch(version)
        .await
        .map_err(|e| format!("{}: {}", describe(), e))?;
    let lexicon = Lexicon::from_json(&raw).map_err(|e| format!("{}: {}", describe(), e))?;

    if let Some(requested) = version {
        if lexicon.version() != requested {
            let err = LexiconError::VersionMismatch {
                requested: requested.to_string(),
                found: lexicon.version().to_string(),
            };
            return Err(format!("{}: {}", describe(), err));
        }
    }
    Ok(lexicon)
}

/// A lexicon and the automaton compiled from it, served together
#[derive(Debug)]
pub struct LexiconSnapshot {
    pub lexicon: Arc<Lexicon>,
    pub automaton: Arc<Automaton>,
    pub source: String,
    pub degraded: Option<String>,
}

impl LexiconSnapshot {
    pub fn version(&self) -> &str {
        self.lexicon.version()
    }
}

/// Atomically swappable reference to the current snapshot
#[derive(Debug, Default)]
pub struct SnapshotCell {
    inner: RwLock<Option<Arc<LexiconSnapshot>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot currently served; the lock is released on return
    pub fn current(&self) -> Option<Arc<LexiconSnapshot>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the served snapshot, returning the previous one
    pub fn publish(&self, snapshot: LexiconSnapshot) -> Option<Arc<LexiconSnapshot>> {
        let next = Arc::new(snapshot);
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.replace(next)
    }
}
