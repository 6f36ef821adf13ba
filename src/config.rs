//! Engine configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! context_radius = 5
//! embedding_timeout_ms = 800
//!
//! [thresholds]
//! min_grammar_score = 0.8
//! min_coverage = 0.05
//!
//! [slang]
//! age_ceiling = "T13"
//! excluded_flags = ["sexual"]
//! density = "medium"
//!
//! [lexicon]
//! remote_url = "https://lexicon.example.com/slang"
//! ```

use crate::engine::result::SlangConfig;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Thresholds below which a result is flagged for polishing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub min_grammar_score: f32,
    pub min_coverage: f32,
    pub min_similarity: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_grammar_score: 0.8,
            min_coverage: 0.05,
            min_similarity: 0.5,
        }
    }
}

/// Weights of the fluency score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluencyWeights {
    pub grammar: f32,
    pub coverage: f32,
}

impl Default for FluencyWeights {
    fn default() -> Self {
        Self {
            grammar: 0.6,
            coverage: 0.4,
        }
    }
}

/// Where lexicons are loaded from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconSettings {
    /// Base URL serving `<version>.json` documents
    pub remote_url: Option<String>,
    /// Local document or directory of documents
    pub local_path: Option<PathBuf>,
    /// Version to pin; the latest when absent
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tokens on each side of a span used as disambiguation context
    pub context_radius: usize,
    /// Similarity gap under which static confidence breaks the tie
    pub ambiguity_epsilon: f32,
    pub embedding_timeout_ms: u64,
    pub max_input_chars: usize,
    pub thresholds: QualityThresholds,
    pub fluency: FluencyWeights,
    /// Defaults for plain-to-slang calls
    pub slang: SlangConfig,
    pub lexicon: LexiconSettings,
    /// JSON-lines file receiving unknown terms
    pub unknown_terms_log: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_radius: 5,
            ambiguity_epsilon: 0.02,
            embedding_timeout_ms: 800,
            max_input_chars: 5000,
            thresholds: QualityThresholds::default(),
            fluency: FluencyWeights::default(),
            slang: SlangConfig::default(),
            lexicon: LexiconSettings::default(),
            unknown_terms_log: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.max_input_chars == 0 {
            return Err(EngineError::Config(
                "max_input_chars must be positive".to_string(),
            ));
        }
        if self.embedding_timeout_ms == 0 {
            return Err(EngineError::Config(
                "embedding_timeout_ms must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ambiguity_epsilon) {
            return Err(EngineError::Config(format!(
                "ambiguity_epsilon {} outside [0, 1]",
                self.ambiguity_epsilon
            )));
        }

        let thresholds = [
            ("min_grammar_score", self.thresholds.min_grammar_score),
            ("min_coverage", self.thresholds.min_coverage),
            ("min_similarity", self.thresholds.min_similarity),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Config(format!(
                    "{} {} outside [0, 1]",
                    name, value
                )));
            }
        }

        let weights = &self.fluency;
        if weights.grammar < 0.0 || weights.coverage < 0.0 || weights.grammar + weights.coverage <= 0.0
        {
            return Err(EngineError::Config(
                "fluency weights must be non-negative and not both zero".to_string(),
            ));
        }
        Ok(())
    }
}
