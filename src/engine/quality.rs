//! Quality metrics for a finished translation

use super::embedding::{EmbeddingProvider, cosine_similarity, embed_with_timeout};
use super::grammar::GrammarOutput;
use super::result::{Degradation, QualityMetrics};
use crate::config::{EngineConfig, FluencyWeights, QualityThresholds};
use std::sync::Arc;
use std::time::Duration;

pub struct QualityAssessor {
    provider: Arc<dyn EmbeddingProvider>,
    thresholds: QualityThresholds,
    weights: FluencyWeights,
    timeout: Duration,
}

impl QualityAssessor {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            thresholds: config.thresholds.clone(),
            weights: config.fluency.clone(),
            timeout: config.embedding_timeout(),
        }
    }

    /// Score a translation and decide whether it should be polished
    ///
    /// `degradations` collected by earlier stages are carried into the
    /// metrics; a failed similarity computation adds one more.
    pub async fn assess(
        &self,
        original: &str,
        translated: &str,
        grammar: &GrammarOutput,
        coverage: f32,
        mut degradations: Vec<Degradation>,
    ) -> (QualityMetrics, bool) {
        let similarity = match self.similarity(original, translated).await {
            Ok(value) => Some(value),
            Err(reason) => {
                tracing::warn!(
                    kind = "SimilarityUnavailable",
                    provider = self.provider.provider_name(),
                    %reason,
                    "similarity excluded from quality"
                );
                degradations.push(Degradation::SimilarityUnavailable { reason });
                None
            }
        };

        let grammar_score = grammar.grammar_score();
        let metrics = QualityMetrics {
            grammar_score,
            similarity,
            fluency_score: fluency(grammar_score, coverage, &self.weights),
            degradations,
        };
        let polish = polish_recommended(&metrics, coverage, &self.thresholds);
        (metrics, polish)
    }

    async fn similarity(&self, original: &str, translated: &str) -> Result<f32, String> {
        let (a, b) = tokio::join!(
            embed_with_timeout(self.provider.as_ref(), original, self.timeout),
            embed_with_timeout(self.provider.as_ref(), translated, self.timeout),
        );
        let (a, b) = (a.map_err(|e| e.to_string())?, b.map_err(|e| e.to_string())?);
        cosine_similarity(&a, &b)
            .map(|s| s.clamp(0.0, 1.0))
            .ok_or_else(|| format!("incomparable vectors ({} and {} dimensions)", a.len(), b.len()))
    }
}

/// Weighted mean of grammar score and coverage
pub fn fluency(grammar_score: f32, coverage: f32, weights: &FluencyWeights) -> f32 {
    let total = weights.grammar + weights.coverage;
    if total <= 0.0 {
        return grammar_score.clamp(0.0, 1.0);
    }
    ((weights.grammar * grammar_score + weights.coverage * coverage) / total).clamp(0.0, 1.0)
}

/// Whether any available metric falls below its threshold
pub fn polish_recommended(
    metrics: &QualityMetrics,
    coverage: f32,
    thresholds: &QualityThresholds,
) -> bool {
    metrics.grammar_score < thresholds.min_grammar_score
        || coverage < thresholds.min_coverage
        || metrics
            .similarity
            .is_some_and(|s| s < thresholds.min_similarity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::grammar::rewrite;
    use crate::engine::mock::{MockEmbedder, MockMode};

    fn assessor(mode: MockMode) -> QualityAssessor {
        QualityAssessor::new(Arc::new(MockEmbedder::new(mode)), &EngineConfig::default())
    }

    #[test]
    fn test_fluency_weights() {
        let weights = FluencyWeights::default();
        assert!((fluency(1.0, 0.5, &weights) - 0.8).abs() < 1e-6);
        assert_eq!(fluency(0.0, 0.0, &weights), 0.0);

        let zero = FluencyWeights {
            grammar: 0.0,
            coverage: 0.0,
        };
        assert_eq!(fluency(0.7, 0.1, &zero), 0.7);
    }

    #[tokio::test]
    async fn test_clean_translation_is_not_flagged() {
        let assessor = assessor(MockMode::Fixed(vec![1.0, 0.0]));
        let grammar = rewrite("That party was exciting.");
        let (metrics, polish) = assessor
            .assess("that party was lit", &grammar.text, &grammar, 0.15, Vec::new())
            .await;
        assert_eq!(metrics.grammar_score, 1.0);
        assert_eq!(metrics.similarity, Some(1.0));
        assert!(metrics.degradations.is_empty());
        assert!(!polish);
    }

    #[tokio::test]
    async fn test_low_coverage_recommends_polish() {
        let assessor = assessor(MockMode::Fixed(vec![1.0, 0.0]));
        let grammar = rewrite("Nothing to translate here.");
        let (_, polish) = assessor
            .assess("nothing to translate here", &grammar.text, &grammar, 0.0, Vec::new())
            .await;
        assert!(polish);
    }

    #[tokio::test]
    async fn test_low_grammar_recommends_polish() {
        let assessor = assessor(MockMode::Fixed(vec![1.0, 0.0]));
        let grammar = rewrite("a apple is lit");
        let (metrics, polish) = assessor
            .assess("a apple is lit", &grammar.text, &grammar, 0.5, Vec::new())
            .await;
        assert_eq!(metrics.grammar_score, 0.5);
        assert!(polish);
    }

    #[tokio::test]
    async fn test_low_similarity_recommends_polish() {
        let assessor = QualityAssessor::new(
            Arc::new(MockEmbedder::keywords([
                ("lit", vec![1.0, 0.0]),
                ("exciting", vec![0.0, 1.0]),
            ])),
            &EngineConfig::default(),
        );
        let grammar = rewrite("Exciting");
        let (metrics, polish) = assessor.assess("lit", "Exciting", &grammar, 1.0, Vec::new()).await;
        assert_eq!(metrics.similarity, Some(0.0));
        assert!(polish);
    }

    #[tokio::test]
    async fn test_provider_failure_excludes_similarity() {
        let assessor = assessor(MockMode::Error("down".to_string()));
        let grammar = rewrite("That party was exciting.");
        let carried = vec![Degradation::LexiconDegraded {
            reason: "primary unreachable".to_string(),
        }];
        let (metrics, polish) = assessor
            .assess("that party was lit", &grammar.text, &grammar, 0.15, carried)
            .await;
        assert_eq!(metrics.similarity, None);
        assert_eq!(metrics.degradations.len(), 2);
        assert!(matches!(
            metrics.degradations[1],
            Degradation::SimilarityUnavailable { .. }
        ));
        assert!(!polish);
    }
}
