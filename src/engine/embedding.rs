//! Embedding provider contract and the HTTP provider
//!
//! Only dimensionality consistency with the lexicon's sense vectors is assumed
//! of a provider. Every call from the pipeline goes through
//! [`embed_with_timeout`], so a slow provider costs at most the configured
//! bound.
//!
//! # Example
//!
//! ```ignore
//! use slangshift::engine::{EmbeddingProvider, HttpEmbeddingProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = HttpEmbeddingProvider::from_env()?;
//!     let vector = provider.embed("that party was lit").await?;
//!     println!("{} dimensions", vector.len());
//!     Ok(())
//! }
//! ```

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

/// Source of sentence embeddings
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text` into a fixed-length vector
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>>;

    /// Get the provider name for logging and degradation reports
    fn provider_name(&self) -> &str;
}

/// Run `provider.embed` with an upper bound on its duration
pub async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> EngineResult<Vec<f32>> {
    match tokio::time::timeout(timeout, provider.embed(text)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::EmbeddingTimeout(timeout)),
    }
}

/// Cosine similarity, or `None` for empty, zero or mismatched vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Provider used when no embedding backend is configured; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEmbeddings;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    async fn embed(&self, _text: &str) -> EngineResult<Vec<f32>> {
        Err(EngineError::Config(
            "no embedding provider configured".to_string(),
        ))
    }

    fn provider_name(&self) -> &str {
        "disabled"
    }
}

/// Embeddings over HTTP
///
/// Sends `POST {endpoint}` with `{"input": text, "model": model}` and accepts
/// either an OpenAI-style `{"data": [{"embedding": [...]}]}` body or a bare
/// `{"embedding": [...]}`.
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
    client: reqwest::Client,
}

impl HttpEmbeddingProvider {
    /// Client-side bound; the pipeline applies its own, tighter one
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: Option<String>,
    ) -> EngineResult<Self> {
        let endpoint = endpoint.into().trim().to_string();
        if endpoint.is_empty() {
            return Err(EngineError::Config(
                "embedding endpoint cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.filter(|m| !m.trim().is_empty()),
            client,
        })
    }

    /// Build from `SLANG_EMBEDDING_URL`, plus the optional
    /// `SLANG_EMBEDDING_API_KEY` and `SLANG_EMBEDDING_MODEL`
    pub fn from_env() -> EngineResult<Self> {
        let endpoint = std::env::var("SLANG_EMBEDDING_URL").map_err(|_| {
            EngineError::Config("SLANG_EMBEDDING_URL environment variable not set".to_string())
        })?;
        Self::new(
            endpoint,
            std::env::var("SLANG_EMBEDDING_API_KEY").ok(),
            std::env::var("SLANG_EMBEDDING_MODEL").ok(),
        )
    }
}

/// Extract the vector from a provider response body
fn parse_embedding(body: &Value) -> EngineResult<Vec<f32>> {
    let raw = body["data"][0]["embedding"]
        .as_array()
        .or_else(|| body["embedding"].as_array())
        .ok_or_else(|| {
            EngineError::Embedding("response has no 'embedding' array".to_string())
        })?;

    let vector: Vec<f32> = raw
        .iter()
        .map(|v| {
            v.as_f64().map(|x| x as f32).ok_or_else(|| {
                EngineError::Embedding("embedding contains a non-numeric value".to_string())
            })
        })
        .collect::<EngineResult<_>>()?;

    if vector.is_empty() {
        return Err(EngineError::Embedding("embedding is empty".to_string()));
    }
    Ok(vector)
}

impl std::fmt::Debug for HttpEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbeddingProvider")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        let mut body = json!({ "input": text });
        if let Some(model) = &self.model {
            body["model"] = json!(model);
        }

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(if status.is_client_error() {
                EngineError::Config(format!("embedding client error ({}): {}", status, error_text))
            } else {
                EngineError::Embedding(format!("embedding server error ({}): {}", status, error_text))
            });
        }

        let json: Value = response.json().await.map_err(|e| {
            EngineError::Embedding(format!("Failed to parse embedding response: {}", e))
        })?;
        parse_embedding(&json)
    }

    fn provider_name(&self) -> &str {
        "HTTP embeddings"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockEmbedder, MockMode};

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        let opposite = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]).unwrap();
        assert!((opposite + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn test_parse_embedding_shapes() {
        let openai = json!({ "data": [ { "embedding": [0.5, 0.25] } ] });
        assert_eq!(parse_embedding(&openai).unwrap(), vec![0.5, 0.25]);

        let bare = json!({ "embedding": [1.0, 2.0, 3.0] });
        assert_eq!(parse_embedding(&bare).unwrap().len(), 3);

        assert!(parse_embedding(&json!({ "vectors": [] })).is_err());
        assert!(parse_embedding(&json!({ "embedding": [] })).is_err());
        assert!(parse_embedding(&json!({ "embedding": ["x"] })).is_err());
    }

    #[test]
    fn test_new_rejects_empty_endpoint() {
        let result = HttpEmbeddingProvider::new("  ", None, None);
        match result {
            Err(EngineError::Config(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_debug_masks_api_key() {
        let provider = HttpEmbeddingProvider::new(
            "https://embeddings.example.com/v1/embeddings",
            Some("secret-key".to_string()),
            Some("small".to_string()),
        )
        .unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("***"));
        assert_eq!(provider.provider_name(), "HTTP embeddings");
    }

    #[test]
    fn test_from_env_without_url() {
        unsafe {
            std::env::remove_var("SLANG_EMBEDDING_URL");
        }
        match HttpEmbeddingProvider::from_env() {
            Err(EngineError::Config(msg)) => assert!(msg.contains("not set")),
            _ => panic!("Expected Config error"),
        }
    }

    #[tokio::test]
    async fn test_embed_with_timeout_expires() {
        let slow = MockEmbedder::with_delay(MockMode::Fixed(vec![1.0, 0.0]), 200);
        let result = embed_with_timeout(&slow, "hello", Duration::from_millis(20)).await;
        assert!(matches!(result, Err(EngineError::EmbeddingTimeout(_))));
    }

    #[tokio::test]
    async fn test_embed_with_timeout_passes_result() {
        let fast = MockEmbedder::new(MockMode::Fixed(vec![1.0, 0.0]));
        let result = embed_with_timeout(&fast, "hello", Duration::from_millis(500)).await;
        assert_eq!(result.unwrap(), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_disabled_embeddings_fail() {
        assert!(DisabledEmbeddings.embed("anything").await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires SLANG_EMBEDDING_URL and network access"]
    async fn test_real_provider() {
        let provider = HttpEmbeddingProvider::from_env().unwrap();
        let vector = provider.embed("that party was lit").await.unwrap();
        assert!(!vector.is_empty());
    }
}
