//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and two concrete implementations:
//! - **[`HashedEmbedder`]** — deterministic bag-of-words feature hashing;
//!   fully offline, used for the demo corpus and in tests.
//! - **[`OpenAiEmbedder`]** — calls the OpenAI embeddings API with retry
//!   and backoff.
//!
//! Use [`create_embedder`] to instantiate the provider selected by the
//! configuration.
//!
//! # Retry Strategy
//!
//! The OpenAI provider uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Converts text into a fixed-dimensional vector for similarity search.
///
/// Implementations must be safe for concurrent use; one instance is shared
/// across all requests.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
}

// ============ Hashed Provider ============

/// Offline embedder using bag-of-words feature hashing.
///
/// Each lowercase alphanumeric token is hashed into one of `dims` buckets;
/// the resulting count vector is L2-normalized. Texts sharing vocabulary get
/// nearby vectors, which is enough for the demo corpus and for deterministic
/// tests. Not a semantic model.
pub struct HashedEmbedder {
    dims: usize,
}

impl HashedEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl Embedder for HashedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0.0f32; self.dims];

        for token in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dims as u64) as usize;
            vec[bucket] += 1.0;
        }

        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }

        Ok(vec)
    }

    fn model_name(&self) -> &str {
        "hashed-bow"
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Split text into lowercase alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable, checked at construction.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            dims: config.dims,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embedding_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Extract the first `data[].embedding` array from an embeddings response.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Create the [`Embedder`] selected by the configuration.
///
/// | Config Value | Provider |
/// |--------------|----------|
/// | `"hashed"` | [`HashedEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "hashed" => Ok(Box::new(HashedEmbedder::new(config.dims))),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hashed_is_deterministic() {
        let embedder = HashedEmbedder::new(64);
        let a = embedder.embed("retrieval augmented generation").await.unwrap();
        let b = embedder.embed("retrieval augmented generation").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hashed_is_normalized() {
        let embedder = HashedEmbedder::new(64);
        let v = embedder.embed("some words to embed here").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashed_empty_text_is_zero_vector() {
        let embedder = HashedEmbedder::new(32);
        let v = embedder.embed("").await.unwrap();
        assert_eq!(v.len(), 32);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_hashed_ignores_case_and_punctuation() {
        let embedder = HashedEmbedder::new(64);
        let a = embedder.embed("What is RAG?").await.unwrap();
        let b = embedder.embed("what is rag").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hashed_respects_dims() {
        let embedder = HashedEmbedder::new(384);
        let v = embedder.embed("dimensionality").await.unwrap();
        assert_eq!(v.len(), 384);
        assert_eq!(embedder.dims(), 384);
    }

    #[test]
    fn test_tokenize_splits_on_non_alphanumeric() {
        assert_eq!(tokenize("Hello, world!"), vec!["hello", "world"]);
        assert_eq!(tokenize(""), Vec::<String>::new());
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn test_parse_embedding_response() {
        let json = serde_json::json!({
            "data": [{ "embedding": [0.1, 0.2, 0.3] }]
        });
        let vec = parse_embedding_response(&json).unwrap();
        assert_eq!(vec.len(), 3);
        assert!((vec[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_parse_embedding_response_missing_data() {
        let json = serde_json::json!({ "data": [] });
        assert!(parse_embedding_response(&json).is_err());
    }
}
