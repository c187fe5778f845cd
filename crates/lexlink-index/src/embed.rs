//! Embedding providers consumed by the dense index.
//!
//! The index sees only vectors; whoever produces them sits behind
//! [`EmbeddingProvider`]. The HTTP implementation speaks the common
//! OpenAI-compatible `/embeddings` shape. [`HashingEmbedding`] is a cheap
//! deterministic provider for tests and offline corpora: token hashes
//! bucketed into a fixed-dimension bag, so related texts land near each
//! other without any network dependency.

use crate::IndexError;
use crate::analyzer::Analyzer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default character budget applied to long documents before embedding.
pub const DEFAULT_EMBED_CHAR_BUDGET: usize = 8_000;

/// Cuts `text` to the embedding character budget on a char boundary.
pub fn truncate_for_embedding(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

/// Produces fixed-dimension float32 embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;

    /// Embeds several texts; the default loops over [`Self::embed`].
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Dimension of produced vectors.
    fn dimensions(&self) -> usize;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

/// HTTP embedding client for OpenAI-compatible services.
pub struct HttpEmbedding {
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl HttpEmbedding {
    /// Creates a client for the given model and dimension.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            dimensions,
            client: reqwest::Client::new(),
        }
    }

    /// Points the client at a compatible self-hosted endpoint.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| IndexError::EmbeddingFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IndexError::EmbeddingFailed(format!(
                "embedding service returned {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| IndexError::EmbeddingFailed(e.to_string()))?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| IndexError::EmbeddingFailed("empty embedding response".into()))?;

        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic bag-of-hashed-tokens embedding for tests and offline use.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimensions: usize,
}

impl HashingEmbedding {
    /// Creates a provider with the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut value = 0usize;
        for &byte in digest.iter().take(8) {
            value = (value << 8) | byte as usize;
        }
        value % self.dimensions
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let mut vector = vec![0.0f32; self.dimensions];
        let analyzer = Analyzer::new();
        for token in analyzer.tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }
        // Unit-normalize so distances reflect token overlap, not length.
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hashing_embedding_deterministic() {
        let provider = HashingEmbedding::new(64);
        let a = provider.embed("misrepresentation contract").await.unwrap();
        let b = provider.embed("misrepresentation contract").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_similar_texts_are_closer() {
        let provider = HashingEmbedding::new(128);
        let a = provider.embed("damages for misrepresentation in contract").await.unwrap();
        let b = provider.embed("misrepresentation damages in a contract claim").await.unwrap();
        let c = provider.embed("striking out a claim under the rules").await.unwrap();

        let dist = |x: &[f32], y: &[f32]| -> f32 {
            x.iter().zip(y).map(|(p, q)| (p - q) * (p - q)).sum()
        };
        assert!(dist(&a, &b) < dist(&a, &c));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = HashingEmbedding::new(16);
        let v = provider.embed("").await.unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_truncate_for_embedding() {
        let text = "abcdef";
        assert_eq!(truncate_for_embedding(text, 3), "abc");
        assert_eq!(truncate_for_embedding(text, 100), "abcdef");
    }
}
