//! Embedding provider interface and a deterministic offline embedder.

use crate::error::Result;
use crate::search::keyword::tokenize;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Computes embedding vectors for queries and documents
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds a batch of documents, one vector per input in input order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Feature-hashing bag-of-words embedder.
///
/// Every token is hashed into one of `dimensions` buckets and the result is
/// L2-normalized, so cosine similarity reflects token overlap. Useful for
/// tests and offline demos; it carries no semantics beyond shared words.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    /// Creates an embedder producing vectors of the given size
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Output dimensionality
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embeds one text synchronously
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        normalize_vector(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

/// Normalize a vector to unit length (L2 norm)
pub fn normalize_vector(vec: &mut [f32]) {
    let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude > 0.0 {
        for x in vec.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// Cosine similarity between two vectors; 0.0 on length mismatch or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
