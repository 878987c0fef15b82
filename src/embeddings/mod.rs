// Embeddings module
// Sentence chunking plus Ollama-backed embedding generation

pub mod chunking;
pub mod ollama;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

pub use chunking::{
    ChunkingConfig, DocumentChunk, chunk_document, chunk_text, estimate_page_number,
    estimate_token_count,
};
pub use ollama::{OllamaClient, OllamaEmbedder};

use crate::Result;

/// Maps a text segment to a fixed-dimensionality, unit-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the model producing the vectors
    fn model_name(&self) -> &str;

    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Scale `vector` to unit length. The zero vector is returned unchanged.
#[inline]
pub fn normalize_l2(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

/// Cosine similarity of two equally sized vectors, 0.0 when either is zero
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator <= f32::EPSILON {
        0.0
    } else {
        dot / denominator
    }
}
