use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use ragflow_core::{Embedder, Result};

pub const DEFAULT_HASHING_DIM: usize = 384;

/// Deterministic bag-of-words embedder: every lowercase alphanumeric token adds a
/// positive weight to one hashed bucket, then the vector is L2-normalised.
///
/// Texts sharing any token score above zero against each other; text without tokens
/// maps to the zero vector.
pub struct HashingEmbedder {
    dim: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), model_id: format!("hashing:xxh64:d{}", dim.max(1)) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let jitter = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += 0.5 + 0.5 * jitter;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIM)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dim)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragflow_core::rank::cosine_similarity;

    #[test]
    fn tokens_are_case_and_punctuation_insensitive() {
        let e = HashingEmbedder::new(64);
        assert_eq!(e.embed_text("Python, used!"), e.embed_text("python used"));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert!(e.embed_text("  ... ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn shared_tokens_give_positive_similarity() {
        let e = HashingEmbedder::default();
        let doc = e.embed_text("Python is a versatile programming language used for web development, data science, and AI.");
        let query = e.embed_text("What is Python used for?");
        assert!(cosine_similarity(&doc, &query) > 0.0);
    }
}
