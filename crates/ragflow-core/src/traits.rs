use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{SearchHit, VectorEntry};

/// Text to fixed-dimension vectors. Output order and length follow the input.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model, e.g. `sentence-transformers/all-MiniLM-L6-v2`.
    fn model_id(&self) -> &str;
    /// Embedding dimensionality, once known.
    fn dimension(&self) -> Option<usize>;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Keyed similarity search over stored vectors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite entries by id. The whole batch is rejected on a dimension mismatch.
    async fn upsert(&self, entries: Vec<VectorEntry>) -> Result<()>;
    /// Top `k` hits by descending cosine score, ties by ascending id.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;
    async fn count(&self) -> Result<usize>;
    /// Number of distinct source documents.
    async fn document_count(&self) -> Result<usize>;
    /// Drop every entry and forget the stored dimension and model.
    async fn clear(&self) -> Result<()>;
    /// Model that produced the stored vectors. `None` while the collection is empty.
    async fn embedding_model(&self) -> Result<Option<String>>;
    /// Tie the collection to `model_id`. An empty collection adopts it; a populated one
    /// written by another model fails with `InvalidConfiguration`.
    async fn bind_model(&self, model_id: &str) -> Result<()>;
}

/// Vectors from different models are not comparable even at equal dimension.
pub fn ensure_same_model(stored: Option<&str>, model_id: &str) -> Result<()> {
    match stored {
        Some(stored) if stored != model_id => Err(Error::InvalidConfiguration(format!(
            "collection was indexed with embedding model '{stored}', not '{model_id}'; reset it or switch models back"
        ))),
        _ => Ok(()),
    }
}

/// Question plus ranked context to an answer.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, question: &str, context: &[String]) -> Result<String>;
}
