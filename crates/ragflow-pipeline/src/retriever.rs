use std::sync::Arc;

use ragflow_core::{ensure_same_model, Chunk, Embedder, Error, Result, RetrievedChunk, VectorStore};

/// Question in, ranked chunks out.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// At most `k` chunks, best first. An empty store yields an empty list; a store
    /// indexed by a different embedding model is an `InvalidConfiguration`.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Err(Error::InvalidConfiguration("top_k must be greater than zero".into()));
        }
        let stored = self.store.embedding_model().await?;
        ensure_same_model(stored.as_deref(), self.embedder.model_id())?;
        let mut vectors = self.embedder.embed(&[question.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(Error::embedding(format!("expected 1 query embedding, got {}", vectors.len())));
        }
        let query = vectors.remove(0);
        let hits = self.store.search(&query, k).await?;
        hits.iter()
            .map(|hit| Ok(RetrievedChunk { chunk: Chunk::from_hit(hit)?, score: hit.score }))
            .collect()
    }
}
