//! Indexing and query flows over injected collaborators.
//!
//! The two flows share nothing but the vector store: indexing writes chunks,
//! querying reads whatever the store has committed.

use futures::stream::{self, StreamExt};
use std::sync::Arc;

use ragflow_core::document::read_document;
use ragflow_core::{
    Chunker, DocumentInput, DocumentOutcome, EmbeddedChunk, Embedder, Error, Generator, IndexReport, IndexStats,
    PipelineConfig, QueryAnswer, Result, VectorStore,
};

use crate::retriever::Retriever;

pub struct Orchestrator {
    config: PipelineConfig,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::new(config.chunking())?;
        let retriever = Retriever::new(Arc::clone(&embedder), Arc::clone(&store));
        Ok(Self { config, chunker, embedder, store, retriever, generator })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Index every input. Per-document failures land in the report.
    ///
    /// A collection written by another embedding model is rejected before anything is
    /// read. A structural error raised while indexing (dimension mismatch) does not
    /// cancel sibling documents: it is returned once all of them settle, and the
    /// chunks siblings already wrote stay in the store, visible through [`Self::stats`].
    pub async fn index_documents(&self, inputs: Vec<DocumentInput>) -> Result<IndexReport> {
        if !inputs.is_empty() {
            self.store.bind_model(self.embedder.model_id()).await?;
        }
        let mut documents: Vec<DocumentOutcome> = stream::iter(inputs)
            .map(|input| async move {
                let source_id = input.source_id();
                let result = self.index_document(&input).await;
                DocumentOutcome { source_id, result }
            })
            .buffered(self.config.index_concurrency.max(1))
            .collect()
            .await;

        if let Some(pos) = documents.iter().position(|d| d.result.as_ref().is_err_and(Error::is_structural)) {
            if let Err(err) = documents.swap_remove(pos).result {
                return Err(err);
            }
        }
        let stats = self.stats().await?;
        Ok(IndexReport { stats, documents })
    }

    async fn index_document(&self, input: &DocumentInput) -> Result<usize> {
        let (source_id, text) = read_document(input)?;
        let chunks = self.chunker.split(&source_id, &text);
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "expected {} embeddings for '{}', got {}",
                chunks.len(),
                source_id,
                vectors.len()
            )));
        }
        let count = chunks.len();
        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector }.into_entry())
            .collect();
        self.store.upsert(entries).await?;
        Ok(count)
    }

    /// Retrieve `top_k` chunks and answer from them. An empty index still reaches the generator.
    pub async fn query(&self, question: &str) -> Result<QueryAnswer> {
        let sources = self.retriever.retrieve(question, self.config.top_k).await?;
        let context: Vec<String> = sources.iter().map(|s| s.chunk.text.clone()).collect();
        let answer = self.generator.complete(question, &context).await?;
        Ok(QueryAnswer { answer, sources })
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats { total_documents: self.store.document_count().await?, total_chunks: self.store.count().await? })
    }

    /// Drop everything indexed so far.
    pub async fn reset(&self) -> Result<()> {
        self.store.clear().await
    }
}
