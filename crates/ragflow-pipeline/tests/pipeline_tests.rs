use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use ragflow_core::{
    DocumentInput, Embedder, Error, Generator, Meta, PipelineConfig, Result, VectorEntry, VectorStore,
};
use ragflow_embed::HashingEmbedder;
use ragflow_pipeline::{Orchestrator, Retriever};
use ragflow_vector::MemoryVectorStore;

const PYTHON: &str = "Python is a versatile programming language used for web development, data science, and AI.";

/// Records what it was asked and answers with the number of context blocks.
#[derive(Default)]
struct EchoGenerator {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn complete(&self, question: &str, context: &[String]) -> Result<String> {
        self.calls.lock().push((question.to_string(), context.to_vec()));
        Ok(format!("answered with {} context blocks", context.len()))
    }
}

struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    fn model_id(&self) -> &str {
        "down"
    }
    fn dimension(&self) -> Option<usize> {
        None
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::embedding("connection refused"))
    }
}

/// Drops the last vector of every batch.
struct ShortEmbedder(HashingEmbedder);

#[async_trait]
impl Embedder for ShortEmbedder {
    fn model_id(&self) -> &str {
        "short"
    }
    fn dimension(&self) -> Option<usize> {
        self.0.dimension()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = self.0.embed(texts).await?;
        out.pop();
        Ok(out)
    }
}

/// Same vectors as the hashing embedder under another model name.
struct RenamedEmbedder(HashingEmbedder, &'static str);

#[async_trait]
impl Embedder for RenamedEmbedder {
    fn model_id(&self) -> &str {
        self.1
    }
    fn dimension(&self) -> Option<usize> {
        self.0.dimension()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.0.embed(texts).await
    }
}

/// 3-d vectors for text mentioning "legacy", 4-d otherwise.
struct SplitDimensionEmbedder;

#[async_trait]
impl Embedder for SplitDimensionEmbedder {
    fn model_id(&self) -> &str {
        "split"
    }
    fn dimension(&self) -> Option<usize> {
        None
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| if t.contains("legacy") { vec![1.0, 0.0, 0.0] } else { vec![1.0, 0.0, 0.0, 0.0] })
            .collect())
    }
}

struct Fixture {
    orchestrator: Orchestrator,
    store: Arc<MemoryVectorStore>,
    generator: Arc<EchoGenerator>,
}

fn fixture_with(config: PipelineConfig, embedder: Arc<dyn Embedder>) -> Fixture {
    let store = Arc::new(MemoryVectorStore::new());
    let generator = Arc::new(EchoGenerator::default());
    let orchestrator = Orchestrator::new(config, embedder, store.clone(), generator.clone()).unwrap();
    Fixture { orchestrator, store, generator }
}

fn fixture() -> Fixture {
    fixture_with(PipelineConfig::default(), Arc::new(HashingEmbedder::default()))
}

#[tokio::test]
async fn python_scenario() {
    let f = fixture();
    let report = f.orchestrator.index_documents(vec![DocumentInput::named_text("python.txt", PYTHON)]).await.unwrap();
    assert_eq!(report.chunks_indexed(), 1);
    assert_eq!(report.stats.total_chunks, 1);
    assert_eq!(report.failures().count(), 0);

    let answer = f.orchestrator.query("What is Python used for?").await.unwrap();
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].chunk.text, PYTHON);
    assert_eq!(answer.sources[0].chunk.source_id, "python.txt");
    assert!(answer.sources[0].score > 0.0);
    assert_eq!(answer.answer, "answered with 1 context blocks");

    let calls = f.generator.calls.lock();
    assert_eq!(calls[0].1, vec![PYTHON.to_string()]);
}

#[tokio::test]
async fn stats_count_documents_and_chunks() {
    let f = fixture_with(
        PipelineConfig { chunk_size: 40, chunk_overlap: 10, ..PipelineConfig::default() },
        Arc::new(HashingEmbedder::default()),
    );
    let long = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi";
    let report = f
        .orchestrator
        .index_documents(vec![DocumentInput::named_text("a", PYTHON), DocumentInput::named_text("b", long)])
        .await
        .unwrap();
    let expected: usize = report.documents.iter().map(|d| *d.result.as_ref().unwrap()).sum();
    assert!(expected > 2);
    let stats = f.orchestrator.stats().await.unwrap();
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.total_chunks, expected);
    assert_eq!(report.stats, stats);
}

#[tokio::test]
async fn reindexing_is_idempotent() {
    let f = fixture();
    let inputs = vec![DocumentInput::text(PYTHON), DocumentInput::named_text("other", "Rust is a systems language.")];
    f.orchestrator.index_documents(inputs.clone()).await.unwrap();
    let first = f.orchestrator.stats().await.unwrap();
    f.orchestrator.index_documents(inputs).await.unwrap();
    assert_eq!(f.orchestrator.stats().await.unwrap(), first);
}

#[tokio::test]
async fn empty_index_still_answers() {
    let f = fixture();
    let answer = f.orchestrator.query("Anything at all?").await.unwrap();
    assert!(answer.sources.is_empty());
    assert!(!answer.answer.is_empty());
    assert!(f.generator.calls.lock()[0].1.is_empty());
}

#[tokio::test]
async fn empty_document_indexes_nothing() {
    let f = fixture();
    let report = f.orchestrator.index_documents(vec![DocumentInput::named_text("empty", "")]).await.unwrap();
    assert_eq!(*report.documents[0].result.as_ref().unwrap(), 0);
    assert_eq!(report.stats.total_chunks, 0);
}

#[tokio::test]
async fn unreadable_file_does_not_stop_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.txt");
    std::fs::write(&good, PYTHON).unwrap();
    let f = fixture();
    let report = f
        .orchestrator
        .index_documents(vec![DocumentInput::file(dir.path().join("missing.txt")), DocumentInput::file(&good)])
        .await
        .unwrap();
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].0.ends_with("missing.txt"));
    assert!(matches!(failures[0].1, Error::DocumentRead { .. }));
    assert_eq!(report.stats.total_documents, 1);
}

#[tokio::test]
async fn embedding_failures_are_reported_per_document() {
    let f = fixture_with(PipelineConfig::default(), Arc::new(DownEmbedder));
    let report = f.orchestrator.index_documents(vec![DocumentInput::text(PYTHON)]).await.unwrap();
    assert!(matches!(report.documents[0].result, Err(Error::EmbeddingUnavailable(_))));
    assert_eq!(f.store.count().await.unwrap(), 0);

    let err = f.orchestrator.query("What is Python used for?").await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    assert!(f.generator.calls.lock().is_empty());
}

#[tokio::test]
async fn short_embedding_batches_fail_the_document() {
    let f = fixture_with(PipelineConfig::default(), Arc::new(ShortEmbedder(HashingEmbedder::default())));
    let report = f.orchestrator.index_documents(vec![DocumentInput::text(PYTHON)]).await.unwrap();
    assert!(matches!(report.documents[0].result, Err(Error::EmbeddingUnavailable(_))));
}

#[tokio::test]
async fn dimension_mismatch_aborts_the_batch() {
    let f = fixture();
    let mut metadata = Meta::new();
    metadata.insert("source_id".into(), "legacy".into());
    f.store
        .upsert(vec![VectorEntry { id: "legacy".into(), vector: vec![1.0, 0.0, 0.0], text: "old".into(), metadata }])
        .await
        .unwrap();

    let err = f.orchestrator.index_documents(vec![DocumentInput::text(PYTHON)]).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 384 }));
    assert!(err.is_structural());
}

#[tokio::test]
async fn reset_clears_the_store() {
    let f = fixture();
    f.orchestrator.index_documents(vec![DocumentInput::text(PYTHON)]).await.unwrap();
    f.orchestrator.reset().await.unwrap();
    assert_eq!(f.orchestrator.stats().await.unwrap().total_chunks, 0);
}

#[tokio::test]
async fn invalid_configuration_is_rejected_up_front() {
    let bad = PipelineConfig { chunk_size: 50, chunk_overlap: 50, ..PipelineConfig::default() };
    let result = Orchestrator::new(
        bad,
        Arc::new(HashingEmbedder::default()),
        Arc::new(MemoryVectorStore::new()),
        Arc::new(EchoGenerator::default()),
    );
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[tokio::test]
async fn retriever_is_deterministic_and_bounded() {
    let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
    let generator = Arc::new(EchoGenerator::default());
    let orchestrator = Orchestrator::new(
        PipelineConfig { chunk_size: 30, chunk_overlap: 5, ..PipelineConfig::default() },
        embedder.clone(),
        store.clone(),
        generator,
    )
    .unwrap();
    orchestrator.index_documents(vec![DocumentInput::named_text("python", PYTHON)]).await.unwrap();

    let retriever = Retriever::new(embedder, store);
    let first = retriever.retrieve("Python data science", 2).await.unwrap();
    let second = retriever.retrieve("Python data science", 2).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert!(first[0].score >= first[1].score);
    assert!(matches!(retriever.retrieve("x", 0).await, Err(Error::InvalidConfiguration(_))));
}

#[tokio::test]
async fn switching_embedding_models_is_rejected() {
    let store = Arc::new(MemoryVectorStore::new());
    let first = Orchestrator::new(
        PipelineConfig::default(),
        Arc::new(HashingEmbedder::default()),
        store.clone(),
        Arc::new(EchoGenerator::default()),
    )
    .unwrap();
    first.index_documents(vec![DocumentInput::named_text("python", PYTHON)]).await.unwrap();

    let generator = Arc::new(EchoGenerator::default());
    let second = Orchestrator::new(
        PipelineConfig::default(),
        Arc::new(RenamedEmbedder(HashingEmbedder::default(), "sentence-transformers/all-MiniLM-L6-v2")),
        store.clone(),
        generator.clone(),
    )
    .unwrap();

    let err = second.query("What is Python used for?").await.unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)), "got {err:?}");
    assert!(generator.calls.lock().is_empty());

    let err = second.index_documents(vec![DocumentInput::named_text("rust", "Rust is fast.")]).await.unwrap_err();
    assert!(err.is_structural());
    assert_eq!(store.count().await.unwrap(), 1);

    second.reset().await.unwrap();
    second.index_documents(vec![DocumentInput::named_text("rust", "Rust is fast.")]).await.unwrap();
    assert_eq!(second.query("Rust").await.unwrap().sources.len(), 1);
}

#[tokio::test]
async fn structural_abort_keeps_sibling_writes() {
    let f = fixture_with(PipelineConfig::default(), Arc::new(SplitDimensionEmbedder));
    let err = f
        .orchestrator
        .index_documents(vec![
            DocumentInput::named_text("modern", "modern notes"),
            DocumentInput::named_text("old", "legacy notes"),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }), "got {err:?}");

    // Whichever document reached the store first stays indexed.
    let stats = f.orchestrator.stats().await.unwrap();
    assert_eq!(stats.total_documents, 1);
    assert_eq!(stats.total_chunks, 1);
}
