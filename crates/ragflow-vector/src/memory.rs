//! In-process vector store with exact cosine search.
//!
//! Readers clone an `Arc` of the current state and score without holding a lock.
//! Writers are serialised, build the next state off to the side, persist it (when a
//! snapshot path is set) on the blocking pool, and only then swap it in. A failed
//! snapshot write leaves the visible state untouched.

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use ragflow_core::rank::{cosine_similarity, top_k};
use ragflow_core::types::ChunkId;
use ragflow_core::{ensure_same_model, Error, Result, SearchHit, VectorEntry, VectorStore};

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    model_id: Option<String>,
    dimension: Option<usize>,
    entries: Vec<VectorEntry>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    model_id: Option<&'a str>,
    dimension: Option<usize>,
    entries: Vec<&'a VectorEntry>,
}

#[derive(Debug, Clone, Default)]
struct Inner {
    model_id: Option<String>,
    dimension: Option<usize>,
    entries: BTreeMap<ChunkId, Arc<VectorEntry>>,
}

#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    state: RwLock<Arc<Inner>>,
    writer: Mutex<()>,
    snapshot: Option<PathBuf>,
}

impl MemoryVectorStore {
    /// Ephemeral store; nothing touches the disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a JSON snapshot at `path`, loaded if it already exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = if path.exists() {
            let snapshot = read_snapshot(&path).map_err(Error::store)?;
            tracing::debug!(path = %path.display(), entries = snapshot.entries.len(), "loaded vector snapshot");
            Inner {
                model_id: snapshot.model_id,
                dimension: snapshot.dimension,
                entries: snapshot.entries.into_iter().map(|e| (e.id.clone(), Arc::new(e))).collect(),
            }
        } else {
            Inner::default()
        };
        Ok(Self { state: RwLock::new(Arc::new(inner)), writer: Mutex::new(()), snapshot: Some(path) })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.state.read().dimension
    }

    fn current(&self) -> Arc<Inner> {
        Arc::clone(&self.state.read())
    }

    /// Persist `next`, then publish it. Callers hold `writer`.
    async fn commit(&self, next: Inner) -> Result<()> {
        let next = Arc::new(next);
        if let Some(path) = self.snapshot.clone() {
            let state = Arc::clone(&next);
            tokio::task::spawn_blocking(move || write_snapshot(&path, &state))
                .await
                .map_err(Error::store)?
                .map_err(Error::store)?;
        }
        *self.state.write() = next;
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write_snapshot(path: &Path, state: &Inner) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let snapshot = SnapshotRef {
        model_id: state.model_id.as_deref(),
        dimension: state.dimension,
        entries: state.entries.values().map(|e| &**e).collect(),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    serde_json::to_writer(&mut tmp, &snapshot)?;
    tmp.as_file_mut().flush()?;
    tmp.persist(path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Dimension shared by every vector in the batch, checked against the stored one.
pub(crate) fn batch_dimension(entries: &[VectorEntry], stored: Option<usize>) -> Result<Option<usize>> {
    let Some(first) = entries.first() else { return Ok(stored) };
    let expected = stored.unwrap_or(first.vector.len());
    if expected == 0 {
        return Err(Error::InvalidConfiguration(format!("entry '{}' has an empty vector", first.id)));
    }
    for entry in entries {
        if entry.vector.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: entry.vector.len() });
        }
    }
    Ok(Some(expected))
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, entries: Vec<VectorEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let _writer = self.writer.lock().await;
        let current = self.current();
        let dimension = batch_dimension(&entries, current.dimension)?;
        let mut next = Inner::clone(&current);
        next.dimension = dimension;
        for entry in entries {
            next.entries.insert(entry.id.clone(), Arc::new(entry));
        }
        self.commit(next).await
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::InvalidConfiguration("k must be greater than zero".into()));
        }
        let state = self.current();
        let Some(dimension) = state.dimension else { return Ok(Vec::new()) };
        if state.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != dimension {
            return Err(Error::DimensionMismatch { expected: dimension, actual: query.len() });
        }
        let hits = state
            .entries
            .values()
            .map(|e| SearchHit {
                id: e.id.clone(),
                text: e.text.clone(),
                metadata: e.metadata.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();
        Ok(top_k(hits, k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.current().entries.len())
    }

    async fn document_count(&self) -> Result<usize> {
        let state = self.current();
        let sources: BTreeSet<&str> = state.entries.values().filter_map(|e| e.source_id()).collect();
        Ok(sources.len())
    }

    async fn clear(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        self.commit(Inner::default()).await
    }

    async fn embedding_model(&self) -> Result<Option<String>> {
        let state = self.current();
        if state.entries.is_empty() {
            return Ok(None);
        }
        Ok(state.model_id.clone())
    }

    async fn bind_model(&self, model_id: &str) -> Result<()> {
        let _writer = self.writer.lock().await;
        let current = self.current();
        if current.model_id.as_deref() == Some(model_id) {
            return Ok(());
        }
        if !current.entries.is_empty() {
            ensure_same_model(current.model_id.as_deref(), model_id)?;
        }
        let mut next = Inner::clone(&current);
        next.model_id = Some(model_id.to_string());
        self.commit(next).await
    }
}
