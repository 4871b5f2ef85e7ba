//! Domain types shared by the chunker, the stores and the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Metadata keys written for every stored chunk.
pub mod meta_keys {
    pub const SOURCE_ID: &str = "source_id";
    pub const OFFSET: &str = "offset";
    pub const LENGTH: &str = "length";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
}

/// A positioned window of a source document, the unit of retrieval.
///
/// - `id`: derived from `source_id` + `offset` (see [`chunk_id`])
/// - `offset`/`length`: position in chars within the source text
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source_id: String,
    pub offset: usize,
    pub length: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl Chunk {
    pub fn to_metadata(&self) -> Meta {
        use meta_keys::*;
        let mut meta = Meta::new();
        meta.insert(SOURCE_ID.to_string(), self.source_id.clone());
        meta.insert(OFFSET.to_string(), self.offset.to_string());
        meta.insert(LENGTH.to_string(), self.length.to_string());
        meta.insert(CHUNK_INDEX.to_string(), self.chunk_index.to_string());
        meta.insert(TOTAL_CHUNKS.to_string(), self.total_chunks.to_string());
        meta
    }

    /// Rebuild a chunk from a stored search hit.
    pub fn from_hit(hit: &SearchHit) -> Result<Self> {
        use meta_keys::*;
        let field = |key: &str| -> Result<&String> {
            hit.metadata
                .get(key)
                .ok_or_else(|| Error::store(format!("entry '{}' has no '{}' metadata", hit.id, key)))
        };
        let number = |key: &str| -> Result<usize> {
            field(key)?
                .parse()
                .map_err(|_| Error::store(format!("entry '{}' has a non-numeric '{}'", hit.id, key)))
        };
        Ok(Self {
            id: hit.id.clone(),
            text: hit.text.clone(),
            source_id: field(SOURCE_ID)?.clone(),
            offset: number(OFFSET)?,
            length: number(LENGTH)?,
            chunk_index: number(CHUNK_INDEX)?,
            total_chunks: number(TOTAL_CHUNKS)?,
        })
    }
}

/// Deterministic chunk identity: same source and offset always give the same id.
///
/// The offset is zero-padded so ascending id order within one document follows
/// ascending offset order.
pub fn chunk_id(source_id: &str, offset: usize) -> ChunkId {
    let digest = blake3::hash(source_id.as_bytes()).to_hex();
    format!("{}-{:010}", &digest.as_str()[..16], offset)
}

/// A chunk paired with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn into_entry(self) -> VectorEntry {
        VectorEntry {
            metadata: self.chunk.to_metadata(),
            id: self.chunk.id,
            text: self.chunk.text,
            vector: self.vector,
        }
    }
}

/// The unit written to a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Meta,
}

impl VectorEntry {
    pub fn source_id(&self) -> Option<&str> {
        self.metadata.get(meta_keys::SOURCE_ID).map(String::as_str)
    }
}

/// The minimal surface returned by vector stores.
///
/// `score` is cosine similarity; higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub text: String,
    pub metadata: Meta,
    pub score: f32,
}

/// A chunk selected as context for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_chunks: usize,
}

/// One input to `index_documents`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentInput {
    Text { source_id: String, text: String },
    File(PathBuf),
}

impl DocumentInput {
    /// Inline text whose source id is derived from its content.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let digest = blake3::hash(text.as_bytes()).to_hex();
        Self::Text { source_id: format!("text:{}", &digest.as_str()[..16]), text }
    }

    pub fn named_text(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text { source_id: source_id.into(), text: text.into() }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// File ids are the absolute, `.`-free path so `a.txt` and `./a.txt` name one document.
    pub fn source_id(&self) -> String {
        match self {
            Self::Text { source_id, .. } => source_id.clone(),
            Self::File(path) => std::path::absolute(path).unwrap_or_else(|_| path.clone()).to_string_lossy().into_owned(),
        }
    }
}

/// Result of indexing one document.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub source_id: String,
    pub result: Result<usize>,
}

/// Result of one `index_documents` batch.
#[derive(Debug)]
pub struct IndexReport {
    pub stats: IndexStats,
    pub documents: Vec<DocumentOutcome>,
}

impl IndexReport {
    pub fn chunks_indexed(&self) -> usize {
        self.documents.iter().filter_map(|d| d.result.as_ref().ok()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.documents
            .iter()
            .filter_map(|d| d.result.as_ref().err().map(|e| (d.source_id.as_str(), e)))
    }
}

/// Answer plus the sources it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
}
