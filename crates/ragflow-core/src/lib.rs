//! ragflow-core
//!
//! Domain types, the error taxonomy, collaborator traits (`Embedder`, `VectorStore`,
//! `Generator`), the sliding-window chunker and the cosine ranking shared by every
//! store implementation.

pub mod chunker;
pub mod config;
pub mod document;
pub mod error;
pub mod rank;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig};
pub use config::{PipelineConfig, Settings};
pub use error::{Error, Result};
pub use traits::{ensure_same_model, Embedder, Generator, VectorStore};
pub use types::{
    Chunk, DocumentInput, DocumentOutcome, EmbeddedChunk, IndexReport, IndexStats, Meta, QueryAnswer, RetrievedChunk,
    SearchHit, VectorEntry,
};
