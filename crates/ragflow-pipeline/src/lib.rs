//! ragflow-pipeline
//!
//! Composes chunker, embedder, vector store and generator into the indexing and
//! query flows.

pub mod orchestrator;
pub mod retriever;

pub use orchestrator::Orchestrator;
pub use retriever::Retriever;
