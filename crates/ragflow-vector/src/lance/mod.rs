//! LanceDB adapter, compiled with the `lance` feature.

pub mod schema;
mod store;

pub use store::LanceVectorStore;
