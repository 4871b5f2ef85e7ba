//! ragflow-vector
//!
//! `VectorStore` adapters. The in-memory store is always available and can persist
//! itself as a JSON snapshot; the LanceDB store needs the `lance` feature.

pub mod memory;

#[cfg(feature = "lance")]
pub mod lance;

use std::sync::Arc;

use ragflow_core::config::{StoreBackend, StoreSettings};
use ragflow_core::{Error, Result, VectorStore};

pub use memory::MemoryVectorStore;

#[cfg(feature = "lance")]
pub use lance::LanceVectorStore;

/// Open the configured store. A `:memory:` location never touches the disk.
pub async fn open_store(settings: &StoreSettings) -> Result<Arc<dyn VectorStore>> {
    if settings.is_ephemeral() {
        return Ok(Arc::new(MemoryVectorStore::new()));
    }
    let root = settings.location_path();
    match settings.backend {
        StoreBackend::Memory => {
            let path = root.join(format!("{}.json", settings.collection));
            tracing::debug!(path = %path.display(), "opening memory store");
            Ok(Arc::new(MemoryVectorStore::open(path)?))
        }
        #[cfg(feature = "lance")]
        StoreBackend::Lance => {
            let store = LanceVectorStore::open(&root, &settings.collection).await.map_err(Error::store)?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "lance"))]
        StoreBackend::Lance => Err(Error::InvalidConfiguration(
            "the lance backend requires building ragflow-vector with the `lance` feature".into(),
        )),
    }
}
