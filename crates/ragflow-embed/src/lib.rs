//! ragflow-embed
//!
//! `Embedder` adapters: a deterministic hashing embedder for tests and offline
//! use, a local BERT encoder on candle, and an OpenAI-compatible HTTP client.

pub mod device;
pub mod hashing;
pub mod local;
pub mod pool;
pub mod remote;
pub mod tokenize;

use std::sync::Arc;
use std::time::Duration;

use ragflow_core::config::{EmbeddingProvider, EmbeddingSettings};
use ragflow_core::{Embedder, Error, Result};

pub use hashing::{HashingEmbedder, DEFAULT_HASHING_DIM};
pub use local::LocalBertEmbedder;
pub use pool::masked_mean_l2;
pub use remote::RemoteEmbedder;

/// Build the configured embedder. `RAGFLOW_USE_FAKE_EMBEDDINGS=1` forces the hashing embedder.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("RAGFLOW_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let provider = if use_fake { EmbeddingProvider::Hashing } else { settings.provider };

    match provider {
        EmbeddingProvider::Hashing => {
            let dim = settings.dimension.unwrap_or(DEFAULT_HASHING_DIM);
            tracing::debug!(dim, "using hashing embedder");
            Ok(Arc::new(HashingEmbedder::new(dim)))
        }
        EmbeddingProvider::Local => {
            let dir = local::resolve_model_dir(settings.model_dir.as_deref(), &settings.model)
                .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
            let model = LocalBertEmbedder::load(&dir, &settings.model, settings.max_len).map_err(Error::embedding)?;
            if let Some(expected) = settings.dimension {
                let actual = model.dimension().unwrap_or(0);
                if expected != actual {
                    return Err(Error::DimensionMismatch { expected, actual });
                }
            }
            Ok(Arc::new(model))
        }
        EmbeddingProvider::Remote => {
            let remote = RemoteEmbedder::new(
                &settings.base_url,
                &settings.model,
                settings.api_key.clone(),
                settings.dimension,
                Duration::from_secs(settings.timeout_secs),
            )
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
            Ok(Arc::new(remote))
        }
    }
}
