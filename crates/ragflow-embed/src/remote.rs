use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ragflow_core::{Embedder, Error};

/// Inputs sent per request.
const MAX_BATCH_SIZE: usize = 64;

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint
/// (LM Studio, Ollama, OpenAI).
pub struct RemoteEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    /// 0 until the first response, unless configured.
    dimension: AtomicUsize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, dimension: Option<usize>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
            dimension: AtomicUsize::new(dimension.unwrap_or(0)),
        })
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut req = self.client.post(&self.endpoint).json(&EmbeddingRequest { model: &self.model, input });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Embedding request failed: Status {}, Body: {}", status, body));
        }
        let mut parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != input.len() {
            return Err(anyhow!("expected {} embeddings but the server returned {}", input.len(), parsed.data.len()));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<usize> {
        match self.dimension.load(Ordering::Relaxed) {
            0 => None,
            d => Some(d),
        }
    }

    async fn embed(&self, texts: &[String]) -> ragflow_core::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_SIZE) {
            tracing::debug!(endpoint = %self.endpoint, inputs = batch.len(), "requesting embeddings");
            let vectors = self.request(batch).await.map_err(Error::embedding)?;
            out.extend(vectors);
        }
        if let Some(first) = out.first() {
            let expected = self.dimension.load(Ordering::Relaxed);
            if expected != 0 && expected != first.len() {
                return Err(Error::DimensionMismatch { expected, actual: first.len() });
            }
            self.dimension.store(first.len(), Ordering::Relaxed);
        }
        Ok(out)
    }
}
