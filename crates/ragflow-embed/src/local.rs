use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;

use ragflow_core::{Embedder, Error};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

const BATCH_SIZE: usize = 32;

/// Sentence-transformers style BERT encoder (e.g. all-MiniLM-L6-v2) run with candle.
///
/// The model directory must contain `config.json`, `tokenizer.json` and either
/// `model.safetensors` or `pytorch_model.bin`. Cloning shares the loaded weights.
#[derive(Clone)]
pub struct LocalBertEmbedder {
    inner: Arc<BertEncoder>,
}

struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl LocalBertEmbedder {
    pub fn load(model_dir: &Path, model_id: &str, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(model = model_id, dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?,
        )?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config)?;
        let max_len = max_len.min(config.max_position_embeddings).max(1);
        tracing::info!(model = model_id, dim = config.hidden_size, "embedding model loaded");

        let encoder = BertEncoder { model, tokenizer, device, model_id: model_id.to_string(), dim: config.hidden_size, max_len, pad_id };
        Ok(Self { inner: Arc::new(encoder) })
    }

    /// Synchronous forward pass over `texts`.
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.inner.embed_batch(texts)
    }
}

impl BertEncoder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, batch, self.max_len, self.pad_id, &self.device)?;
            let token_type_ids = input_ids.zeros_like()?;
            let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
            let pooled = masked_mean_l2(&hidden, &attention_mask)?;
            let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
            out.extend(rows);
        }
        tracing::debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let tensors = candle_core::pickle::read_all(&pickle)?;
        return tensors
            .into_iter()
            .map(|(name, t)| -> Result<(String, Tensor)> { Ok((name, t.to_device(device)?)) })
            .collect();
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

/// Lookup order: explicit setting, then `RAGFLOW_MODEL_DIR`, then `./models/<model name>`.
pub fn resolve_model_dir(configured: Option<&str>, model_id: &str) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = ragflow_core::config::expand_path(dir);
        if p.exists() {
            return Ok(p);
        }
        return Err(anyhow!("Configured model_dir {} does not exist", p.display()));
    }
    if let Ok(dir) = std::env::var("RAGFLOW_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() {
            return Ok(p);
        }
    }
    let name = model_id.rsplit('/').next().unwrap_or(model_id);
    let local = Path::new("models").join(name);
    if local.exists() {
        return Ok(local);
    }
    Err(anyhow!("Could not locate a model directory for {}", model_id))
}

/// Run CPU-bound work on tokio's blocking pool so runtime workers keep serving other tasks.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

#[async_trait]
impl Embedder for LocalBertEmbedder {
    fn model_id(&self) -> &str {
        &self.inner.model_id
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.inner.dim)
    }

    async fn embed(&self, texts: &[String]) -> ragflow_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encoder = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        run_blocking(move || encoder.embed_batch(&texts)).await.map_err(Error::embedding)
    }
}
