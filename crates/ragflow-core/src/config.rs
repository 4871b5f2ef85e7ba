//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml` and
//! `RAGFLOW_*` env vars (`__` separates nested keys, e.g. `RAGFLOW_PIPELINE__TOP_K=5`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_INDEX_CONCURRENCY: usize = 4;
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_GENERATION_URL: &str = "http://localhost:1234";
pub const DEFAULT_STORE_PATH: &str = "./data/ragflow";
pub const DEFAULT_COLLECTION: &str = "rag_documents";

/// Everything the orchestrator itself needs. Passed by value, never global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Documents embedded and upserted at the same time within one batch.
    pub index_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let chunking = ChunkingConfig::default();
        Self {
            chunk_size: chunking.chunk_size,
            chunk_overlap: chunking.chunk_overlap,
            top_k: DEFAULT_TOP_K,
            index_concurrency: DEFAULT_INDEX_CONCURRENCY,
        }
    }
}

impl PipelineConfig {
    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig { chunk_size: self.chunk_size, chunk_overlap: self.chunk_overlap }
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking().validate()?;
        if self.top_k == 0 {
            return Err(Error::InvalidConfiguration("top_k must be greater than 0".into()));
        }
        if self.index_concurrency == 0 {
            return Err(Error::InvalidConfiguration("index_concurrency must be greater than 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic token hashing; no model files needed.
    Hashing,
    /// BERT-family model loaded from `model_dir`.
    Local,
    /// OpenAI-compatible `/v1/embeddings` endpoint at `base_url`.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub model_dir: Option<String>,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Dimension of the hashing embedder, or the expected dimension of other providers.
    pub dimension: Option<usize>,
    pub max_len: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            model_dir: None,
            base_url: DEFAULT_GENERATION_URL.to_string(),
            api_key: None,
            dimension: None,
            max_len: 256,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store, persisted to a JSON snapshot under `location`.
    Memory,
    /// LanceDB table under `location` (requires the `lance` feature).
    Lance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Directory holding the collection. `:memory:` keeps everything in process.
    pub location: String,
    pub collection: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { backend: StoreBackend::Memory, location: DEFAULT_STORE_PATH.to_string(), collection: DEFAULT_COLLECTION.to_string() }
    }
}

impl StoreSettings {
    pub fn is_ephemeral(&self) -> bool {
        self.location == ":memory:"
    }

    pub fn location_path(&self) -> PathBuf {
        resolve_with_base(&env::current_dir().unwrap_or_default(), &self.location)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GENERATION_URL.to_string(),
            model: None,
            api_key: None,
            system_prompt: None,
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub embedding: EmbeddingSettings,
    pub store: StoreSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    /// Defaults ← `config.toml` ← `config.<env>.toml` ← `RAGFLOW_*` variables.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RAGFLOW_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("RAGFLOW_").ignore(&["ENV", "USE_FAKE_EMBEDDINGS"]).split("__"));

        let settings: Settings = figment.extract().map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        if self.store.collection.trim().is_empty() {
            return Err(Error::InvalidConfiguration("store.collection must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(Error::InvalidConfiguration(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        if self.embedding.dimension == Some(0) {
            return Err(Error::InvalidConfiguration("embedding.dimension must be greater than 0".into()));
        }
        Ok(())
    }
}

/// `~` and `$VAR` / `${VAR}` expanded; unknown variables are left as written.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    match expand_path(p) {
        abs if abs.is_absolute() => abs,
        rel => base.join(rel),
    }
}
