//! Configuration objects for a stockrag context.
//!
//! [`RagConfig`] aggregates the LLM, embedding, chunking, vector-store, and
//! retrieval settings. All fields carry defaults so an empty config (or no
//! config file at all) produces a working setup; a TOML file can override
//! any subset.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, StockRagError};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RagConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Hosted LLM settings (Groq's OpenAI-compatible chat-completions API).
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Explicit API key; falls back to the `GROQ_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            api_key: None,
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_retries() -> u32 {
    3
}
fn default_llm_timeout_secs() -> u64 {
    60
}

/// Local embedding model settings.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_embedding_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_batch_size() -> usize {
    64
}

/// Text chunking settings, in approximate tokens.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1024
}
fn default_chunk_overlap() -> usize {
    200
}

/// Vector store location. When unset, both fields are derived from the
/// ticker at context creation.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub persist_path: Option<PathBuf>,
    #[serde(default)]
    pub collection_name: Option<String>,
}

impl VectorStoreConfig {
    /// Resolve the persistence directory and collection name for a ticker.
    ///
    /// Unset fields fall back to the ticker-derived defaults:
    /// `./chroma_db_{ticker}` and `{ticker}_knowledge_base`.
    pub fn resolve(&self, ticker: &str) -> (PathBuf, String) {
        let path = self
            .persist_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("./chroma_db_{}", ticker)));
        let collection = self
            .collection_name
            .clone()
            .unwrap_or_else(|| format!("{}_knowledge_base", ticker));
        (path, collection)
    }
}

/// Retrieval settings for the query engine.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the LLM as context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to be used.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}

fn default_top_k() -> usize {
    6
}
fn default_min_score() -> f64 {
    0.0
}

impl RagConfig {
    /// Check cross-field invariants. Called by [`load_config`] and by the
    /// context factory for programmatically built configs.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(StockRagError::Configuration(
                "chunking.chunk_size must be > 0".to_string(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(StockRagError::Configuration(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(StockRagError::Configuration(format!(
                "llm.temperature must be in [0.0, 2.0], got {}",
                self.llm.temperature
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(StockRagError::Configuration(
                "retrieval.top_k must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load and validate a [`RagConfig`] from a TOML file.
pub fn load_config(path: &Path) -> Result<RagConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        StockRagError::Configuration(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: RagConfig = toml::from_str(&content)
        .map_err(|e| StockRagError::Configuration(format!("failed to parse config file: {}", e)))?;

    config.validate()?;
    Ok(config)
}
