//! Local embedding model and vector utilities.
//!
//! Embeddings run entirely on-device via fastembed; models are downloaded
//! from Hugging Face on first use and cached. Also provides the codecs used
//! to persist vectors as SQLite BLOBs:
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] — decode a BLOB back into a `Vec<f32>`
//! - [`cosine_similarity`] — similarity between two embedding vectors

use crate::config::EmbeddingConfig;
use crate::error::{Result, StockRagError};

/// Metadata for the configured local embedding model.
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_model(&config.model)?;
        Ok(Self { model_name, dims })
    }

    /// Model identifier (e.g. `"all-minilm-l6-v2"`).
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Embedding vector dimensionality (e.g. `384`).
    pub fn dims(&self) -> usize {
        self.dims
    }
}

/// Known local models and their dimensionalities.
fn resolve_model(name: &str) -> Result<(String, usize)> {
    let dims = match name {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        other => {
            return Err(StockRagError::Configuration(format!(
                "unknown embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1, nomic-embed-text-v1.5, \
                 multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
                other
            )))
        }
    };
    Ok((name.to_string(), dims))
}

#[cfg(feature = "local-embeddings-fastembed")]
fn to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(StockRagError::Configuration(format!(
            "unknown embedding model: '{}'",
            other
        ))),
    }
}

/// Embed a batch of texts with the configured local model.
///
/// Returns one vector per input text, in input order. Model inference runs
/// on a blocking thread.
#[cfg(feature = "local-embeddings-fastembed")]
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let model = to_fastembed_model(&config.model)?;
    let batch_size = config.batch_size;
    let texts = texts.to_vec();

    tokio::task::spawn_blocking(move || {
        let mut embedder = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(model).with_show_download_progress(true),
        )
        .map_err(|e| {
            StockRagError::Embedding(format!("failed to initialize embedding model: {}", e))
        })?;

        embedder
            .embed(texts, Some(batch_size))
            .map_err(|e| StockRagError::Embedding(e.to_string()))
    })
    .await
    .map_err(|e| StockRagError::Embedding(format!("embedding task panicked: {}", e)))?
}

#[cfg(not(feature = "local-embeddings-fastembed"))]
pub async fn embed_texts(_config: &EmbeddingConfig, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
    Err(StockRagError::Embedding(
        "local embeddings require the local-embeddings-fastembed feature".to_string(),
    ))
}

/// Embed a single query text. Convenience wrapper around [`embed_texts`].
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| StockRagError::Embedding("empty embedding response".to_string()))
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
