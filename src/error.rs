//! Error types for the stockrag library.
//!
//! Loaders, index, and query operations return [`StockRagError`] so callers
//! can distinguish configuration problems from lifecycle errors (nothing
//! loaded yet, index not built) and from external failures (store, HTTP,
//! embedding model, LLM API).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StockRagError {
    /// Invalid or missing configuration (e.g. no resolvable LLM credential).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The knowledge base holds no documents; a loader must run first.
    #[error("no documents loaded for {ticker}; run a loader before building the index")]
    NoDocuments { ticker: String },

    /// The vector index has not been built for this collection.
    #[error("index not built for {ticker}; call build_index or load_existing_index first")]
    IndexNotBuilt { ticker: String },

    /// Vector store (SQLite) failure.
    #[error("vector store error: {0}")]
    Store(#[from] sqlx::Error),

    /// HTTP transport failure (SEC, website, news, or LLM endpoints).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Document text extraction failed (PDF or HTML).
    #[error("extraction failed: {0}")]
    Extract(String),

    /// Local embedding model failure.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The LLM API returned an error or an unparseable response.
    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = StockRagError> = std::result::Result<T, E>;
