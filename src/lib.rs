//! stockrag is a retrieval-augmented question answering toolkit for public
//! companies. It pulls a company's annual reports, SEC filings, website
//! pages, and news releases into a local per-ticker knowledge base, indexes
//! them with on-device embeddings, and answers questions through Groq's
//! chat API with the retrieved excerpts as grounding.
//!
//! Everything hangs off a [`RagContext`] created by [`create_context`]:
//! configuration travels inside the context, so contexts for different
//! tickers are fully independent.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`config`] | TOML-backed configuration with ticker-derived defaults |
//! | [`context`] | Per-company context factory and collection setup |
//! | [`loaders`] | Annual reports, SEC EDGAR, website, and news ingestion |
//! | [`chunk`] | Paragraph-aware text chunking with overlap |
//! | [`embedding`] | Local embedding models and vector codecs |
//! | [`index`] | Vector index build and verification |
//! | [`query`] | Similarity retrieval and LLM question answering |
//! | [`maintenance`] | Incremental updates and knowledge-base stats |

pub mod chunk;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod loaders;
pub mod maintenance;
pub mod models;
pub mod query;

pub use config::{load_config, RagConfig};
pub use context::{create_context, RagContext};
pub use error::{Result, StockRagError};
pub use index::{build_index, load_existing_index, IndexBuildReport};
pub use ingest::IngestReport;
pub use loaders::{
    load_annual_reports, load_company_website, load_news_releases, load_sec_filings,
};
pub use maintenance::{get_stats, update_with_new_data, UpdateReport};
pub use models::{KnowledgeBaseStats, RetrievedChunk, Source, SourceDocument};
pub use query::{create_query_engine, query, query_with_filters, QueryEngine, QueryResponse};
