//! Core data models used throughout stockrag.
//!
//! These types represent the source documents, stored chunks, and retrieval
//! results that flow through the ingestion and query pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of source a document came from. Stored as a string column on
/// `documents` and usable as a query-time filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    AnnualReport,
    SecFiling,
    Website,
    News,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::AnnualReport => "annual_report",
            Source::SecFiling => "sec_filing",
            Source::Website => "website",
            Source::News => "news",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annual_report" => Ok(Source::AnnualReport),
            "sec_filing" => Ok(Source::SecFiling),
            "website" => Ok(Source::Website),
            "news" => Ok(Source::News),
            other => Err(format!(
                "unknown source '{}'; expected annual_report, sec_filing, website, or news",
                other
            )),
        }
    }
}

/// Raw document produced by a loader before storage.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: Source,
    /// Stable identity within the source (file path, accession number, URL).
    pub source_id: String,
    pub source_url: Option<String>,
    pub title: Option<String>,
    pub published_at: DateTime<Utc>,
    pub content_type: String,
    pub body: String,
    pub metadata_json: String,
}

/// A chunk of a document's body text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk retrieved for a query, with its similarity score and the
/// metadata of the document it belongs to.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub source: Source,
    pub title: Option<String>,
    pub score: f64,
    pub text: String,
}

/// Per-source breakdown within [`KnowledgeBaseStats`].
#[derive(Debug, Clone, Serialize)]
pub struct SourceBreakdown {
    pub source: String,
    pub documents: i64,
    pub chunks: i64,
    pub embedded_chunks: i64,
}

/// Snapshot of the knowledge base returned by `get_stats`.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeBaseStats {
    pub ticker: String,
    pub collection_name: String,
    pub persist_path: PathBuf,
    pub db_size_bytes: u64,
    pub documents: i64,
    pub chunks: i64,
    pub embedded_chunks: i64,
    pub by_source: Vec<SourceBreakdown>,
}
