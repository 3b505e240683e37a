//! Incremental updates and knowledge-base statistics.

use sqlx::Row;
use std::path::PathBuf;

use crate::context::RagContext;
use crate::error::Result;
use crate::index;
use crate::loaders;
use crate::models::{KnowledgeBaseStats, SourceBreakdown};

/// Outcome of an incremental update run.
#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateReport {
    pub documents_ingested: u64,
    pub documents_unchanged: u64,
    pub chunks_written: u64,
    pub chunks_embedded: u64,
}

/// Pull fresh content from the given inputs and bring the index up to date.
///
/// Each input list is optional; empty lists are skipped rather than treated
/// as errors. Unchanged documents keep their existing embeddings, so only
/// new or modified chunks are re-embedded.
pub async fn update_with_new_data(
    ctx: &RagContext,
    report_paths: &[PathBuf],
    website_urls: &[String],
    news_urls: &[String],
) -> Result<UpdateReport> {
    let mut report = UpdateReport::default();

    if !report_paths.is_empty() {
        let r = loaders::load_annual_reports(ctx, report_paths).await?;
        report.documents_ingested += r.documents_ingested;
        report.documents_unchanged += r.documents_unchanged;
        report.chunks_written += r.chunks_written;
    }
    if !website_urls.is_empty() {
        let r = loaders::load_company_website(ctx, website_urls).await?;
        report.documents_ingested += r.documents_ingested;
        report.documents_unchanged += r.documents_unchanged;
        report.chunks_written += r.chunks_written;
    }
    if !news_urls.is_empty() {
        let r = loaders::load_news_releases(ctx, news_urls).await?;
        report.documents_ingested += r.documents_ingested;
        report.documents_unchanged += r.documents_unchanged;
        report.chunks_written += r.chunks_written;
    }

    if report.documents_ingested > 0 {
        let build = index::embed_pending(ctx).await?;
        report.chunks_embedded = build.embedded;
    }

    Ok(report)
}

/// Snapshot the knowledge base: document/chunk/embedding counts, a per-source
/// breakdown, and the on-disk size of the collection file.
pub async fn get_stats(ctx: &RagContext) -> Result<KnowledgeBaseStats> {
    let pool = ctx.pool();

    let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;
    let embedded_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT d.source,
               COUNT(DISTINCT d.id) AS documents,
               COUNT(c.id) AS chunks,
               COUNT(v.chunk_id) AS embedded_chunks
        FROM documents d
        LEFT JOIN chunks c ON c.document_id = d.id
        LEFT JOIN chunk_vectors v ON v.chunk_id = c.id
        GROUP BY d.source
        ORDER BY d.source
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_source = rows
        .iter()
        .map(|row| SourceBreakdown {
            source: row.get("source"),
            documents: row.get("documents"),
            chunks: row.get("chunks"),
            embedded_chunks: row.get("embedded_chunks"),
        })
        .collect();

    let db_path = ctx
        .persist_path
        .join(format!("{}.sqlite", ctx.collection_name));
    let db_size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    Ok(KnowledgeBaseStats {
        ticker: ctx.ticker.clone(),
        collection_name: ctx.collection_name.clone(),
        persist_path: ctx.persist_path.clone(),
        db_size_bytes,
        documents,
        chunks,
        embedded_chunks,
        by_source,
    })
}

/// Human-readable byte count for CLI output.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
