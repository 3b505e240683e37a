//! Document storage pipeline.
//!
//! Takes normalized [`SourceDocument`]s from the loaders, upserts them into
//! the collection keyed by `(source, source_id)`, and replaces their chunks.
//! Documents whose dedup hash is unchanged are skipped entirely so their
//! existing embeddings survive incremental updates.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::context::RagContext;
use crate::error::Result;
use crate::models::{Chunk, SourceDocument};

/// Outcome of an ingest batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestReport {
    pub documents_ingested: u64,
    pub documents_unchanged: u64,
    pub chunks_written: u64,
}

/// Store a batch of source documents in the context's collection.
pub async fn ingest_documents(ctx: &RagContext, docs: &[SourceDocument]) -> Result<IngestReport> {
    let pool = ctx.pool();
    let mut report = IngestReport::default();

    for doc in docs {
        let dedup_hash = compute_dedup_hash(doc);

        let existing: Option<(String, String)> = sqlx::query_as(
            "SELECT id, dedup_hash FROM documents WHERE source = ? AND source_id = ?",
        )
        .bind(doc.source.as_str())
        .bind(&doc.source_id)
        .fetch_optional(pool)
        .await?;

        if let Some((_, ref hash)) = existing {
            if hash == &dedup_hash {
                report.documents_unchanged += 1;
                continue;
            }
        }

        let doc_id = existing
            .map(|(id, _)| id)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        upsert_document(pool, &doc_id, doc, &dedup_hash).await?;

        let chunks = chunk_text(
            &doc_id,
            &doc.body,
            ctx.config.chunking.chunk_size,
            ctx.config.chunking.chunk_overlap,
        );
        report.chunks_written += chunks.len() as u64;
        replace_chunks(pool, &doc_id, &chunks).await?;

        report.documents_ingested += 1;
    }

    Ok(report)
}

fn compute_dedup_hash(doc: &SourceDocument) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc.source.as_str().as_bytes());
    hasher.update(doc.source_id.as_bytes());
    hasher.update(doc.body.as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn upsert_document(
    pool: &SqlitePool,
    doc_id: &str,
    doc: &SourceDocument,
    dedup_hash: &str,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO documents (id, source, source_id, source_url, title, published_at, updated_at, content_type, body, metadata_json, dedup_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source, source_id) DO UPDATE SET
            source_url = excluded.source_url,
            title = excluded.title,
            published_at = excluded.published_at,
            updated_at = excluded.updated_at,
            content_type = excluded.content_type,
            body = excluded.body,
            metadata_json = excluded.metadata_json,
            dedup_hash = excluded.dedup_hash
        "#,
    )
    .bind(doc_id)
    .bind(doc.source.as_str())
    .bind(&doc.source_id)
    .bind(&doc.source_url)
    .bind(&doc.title)
    .bind(doc.published_at.timestamp())
    .bind(now)
    .bind(&doc.content_type)
    .bind(&doc.body)
    .bind(&doc.metadata_json)
    .bind(dedup_hash)
    .execute(pool)
    .await?;

    Ok(())
}

/// Replace a document's chunks (and any embeddings tied to them) in one
/// transaction.
async fn replace_chunks(pool: &SqlitePool, document_id: &str, chunks: &[Chunk]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM chunk_vectors WHERE chunk_id IN (SELECT id FROM chunks WHERE document_id = ?)",
    )
    .bind(document_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "DELETE FROM embeddings WHERE chunk_id IN (SELECT id FROM chunks WHERE document_id = ?)",
    )
    .bind(document_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

    for chunk in chunks {
        sqlx::query(
            "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Total number of documents in the collection.
pub async fn document_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
