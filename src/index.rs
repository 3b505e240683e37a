//! Vector index construction over the stored chunks.
//!
//! `build_index` embeds every chunk that is missing an embedding or whose
//! text hash went stale, in batches, and records the build in `index_meta`.
//! `load_existing_index` verifies a previously built index without touching
//! the embedding model.

use sqlx::{Row, SqlitePool};

use crate::context::RagContext;
use crate::embedding::{self, LocalEmbedder};
use crate::error::{Result, StockRagError};
use crate::ingest::document_count;

/// Outcome of an index build.
#[derive(Debug, Clone, Copy)]
pub struct IndexBuildReport {
    pub embedded: u64,
    pub up_to_date: u64,
}

/// Build (or refresh) the vector index from the loaded documents.
///
/// # Errors
///
/// [`StockRagError::NoDocuments`] when nothing has been loaded yet.
pub async fn build_index(ctx: &RagContext) -> Result<IndexBuildReport> {
    if document_count(ctx.pool()).await? == 0 {
        return Err(StockRagError::NoDocuments {
            ticker: ctx.ticker.clone(),
        });
    }

    let report = embed_pending(ctx).await?;

    let now = chrono::Utc::now().timestamp();
    set_meta(ctx.pool(), "embedding_model", &ctx.config.embedding.model).await?;
    set_meta(ctx.pool(), "built_at", &now.to_string()).await?;

    Ok(report)
}

/// Verify that a previously built index exists in the collection.
///
/// # Errors
///
/// [`StockRagError::IndexNotBuilt`] when the collection has no stored
/// vectors or was never built.
pub async fn load_existing_index(ctx: &RagContext) -> Result<()> {
    if !is_built(ctx.pool()).await? {
        return Err(StockRagError::IndexNotBuilt {
            ticker: ctx.ticker.clone(),
        });
    }
    Ok(())
}

/// An index counts as built once at least one vector is stored and a build
/// was recorded.
pub(crate) async fn is_built(pool: &SqlitePool) -> Result<bool> {
    let vectors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(pool)
        .await?;
    if vectors == 0 {
        return Ok(false);
    }
    let built_at: Option<String> =
        sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'built_at'")
            .fetch_optional(pool)
            .await?;
    Ok(built_at.is_some())
}

/// Embed chunks that are missing an embedding for the configured model or
/// whose text hash changed since they were last embedded.
pub(crate) async fn embed_pending(ctx: &RagContext) -> Result<IndexBuildReport> {
    let pool = ctx.pool();
    let embedder = LocalEmbedder::new(&ctx.config.embedding)?;
    let model_name = embedder.model_name().to_string();

    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;

    let pending = find_pending_chunks(pool, &model_name).await?;
    let up_to_date = total_chunks as u64 - pending.len() as u64;

    let mut embedded = 0u64;
    for batch in pending.chunks(ctx.config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
        let vectors = embedding::embed_texts(&ctx.config.embedding, &texts).await?;

        for (item, vec) in batch.iter().zip(vectors.iter()) {
            let blob = embedding::vec_to_blob(vec);
            upsert_embedding(
                pool,
                &item.chunk_id,
                &item.document_id,
                &model_name,
                embedder.dims(),
                &item.hash,
                &blob,
            )
            .await?;
            embedded += 1;
        }
    }

    Ok(IndexBuildReport {
        embedded,
        up_to_date,
    })
}

struct PendingChunk {
    chunk_id: String,
    document_id: String,
    text: String,
    hash: String,
}

async fn find_pending_chunks(pool: &SqlitePool, model: &str) -> Result<Vec<PendingChunk>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id AS chunk_id, c.document_id, c.text, c.hash
        FROM chunks c
        LEFT JOIN embeddings e ON e.chunk_id = c.id AND e.model = ?
        WHERE e.chunk_id IS NULL OR e.hash != c.hash
        ORDER BY c.document_id, c.chunk_index
        "#,
    )
    .bind(model)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PendingChunk {
            chunk_id: row.get("chunk_id"),
            document_id: row.get("document_id"),
            text: row.get("text"),
            hash: row.get("hash"),
        })
        .collect())
}

async fn upsert_embedding(
    pool: &SqlitePool,
    chunk_id: &str,
    document_id: &str,
    model: &str,
    dims: usize,
    text_hash: &str,
    blob: &[u8],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO embeddings (chunk_id, model, dims, created_at, hash)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            model = excluded.model,
            dims = excluded.dims,
            created_at = excluded.created_at,
            hash = excluded.hash
        "#,
    )
    .bind(chunk_id)
    .bind(model)
    .bind(dims as i64)
    .bind(now)
    .bind(text_hash)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO chunk_vectors (chunk_id, document_id, embedding)
        VALUES (?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            document_id = excluded.document_id,
            embedding = excluded.embedding
        "#,
    )
    .bind(chunk_id)
    .bind(document_id)
    .bind(blob)
    .execute(pool)
    .await?;

    Ok(())
}

async fn set_meta(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO index_meta (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RagConfig, VectorStoreConfig};
    use crate::context::create_context;

    #[tokio::test]
    async fn build_index_without_documents_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.llm.api_key = Some("gsk_test_key".to_string());
        config.vector_store = VectorStoreConfig {
            persist_path: Some(tmp.path().join("kb")),
            collection_name: None,
        };
        let ctx = create_context("TEST", "Test Corp", Some(config))
            .await
            .unwrap();

        let err = build_index(&ctx).await.unwrap_err();
        assert!(matches!(err, StockRagError::NoDocuments { .. }));
        ctx.close().await;
    }

    #[tokio::test]
    async fn load_existing_index_on_fresh_collection_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.llm.api_key = Some("gsk_test_key".to_string());
        config.vector_store = VectorStoreConfig {
            persist_path: Some(tmp.path().join("kb")),
            collection_name: None,
        };
        let ctx = create_context("TEST", "Test Corp", Some(config))
            .await
            .unwrap();

        let err = load_existing_index(&ctx).await.unwrap_err();
        assert!(matches!(err, StockRagError::IndexNotBuilt { .. }));
        ctx.close().await;
    }
}
