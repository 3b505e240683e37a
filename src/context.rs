//! The per-company RAG context and its factory.
//!
//! [`RagContext`] bundles a ticker, a company name, the resolved
//! configuration, and an open handle to the persistent vector-store
//! collection. It can only be obtained through [`create_context`], so every
//! loader, index, and query call is guaranteed an initialized store.
//! Configuration travels inside the context — there is no process-global
//! state, and contexts for different tickers never interfere.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::RagConfig;
use crate::error::{Result, StockRagError};

#[derive(Debug)]
pub struct RagContext {
    pub ticker: String,
    pub company_name: String,
    pub config: RagConfig,
    pub persist_path: PathBuf,
    pub collection_name: String,
    pool: SqlitePool,
}

impl RagContext {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// API key resolved at creation time. Always present on a live context.
    pub fn api_key(&self) -> &str {
        self.config.llm.api_key.as_deref().unwrap_or_default()
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Create and initialize a [`RagContext`] for a company.
///
/// Validates the configuration and the LLM credential, resolves the
/// vector-store location (ticker-derived defaults when unconfigured), then
/// opens or creates the persistent collection and runs schema migrations.
///
/// # Errors
///
/// Returns [`StockRagError::Configuration`] for an empty ticker/company name
/// or when no API key is resolvable from `config.llm.api_key` or the
/// `GROQ_API_KEY` environment variable. Credential validation happens before
/// any on-disk state is created, so a failed call leaves no collection
/// behind.
pub async fn create_context(
    ticker: &str,
    company_name: &str,
    config: Option<RagConfig>,
) -> Result<RagContext> {
    if ticker.trim().is_empty() {
        return Err(StockRagError::Configuration(
            "ticker must be a non-empty string".to_string(),
        ));
    }
    if company_name.trim().is_empty() {
        return Err(StockRagError::Configuration(
            "company name must be a non-empty string".to_string(),
        ));
    }

    let mut config = config.unwrap_or_default();
    config.validate()?;

    let api_key = config
        .llm
        .api_key
        .clone()
        .or_else(|| std::env::var("GROQ_API_KEY").ok())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            StockRagError::Configuration(
                "Groq API key must be provided in [llm] api_key or set in the \
                 GROQ_API_KEY environment variable"
                    .to_string(),
            )
        })?;
    config.llm.api_key = Some(api_key);

    let (persist_path, collection_name) = config.vector_store.resolve(ticker);

    std::fs::create_dir_all(&persist_path)?;
    let db_path = persist_path.join(format!("{}.sqlite", collection_name));

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(StockRagError::Store)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(RagContext {
        ticker: ticker.to_string(),
        company_name: company_name.to_string(),
        config,
        persist_path,
        collection_name,
        pool,
    })
}

/// Idempotent schema setup for a collection file.
async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            source_id TEXT NOT NULL,
            source_url TEXT,
            title TEXT,
            published_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            content_type TEXT NOT NULL DEFAULT 'text/plain',
            body TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            dedup_hash TEXT NOT NULL,
            UNIQUE(source, source_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(document_id, chunk_index),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            chunk_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunk_vectors_document_id ON chunk_vectors(document_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorStoreConfig;

    fn config_with_key() -> RagConfig {
        let mut config = RagConfig::default();
        config.llm.api_key = Some("gsk_test_key".to_string());
        config
    }

    #[tokio::test]
    async fn missing_credential_fails_without_creating_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let store_dir = tmp.path().join("kb");

        // No other unit test reads this variable, so clearing it here is safe.
        std::env::remove_var("GROQ_API_KEY");

        let mut config = RagConfig::default();
        config.llm.api_key = None;
        config.vector_store = VectorStoreConfig {
            persist_path: Some(store_dir.clone()),
            collection_name: None,
        };

        let err = create_context("AAPL", "Apple Inc.", Some(config))
            .await
            .unwrap_err();
        assert!(matches!(err, StockRagError::Configuration(_)));
        assert!(err.to_string().contains("GROQ_API_KEY"));
        assert!(!store_dir.exists(), "no on-disk collection may be created");
    }

    #[tokio::test]
    async fn empty_ticker_rejected() {
        let err = create_context("", "Apple Inc.", Some(config_with_key()))
            .await
            .unwrap_err();
        assert!(matches!(err, StockRagError::Configuration(_)));
    }

    #[tokio::test]
    async fn context_uses_configured_store_location() {
        let tmp = tempfile::tempdir().unwrap();
        let store_dir = tmp.path().join("custom_store");

        let mut config = config_with_key();
        config.vector_store = VectorStoreConfig {
            persist_path: Some(store_dir.clone()),
            collection_name: Some("apple_kb".to_string()),
        };

        let ctx = create_context("AAPL", "Apple Inc.", Some(config))
            .await
            .unwrap();
        assert_eq!(ctx.persist_path, store_dir);
        assert_eq!(ctx.collection_name, "apple_kb");
        assert!(store_dir.join("apple_kb.sqlite").exists());
        ctx.close().await;
    }

    #[tokio::test]
    async fn recreating_context_reuses_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let store_dir = tmp.path().join("kb");

        let mut config = config_with_key();
        config.vector_store = VectorStoreConfig {
            persist_path: Some(store_dir.clone()),
            collection_name: Some("aapl_kb".to_string()),
        };

        let ctx1 = create_context("AAPL", "Apple Inc.", Some(config.clone()))
            .await
            .unwrap();
        sqlx::query("INSERT INTO index_meta (key, value) VALUES ('probe', '1')")
            .execute(ctx1.pool())
            .await
            .unwrap();
        ctx1.close().await;

        let ctx2 = create_context("AAPL", "Apple Inc.", Some(config))
            .await
            .unwrap();
        let probe: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'probe'")
                .fetch_optional(ctx2.pool())
                .await
                .unwrap();
        assert_eq!(probe.as_deref(), Some("1"));
        ctx2.close().await;
    }

    #[tokio::test]
    async fn default_collection_name_derived_from_ticker() {
        let tmp = tempfile::tempdir().unwrap();
        let store_dir = tmp.path().join("derived");

        let mut config = config_with_key();
        config.vector_store = VectorStoreConfig {
            persist_path: Some(store_dir.clone()),
            collection_name: None,
        };

        let ctx = create_context("MSFT", "Microsoft Corporation", Some(config))
            .await
            .unwrap();
        assert_eq!(ctx.collection_name, "MSFT_knowledge_base");
        assert!(store_dir.join("MSFT_knowledge_base.sqlite").exists());
        ctx.close().await;
    }
}
