//! Retrieval and question answering.
//!
//! The query path embeds the question locally, scans the stored chunk
//! vectors with cosine similarity (optionally restricted to one source),
//! and hands the top chunks to the LLM as numbered excerpts.

use sqlx::Row;
use std::str::FromStr;

use crate::context::RagContext;
use crate::embedding::{self, blob_to_vec, cosine_similarity};
use crate::error::{Result, StockRagError};
use crate::index;
use crate::llm;
use crate::models::{RetrievedChunk, Source};

/// Answer plus the retrieved chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
}

/// A handle for running queries against a built index.
///
/// Constructing one verifies the index exists; the engine itself only
/// carries the retrieval parameters.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    top_k: usize,
    min_score: f64,
}

/// Create a query engine for the context.
///
/// # Errors
///
/// [`StockRagError::IndexNotBuilt`] when the index was never built.
pub async fn create_query_engine(ctx: &RagContext) -> Result<QueryEngine> {
    index::load_existing_index(ctx).await?;
    Ok(QueryEngine {
        top_k: ctx.config.retrieval.top_k,
        min_score: ctx.config.retrieval.min_score,
    })
}

impl QueryEngine {
    /// Answer a question using every source in the knowledge base.
    pub async fn query(&self, ctx: &RagContext, question: &str) -> Result<QueryResponse> {
        self.ask(ctx, question, None).await
    }

    /// Answer a question using only chunks from one source type.
    pub async fn query_with_filters(
        &self,
        ctx: &RagContext,
        question: &str,
        source: Source,
    ) -> Result<QueryResponse> {
        self.ask(ctx, question, Some(source)).await
    }

    async fn ask(
        &self,
        ctx: &RagContext,
        question: &str,
        source: Option<Source>,
    ) -> Result<QueryResponse> {
        if question.trim().is_empty() {
            return Err(StockRagError::Configuration(
                "question must not be empty".to_string(),
            ));
        }

        let query_vec = embedding::embed_query(&ctx.config.embedding, question).await?;
        let retrieved = retrieve(ctx, &query_vec, source, self.top_k, self.min_score).await?;

        if retrieved.is_empty() {
            return Ok(QueryResponse {
                answer: "No relevant information found in the knowledge base.".to_string(),
                sources: Vec::new(),
            });
        }

        let system_prompt = format!(
            "You are a financial analyst assistant for {} (ticker {}). \
             Answer using only the provided excerpts from the company's \
             filings, reports, and announcements. If the excerpts do not \
             contain the answer, say so.",
            ctx.company_name, ctx.ticker
        );
        let user_prompt = build_user_prompt(question, &retrieved);

        let answer =
            llm::chat_completion(&ctx.config.llm, ctx.api_key(), &system_prompt, &user_prompt)
                .await?;

        Ok(QueryResponse {
            answer,
            sources: retrieved,
        })
    }
}

/// One-shot query helper matching the engine's default behavior.
pub async fn query(ctx: &RagContext, question: &str) -> Result<QueryResponse> {
    create_query_engine(ctx).await?.query(ctx, question).await
}

/// One-shot filtered query helper.
pub async fn query_with_filters(
    ctx: &RagContext,
    question: &str,
    source: Source,
) -> Result<QueryResponse> {
    create_query_engine(ctx)
        .await?
        .query_with_filters(ctx, question, source)
        .await
}

/// Scan stored vectors, score against the query vector, and keep the best.
///
/// Results are ordered by score descending with chunk id as a tiebreak so
/// repeated queries return identical orderings.
async fn retrieve(
    ctx: &RagContext,
    query_vec: &[f32],
    source: Option<Source>,
    top_k: usize,
    min_score: f64,
) -> Result<Vec<RetrievedChunk>> {
    let sql = match source {
        Some(_) => {
            r#"
            SELECT v.chunk_id, v.embedding, c.document_id, c.text,
                   d.source, d.title
            FROM chunk_vectors v
            JOIN chunks c ON c.id = v.chunk_id
            JOIN documents d ON d.id = c.document_id
            WHERE d.source = ?
            "#
        }
        None => {
            r#"
            SELECT v.chunk_id, v.embedding, c.document_id, c.text,
                   d.source, d.title
            FROM chunk_vectors v
            JOIN chunks c ON c.id = v.chunk_id
            JOIN documents d ON d.id = c.document_id
            "#
        }
    };

    let mut query = sqlx::query(sql);
    if let Some(s) = source {
        query = query.bind(s.as_str().to_string());
    }
    let rows = query.fetch_all(ctx.pool()).await?;

    let mut scored = Vec::with_capacity(rows.len());
    for row in &rows {
        let blob: Vec<u8> = row.get("embedding");
        let vec = blob_to_vec(&blob);
        let score = cosine_similarity(query_vec, &vec) as f64;
        if score < min_score {
            continue;
        }
        let source_str: String = row.get("source");
        scored.push(RetrievedChunk {
            chunk_id: row.get("chunk_id"),
            document_id: row.get("document_id"),
            source: Source::from_str(&source_str).map_err(StockRagError::Configuration)?,
            title: row.get("title"),
            score,
            text: row.get("text"),
        });
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    scored.truncate(top_k);
    Ok(scored)
}

fn build_user_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::from("Excerpts:\n\n");
    for (i, chunk) in chunks.iter().enumerate() {
        let label = chunk.title.as_deref().unwrap_or("untitled");
        prompt.push_str(&format!(
            "[{}] ({}, {})\n{}\n\n",
            i + 1,
            chunk.source,
            label,
            chunk.text
        ));
    }
    prompt.push_str(&format!("Question: {}", question));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RagConfig, VectorStoreConfig};
    use crate::context::create_context;
    use crate::embedding::vec_to_blob;

    async fn test_context(tmp: &tempfile::TempDir) -> RagContext {
        let mut config = RagConfig::default();
        config.llm.api_key = Some("gsk_test_key".to_string());
        config.vector_store = VectorStoreConfig {
            persist_path: Some(tmp.path().join("kb")),
            collection_name: None,
        };
        create_context("TEST", "Test Corp", Some(config))
            .await
            .unwrap()
    }

    async fn seed_chunk(
        ctx: &RagContext,
        doc_id: &str,
        chunk_id: &str,
        source: &str,
        text: &str,
        vector: &[f32],
    ) {
        sqlx::query(
            "INSERT OR IGNORE INTO documents (id, source, source_id, source_url, title, published_at, updated_at, content_type, body, metadata_json, dedup_hash)
             VALUES (?, ?, ?, NULL, 'Doc', 0, 0, 'text/plain', '', '{}', ?)",
        )
        .bind(doc_id)
        .bind(source)
        .bind(doc_id)
        .bind(doc_id)
        .execute(ctx.pool())
        .await
        .unwrap();

        sqlx::query("INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, 0, ?, ?)")
            .bind(chunk_id)
            .bind(doc_id)
            .bind(text)
            .bind(chunk_id)
            .execute(ctx.pool())
            .await
            .unwrap();

        sqlx::query("INSERT INTO chunk_vectors (chunk_id, document_id, embedding) VALUES (?, ?, ?)")
            .bind(chunk_id)
            .bind(doc_id)
            .bind(vec_to_blob(vector))
            .execute(ctx.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn retrieval_orders_by_similarity() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(&tmp).await;

        seed_chunk(&ctx, "d1", "c1", "annual_report", "close match", &[1.0, 0.0, 0.0]).await;
        seed_chunk(&ctx, "d2", "c2", "news", "far match", &[0.0, 1.0, 0.0]).await;

        let results = retrieve(&ctx, &[1.0, 0.1, 0.0], None, 10, 0.0).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "c1");
        assert!(results[0].score > results[1].score);
        ctx.close().await;
    }

    #[tokio::test]
    async fn source_filter_restricts_results() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(&tmp).await;

        seed_chunk(&ctx, "d1", "c1", "annual_report", "report text", &[1.0, 0.0]).await;
        seed_chunk(&ctx, "d2", "c2", "news", "news text", &[1.0, 0.0]).await;

        let results = retrieve(&ctx, &[1.0, 0.0], Some(Source::News), 10, 0.0)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, Source::News);
        ctx.close().await;
    }

    #[tokio::test]
    async fn min_score_drops_weak_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(&tmp).await;

        seed_chunk(&ctx, "d1", "c1", "website", "strong", &[1.0, 0.0]).await;
        seed_chunk(&ctx, "d2", "c2", "website", "orthogonal", &[0.0, 1.0]).await;

        let results = retrieve(&ctx, &[1.0, 0.0], None, 10, 0.5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "strong");
        ctx.close().await;
    }

    #[tokio::test]
    async fn top_k_caps_result_count() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(&tmp).await;

        for i in 0..5 {
            seed_chunk(
                &ctx,
                &format!("d{}", i),
                &format!("c{}", i),
                "website",
                "text",
                &[1.0, i as f32 * 0.1],
            )
            .await;
        }

        let results = retrieve(&ctx, &[1.0, 0.0], None, 3, 0.0).await.unwrap();
        assert_eq!(results.len(), 3);
        ctx.close().await;
    }

    #[tokio::test]
    async fn engine_requires_built_index() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(&tmp).await;
        let err = create_query_engine(&ctx).await.unwrap_err();
        assert!(matches!(err, StockRagError::IndexNotBuilt { .. }));
        ctx.close().await;
    }

    #[test]
    fn prompt_numbers_excerpts() {
        let chunks = vec![
            RetrievedChunk {
                chunk_id: "c1".to_string(),
                document_id: "d1".to_string(),
                source: Source::AnnualReport,
                title: Some("FY24".to_string()),
                score: 0.9,
                text: "Revenue grew.".to_string(),
            },
            RetrievedChunk {
                chunk_id: "c2".to_string(),
                document_id: "d2".to_string(),
                source: Source::News,
                title: None,
                score: 0.7,
                text: "New product launched.".to_string(),
            },
        ];
        let prompt = build_user_prompt("What happened?", &chunks);
        assert!(prompt.contains("[1] (annual_report, FY24)"));
        assert!(prompt.contains("[2] (news, untitled)"));
        assert!(prompt.ends_with("Question: What happened?"));
    }
}
