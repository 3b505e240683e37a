//! Document loaders.
//!
//! Each loader normalizes one kind of input (local annual-report files, SEC
//! filings, company web pages, news releases) into [`SourceDocument`]s and
//! stores them through the ingest pipeline. Embedding happens later, at
//! index-build time. Per-item failures are reported and skipped; a batch
//! where everything failed is an error.

pub mod html;
pub mod sec;

use chrono::{TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::RagContext;
use crate::error::{Result, StockRagError};
use crate::ingest::{ingest_documents, IngestReport};
use crate::models::{Source, SourceDocument};

/// Load local annual-report files into the knowledge base.
///
/// `.pdf` files go through pdf-extract; anything else is read as UTF-8
/// text. Returns the ingest report for the batch.
pub async fn load_annual_reports(ctx: &RagContext, paths: &[PathBuf]) -> Result<IngestReport> {
    if paths.is_empty() {
        return Err(StockRagError::Configuration(
            "no annual report files given".to_string(),
        ));
    }

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        match read_report(path) {
            Ok(doc) => docs.push(doc),
            Err(e) => eprintln!("Warning: skipping {}: {}", path.display(), e),
        }
    }

    if docs.is_empty() {
        return Err(StockRagError::Extract(
            "none of the annual report files could be read".to_string(),
        ));
    }

    ingest_documents(ctx, &docs).await
}

fn read_report(path: &Path) -> Result<SourceDocument> {
    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    let body = if is_pdf {
        let bytes = std::fs::read(path)?;
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| StockRagError::Extract(format!("PDF extraction failed: {}", e)))?
    } else {
        std::fs::read_to_string(path)?
    };

    if body.trim().is_empty() {
        return Err(StockRagError::Extract(format!(
            "{} produced no text",
            path.display()
        )));
    }

    let modified_secs = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let title = path
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(SourceDocument {
        source: Source::AnnualReport,
        source_id: path.to_string_lossy().to_string(),
        source_url: Some(format!("file://{}", path.display())),
        title: Some(title),
        published_at: Utc.timestamp_opt(modified_secs, 0).single().unwrap_or_else(Utc::now),
        content_type: if is_pdf { "application/pdf" } else { "text/plain" }.to_string(),
        body,
        metadata_json: "{}".to_string(),
    })
}

/// Load recent SEC filings of the given form types (e.g. `10-K`, `10-Q`)
/// for the context's ticker, `limit_per_type` most recent of each.
pub async fn load_sec_filings(
    ctx: &RagContext,
    filing_types: &[String],
    limit_per_type: usize,
) -> Result<IngestReport> {
    let docs = sec::fetch_filings(&ctx.ticker, filing_types, limit_per_type).await?;
    ingest_documents(ctx, &docs).await
}

/// Load pages from the company's website.
pub async fn load_company_website(ctx: &RagContext, urls: &[String]) -> Result<IngestReport> {
    load_pages(ctx, urls, Source::Website).await
}

/// Load news releases / press pages.
pub async fn load_news_releases(ctx: &RagContext, urls: &[String]) -> Result<IngestReport> {
    load_pages(ctx, urls, Source::News).await
}

async fn load_pages(ctx: &RagContext, urls: &[String], source: Source) -> Result<IngestReport> {
    if urls.is_empty() {
        return Err(StockRagError::Configuration(format!(
            "no URLs given for {} loader",
            source
        )));
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("stockrag/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?;

    let mut docs = Vec::with_capacity(urls.len());
    for url in urls {
        match fetch_page(&client, url, source).await {
            Ok(doc) => docs.push(doc),
            Err(e) => eprintln!("Warning: skipping {}: {}", url, e),
        }
    }

    if docs.is_empty() {
        return Err(StockRagError::Extract(format!(
            "none of the {} URLs could be fetched",
            source
        )));
    }

    ingest_documents(ctx, &docs).await
}

async fn fetch_page(
    client: &reqwest::Client,
    url: &str,
    source: Source,
) -> Result<SourceDocument> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(StockRagError::Extract(format!(
            "{} returned HTTP {}",
            url, status
        )));
    }

    let raw = response.text().await?;
    let body = html::extract_main_content(&raw);
    if body.trim().is_empty() {
        return Err(StockRagError::Extract(format!(
            "{} produced no readable text",
            url
        )));
    }

    Ok(SourceDocument {
        source,
        source_id: url.to_string(),
        source_url: Some(url.to_string()),
        title: html::extract_title(&raw),
        published_at: Utc::now(),
        content_type: "text/html".to_string(),
        body,
        metadata_json: "{}".to_string(),
    })
}
