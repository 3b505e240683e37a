//! SEC EDGAR filing retrieval.
//!
//! Resolves a ticker to its CIK through the SEC's public ticker map, reads
//! the company's submissions index from `data.sec.gov`, and downloads the
//! primary document of the most recent filings of the requested form types.
//! EDGAR requires a descriptive `User-Agent` on every request.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Result, StockRagError};
use crate::loaders::html::extract_main_content;
use crate::models::{Source, SourceDocument};

const TICKER_MAP_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const USER_AGENT: &str = concat!("stockrag/", env!("CARGO_PKG_VERSION"), " (research tool)");

/// Retries for transient EDGAR failures (429/5xx), with 1s/2s/4s backoff.
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
}

#[derive(Debug, Deserialize)]
struct Submissions {
    filings: Filings,
}

#[derive(Debug, Deserialize)]
struct Filings {
    recent: RecentFilings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    accession_number: Vec<String>,
    form: Vec<String>,
    filing_date: Vec<String>,
    primary_document: Vec<String>,
}

/// One filing selected from the submissions index.
#[derive(Debug, Clone)]
struct FilingRef {
    accession_number: String,
    form: String,
    filing_date: String,
    primary_document: String,
}

/// Fetch the most recent filings of the requested form types for a ticker.
pub async fn fetch_filings(
    ticker: &str,
    filing_types: &[String],
    limit_per_type: usize,
) -> Result<Vec<SourceDocument>> {
    if filing_types.is_empty() {
        return Err(StockRagError::Configuration(
            "at least one filing type is required (e.g. 10-K, 10-Q)".to_string(),
        ));
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()?;

    let cik = lookup_cik(&client, ticker).await?;
    let submissions = fetch_submissions(&client, cik).await?;
    let selected = select_filings(&submissions.filings.recent, filing_types, limit_per_type);

    if selected.is_empty() {
        return Err(StockRagError::Extract(format!(
            "no filings of type(s) {} found for {}",
            filing_types.join(", "),
            ticker
        )));
    }

    let mut docs = Vec::with_capacity(selected.len());
    for filing in &selected {
        match fetch_filing_document(&client, cik, filing).await {
            Ok(doc) => docs.push(doc),
            Err(e) => eprintln!(
                "Warning: skipping filing {} ({}): {}",
                filing.accession_number, filing.form, e
            ),
        }
    }

    if docs.is_empty() {
        return Err(StockRagError::Extract(format!(
            "all {} selected filings failed to download",
            selected.len()
        )));
    }

    Ok(docs)
}

async fn lookup_cik(client: &reqwest::Client, ticker: &str) -> Result<u64> {
    let body = get_with_retry(client, TICKER_MAP_URL).await?;
    let entries: HashMap<String, TickerEntry> = serde_json::from_str(&body)
        .map_err(|e| StockRagError::Extract(format!("unexpected ticker map format: {}", e)))?;

    entries
        .values()
        .find(|entry| entry.ticker.eq_ignore_ascii_case(ticker))
        .map(|entry| entry.cik_str)
        .ok_or_else(|| {
            StockRagError::Configuration(format!("ticker '{}' not found in SEC EDGAR", ticker))
        })
}

async fn fetch_submissions(client: &reqwest::Client, cik: u64) -> Result<Submissions> {
    let url = format!("https://data.sec.gov/submissions/CIK{:010}.json", cik);
    let body = get_with_retry(client, &url).await?;
    serde_json::from_str(&body)
        .map_err(|e| StockRagError::Extract(format!("unexpected submissions format: {}", e)))
}

/// Pick up to `limit_per_type` most recent filings of each requested form.
/// The recent-filings arrays are parallel and already newest-first.
fn select_filings(
    recent: &RecentFilings,
    filing_types: &[String],
    limit_per_type: usize,
) -> Vec<FilingRef> {
    let mut selected = Vec::new();
    let mut taken: HashMap<&str, usize> = HashMap::new();

    let n = recent
        .form
        .len()
        .min(recent.accession_number.len())
        .min(recent.filing_date.len())
        .min(recent.primary_document.len());

    for i in 0..n {
        let form = recent.form[i].as_str();
        let Some(requested) = filing_types
            .iter()
            .find(|t| t.eq_ignore_ascii_case(form))
        else {
            continue;
        };

        let count = taken.entry(requested.as_str()).or_insert(0);
        if *count >= limit_per_type {
            continue;
        }
        *count += 1;

        selected.push(FilingRef {
            accession_number: recent.accession_number[i].clone(),
            form: recent.form[i].clone(),
            filing_date: recent.filing_date[i].clone(),
            primary_document: recent.primary_document[i].clone(),
        });
    }

    selected
}

async fn fetch_filing_document(
    client: &reqwest::Client,
    cik: u64,
    filing: &FilingRef,
) -> Result<SourceDocument> {
    let accession_compact = filing.accession_number.replace('-', "");
    let url = format!(
        "https://www.sec.gov/Archives/edgar/data/{}/{}/{}",
        cik, accession_compact, filing.primary_document
    );

    let raw = get_with_retry(client, &url).await?;

    let is_html = filing.primary_document.ends_with(".htm")
        || filing.primary_document.ends_with(".html");
    let body = if is_html {
        extract_main_content(&raw)
    } else {
        raw
    };

    if body.trim().is_empty() {
        return Err(StockRagError::Extract(format!(
            "filing {} produced no text",
            filing.accession_number
        )));
    }

    let published_at = parse_filing_date(&filing.filing_date);

    Ok(SourceDocument {
        source: Source::SecFiling,
        source_id: filing.accession_number.clone(),
        source_url: Some(url),
        title: Some(format!("{} filed {}", filing.form, filing.filing_date)),
        published_at,
        content_type: if is_html { "text/html" } else { "text/plain" }.to_string(),
        body,
        metadata_json: serde_json::json!({
            "form": filing.form,
            "filing_date": filing.filing_date,
        })
        .to_string(),
    })
}

fn parse_filing_date(date: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

/// GET with exponential backoff on 429/5xx and network errors.
async fn get_with_retry(client: &reqwest::Client, url: &str) -> Result<String> {
    let mut last_err: Option<StockRagError> = None;

    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.text().await?);
                }
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(StockRagError::Extract(format!(
                        "EDGAR returned {} for {}",
                        status, url
                    )));
                    continue;
                }
                return Err(StockRagError::Extract(format!(
                    "EDGAR returned {} for {}",
                    status, url
                )));
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| StockRagError::Extract(format!("request to {} failed", url))))
}
