//! # stockrag CLI
//!
//! Command-line interface to the stockrag knowledge base. Every command
//! operates on one company, identified by `--ticker` and `--company`.
//!
//! ## Usage
//!
//! ```bash
//! stockrag --ticker AAPL --company "Apple Inc." <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `stockrag init` | Create the per-ticker collection and run migrations |
//! | `stockrag load reports <files>` | Load local annual-report files (PDF or text) |
//! | `stockrag load filings` | Pull recent SEC filings from EDGAR |
//! | `stockrag load website <urls>` | Load company web pages |
//! | `stockrag load news <urls>` | Load news releases |
//! | `stockrag index build` | Embed loaded chunks and build the vector index |
//! | `stockrag index load` | Verify an existing index |
//! | `stockrag query "<question>"` | Ask a question against the knowledge base |
//! | `stockrag update` | Incrementally refresh data and re-embed |
//! | `stockrag stats` | Show knowledge-base statistics |
//!
//! ## Examples
//!
//! ```bash
//! export GROQ_API_KEY=gsk_...
//!
//! stockrag --ticker AAPL --company "Apple Inc." init
//! stockrag --ticker AAPL --company "Apple Inc." load reports ./reports/fy2024.pdf
//! stockrag --ticker AAPL --company "Apple Inc." load filings --types 10-K --types 10-Q
//! stockrag --ticker AAPL --company "Apple Inc." index build
//! stockrag --ticker AAPL --company "Apple Inc." query "How did revenue change?"
//! stockrag --ticker AAPL --company "Apple Inc." query "Any product news?" --source news
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stockrag::models::Source;
use stockrag::{config, context, index, loaders, maintenance, query};

/// stockrag — retrieval-augmented question answering over a company's
/// filings, reports, and announcements.
#[derive(Parser)]
#[command(
    name = "stockrag",
    about = "Retrieval-augmented Q&A over a company's filings, reports, and announcements",
    version
)]
struct Cli {
    /// Stock ticker symbol (e.g. AAPL).
    #[arg(long, global = true, default_value = "")]
    ticker: String,

    /// Company name (e.g. "Apple Inc.").
    #[arg(long, global = true, default_value = "")]
    company: String,

    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the per-ticker collection and run schema migrations.
    ///
    /// Idempotent: re-running against an existing collection is safe.
    Init,

    /// Load documents into the knowledge base.
    Load {
        #[command(subcommand)]
        source: LoadSource,
    },

    /// Build or verify the vector index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Ask a question against the built index.
    Query {
        /// The question to answer.
        question: String,

        /// Restrict retrieval to one source type:
        /// annual_report, sec_filing, website, or news.
        #[arg(long)]
        source: Option<Source>,
    },

    /// Incrementally load new data and re-embed what changed.
    Update {
        /// Annual-report file to (re)load. Repeatable.
        #[arg(long = "report")]
        reports: Vec<PathBuf>,

        /// Company web page URL to (re)load. Repeatable.
        #[arg(long = "url")]
        urls: Vec<String>,

        /// News release URL to (re)load. Repeatable.
        #[arg(long = "news")]
        news: Vec<String>,
    },

    /// Show knowledge-base statistics.
    Stats,
}

/// Document loading subcommands.
#[derive(Subcommand)]
enum LoadSource {
    /// Load local annual-report files (PDF or plain text).
    Reports {
        /// Paths to report files.
        files: Vec<PathBuf>,
    },

    /// Pull recent filings from SEC EDGAR for the ticker.
    Filings {
        /// Filing form types to fetch, comma separated or repeated
        /// (e.g. `--types 10-K,10-Q`).
        #[arg(long = "types", value_delimiter = ',', default_values = ["10-K", "10-Q"])]
        types: Vec<String>,

        /// Most recent filings to fetch per form type.
        #[arg(long, default_value = "3")]
        limit: usize,
    },

    /// Load pages from the company website.
    Website {
        /// Page URLs.
        urls: Vec<String>,
    },

    /// Load news releases / press pages.
    News {
        /// Page URLs.
        urls: Vec<String>,
    },
}

/// Index subcommands.
#[derive(Subcommand)]
enum IndexAction {
    /// Embed loaded chunks and record the build.
    Build,
    /// Verify that an index has already been built.
    Load,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let rag_config = match &cli.config {
        Some(path) => Some(config::load_config(path)?),
        None => None,
    };

    let ctx = context::create_context(&cli.ticker, &cli.company, rag_config).await?;

    match cli.command {
        Commands::Init => {
            println!(
                "Initialized collection '{}' at {}",
                ctx.collection_name,
                ctx.persist_path.display()
            );
        }
        Commands::Load { source } => {
            let report = match source {
                LoadSource::Reports { files } => loaders::load_annual_reports(&ctx, &files).await?,
                LoadSource::Filings { types, limit } => {
                    loaders::load_sec_filings(&ctx, &types, limit).await?
                }
                LoadSource::Website { urls } => loaders::load_company_website(&ctx, &urls).await?,
                LoadSource::News { urls } => loaders::load_news_releases(&ctx, &urls).await?,
            };
            println!(
                "Loaded {} document(s) ({} unchanged), {} chunk(s) written",
                report.documents_ingested, report.documents_unchanged, report.chunks_written
            );
        }
        Commands::Index { action } => match action {
            IndexAction::Build => {
                let report = index::build_index(&ctx).await?;
                println!(
                    "Index built: {} chunk(s) embedded, {} already up to date",
                    report.embedded, report.up_to_date
                );
            }
            IndexAction::Load => {
                index::load_existing_index(&ctx).await?;
                println!("Index for {} is ready.", ctx.ticker);
            }
        },
        Commands::Query { question, source } => {
            let engine = query::create_query_engine(&ctx).await?;
            let response = match source {
                Some(s) => engine.query_with_filters(&ctx, &question, s).await?,
                None => engine.query(&ctx, &question).await?,
            };

            println!("{}\n", response.answer);
            println!("Sources:");
            for (i, chunk) in response.sources.iter().enumerate() {
                println!(
                    "  [{}] {} — {} (score {:.3})",
                    i + 1,
                    chunk.source,
                    chunk.title.as_deref().unwrap_or("untitled"),
                    chunk.score
                );
            }
        }
        Commands::Update {
            reports,
            urls,
            news,
        } => {
            let report = maintenance::update_with_new_data(&ctx, &reports, &urls, &news).await?;
            println!(
                "Update complete: {} document(s) ingested, {} unchanged, {} chunk(s) embedded",
                report.documents_ingested, report.documents_unchanged, report.chunks_embedded
            );
        }
        Commands::Stats => {
            let stats = maintenance::get_stats(&ctx).await?;
            println!("Knowledge base for {} ({})", stats.ticker, stats.collection_name);
            println!("  Location:  {}", stats.persist_path.display());
            println!("  Size:      {}", maintenance::format_bytes(stats.db_size_bytes));
            println!("  Documents: {}", stats.documents);
            println!("  Chunks:    {} ({} embedded)", stats.chunks, stats.embedded_chunks);
            if !stats.by_source.is_empty() {
                println!("  By source:");
                for b in &stats.by_source {
                    println!(
                        "    {:<14} {} document(s), {} chunk(s), {} embedded",
                        b.source, b.documents, b.chunks, b.embedded_chunks
                    );
                }
            }
        }
    }

    ctx.close().await;
    Ok(())
}
