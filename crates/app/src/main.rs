use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use directory_rag_core::{
    filter_companies, list_companies, CharacterNgramEmbedder, Collector, CollectorOptions,
    Embedder, HttpFetcher, Indexer, IndexingOptions, ItemOutcome, LocalStore, OpenAiEmbedder,
    QdrantStore, QueryHistory, QueryRecord, SearchHit, VectorStore, WebDriverRenderer,
    DEFAULT_COLLECTION_NAME,
    DEFAULT_LISTING_URL, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, DEFAULT_TOP_K,
};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type DynEmbedder = Box<dyn Embedder + Send + Sync>;
type DynStore = Box<dyn VectorStore + Send + Sync>;

#[derive(Parser)]
#[command(name = "directory-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vector store backend
    #[arg(long, value_enum, default_value_t = StoreKind::Local)]
    store: StoreKind,

    /// Directory holding local collections
    #[arg(long, default_value = "./imda_vectordb")]
    store_dir: String,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Collection name
    #[arg(long, default_value = DEFAULT_COLLECTION_NAME)]
    collection: String,

    /// Embedding provider
    #[arg(long, value_enum, default_value_t = EmbedderKind::Openai)]
    embedder: EmbedderKind,

    /// API key for the OpenAI embedding provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    /// Embedding model name
    #[arg(long, default_value = DEFAULT_OPENAI_MODEL)]
    embedding_model: String,

    /// JSON-lines file recording answered queries
    #[arg(long, default_value = "logs/query_history.jsonl")]
    history_file: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    Local,
    Qdrant,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    Openai,
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the company directory and rebuild the collection.
    Scrape {
        /// Listing URL of the directory.
        #[arg(long, default_value = DEFAULT_LISTING_URL)]
        url: String,
        /// WebDriver endpoint used to render listing pages.
        #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
        webdriver_url: String,
        /// Show the browser window instead of running headless.
        #[arg(long, default_value_t = false)]
        headed: bool,
    },
    /// Query the collection for the closest companies.
    Search {
        /// Natural-language query.
        #[arg(long)]
        query: String,
        /// Number of chunks to return.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// User recorded in the query history.
        #[arg(long, env = "USER_EMAIL", default_value = "anonymous")]
        user: String,
    },
    /// List the companies in the collection.
    Directory {
        /// Only list companies whose name contains this text (case-insensitive).
        #[arg(long)]
        search: Option<String>,
    },
    /// Inspect or prune the query history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print a user's recorded queries, newest first.
    List {
        #[arg(long, env = "USER_EMAIL", default_value = "anonymous")]
        user: String,
    },
    /// Delete the entries a user logged at a timestamp.
    Delete {
        /// RFC 3339 timestamp of the entry.
        #[arg(long)]
        timestamp: DateTime<Utc>,
        #[arg(long)]
        user: String,
    },
}

fn build_embedder(cli: &Cli) -> anyhow::Result<DynEmbedder> {
    let embedder: DynEmbedder = match cli.embedder {
        EmbedderKind::Ngram => Box::new(CharacterNgramEmbedder::default()),
        EmbedderKind::Openai => {
            let api_key = cli
                .openai_api_key
                .clone()
                .context("OPENAI_API_KEY is required for the openai embedder")?;
            Box::new(OpenAiEmbedder::new(
                api_key,
                &cli.openai_base_url,
                cli.embedding_model.clone(),
                None,
                Duration::from_secs(60),
            )?)
        }
    };
    Ok(embedder)
}

fn build_store(cli: &Cli) -> DynStore {
    match cli.store {
        StoreKind::Local => Box::new(LocalStore::new(&cli.store_dir)),
        StoreKind::Qdrant => Box::new(QdrantStore::new(&cli.qdrant_url)),
    }
}

fn render_hits(hits: &[SearchHit]) -> String {
    let mut rendered = String::new();
    for (rank, hit) in hits.iter().enumerate() {
        rendered.push_str(&format!(
            "{}. {} [{}] score={:.4}\n",
            rank + 1,
            hit.metadata.name,
            hit.metadata.category,
            hit.score
        ));
        if !hit.metadata.website.is_empty() {
            rendered.push_str(&format!("   website={}\n", hit.metadata.website));
        }
        rendered.push_str(&format!("{}\n", hit.text));
    }
    rendered
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "directory-rag boot"
    );

    match &cli.command {
        Command::Scrape {
            url,
            webdriver_url,
            headed,
        } => {
            let indexer = Indexer::new(
                build_embedder(&cli)?,
                build_store(&cli),
                IndexingOptions::default(),
            );

            let options = CollectorOptions::default();
            let renderer = WebDriverRenderer::new(webdriver_url, !headed, &options)?;
            let fetcher = HttpFetcher::new(&options)?;
            let collector = Collector::new(renderer, fetcher, options);

            let report = collector.collect(url).await;
            for outcome in report.skipped() {
                if let ItemOutcome::Skipped { url, page, reason } = outcome {
                    warn!(url = %url, page, reason = %reason, "skipped");
                }
            }
            println!(
                "pages {}..={}: {} companies collected, {} skipped",
                report.range.first,
                report.range.last,
                report.records.len(),
                report.skipped().count()
            );

            let handle = indexer
                .build_index(&report.records, &cli.collection)
                .await
                .context("failed to rebuild collection")?;

            println!(
                "{} chunks indexed into `{}` at {}",
                handle.chunk_count(),
                handle.name(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Search { query, top_k, user } => {
            let indexer = Indexer::new(
                build_embedder(&cli)?,
                build_store(&cli),
                IndexingOptions::default(),
            );
            let handle = indexer.open(&cli.collection).await?;

            let started = Instant::now();
            let hits = handle.search(query, *top_k).await?;
            let response = render_hits(&hits);

            println!("query: {query}");
            if hits.is_empty() {
                println!("no matching companies");
            } else {
                print!("{response}");
            }

            let history = QueryHistory::new(&cli.history_file);
            let record = QueryRecord::new(user.clone(), query.clone(), &response, started.elapsed());
            if let Err(error) = history.append(&record).await {
                warn!(path = %history.path().display(), %error, "failed to save query history");
            }
        }
        Command::Directory { search } => {
            let store = build_store(&cli);
            let companies = list_companies(&store, &cli.collection).await?;
            let total = companies.len();
            let companies = match search {
                Some(term) => filter_companies(companies, term),
                None => companies,
            };

            for company in &companies {
                if company.name.is_empty() {
                    println!("(unnamed)");
                } else {
                    println!("{}", company.name);
                }
                println!("  category={} subcategory={}", company.category, company.subcategory);
                if !company.website.is_empty() {
                    println!("  website={}", company.website);
                }
                if !company.contact.is_empty() {
                    println!("  contact={}", company.contact);
                }
                if !company.tags.is_empty() {
                    println!("  tags={}", company.tags);
                }
            }
            println!(
                "{} of {} companies in `{}`",
                companies.len(),
                total,
                cli.collection
            );
        }
        Command::History { action } => {
            let history = QueryHistory::new(&cli.history_file);
            match action {
                HistoryAction::List { user } => {
                    let entries = history.entries_for(user).await?;
                    if entries.is_empty() {
                        println!("no searches recorded for {user}");
                    }
                    for entry in entries {
                        println!(
                            "{} time={:.2}s query={}",
                            entry.timestamp.to_rfc3339(),
                            entry.response_time_secs,
                            entry.query
                        );
                        println!("{}", entry.response.trim_end());
                        println!();
                    }
                }
                HistoryAction::Delete { timestamp, user } => {
                    let removed = history.delete(*timestamp, user).await?;
                    println!("{removed} history entries deleted");
                }
            }
        }
    }

    Ok(())
}
