use chrono::Utc;
use clap::{Parser, Subcommand};
use docdex_core::{
    assemble_results, build_exact_query, build_fuzzy_query, build_match_all_query, BatchIndexer,
    DocumentStore, ExtractionCoordinator, Fuzziness, HighlightConfig, NewFilesScanner, OcrConfig,
    Operator, RemoteOcrExtractor, TextLayerExtractor, DEFAULT_MAX_WORKERS,
};
use docdex_core::OpenSearchStore;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docdex", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenSearch base URL
    #[arg(long, env = "DOCDEX_OPENSEARCH_URL", default_value = "http://localhost:9200")]
    opensearch_url: String,

    /// OpenSearch index name
    #[arg(long, env = "DOCDEX_INDEX", default_value = "pdfs")]
    index: String,

    /// HTTP OCR service endpoint; OCR fallback is disabled when unset
    #[arg(long, env = "DOCDEX_OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// Bearer token for the OCR service
    #[arg(long, env = "DOCDEX_OCR_API_KEY")]
    ocr_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract and index every PDF under a directory tree.
    Ingest {
        /// Root directory scanned recursively for PDFs.
        #[arg(long)]
        folder: String,
        /// Concurrent extraction/indexing workers.
        #[arg(long, default_value_t = DEFAULT_MAX_WORKERS)]
        max_workers: usize,
    },
    /// Index only files not yet present in the store.
    CheckNew {
        #[arg(long)]
        folder: String,
    },
    /// Fuzzy search against page content.
    Search {
        /// Search term; omit to list all documents.
        #[arg(long)]
        term: Option<String>,
        /// Allowed edit distance: AUTO, 0, 1 or 2.
        #[arg(long, default_value = "AUTO")]
        fuzziness: String,
        /// Term combination: AND or OR.
        #[arg(long, default_value = "OR")]
        operator: String,
    },
    /// Exact phrase search against page content.
    SearchExact {
        #[arg(long)]
        term: Option<String>,
    },
    /// Fetch one document by its relative path.
    Get {
        #[arg(long)]
        id: String,
    },
    /// List all indexed documents.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = Arc::new(OpenSearchStore::new(&cli.opensearch_url, &cli.index));
    let ocr = match &cli.ocr_endpoint {
        Some(endpoint) => RemoteOcrExtractor::new(OcrConfig {
            endpoint: endpoint.clone(),
            api_key: cli.ocr_api_key.clone(),
        }),
        None => RemoteOcrExtractor::disabled(),
    };
    let coordinator = Arc::new(ExtractionCoordinator::new(TextLayerExtractor, ocr));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        index = %cli.index,
        "docdex boot"
    );

    match cli.command {
        Command::Ingest {
            folder,
            max_workers,
        } => {
            ensure_index(store.as_ref()).await?;
            let summary = BatchIndexer::new(Arc::clone(&store), coordinator)
                .with_max_workers(max_workers)
                .process_directory(Path::new(&folder))
                .await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::CheckNew { folder } => {
            ensure_index(store.as_ref()).await?;
            let report = NewFilesScanner::new(Arc::clone(&store), coordinator)
                .find_and_process_new_files(Path::new(&folder))
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Search {
            term,
            fuzziness,
            operator,
        } => {
            let fuzziness: Fuzziness = fuzziness
                .parse()
                .map_err(|error| anyhow::anyhow!("{error}"))?;
            let operator: Operator = operator
                .parse()
                .map_err(|error| anyhow::anyhow!("{error}"))?;

            let query = match term.as_deref() {
                Some(term) => {
                    build_fuzzy_query(term, fuzziness, operator, &HighlightConfig::default())
                }
                None => build_match_all_query(),
            };

            run_search(store.as_ref(), &query, term.as_deref()).await?;
        }
        Command::SearchExact { term } => {
            let query = match term.as_deref() {
                Some(term) => build_exact_query(term, &HighlightConfig::default()),
                None => build_match_all_query(),
            };

            run_search(store.as_ref(), &query, term.as_deref()).await?;
        }
        Command::Get { id } => match store.get_by_id(&id).await {
            Ok(Some(record)) => {
                let projection = json!({
                    "filename": record.filename,
                    "relative_path": record.relative_path,
                    "total_pages": record.total_pages,
                    "metadata": record.metadata,
                    "pages": record.pages,
                });
                println!("{}", serde_json::to_string_pretty(&projection)?);
            }
            Ok(None) => {
                println!("{}", json!({"error": format!("document not found: {id}")}));
            }
            Err(error) => {
                println!("{}", json!({"error": error.to_string()}));
            }
        },
        Command::List => {
            let query = build_match_all_query();
            run_search(store.as_ref(), &query, None).await?;
        }
    }

    Ok(())
}

async fn ensure_index(store: &OpenSearchStore) -> anyhow::Result<()> {
    let exists = store
        .index_exists()
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    if !exists {
        info!(index = %store.index_name(), "creating index");
        store
            .create_index()
            .await
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    }

    Ok(())
}

async fn run_search(
    store: &OpenSearchStore,
    query: &serde_json::Value,
    term: Option<&str>,
) -> anyhow::Result<()> {
    let response = store
        .search(query)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let results = assemble_results(&response, term);
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
