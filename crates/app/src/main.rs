mod server;

use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_qa_core::{
    AnswerAssembler, AnswerModel, GeminiConfig, GeminiModel, IngestStatus, IngestionOptions,
    IngestionReport, Ingestor, LocalBucketSource, ObjectRef, QuestionAnswerer, Retriever,
    RetrievalOptions, SqliteChunkStore, DEFAULT_GEMINI_MODEL,
};
use server::AppState;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://pdf_qa.db")]
    database_url: String,

    /// Directory whose subdirectories act as buckets
    #[arg(long, env = "BUCKET_ROOT", default_value = "./buckets")]
    bucket_root: String,

    /// Gemini API key; answers fall back to a configuration message when unset
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    gemini_model: String,

    /// Soft cap on chunk length, in characters
    #[arg(long, default_value = "1000")]
    chunk_size: usize,

    /// Characters carried from one chunk into the next
    #[arg(long, default_value = "100")]
    chunk_overlap: usize,

    /// Number of chunks retrieved as answer context
    #[arg(long, default_value = "5")]
    num_chunks: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Create the chunk table and keyword index if missing.
    Migrate,
    /// Ingest one object from a bucket.
    Ingest {
        /// Bucket name (a directory under the bucket root).
        #[arg(long)]
        bucket: String,
        /// Object name inside the bucket.
        #[arg(long)]
        name: String,
    },
    /// Ingest every PDF found recursively in a bucket.
    IngestFolder {
        /// Bucket name (a directory under the bucket root).
        #[arg(long)]
        bucket: String,
    },
    /// Answer a question from the stored chunks.
    Ask {
        /// Question text
        #[arg(long)]
        query: String,
        /// Print the retrieved context before the answer.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
    /// Serve the HTTP API.
    Serve {
        /// Address to bind
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: String,
    },
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
        "pdf-qa boot"
    );

    let store = Arc::new(
        SqliteChunkStore::connect(&cli.database_url)
            .await
            .map_err(|error| anyhow::anyhow!(error.to_string()))?,
    );
    store
        .migrate()
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let options = IngestionOptions {
        chunk_size: cli.chunk_size,
        overlap: cli.chunk_overlap,
    };
    let objects = Arc::new(LocalBucketSource::new(&cli.bucket_root));
    let ingestor = Ingestor::new(objects, store.clone(), options)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let model = GeminiConfig::from_optional_key(cli.gemini_api_key.as_deref(), &cli.gemini_model)
        .map(|config| Arc::new(GeminiModel::new(config)) as Arc<dyn AnswerModel + Send + Sync>);
    if model.is_none() {
        warn!("GEMINI_API_KEY not set; answers will report a configuration error");
    }
    let retriever = Retriever::with_options(
        store.clone(),
        RetrievalOptions {
            num_chunks: cli.num_chunks,
        },
    );
    let answerer = QuestionAnswerer::new(retriever, AnswerAssembler::from_optional(model));

    match cli.command {
        Command::Migrate => {
            println!("schema ready at {}", cli.database_url);
        }
        Command::Ingest { bucket, name } => {
            let report = ingestor.ingest(&ObjectRef::new(bucket, name)).await;
            print_report(&report);
        }
        Command::IngestFolder { bucket } => {
            let reports = ingestor
                .ingest_bucket(&bucket)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let failed = reports
                .iter()
                .filter(|report| report.status == IngestStatus::Failed)
                .count();
            if failed > 0 {
                warn!(failed, bucket = %bucket, "some documents failed");
            }
            for report in &reports {
                print_report(report);
            }
            let chunks: usize = reports.iter().map(|report| report.chunks_written).sum();
            println!(
                "{} documents, {} chunks ingested at {}",
                reports.len(),
                chunks,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask {
            query,
            show_context,
        } => {
            let trace = answerer
                .ask_traced(&query)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if show_context {
                for (index, chunk) in trace.context.iter().enumerate() {
                    println!("[context {}]\n{chunk}\n", index + 1);
                }
            }

            let states = trace
                .states
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            info!(states = %states, context_chunks = trace.context.len(), "query finished");
            println!("{}", trace.outcome.message());
        }
        Command::Serve { bind } => {
            let state = AppState {
                ingestor: Arc::new(ingestor),
                answerer: Arc::new(answerer),
            };
            server::run_server(&bind, state).await?;
        }
    }

    store.close().await;
    Ok(())
}

fn print_report(report: &IngestionReport) {
    println!(
        "{}: {} (pages={}, chunks={})",
        report.document_name,
        report.status_message(),
        report.pages_extracted,
        report.chunks_written
    );
    if let Some(reason) = &report.reason {
        println!("  reason: {reason}");
    }
    if let Some(checksum) = &report.checksum {
        println!("  sha256: {checksum}");
    }
    for failure in &report.page_failures {
        println!("  page {} skipped: {}", failure.page_number, failure.reason);
    }
}
