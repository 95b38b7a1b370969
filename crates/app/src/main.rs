use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_archive_core::{
    BlobStore, ElasticIndex, LopdfExtractor, ReconciliationEngine, SearchGateway, MEDIA_TYPE_PDF,
};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-archive", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Elasticsearch base URL
    #[arg(long, default_value = "http://localhost:9200")]
    elastic_url: String,

    /// Elasticsearch index name
    #[arg(long, default_value = "pdf_documents")]
    elastic_index: String,

    /// Directory holding the stored PDF files
    #[arg(long, default_value = "./uploads")]
    uploads_dir: String,
}

#[derive(Subcommand)]
enum Command {
    /// List stored PDFs, newest first.
    List,
    /// Store a PDF and index its extracted text.
    Upload {
        /// Path of the PDF to store.
        #[arg(long)]
        file: String,
        /// Original name recorded in the index; defaults to the file's name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove a stored PDF and its index entries.
    Delete {
        /// Storage name as shown by `list`, for example 001.pdf.
        #[arg(long)]
        storage_name: String,
    },
    /// Full-text search over stored PDF content.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
    },
    /// Remove index entries whose file is gone from the uploads directory.
    Sync,
    /// Same sweep as sync, followed by an index refresh.
    Cleanup,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let blobs = BlobStore::open(&cli.uploads_dir)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let index = ElasticIndex::new(&cli.elastic_url, &cli.elastic_index)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        uploads_dir = %blobs.root().display(),
        elastic_index = %cli.elastic_index,
        "pdf-archive boot"
    );

    match cli.command {
        Command::List => {
            let records = blobs
                .list()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if records.is_empty() {
                println!("no stored pdfs");
            }
            for record in records {
                println!(
                    "{}  {} bytes  modified {}",
                    record.storage_name,
                    record.size_bytes,
                    record.modified_at.to_rfc3339()
                );
            }
        }
        Command::Upload { file, name } => {
            let path = Path::new(&file);
            let original_name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|value| value.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.clone())
            });
            let bytes = tokio::fs::read(path).await?;

            index
                .ensure_index()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let engine = ReconciliationEngine::new(blobs, index, LopdfExtractor);

            let receipt = engine
                .upload(&original_name, media_type_for(path), &bytes)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            match &receipt.warning {
                Some(warning) => println!(
                    "{} stored as {} ({warning})",
                    receipt.original_name, receipt.storage_name
                ),
                None => println!(
                    "{} stored as {} and indexed",
                    receipt.original_name, receipt.storage_name
                ),
            }
        }
        Command::Delete { storage_name } => {
            index
                .ensure_index()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let engine = ReconciliationEngine::new(blobs, index, LopdfExtractor);

            let removed = engine
                .delete(&storage_name)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if removed {
                println!("{storage_name} deleted");
            } else {
                println!("{storage_name} was not on disk; index entries cleaned up");
            }
        }
        Command::Search { query } => {
            index
                .ensure_index()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let gateway = SearchGateway::new(blobs, index);

            let matches = gateway
                .search(&query)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("query: {query}");
            if matches.is_empty() {
                println!("no matches");
            }
            for found in matches {
                println!(
                    "score={:.4} {} [{}]",
                    found.score, found.original_name, found.storage_name
                );
                for fragment in found.highlights {
                    println!("  {fragment}");
                }
            }
        }
        Command::Sync => {
            index
                .ensure_index()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let engine = ReconciliationEngine::new(blobs, index, LopdfExtractor);

            let report = engine
                .sync()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            print_report(&report);
        }
        Command::Cleanup => {
            index
                .ensure_index()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let engine = ReconciliationEngine::new(blobs, index, LopdfExtractor);

            let report = engine
                .cleanup()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            print_report(&report);
        }
    }

    Ok(())
}

fn media_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => MEDIA_TYPE_PDF,
        _ => "application/octet-stream",
    }
}

fn print_report(report: &pdf_archive_core::ReconcileReport) {
    println!(
        "{} files on disk, {} index entries scanned, {} orphaned entries removed",
        report.files_in_directory, report.documents_scanned, report.orphans_removed
    );
}
