//! archivist CLI entry point

use archivist::commands::{
    cmd_ingest_dir, cmd_init, cmd_push, cmd_query, cmd_status, print_query_results,
    print_status, print_sync_report,
};
use archivist::config::Config;
use archivist::controller::DocumentController;
use archivist::embed::{Embedder, HttpEmbedder};
use archivist::error::{Error, Result};
use archivist::events::{FileObserver, LogObserver};
use archivist::remote::BackendClient;
use archivist::sync::SyncService;
use archivist::validate::PreInsertCheck;
use archivist::vector::VectorIndex;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "archivist")]
#[command(version, about = "Track parsed documents and sync them to a remote archive and vector index", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize archivist configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest documents from a local directory
    Ingest {
        /// Path to directory
        path: PathBuf,

        /// Output directory for derived artifacts (defaults to <base>/parsed_docs)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tag names to attach to every ingested document
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// Push pending documents to the remote archive
    Push {
        /// Also push documents the remote already holds, as updates
        #[arg(long)]
        merge: bool,
    },

    /// Query the vector index
    Query {
        /// The search query
        text: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,

        /// Namespace to query (defaults to the configured one)
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Show local store status
    Status,

    /// Attach a tag to the document with the given hash
    Tag {
        /// Content hash of the document
        doc_hash: String,

        /// Tag name to attach
        name: String,
    },

    /// Reset sync flags on all documents to force a full re-sync
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Delete all vectors in a namespace
    Purge {
        /// Namespace to purge (defaults to the configured one)
        #[arg(long)]
        namespace: Option<String>,

        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },

    /// Delete all local documents (cascades to chunks)
    DeleteAll {
        /// Confirm the delete
        #[arg(long)]
        yes: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Init and completions run without loaded config
    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.and_then(|p| p.parent().map(PathBuf::from));
        let config = cmd_init(base_dir, force).await?;
        println!("✓ archivist initialized successfully");
        println!("  Config: {}", config.paths.config_file.display());
        println!("\nNext steps:");
        println!("  1. Edit the config file and export the credential env vars");
        println!("  2. Ingest docs: archivist ingest /path/to/docs");
        println!("  3. Sync: archivist push");
        return Ok(());
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "archivist", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Ingest { path, output, tag } => {
            let remote = match BackendClient::connect(&config.remote) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!("Remote client unavailable, pre-insert check disabled: {}", e);
                    None
                }
            };
            let controller = build_controller(&config, remote).await?;
            let embedder = HttpEmbedder::new(&config.embedding)?;
            let output = output.unwrap_or_else(|| config.paths.base_dir.join("parsed_docs"));

            let stats =
                cmd_ingest_dir(&config, &controller, &embedder, &path, &output, &tag).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("\n✓ Ingestion complete");
                println!("  Documents ingested: {}", stats.docs_ingested);
                println!("  Documents skipped: {}", stats.docs_skipped);
                println!("  Chunks created: {}", stats.chunks_created);
            }
        }

        Commands::Push { merge } => {
            let remote = Arc::new(BackendClient::connect(&config.remote)?);
            let controller = Arc::new(build_controller(&config, Some(remote.clone())).await?);
            let vector = build_vector_index(&config).await?;

            let service = SyncService::new(controller, remote, vector, &config.vector.namespace);
            let report = cmd_push(&service, merge).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_sync_report(&report);
            }

            if !report.is_clean() {
                std::process::exit(1);
            }
        }

        Commands::Query {
            text,
            top_k,
            namespace,
        } => {
            let index = build_vector_index(&config)
                .await?
                .ok_or_else(|| Error::Config("vector index is disabled in config".to_string()))?;
            let namespace = namespace.unwrap_or_else(|| config.vector.namespace.clone());

            let matches = cmd_query(&index, &text, top_k, &namespace).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                print_query_results(&matches);
            }
        }

        Commands::Status => {
            let controller = build_controller(&config, None).await?;
            let stats = cmd_status(&controller).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_status(&stats);
            }
        }

        Commands::Tag { doc_hash, name } => {
            let controller = build_controller(&config, None).await?;
            let doc = controller.add_tag_to_document_by_hash(&doc_hash, &name).await?;
            println!("✓ Tagged '{}' with '{}'", doc.title, name);
        }

        Commands::Reset { yes } => {
            if !yes {
                eprintln!("This resets sync flags on every document. Re-run with --yes to confirm.");
                std::process::exit(1);
            }
            let controller = build_controller(&config, None).await?;
            let count = controller.mark_all_documents_not_uploaded().await?;
            println!("✓ Reset sync flags on {} documents", count);
        }

        Commands::Purge { namespace, yes } => {
            if !yes {
                eprintln!("This deletes every vector in the namespace. Re-run with --yes to confirm.");
                std::process::exit(1);
            }
            let index = build_vector_index(&config)
                .await?
                .ok_or_else(|| Error::Config("vector index is disabled in config".to_string()))?;
            let namespace = namespace.unwrap_or_else(|| config.vector.namespace.clone());
            index.purge_namespace(&namespace).await?;
            println!("✓ Purged namespace '{}'", namespace);
        }

        Commands::DeleteAll { yes } => {
            if !yes {
                eprintln!("This deletes every local document and chunk. Re-run with --yes to confirm.");
                std::process::exit(1);
            }
            let controller = build_controller(&config, None).await?;
            let deleted = controller.delete_all_documents().await?;
            println!("✓ Deleted {} documents", deleted);
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_from(None),
    }
}

/// Open the controller with observers, and the pre-insert check when a
/// remote client is supplied
async fn build_controller(
    config: &Config,
    remote: Option<Arc<BackendClient>>,
) -> Result<DocumentController> {
    let mut controller = DocumentController::connect(config).await?;
    controller.add_observer(Arc::new(LogObserver));
    controller.add_observer(Arc::new(FileObserver::new(config.paths.event_log.clone())));

    if config.validation.check_remote_on_create {
        if let Some(client) = remote {
            controller = controller.with_precheck(PreInsertCheck::new(
                client,
                config.validation.on_check_failure,
            ));
        }
    }

    Ok(controller)
}

async fn build_vector_index(config: &Config) -> Result<Option<Arc<VectorIndex>>> {
    if !config.vector.enabled {
        return Ok(None);
    }

    let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(&config.embedding)?);
    let index = VectorIndex::connect(&config.vector, embedder).await?;
    Ok(Some(Arc::new(index)))
}
