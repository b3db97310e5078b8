use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tracing::{error, info};

use flowlog_indexer::config::LogFormat;
use flowlog_indexer::logging::init_logging;
use flowlog_indexer::{
    handle_event, render_response, Dependencies, IndexerConfig, IndexingError,
};
use flowlog_indexer_repository::BulkIndexProvider;
use flowlog_indexer_shared::ObjectCreatedEvent;

#[derive(Parser)]
#[command(name = "flowlog-indexer")]
#[command(about = "Index compressed flow-log objects into OpenSearch", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one object-created notification and print the response
    Ingest {
        /// Path of the notification document, `-` for stdin
        #[arg(long, default_value = "-")]
        event: PathBuf,
    },
    /// Check that the OpenSearch cluster is reachable and healthy
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match IndexerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_logging(LogFormat::Json);
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.log_format);

    let result = match cli.command {
        Commands::Ingest { event } => ingest(&config, &event).await,
        Commands::Health => health(&config).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Indexer failed");
            ExitCode::FAILURE
        }
    }
}

/// Run one invocation; `Ok(true)` when it succeeded.
async fn ingest(config: &IndexerConfig, event_path: &Path) -> Result<bool, IndexingError> {
    let deadline = config.invocation_timeout.map(|timeout| Instant::now() + timeout);
    info!(
        received_at = %Utc::now().to_rfc3339(),
        source = %event_path.display(),
        "Invocation started"
    );

    let input = read_event(event_path).await?;
    let event = ObjectCreatedEvent::from_json(&input)?;

    let dependencies = Dependencies::init(config).await?;
    let response = handle_event(&dependencies.orchestrator, &event, deadline).await;

    println!("{}", render_response(&response)?);
    Ok(response.is_success())
}

async fn read_event(path: &Path) -> Result<String, IndexingError> {
    if path.as_os_str() == "-" {
        let mut input = String::new();
        tokio::io::stdin().read_to_string(&mut input).await?;
        Ok(input)
    } else {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// Check the backend; `Ok(true)` when the cluster is green or yellow.
async fn health(config: &IndexerConfig) -> Result<bool, IndexingError> {
    let dependencies = Dependencies::init(config).await?;
    let healthy = dependencies.index_provider.health_check().await?;

    if healthy {
        info!("OpenSearch cluster is healthy");
    } else {
        error!("OpenSearch cluster is unhealthy");
    }
    Ok(healthy)
}
