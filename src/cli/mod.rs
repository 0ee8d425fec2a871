pub mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::runner::Worker;
use crate::storage::postgres::PostgresStore;

/// The worker exposes no commands beyond process start; every knob here is
/// an operational override on top of the config file and environment.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the worker identity reported to the job store
    #[arg(long)]
    pub worker_id: Option<String>,

    /// Enable debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Build the worker from configuration and run it until the process is killed
pub async fn run(args: Cli) -> Result<()> {
    let config = config::WorkerConfig::load(args.config.as_deref())?;

    let worker_id = args
        .worker_id
        .unwrap_or_else(crate::crawler::runner::generate_worker_id);

    info!("Worker identity: {}", worker_id);

    let store = Arc::new(PostgresStore::connect(&config.store).await?);
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);

    let mut worker = Worker::new(store, fetcher, config.worker, worker_id);
    worker.run().await
}
