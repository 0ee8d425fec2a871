use anyhow::Result;
use tracing::{error, info};

mod cli;
mod crawler;
mod seo;
mod storage;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::parse_args();

    // Initialize logging
    utils::init_logging(args.verbose, args.log_file.clone())?;

    info!("Starting SEO crawl worker v{}", env!("CARGO_PKG_VERSION"));

    match cli::run(args).await {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("Worker terminated: {:#}", e);
            Err(e)
        }
    }
}
