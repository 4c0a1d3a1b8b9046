//! Load the video-statistics dataset into PostgreSQL.
//!
//! Run with: cargo run --bin load_dataset -- videos.json
//!
//! Both tables are dropped and recreated first.

use anyhow::{Context, Result};
use clap::Parser;
use metrics_sql_bot::config::DatabaseSettings;
use metrics_sql_bot::db::{close_pool, init_pool, load_dataset, read_dataset};
use metrics_sql_bot::telemetry;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "load_dataset")]
#[command(about = "Recreate the videos tables and fill them from a JSON dump")]
struct Args {
    /// Path to the dataset JSON file
    path: PathBuf,

    /// Log file (default: LOG_FILE or setup.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let log_file = args
        .log_file
        .or_else(|| std::env::var("LOG_FILE").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("setup.log"));
    telemetry::init(Some(&log_file)).context("Failed to initialise logging")?;

    info!("=== Loading dataset ===");
    let settings = DatabaseSettings::from_env().context("Failed to load database settings")?;
    let pool = init_pool(&settings)
        .await
        .context("Failed to connect to the database")?;

    let result = async {
        let dataset = read_dataset(&args.path).await?;
        load_dataset(&pool, dataset).await
    }
    .await;
    close_pool(&pool).await;

    let summary = result.with_context(|| format!("Failed to load {}", args.path.display()))?;
    info!(
        videos = summary.videos_in_db,
        snapshots = summary.snapshots_in_db,
        "=== Dataset loaded ==="
    );
    Ok(())
}
