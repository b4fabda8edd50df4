//! Builder Service - Builds the local Italian municipalities store
//!
//! Usage:
//!   # Build once, keep an existing store:
//!   cargo run --bin builder
//!
//!   # Rebuild from scratch into a custom path:
//!   cargo run --bin builder -- --db /srv/italia.db --force
//!
//!   # Fetch and reconcile only, print the counts:
//!   cargo run --bin builder -- --dry-run
//!
//!   # Show what is on disk:
//!   cargo run --bin builder -- --status

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use builder::{
    manifest::store_status, preview, refresh, BuildSummary, Config, HttpFeedClient,
    RefreshOutcome,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "builder", about = "Builds the local store of Italian municipalities")]
struct Args {
    /// Store path (overrides ITALIA_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Rebuild even if the store already exists
    #[arg(long, default_value = "false")]
    force: bool,

    /// Dry run - fetch and reconcile without writing the store
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Print the store status as JSON and exit
    #[arg(long, default_value = "false")]
    status: bool,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}

fn print_summary(summary: &BuildSummary) {
    println!("  Municipalities:     {}", summary.municipalities);
    println!("  Regions:            {}", summary.regions);
    println!("  Provinces:          {}", summary.provinces);
    println!("  With population:    {}", summary.with_population);
    println!("  With coordinates:   {}", summary.with_coordinates);
    println!("  With postal codes:  {}", summary.with_postal_codes);
    println!("  With geo data:      {}", summary.with_geo);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing()?;

    let mut config = Config::from_env();
    if let Some(db) = args.db {
        config = config.with_db_path(db);
    }

    if args.status {
        let status = store_status(&config.db_path, &config.manifest_path).await;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("=== Italia Open Data Builder ===");
    println!("Store: {}", config.db_path.display());

    let client = HttpFeedClient::new(
        Duration::from_secs(config.http_timeout_secs),
        &config.user_agent,
    )
    .context("Failed to build HTTP client")?;

    if args.dry_run {
        println!("\nDry run - nothing will be written");
        let summary = preview(&client, &config.feeds)
            .await
            .context("Failed to fetch feeds")?;
        print_summary(&summary);
        return Ok(());
    }

    match refresh(&client, &config, args.force)
        .await
        .context("Failed to build store")?
    {
        RefreshOutcome::AlreadyExists(status) => {
            println!("\nStore already exists - use --force to rebuild");
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        RefreshOutcome::Refreshed(manifest) => {
            println!("\n✓ Store built at {}", manifest.downloaded_at.to_rfc3339());
            print_summary(&manifest.records);
            println!("Manifest: {}", config.manifest_path.display());
        }
    }

    Ok(())
}
