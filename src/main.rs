#![allow(clippy::result_large_err)]

mod cli;

use bekya::{
    Marketplace,
    config::{database, settings},
    errors::Result,
};
use clap::Parser;
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    let cli = cli::Cli::parse();

    // 3. Load settings
    let settings = settings::load_default_settings()?;

    // 4. Connect and make sure the schema exists
    tokio::fs::create_dir_all(&settings.storage.root).await?;
    let db = database::create_connection(&settings.database_url())
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;
    info!("Database initialized successfully.");

    let mut market = Marketplace::new(db, settings);
    market.start();

    let outcome = cli.run(&market).await;
    if let Err(e) = &outcome {
        eprintln!("{}", e.localized());
        error!("Command failed: {e}");
    }

    market.shutdown().await?;
    outcome
}
