#![doc = include_str!("../README.md")]

mod cli;

use clap::Parser;
use cli::config::CliArgs;
use cli::telemetry::init_telemetry;
use ferrodoc::{Database, Settings};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let settings = Settings::try_from(&args)?;

    init_telemetry()?;
    if cfg!(debug_assertions) {
        tracing::debug!("Starting with full config: {:#?}", settings);
    }

    let db = Database::connect(settings)?;
    cli::commands::run(&db, args.command).await?;

    tracing::debug!(
        last_successful_request = ?db.last_successful_request(),
        "Finished"
    );
    Ok(())
}
