use clap::{Parser, Subcommand};
use core::time::Duration;
use ferrodoc::{
    DEFAULT_ENDPOINT, Logger, Settings,
    ferrodoc_core::types::{
        DEFAULT_DATABASE_ID, DEFAULT_RETRY_DELAY, MAX_CONCURRENT_REQUESTS_PER_CLIENT,
    },
};

/// Reads, queries and writes documents through the ferrodoc client.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// gRPC endpoint of the database (or emulator)
    #[arg(long, env = "FERRODOC_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Project to address; detected through the first connection if omitted
    #[arg(long, env = "FERRODOC_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Database within the project
    #[arg(long, env = "FERRODOC_DATABASE_ID", default_value = DEFAULT_DATABASE_ID)]
    pub database_id: String,

    /// Operations multiplexed over one connection before another is opened
    #[arg(long, env = "FERRODOC_MAX_CONCURRENCY", default_value_t = MAX_CONCURRENT_REQUESTS_PER_CLIENT)]
    pub max_concurrency: usize,

    /// Delay before every retried attempt, in milliseconds
    #[arg(long, env = "FERRODOC_RETRY_DELAY_MS", default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64)]
    pub retry_delay_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read documents; results follow argument order
    Get {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Run a structured query given as JSON
    Query {
        structured_query: String,
        /// Document whose subcollections are queried
        #[arg(long)]
        parent: Option<String>,
    },
    /// Apply a JSON list of writes atomically
    Commit { writes: String },
    /// Print changes to documents until interrupted
    Listen {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

impl TryFrom<&CliArgs> for Settings {
    type Error = anyhow::Error;

    fn try_from(args: &CliArgs) -> Result<Self, Self::Error> {
        let mut settings = Settings::default()
            .with_endpoint(args.endpoint.as_str())
            .with_database_id(args.database_id.as_str())
            .with_max_concurrency(args.max_concurrency)
            .with_retry_delay(Duration::from_millis(args.retry_delay_ms))
            .with_logger(Logger::tracing());
        if let Some(project_id) = &args.project_id {
            settings = settings.with_project_id(project_id.as_str());
        }
        settings.validate()?;
        Ok(settings)
    }
}
