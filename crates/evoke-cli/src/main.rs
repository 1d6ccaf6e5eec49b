//! CLI entry point - the composition root.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use evoke_cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Serve {
            port,
            throttle_ms,
            heartbeat_secs,
            cors_origins,
        } => handlers::serve::execute(port, throttle_ms, heartbeat_secs, cors_origins).await,
        Commands::Watch {
            project_id,
            url,
            max_attempts,
        } => handlers::watch::execute(&url, &project_id, max_attempts).await,
    }
}
