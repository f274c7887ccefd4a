//! Driftwatch - Main Entry Point

use clap::Parser;
use driftwatch::cli::{cmd_config, cmd_evaluate, cmd_watch, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "driftwatch=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate { reference, observations, features, config, json } => {
            cmd_evaluate(&reference, &observations, features.as_deref(), config.as_deref(), json)?;
        }
        Commands::Watch { reference, log_dir, features, config, metrics_file, audit_dir, poll_secs } => {
            cmd_watch(
                &reference,
                &log_dir,
                features.as_deref(),
                config.as_deref(),
                metrics_file.as_deref(),
                audit_dir.as_deref(),
                poll_secs,
            )
            .await?;
        }
        Commands::Config { config } => {
            cmd_config(config.as_deref())?;
        }
    }

    Ok(())
}
