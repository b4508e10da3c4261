//! Minne CLI entry point.

use anyhow::Result;
use clap::Parser;
use minne::cli::{commands, Cli, Commands};
use minne::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("minne={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.video_dir())?;

    match cli.command {
        Commands::Add {
            file,
            title,
            date,
            participants,
            notes,
            run,
        } => {
            commands::run_add(
                &file,
                &title,
                date.as_deref(),
                participants,
                notes,
                run,
                settings,
            )
            .await?;
        }

        Commands::Run { video_id } => {
            commands::run_run(video_id, settings).await?;
        }

        Commands::Status { video_id } => {
            commands::run_status(video_id, settings)?;
        }

        Commands::List => {
            commands::run_list(settings)?;
        }

        Commands::Search { query, limit } => {
            commands::run_search(&query, limit, settings).await?;
        }

        Commands::Ask { question } => {
            commands::run_ask(&question, settings).await?;
        }

        Commands::Doc { request, videos } => {
            commands::run_doc(&request, videos, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings)?;
        }
    }

    Ok(())
}
