use anyhow::{Context, Result};
use cadence_core::db;
use cadence_core::generator::{CreatedInstance, GenerationScope, InstanceGenerator};
use cadence_core::repository::SqliteRepository;
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Duration, MissedTickBehavior};

mod cli;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();
    let mut config = config::WorkerConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    cli.apply(&mut config);

    config.validate()?;

    let pool = db::establish_connection(&config.database_path)
        .await
        .with_context(|| format!("failed to open database {}", config.database_path))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let log_task = tokio::spawn(log_created(rx));

    let generator = InstanceGenerator::new(SqliteRepository::new(pool), config.generator.clone())
        .with_listener(Arc::new(tx));
    let scope = GenerationScope::Boards(config.boards.clone());

    if cli.once {
        run_pass(&generator, &scope).await?;
    } else {
        tracing::info!(
            boards = config.boards.len(),
            interval_secs = config.interval_secs,
            "starting recurring task worker"
        );
        let mut interval = time::interval(Duration::from_secs(config.interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // A failed pass is retried on the next tick.
                    if let Err(e) = run_pass(&generator, &scope).await {
                        tracing::error!(error = %e, "generation pass failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    break;
                }
            }
        }
    }

    drop(generator);
    log_task.await.context("instance log task panicked")?;
    Ok(())
}

async fn run_pass(generator: &InstanceGenerator<SqliteRepository>, scope: &GenerationScope) -> Result<()> {
    let today = Utc::now().date_naive();
    let report = generator
        .generate_on(scope, today)
        .await
        .context("failed to load recurring series")?;

    for failed in &report.failed {
        tracing::warn!(series_id = %failed.series_id, error = %failed.error, "series not generated");
    }
    Ok(())
}

async fn log_created(mut rx: mpsc::UnboundedReceiver<CreatedInstance>) {
    while let Some(created) = rx.recv().await {
        tracing::info!(
            series_id = %created.series_id,
            instance_id = %created.instance_id,
            due = %created.occurrence_date,
            "instance ready"
        );
    }
}
