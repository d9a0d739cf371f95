//! # Tracking Worker
//!
//! Runs one of the tracking consumers as a standalone process, or applies
//! the datastore migrations.
//!
//! ```bash
//! tracking-worker tasks              # task consumer on messaging.task_queues
//! tracking-worker results            # result consumer on messaging.results_queue
//! tracking-worker migrate
//! tracking-worker --config-dir ./config --environment production validate
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tasker_tracking::config::ConfigManager;
use tasker_tracking::consumer::{ConsumerLoop, DeliveryHandler};
use tasker_tracking::{database, logging, TrackingSystem};
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "tracking-worker")]
#[command(about = "Task tracking consumers and maintenance")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration directory (default: ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Environment overlay to load (default: TASKER_ENV, APP_ENV, then development)
    #[arg(short, long)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume task queues and create missing tracking rows
    Tasks,

    /// Consume the results queue and apply outcomes and progress
    Results,

    /// Apply datastore migrations and exit
    Migrate,

    /// Load and validate configuration, then print the effective topology
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();
    let cli = Cli::parse();

    let manager = match &cli.environment {
        Some(environment) => ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), environment),
        None => ConfigManager::load_from_directory(cli.config_dir.clone()),
    }
    .context("failed to load configuration")?;
    let config = manager.config().clone();
    info!(environment = %manager.environment(), "Configuration loaded");

    match cli.command {
        Commands::Validate => {
            config.validate().context("configuration is invalid")?;
            println!("environment:   {}", manager.environment());
            println!("transport:     {}", config.messaging.transport);
            println!("results queue: {}", config.messaging.results_queue);
            println!("declared:      {}", config.messaging.declared_queues().join(", "));
            println!("breaker:       {} (fail_max {})", config.circuit_breaker.name, config.circuit_breaker.fail_max);
            Ok(())
        }
        Commands::Migrate => {
            let pool = database::connect(&config.database).await?;
            database::run_migrations(&pool).await?;
            Ok(())
        }
        Commands::Tasks => {
            let system = TrackingSystem::bootstrap(config).await?;
            run_until_ctrl_c(system.task_consumer()).await
        }
        Commands::Results => {
            let system = TrackingSystem::bootstrap(config).await?;
            let consumer = system
                .result_consumer()
                .context("refusing to start the result consumer")?;
            run_until_ctrl_c(consumer).await
        }
    }
}

async fn run_until_ctrl_c<H>(consumer: ConsumerLoop<H>) -> anyhow::Result<()>
where
    H: DeliveryHandler + 'static,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = Arc::new(consumer);
    let running = {
        let consumer = Arc::clone(&consumer);
        tokio::spawn(async move { consumer.run(shutdown_rx).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("🛑 Shutdown requested, finishing in-flight message");
    let _ = shutdown_tx.send(true);

    if let Err(e) = running.await {
        error!(error = %e, "Consumer task ended abnormally");
    }
    Ok(())
}
