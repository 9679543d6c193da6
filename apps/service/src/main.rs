use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use pingboard_service::Config;
use pingboard_service::database::{self, Database};
use pingboard_service::monitoring::{CheckRunner, HttpProber, TickOrchestrator};
use pingboard_service::pool::open_local_pool;

/// Standalone scheduler: ticks on a timer until interrupted
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the config file (defaults to $XDG_CONFIG_HOME/pingboard/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let args = Args::parse();
    let config = Config::from_config(args.config.as_ref()).context("Failed to load config")?;
    if args.print_config {
        print!("{config}");
        return Ok(());
    }

    let pool = open_local_pool(&config.database.path, config.database.max_connections).await?;
    let database: Arc<dyn Database> = Arc::new(database::open(pool).await?);

    let prober = Arc::new(HttpProber::new(&config.probe.user_agent)?);
    let runner = Arc::new(CheckRunner::new(prober, database.clone()));
    let orchestrator = Arc::new(TickOrchestrator::new(database, runner));

    let period = Duration::from_secs(config.scheduler.tick_seconds.max(1));
    info!(database = %config.database.path, period_secs = period.as_secs(), "Scheduler started");
    let ticker = orchestrator.run_periodic(period);

    tokio::signal::ctrl_c().await?;
    ticker.abort();
    info!("Scheduler stopped");

    Ok(())
}
