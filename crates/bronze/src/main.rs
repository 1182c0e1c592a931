use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bronze_core::pipelines::plan_by_name;
use bronze_core::{
    db, storage, BronzeConfig, IngestContext, PostgresDatabase, RetryPolicy, Scheduler,
};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Bronze-layer loader for listings and census exports", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a load plan (bronze-load or monthly)
    Run(RunArgs),
    /// Run database migrations
    Migrate,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Plan to execute
    plan: String,
    /// Skip running migrations before loading
    #[arg(long)]
    skip_migrations: bool,
    /// Disable whole-task retries
    #[arg(long)]
    no_retry: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = BronzeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run(args) => handle_run(&config, args).await,
        Command::Migrate => {
            let pool = connect_pool(&config).await?;
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
            Ok(())
        }
    }
}

async fn handle_run(config: &BronzeConfig, args: RunArgs) -> Result<()> {
    let plan = plan_by_name(&args.plan, &config.prefixes)?;

    let pool = connect_pool(config).await?;
    if args.skip_migrations {
        warn!("Skipping migrations before loading");
    } else {
        db::run_migrations(&pool).await?;
    }

    let storage = storage::from_config(&config.storage)
        .await
        .context("failed to configure storage")?;
    info!(storage = %storage.describe(), plan = plan.name, "Storage ready");

    let ctx = IngestContext::new(storage, Arc::new(PostgresDatabase::new(pool)));
    let retry = if args.no_retry {
        RetryPolicy::none()
    } else {
        config.retry.policy()
    };

    let report = Scheduler::new(retry).run(&plan, &ctx).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.succeeded() {
        bail!("plan '{}' did not complete", plan.name);
    }
    Ok(())
}

async fn connect_pool(config: &BronzeConfig) -> Result<db::DbPool> {
    db::connect(config.database_url()?, config.database.max_connections).await
}
