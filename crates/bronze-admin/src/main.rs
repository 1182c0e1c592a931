use std::path::PathBuf;

use anyhow::{bail, Result};
use bronze_core::enumerate::enumerate;
use bronze_core::pipelines::{all_pipelines, plan_by_name, PipelineDefinition};
use bronze_core::{db, storage, BronzeConfig, Database, PostgresDatabase};
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Bronze loader administrative tooling", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the files a plan would pick up, without loading anything
    Plan(PlanArgs),
    /// Delete every row loaded from one source file
    PurgeSource(PurgeSourceArgs),
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Plan to inspect
    plan: String,
}

#[derive(Args, Debug)]
struct PurgeSourceArgs {
    /// Destination table, e.g. bronze.airbnb_listings_raw
    #[arg(long)]
    table: String,
    /// Storage key recorded in the source_file column
    #[arg(long)]
    source_file: String,
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
        Command::Plan(args) => handle_plan(&config, args).await,
        Command::PurgeSource(args) => handle_purge_source(&config, args).await,
    }
}

async fn handle_plan(config: &BronzeConfig, args: PlanArgs) -> Result<()> {
    let plan = plan_by_name(&args.plan, &config.prefixes)?;
    let storage = storage::from_config(&config.storage).await?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Stage", "Pipeline", "Table", "Policy", "Pending file"]);

    let mut pending_total = 0;
    for (index, stage) in plan.stages.iter().enumerate() {
        for pipeline in stage {
            let files = enumerate(storage.as_ref(), &pipeline.prefix, &pipeline.selector).await?;
            pending_total += files.len();
            if files.is_empty() {
                table.add_row(row(index, pipeline, "(none)".to_string()));
            }
            for file in files {
                table.add_row(row(index, pipeline, file.key));
            }
        }
    }

    println!("Plan '{}' against {}", plan.name, storage.describe());
    println!("{table}");
    println!("{pending_total} file(s) pending");
    Ok(())
}

fn row(stage: usize, pipeline: &PipelineDefinition, file: String) -> Vec<String> {
    vec![
        (stage + 1).to_string(),
        pipeline.code.to_string(),
        pipeline.table().to_string(),
        format!("{:?}", pipeline.policy),
        file,
    ]
}

async fn handle_purge_source(config: &BronzeConfig, args: PurgeSourceArgs) -> Result<()> {
    let mut known: Vec<&str> = all_pipelines(&config.prefixes)
        .iter()
        .map(PipelineDefinition::table)
        .collect();
    known.sort();
    known.dedup();
    if !known.contains(&args.table.as_str()) {
        bail!(
            "unknown table '{}' (expected one of: {})",
            args.table,
            known.join(", ")
        );
    }

    let pool = db::connect(config.database_url()?, config.database.max_connections).await?;
    let database = PostgresDatabase::new(pool);
    let deleted = database
        .delete_source(&args.table, &args.source_file)
        .await?;

    info!(table = %args.table, source_file = %args.source_file, deleted, "Purged source rows");
    println!(
        "Deleted {deleted} row(s) from {} for '{}'.",
        args.table, args.source_file
    );
    Ok(())
}
