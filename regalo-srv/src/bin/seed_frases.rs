//! seed-frases - one-shot loader for the phrase catalog
//!
//! Reads a JSON array of `{id, texto}` entries and writes them all to the
//! `frases` table in a single transaction, each with `veces_asignada = 0`.
//! Re-running overwrites the existing documents.

use anyhow::{Context, Result};
use clap::Parser;
use regalo_common::config::{database_path, resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV};
use regalo_common::db::models::CatalogEntry;
use regalo_common::db::{frases, init::init_database};
use std::path::PathBuf;
use tracing::{error, info};

/// Command-line arguments for seed-frases
#[derive(Parser, Debug)]
#[command(name = "seed-frases")]
#[command(about = "Load the phrase catalog into the regalo database")]
#[command(version)]
struct Args {
    /// JSON catalog file
    #[arg(default_value = "frases.json")]
    catalog: PathBuf,

    /// Root folder holding regalo.db
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Highest phrase id accepted
    #[arg(long, default_value_t = 50)]
    catalog_size: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let content = std::fs::read_to_string(&args.catalog)
        .with_context(|| format!("Failed to read {}", args.catalog.display()))?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", args.catalog.display()))?;

    info!("Preparing {} phrases for upload", entries.len());
    frases::validate_catalog(&entries, args.catalog_size).context("Catalog rejected")?;

    let toml = TomlConfig::load_default();
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml);
    let pool = init_database(&database_path(&root_folder))
        .await
        .context("Failed to open database")?;

    match frases::seed_catalog(&pool, &entries).await {
        Ok(count) => {
            info!("All {} phrases written to {}", count, root_folder.display());
            Ok(())
        }
        Err(e) => {
            error!("Failed to write phrases: {}", e);
            Err(e.into())
        }
    }
}
