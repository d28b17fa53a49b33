use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tax_data::SlabTableLoader;
use tax_db_sqlite::SqliteSlabRepository;
use tracing_subscriber::EnvFilter;

/// Load custom slab tables from a CSV file into the slab store.
///
/// The CSV file should have the following columns:
/// - tax_year: The fiscal year (e.g., 2026)
/// - start: Inclusive lower bound of the slab
/// - end: Upper bound (empty for unbounded)
/// - rate: The slab rate as a fraction (e.g., 0.05)
///
/// Each year found in the file replaces that year's stored table.
#[derive(Parser, Debug)]
#[command(name = "tax-slab-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing slab data
    #[arg(short, long)]
    file: PathBuf,

    /// SQLite database URL (e.g., sqlite:slabs.db?mode=rwc to create if missing)
    #[arg(short, long, default_value = "sqlite:slabs.db?mode=rwc")]
    database: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let repo = SqliteSlabRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    repo.run_migrations()
        .await
        .context("Failed to run migrations")?;

    println!("Loading slab tables from: {}", args.file.display());

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open: {}", args.file.display()))?;

    let records = SlabTableLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", args.file.display()))?;

    println!("Parsed {} records from CSV", records.len());

    let written = SlabTableLoader::load(&repo, &records)
        .await
        .context("Failed to load slab tables into database")?;

    println!("Successfully loaded {} slabs into the database.", written);

    Ok(())
}
