//! Add registry NPI-1 / NPI-2 columns to a roster.
//!
//! Usage: enrich-alignment <roster.csv> [output_enriched.csv] [--limit N]
//!
//! Calls the public NPPES registry once or twice per row with a fixed delay,
//! so a full roster takes a while. Use --limit for a trial run.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use npi_reconcile::config::ReconcileConfig;
use npi_reconcile::dataset::{write_table, Table};
use npi_reconcile::enrich::enrich_roster;
use npi_reconcile::progress::{create_progress_bar, format_duration, set_log_only};
use npi_reconcile::registry::NpiRegistryClient;
use npi_reconcile::safety::{default_output_path, validate_output_path};

#[derive(Parser)]
#[command(name = "enrich-alignment")]
#[command(about = "Look up provider and practice NPIs in the NPPES registry")]
struct Args {
    roster: PathBuf,

    /// Output CSV (name must contain "enriched"); defaults to <roster>_enriched.csv
    output: Option<PathBuf>,

    /// Only enrich the first N rows
    #[arg(long)]
    limit: Option<usize>,

    /// TOML file with column aliases and registry settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pause between registry calls in milliseconds (overrides the config file)
    #[arg(long)]
    delay_ms: Option<u64>,

    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();
    set_log_only(args.log_only);

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.roster, "enriched"));
    validate_output_path(&output, "enriched", &[&args.roster])?;

    let mut config = ReconcileConfig::load_or_default(args.config.as_deref())
        .context("Failed to load config")?;
    if let Some(delay) = args.delay_ms {
        config.registry.delay_ms = delay;
    }

    let start = Instant::now();
    let table = Table::load(&args.roster)
        .with_context(|| format!("Failed to read roster {:?}", args.roster))?;
    let to_process = args.limit.unwrap_or(table.len()).min(table.len());
    info!(
        "Enriching {} of {} rows via {} (delay {} ms)",
        to_process,
        table.len(),
        config.registry.base_url,
        config.registry.delay_ms
    );

    let mut client =
        NpiRegistryClient::new(config.registry.clone()).context("Failed to create HTTP client")?;
    let pb = create_progress_bar(to_process as u64, "Registry lookups");
    let enriched = enrich_roster(&table, &config.query, &mut client, args.limit, &pb)
        .context("Enrichment failed")?;
    pb.finish_with_message(format!("Registry lookups: {} rows", enriched.stats.processed));

    write_table(&output, &enriched.headers, &enriched.rows)
        .with_context(|| format!("Failed to write {:?}", output))?;

    let stats = &enriched.stats;
    println!("\n{:=<60}", "");
    println!("Enrichment complete!");
    println!("  Rows processed:   {} of {}", stats.processed, stats.total_rows);
    println!(
        "  Providers found:  {} ({:.1}%)",
        stats.providers_found,
        stats.provider_rate()
    );
    println!(
        "  Practices found:  {} ({:.1}%)",
        stats.practices_found,
        stats.practice_rate()
    );
    println!("  Lookup failures:  {}", stats.lookup_failures);
    println!("  Output: {}", output.display());
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
