//! Cross-check fuzzy practice matches against the NPPES registry.
//!
//! Usage: validate-matches <matching_report.csv> [fuzzy_validation.csv]

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use npi_reconcile::config::ReconcileConfig;
use npi_reconcile::progress::{create_progress_bar, format_duration, set_log_only};
use npi_reconcile::registry::NpiRegistryClient;
use npi_reconcile::report::read_report;
use npi_reconcile::safety::{default_output_path, validate_output_path};
use npi_reconcile::validate::{fuzzy_matched_names, validate_fuzzy_matches, write_validation, ValidationStatus};

#[derive(Parser)]
#[command(name = "validate-matches")]
#[command(about = "Compare registry NPIs of fuzzy-matched practices with the roster NPI-2")]
struct Args {
    report: PathBuf,

    /// Output CSV (name must contain "validation"); defaults to <report>_validation.csv
    output: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    log_only: bool,
}

const SAMPLE_ROWS: usize = 5;

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();
    set_log_only(args.log_only);

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.report, "validation"));
    validate_output_path(&output, "validation", &[&args.report])?;

    let config = ReconcileConfig::load_or_default(args.config.as_deref())
        .context("Failed to load config")?;

    let start = Instant::now();
    let report = read_report(&args.report)
        .with_context(|| format!("Failed to read matching report {:?}", args.report))?;
    info!("Loaded {} report rows", report.len());

    let mut client =
        NpiRegistryClient::new(config.registry.clone()).context("Failed to create HTTP client")?;
    let unique = fuzzy_matched_names(&report).len();
    let pb = create_progress_bar(unique as u64, "Registry lookups");
    let validation = validate_fuzzy_matches(&report, &mut client, &pb);
    pb.finish_with_message(format!("Registry lookups: {} names", validation.summary.unique_matched));

    if validation.rows.is_empty() {
        println!("No fuzzy matches to validate.");
        return Ok(());
    }

    write_validation(&output, &validation.rows)
        .with_context(|| format!("Failed to write {:?}", output))?;

    let s = &validation.summary;
    println!("\n{:=<60}", "");
    println!("Validation complete!");
    println!("  Fuzzy matches validated: {}", s.total_fuzzy);
    println!("  Unique matched names:    {}", s.unique_matched);
    for status in ValidationStatus::ALL {
        let mean = s
            .mean_scores
            .get(&status)
            .map(|m| format!("{:.1}", m))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<20} {:>5} ({:>5.1}%)  mean score {}",
            status.label(),
            s.count(status),
            s.rate(status),
            mean
        );
    }
    println!("  Accuracy: {:.1}%", s.accuracy());
    if s.lookup_failures > 0 {
        println!("  Lookup failures: {}", s.lookup_failures);
    }
    println!("{:=<60}", "");

    for (title, status) in [
        ("Confirmed fuzzy matches", ValidationStatus::Confirmed),
        ("Potential false positives", ValidationStatus::Mismatch),
    ] {
        let rows: Vec<_> = validation.rows.iter().filter(|r| r.status == status).collect();
        if rows.is_empty() {
            continue;
        }
        println!("\n{}:", title);
        for r in rows.iter().take(SAMPLE_ROWS) {
            println!(
                "  {} -> {} (NPI-2 {} vs registry {})",
                r.original_practice,
                r.matched_practice,
                r.roster_npi_2,
                if r.registry_npi.is_empty() { "-" } else { r.registry_npi.as_str() }
            );
        }
        if rows.len() > SAMPLE_ROWS {
            println!("  ... and {} more", rows.len() - SAMPLE_ROWS);
        }
    }

    println!("\nOutput: {}", output.display());
    println!("Elapsed: {}", format_duration(start.elapsed()));
    Ok(())
}
