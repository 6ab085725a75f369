//! NPI frequency and reference-coverage reports for an enriched roster.
//!
//! Usage:
//!   npi-stats frequency <roster_enriched.csv> <frequency_report.csv> [--top N]
//!   npi-stats coverage <roster_enriched.csv> <reference.csv> <coverage_report.csv> [--top N]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use npi_reconcile::config::ReconcileConfig;
use npi_reconcile::dataset::{write_csv, Table, TableCache};
use npi_reconcile::npi::{
    analyze_column, concentration, default_column_specs, frequency_report, overlap,
    reference_npis, roster_coverage, top_coverage, ColumnFrequency, ConcentrationLevel,
    UniqueCoverage, COVERAGE_HEADERS, DEFAULT_TOP_N, FREQUENCY_HEADERS, TOP_COVERAGE_HEADERS,
};
use npi_reconcile::progress::{create_spinner, format_duration, set_log_only};
use npi_reconcile::safety::{default_output_path, validate_output_path};

#[derive(Parser)]
#[command(name = "npi-stats")]
#[command(about = "NPI frequency analysis and reference coverage")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// TOML file with column aliases
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hide spinners and log progress lines instead
    #[arg(long, global = true)]
    log_only: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Most frequent NPIs per column, concentration and overlap
    Frequency {
        roster: PathBuf,
        /// Output CSV (name must contain "report")
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top: usize,
    },
    /// Roster NPIs found in / missing from the reference dataset
    Coverage {
        roster: PathBuf,
        reference: PathBuf,
        /// Per-record coverage CSV (name must contain "report")
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top: usize,
    },
}

fn load(cache: &mut TableCache, path: &Path) -> Result<std::sync::Arc<Table>> {
    let spinner = create_spinner(&format!("Loading {}", path.display()));
    let table = cache
        .get_or_load(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    spinner.finish_with_message(format!("Loaded {} rows from {}", table.len(), path.display()));
    Ok(table)
}

fn print_frequency(f: &ColumnFrequency) {
    println!("\n{} ({})", f.spec.category, f.spec.column);
    println!("{:-<80}", "");
    println!("  Total entries:     {}", f.total);
    println!("  Unique NPIs:       {}", f.unique);
    println!("  Average frequency: {:.2}", f.average_frequency());
    for t in &f.top {
        println!(
            "  {:>2}. {:<12} {:>5} ({:>5.1}%)  {} {}",
            t.rank, t.npi, t.count, t.percentage, t.entity_name, t.entity_state
        );
    }
    if let Some(insight) = concentration(f) {
        let level = match insight.level {
            ConcentrationLevel::High => "high concentration",
            ConcentrationLevel::Moderate => "moderate concentration",
            ConcentrationLevel::WellDistributed => "well distributed",
        };
        println!(
            "  Top NPI share {:.1}% ({}); top 3 share {:.1}%{}",
            insight.top_share,
            level,
            insight.top3_share,
            if insight.skewed { " - skewed" } else { "" }
        );
    }
}

fn run_frequency(cache: &mut TableCache, roster: &Path, output: &Path, top: usize) -> Result<()> {
    validate_output_path(output, "report", &[roster])?;
    let table = load(cache, roster)?;

    let mut frequencies = Vec::new();
    for spec in default_column_specs() {
        match analyze_column(&table, &spec, top) {
            Some(f) => {
                print_frequency(&f);
                frequencies.push(f);
            }
            None => warn!("column {:?} missing or empty, skipped", spec.column),
        }
    }

    println!("\nCross-analysis");
    println!("{:-<80}", "");
    for (left, right) in [("NPI", "NPI-1"), ("Practice NPI", "NPI-2")] {
        match overlap(&table, left, right) {
            Some(o) => println!(
                "  {} vs {}: both {}, only {} {}, only {} {} ({:.1}% overlap)",
                o.left, o.right, o.both, o.left_only, o.left, o.right_only, o.right, o.overlap_rate
            ),
            None => info!("{} / {} not both present, overlap skipped", left, right),
        }
    }

    let rows = frequency_report(&frequencies);
    write_csv(output, &FREQUENCY_HEADERS, &rows)
        .with_context(|| format!("Failed to write {:?}", output))?;
    info!("Wrote {} rows to {:?}", rows.len(), output);
    Ok(())
}

fn print_unique(label: &str, c: &UniqueCoverage) {
    println!(
        "  {:<10} unique {:>6}, found {:>6}, missing {:>6} ({:.1}% coverage)",
        label,
        c.unique,
        c.found,
        c.missing(),
        c.rate()
    );
}

fn run_coverage(
    cache: &mut TableCache,
    config: &ReconcileConfig,
    roster_path: &Path,
    reference_path: &Path,
    output: &Path,
    top: usize,
) -> Result<()> {
    validate_output_path(output, "report", &[roster_path, reference_path])?;
    let top_output = default_output_path(output, "top_npis");
    validate_output_path(&top_output, "report", &[roster_path, reference_path])?;

    let roster = load(cache, roster_path)?;
    let reference = load(cache, reference_path)?;
    let reference_set = reference_npis(&reference);
    info!("{} distinct NPIs in reference", reference_set.len());

    let mut top_rows = Vec::new();
    for spec in default_column_specs()
        .into_iter()
        .filter(|s| s.column == "NPI-1" || s.column == "NPI-2")
    {
        let Some(f) = analyze_column(&roster, &spec, top) else {
            warn!("column {:?} missing or empty, skipped", spec.column);
            continue;
        };
        let rows = top_coverage(&f, &reference_set);
        let found = rows.iter().filter(|r| r.in_complete_dataset == "Yes").count();
        println!(
            "\nTop {} {} NPIs: {} of {} in reference",
            rows.len(),
            spec.entity_type,
            found,
            rows.len()
        );
        for r in &rows {
            println!(
                "  {:>2}. {:<12} {:>5}  {:<3} {}",
                r.rank, r.npi, r.alignment_frequency, r.in_complete_dataset, r.alignment_name
            );
        }
        top_rows.extend(rows);
    }

    let coverage = roster_coverage(&roster, &config.query, &reference_set);
    println!("\nUnique NPI coverage");
    println!("{:-<80}", "");
    print_unique("NPI-1", &coverage.npi_1);
    print_unique("NPI-2", &coverage.npi_2);
    print_unique("Combined", &coverage.combined);

    write_csv(output, &COVERAGE_HEADERS, &coverage.rows)
        .with_context(|| format!("Failed to write {:?}", output))?;
    write_csv(&top_output, &TOP_COVERAGE_HEADERS, &top_rows)
        .with_context(|| format!("Failed to write {:?}", top_output))?;
    info!("Wrote {:?} and {:?}", output, top_output);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();
    set_log_only(args.log_only);

    let config = ReconcileConfig::load_or_default(args.config.as_deref())
        .context("Failed to load config")?;
    let start = Instant::now();
    let mut cache = TableCache::new();

    match &args.command {
        Command::Frequency { roster, output, top } => {
            run_frequency(&mut cache, roster, output, *top)?
        }
        Command::Coverage {
            roster,
            reference,
            output,
            top,
        } => run_coverage(&mut cache, &config, roster, reference, output, *top)?,
    }

    println!("\nElapsed: {}", format_duration(start.elapsed()));
    Ok(())
}
