use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use npi_reconcile::config::ReconcileConfig;
use npi_reconcile::dataset::{write_json, TableCache};
use npi_reconcile::index::CandidateNameIndex;
use npi_reconcile::matcher::FuzzyMatcher;
use npi_reconcile::models::{MatchResult, MatchStatus};
use npi_reconcile::pipeline::{assemble, distinct_queries, exact_pass, fuzzy_pass, MatchSummary};
use npi_reconcile::progress::{create_progress_bar, create_spinner, format_duration, set_log_only};
use npi_reconcile::report::write_report;
use npi_reconcile::safety::{ensure_distinct_from_inputs, validate_output_path};
use npi_reconcile::scoring::EXACT_SCORE;

#[derive(Parser)]
#[command(name = "npi-reconcile")]
#[command(about = "Match roster practice names against a reference provider dataset")]
struct Args {
    /// Roster CSV with the practice names to match
    roster: PathBuf,

    /// Reference CSV with NPIs and practice-name columns
    reference: PathBuf,

    /// Matching report CSV (name must contain "report")
    output: PathBuf,

    /// TOML file with column aliases, threshold and registry settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum fuzzy score, 0-100 (overrides the config file)
    #[arg(long)]
    threshold: Option<u8>,

    /// Write the run summary as JSON
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Hide progress bars and log progress lines instead
    #[arg(long)]
    log_only: bool,
}

const SAMPLE_ROWS: usize = 10;

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn print_summary(summary: &MatchSummary, results: &[MatchResult]) {
    println!("\n{:=<60}", "");
    println!("Matching complete!");
    println!("  Roster records:         {}", summary.total_records);
    println!("  Without practice name:  {}", summary.records_without_practice);
    println!("  Unique practice names:  {}", summary.unique_practices);
    println!(
        "  Exact matches:          {} ({:.1}%)",
        summary.exact_matches,
        summary.rate(summary.exact_matches)
    );
    println!(
        "  Fuzzy matches (>= {}):  {} ({:.1}%)",
        summary.threshold,
        summary.fuzzy_matches,
        summary.rate(summary.fuzzy_matches)
    );
    println!(
        "  Total matched:          {} ({:.1}%)",
        summary.total_matches,
        summary.rate(summary.total_matches)
    );
    println!(
        "  Unmatched:              {} ({:.1}%)",
        summary.unmatched,
        summary.rate(summary.unmatched)
    );
    println!("{:=<60}", "");

    let matched: Vec<&MatchResult> = results
        .iter()
        .filter(|r| r.status() != MatchStatus::Unmatched)
        .collect();
    if !matched.is_empty() {
        println!("\nSample matches:");
        println!("{:-<100}", "");
        println!("{:<35} | {:<35} | {:>5} | {:<12}", "Practice", "Matched", "Score", "NPI");
        println!("{:-<100}", "");
        for result in matched.iter().take(SAMPLE_ROWS) {
            let (name, npi) = result
                .candidate()
                .map(|c| (c.name.as_str(), c.record.npi.as_deref().unwrap_or("")))
                .unwrap_or(("", ""));
            println!(
                "{:<35} | {:<35} | {:>5} | {:<12}",
                truncate(result.query(), 35),
                truncate(name, 35),
                result.score(),
                npi
            );
        }
        if matched.len() > SAMPLE_ROWS {
            println!("... and {} more", matched.len() - SAMPLE_ROWS);
        }
    }

    let unmatched: Vec<&MatchResult> = results
        .iter()
        .filter(|r| r.status() == MatchStatus::Unmatched)
        .collect();
    if !unmatched.is_empty() {
        println!("\nSample unmatched practice names:");
        for result in unmatched.iter().take(SAMPLE_ROWS) {
            println!("  - {}", result.query());
        }
        if unmatched.len() > SAMPLE_ROWS {
            println!("  ... and {} more", unmatched.len() - SAMPLE_ROWS);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();
    set_log_only(args.log_only);

    validate_output_path(&args.output, "report", &[&args.roster, &args.reference])?;
    if let Some(path) = &args.stats_json {
        ensure_distinct_from_inputs(path, &[&args.roster, &args.reference, &args.output])?;
    }

    let mut config = ReconcileConfig::load_or_default(args.config.as_deref())
        .context("Failed to load config")?;
    if let Some(threshold) = args.threshold {
        if threshold > EXACT_SCORE {
            bail!("--threshold must be at most {}, got {}", EXACT_SCORE, threshold);
        }
        config.matching.threshold = threshold;
    }
    let threshold = config.matching.threshold;

    let start = Instant::now();
    let mut cache = TableCache::new();

    // Phase 1: load both tables
    let spinner = create_spinner("Phase 1: Loading tables");
    let roster = cache
        .get_or_load(&args.roster)
        .with_context(|| format!("Failed to read roster {:?}", args.roster))?;
    let reference = cache
        .get_or_load(&args.reference)
        .with_context(|| format!("Failed to read reference {:?}", args.reference))?;
    spinner.finish_with_message(format!(
        "Phase 1: Loaded {} roster rows, {} reference rows",
        roster.len(),
        reference.len()
    ));
    for table in [&roster, &reference] {
        if table.skipped_rows() > 0 {
            info!("{}: skipped {} malformed rows", table.name(), table.skipped_rows());
        }
    }

    let query_columns = config
        .query
        .resolve_for_matching(&roster)
        .context("Roster is missing its practice-name column")?;
    let queries = query_columns.records(&roster);

    // Phase 2: candidate index
    let spinner = create_spinner("Phase 2: Building candidate index");
    let candidate_columns = config
        .candidate
        .resolve(&reference)
        .context("Reference has no usable practice-name columns")?;
    let index = CandidateNameIndex::build(
        &candidate_columns.practice_headers(),
        candidate_columns.records(&reference),
    )
    .context("Failed to build candidate index")?;
    spinner.finish_with_message(format!(
        "Phase 2: Indexed {} names ({} distinct) from {:?}",
        index.len(),
        index.distinct_key_count(),
        candidate_columns.practice_headers()
    ));

    // Phase 3: exact
    let names = distinct_queries(&queries);
    info!("{} unique practice names to match", names.len());
    let pb = create_progress_bar(names.len() as u64, "Phase 3: Exact matching");
    let exact = exact_pass(&names, &index, &pb);
    pb.finish_with_message(format!("Phase 3: {} exact matches", exact.matched.len()));

    // Phase 4: fuzzy on the remainder
    let matcher = FuzzyMatcher::new(&index);
    info!(
        "Fuzzy matching {} names against {} candidates (threshold {})",
        exact.remaining.len(),
        matcher.comparisons_per_query(),
        threshold
    );
    let pb = create_progress_bar(exact.remaining.len() as u64, "Phase 4: Fuzzy matching");
    let fuzzy = fuzzy_pass(&exact.remaining, &matcher, threshold, &pb);
    let fuzzy_hits = fuzzy
        .values()
        .filter(|r| r.status() == MatchStatus::Fuzzy)
        .count();
    pb.finish_with_message(format!("Phase 4: {} fuzzy matches", fuzzy_hits));

    let run = assemble(&queries, &names, exact, fuzzy, &index, threshold);

    // Phase 5: outputs
    write_report(&args.output, &run.report)
        .with_context(|| format!("Failed to write report {:?}", args.output))?;
    info!("Wrote {} report rows to {:?}", run.report.len(), args.output);

    if let Some(path) = &args.stats_json {
        write_json(path, &run.summary).with_context(|| format!("Failed to write {:?}", path))?;
    }

    print_summary(&run.summary, &run.results);
    println!("\nElapsed: {}", format_duration(start.elapsed()));

    Ok(())
}
