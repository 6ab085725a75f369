//! Output path checks that keep a run from overwriting its own inputs.
//!
//! Every binary writes a fresh CSV next to hand-maintained spreadsheet
//! exports that are not recoverable once clobbered.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Same file, comparing canonical paths when both exist.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output filename must contain the required marker (e.g. "report", "enriched")
/// - Output must be a `.csv` file
/// - Output cannot be any of the input paths
pub fn validate_output_path(output: &Path, required_marker: &str, inputs: &[&Path]) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.to_lowercase().contains(required_marker) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_marker
        );
    }

    let is_csv = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if !is_csv {
        bail!(
            "Safety check failed: output '{}' must be a .csv file",
            output.display()
        );
    }

    ensure_distinct_from_inputs(output, inputs)
}

/// Refuses an output that resolves to one of `inputs`. Used alone for
/// side outputs (e.g. `--stats-json`) that carry no name or extension rule.
pub fn ensure_distinct_from_inputs(output: &Path, inputs: &[&Path]) -> Result<()> {
    for input in inputs {
        if same_file(output, input) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as input '{}'",
                output.display(),
                input.display()
            );
        }
    }
    Ok(())
}

/// `<stem>_<marker>.csv` next to `input`, for outputs the user did not name.
pub fn default_output_path(input: &Path, marker: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}_{marker}.csv"))
}
