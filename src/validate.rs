//! Registry cross-check of fuzzy matches.
//!
//! For every fuzzy report row, the matched practice name is looked up as an
//! organization and the registry NPI is compared with the roster's NPI-2.

use indicatif::ProgressBar;
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dataset::write_csv;
use crate::error::Result;
use crate::models::MatchStatus;
use crate::normalize::clean_npi;
use crate::progress::{log_progress, percent};
use crate::registry::{NpiLookup, RegistryRecord};
use crate::report::ReportRow;
use crate::scoring::Score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationStatus {
    #[serde(rename = "No NPI-2 Available")]
    NoRosterNpi,
    #[serde(rename = "No Registry NPI")]
    NoRegistryNpi,
    #[serde(rename = "NPIs Match")]
    Confirmed,
    #[serde(rename = "NPIs Differ")]
    Mismatch,
}

impl ValidationStatus {
    pub const ALL: [ValidationStatus; 4] = [
        ValidationStatus::Confirmed,
        ValidationStatus::Mismatch,
        ValidationStatus::NoRegistryNpi,
        ValidationStatus::NoRosterNpi,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ValidationStatus::NoRosterNpi => "No NPI-2 Available",
            ValidationStatus::NoRegistryNpi => "No Registry NPI",
            ValidationStatus::Confirmed => "NPIs Match",
            ValidationStatus::Mismatch => "NPIs Differ",
        }
    }

    /// Roster NPI-2 is checked first, then the registry result.
    pub fn classify(roster_npi: Option<&str>, registry_npi: Option<&str>) -> Self {
        match (roster_npi, registry_npi) {
            (None, _) => ValidationStatus::NoRosterNpi,
            (Some(_), None) => ValidationStatus::NoRegistryNpi,
            (Some(a), Some(b)) if a == b => ValidationStatus::Confirmed,
            _ => ValidationStatus::Mismatch,
        }
    }
}

pub const VALIDATION_HEADERS: [&str; 11] = [
    "Record_Index",
    "Original_Practice",
    "Matched_Practice",
    "Similarity_Score",
    "NPI-2_From_API",
    "NPI_From_Matched_Practice",
    "API_Practice_Name",
    "API_State",
    "Validation_Status",
    "Provider_First_Name",
    "Provider_Last_Name",
];

/// One validated fuzzy match. Field order matches `VALIDATION_HEADERS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRow {
    #[serde(rename = "Record_Index")]
    pub record_index: usize,
    #[serde(rename = "Original_Practice")]
    pub original_practice: String,
    #[serde(rename = "Matched_Practice")]
    pub matched_practice: String,
    #[serde(rename = "Similarity_Score")]
    pub similarity_score: Score,
    #[serde(rename = "NPI-2_From_API")]
    pub roster_npi_2: String,
    #[serde(rename = "NPI_From_Matched_Practice")]
    pub registry_npi: String,
    #[serde(rename = "API_Practice_Name")]
    pub registry_name: String,
    #[serde(rename = "API_State")]
    pub registry_state: String,
    #[serde(rename = "Validation_Status")]
    pub status: ValidationStatus,
    #[serde(rename = "Provider_First_Name")]
    pub provider_first_name: String,
    #[serde(rename = "Provider_Last_Name")]
    pub provider_last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationSummary {
    pub total_fuzzy: usize,
    pub unique_matched: usize,
    pub lookup_failures: usize,
    pub counts: FxHashMap<ValidationStatus, usize>,
    pub mean_scores: FxHashMap<ValidationStatus, f64>,
}

impl ValidationSummary {
    pub fn count(&self, status: ValidationStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn rate(&self, status: ValidationStatus) -> f64 {
        percent(self.count(status), self.total_fuzzy)
    }

    /// Confirmed matches over all fuzzy matches.
    pub fn accuracy(&self) -> f64 {
        self.rate(ValidationStatus::Confirmed)
    }
}

pub struct Validation {
    pub rows: Vec<ValidationRow>,
    pub summary: ValidationSummary,
}

/// Distinct matched names of fuzzy rows, first-seen order.
pub fn fuzzy_matched_names(report: &[ReportRow]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    report
        .iter()
        .filter(|r| r.matching_status == MatchStatus::Fuzzy)
        .map(|r| r.matched_practice_name.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

pub fn validate_fuzzy_matches<L: NpiLookup + ?Sized>(
    report: &[ReportRow],
    lookup: &mut L,
    pb: &ProgressBar,
) -> Validation {
    let fuzzy: Vec<&ReportRow> = report
        .iter()
        .filter(|r| r.matching_status == MatchStatus::Fuzzy)
        .collect();
    let names = fuzzy_matched_names(report);
    let mut summary = ValidationSummary {
        total_fuzzy: fuzzy.len(),
        unique_matched: names.len(),
        ..Default::default()
    };

    let mut found: FxHashMap<String, RegistryRecord> = FxHashMap::default();
    for (i, name) in names.iter().enumerate() {
        match lookup.find_organization(name) {
            Ok(Some(record)) => {
                debug!("{:?} -> {}", name, record.npi);
                found.insert(name.clone(), record);
            }
            Ok(None) => debug!("{:?} -> no registry result", name),
            Err(e) => {
                warn!("registry lookup failed for {:?}: {}", name, e);
                summary.lookup_failures += 1;
            }
        }
        pb.inc(1);
        log_progress("validate", i as u64 + 1, names.len() as u64, 25);
    }

    let rows: Vec<ValidationRow> = fuzzy
        .iter()
        .map(|r| {
            let roster_npi = clean_npi(&r.npi_2_from_api);
            let registry = found.get(r.matched_practice_name.trim());
            let registry_npi = registry.and_then(|rec| clean_npi(&rec.npi));
            let status = ValidationStatus::classify(roster_npi.as_deref(), registry_npi.as_deref());
            ValidationRow {
                record_index: r.record_index,
                original_practice: r.original_practice_name.clone(),
                matched_practice: r.matched_practice_name.clone(),
                similarity_score: r.similarity_score,
                roster_npi_2: roster_npi.unwrap_or_default(),
                registry_npi: registry_npi.unwrap_or_default(),
                registry_name: registry.map(|rec| rec.name.clone()).unwrap_or_default(),
                registry_state: registry.map(|rec| rec.state.clone()).unwrap_or_default(),
                status,
                provider_first_name: r.provider_first_name.clone(),
                provider_last_name: r.provider_last_name.clone(),
            }
        })
        .collect();

    let mut totals: FxHashMap<ValidationStatus, u64> = FxHashMap::default();
    for row in &rows {
        *summary.counts.entry(row.status).or_insert(0) += 1;
        *totals.entry(row.status).or_insert(0) += u64::from(row.similarity_score);
    }
    for (status, total) in totals {
        let n = summary.count(status);
        summary.mean_scores.insert(status, total as f64 / n as f64);
    }

    Validation { rows, summary }
}

pub fn write_validation(path: &Path, rows: &[ValidationRow]) -> Result<()> {
    write_csv(path, &VALIDATION_HEADERS, rows)
}
