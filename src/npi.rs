//! NPI frequency analysis and reference-dataset coverage.
//!
//! Both reports work on raw tables: NPI cells are cleaned with `clean_npi`
//! and counted, so float-exported values ("1234567893.0") and blank or "nan"
//! cells never create spurious identifiers.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::dataset::Table;
use crate::normalize::{clean_cell, clean_npi};
use crate::progress::percent;
use crate::schema::QuerySchema;

/// Top share above which a single NPI dominates a column
pub const HIGH_CONCENTRATION_PCT: f64 = 10.0;
pub const MODERATE_CONCENTRATION_PCT: f64 = 5.0;
/// Combined share of the top three NPIs that flags a skewed column
pub const SKEWED_TOP3_PCT: f64 = 25.0;

pub const DEFAULT_TOP_N: usize = 10;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// Column Specs
// ============================================================================

/// One roster NPI column analysed by the frequency report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpiColumnSpec {
    /// Label used in the report, e.g. "API Provider NPI"
    pub category: String,
    pub column: String,
    /// "Original", "Provider" or "Practice"
    pub entity_type: String,
    /// Cells joined with a space to describe the entity
    pub name_columns: Vec<String>,
    pub state_column: Option<String>,
}

impl NpiColumnSpec {
    fn new(category: &str, column: &str, entity_type: &str, names: &[&str], state: &str) -> Self {
        Self {
            category: category.to_string(),
            column: column.to_string(),
            entity_type: entity_type.to_string(),
            name_columns: names.iter().map(|s| s.to_string()).collect(),
            state_column: Some(state.to_string()),
        }
    }
}

/// Roster NPI (`NPI`), practice NPI (`Practice NPI`) and the two registry
/// columns added by enrichment.
pub fn default_column_specs() -> Vec<NpiColumnSpec> {
    vec![
        NpiColumnSpec::new(
            "Original NPI",
            "NPI",
            "Original",
            &["PROVIDER_FIRST_NAME", "PROVIDER_LAST_NAME"],
            "Provider Address State",
        ),
        NpiColumnSpec::new(
            "Practice NPI",
            "Practice NPI",
            "Original",
            &["Practice Name"],
            "Provider Address State",
        ),
        NpiColumnSpec::new("API Provider NPI", "NPI-1", "Provider", &["NPI-1_Name"], "NPI-1_State"),
        NpiColumnSpec::new("API Practice NPI", "NPI-2", "Practice", &["NPI-2_Name"], "NPI-2_State"),
    ]
}

// ============================================================================
// Counting
// ============================================================================

/// Cleaned NPI values of one column, in row order.
pub fn npi_values(table: &Table, column: usize) -> Vec<String> {
    table.rows().iter().filter_map(|row| clean_npi(&row[column])).collect()
}

/// Distinct cleaned NPIs of one column.
pub fn npi_set(table: &Table, header: &str) -> FxHashSet<String> {
    match table.column_index(header) {
        Some(column) => npi_values(table, column).into_iter().collect(),
        None => FxHashSet::default(),
    }
}

/// (npi, count), most frequent first. Ties keep first-seen order.
pub fn count_npis(values: &[String]) -> Vec<(String, usize)> {
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    let mut order: Vec<&str> = Vec::new();
    for value in values {
        let count = counts.entry(value.as_str()).or_insert(0);
        if *count == 0 {
            order.push(value.as_str());
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|npi| (npi.to_string(), counts[npi]))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Name and state from the first row carrying `npi` in `column`.
fn entity_details(table: &Table, column: usize, npi: &str, spec: &NpiColumnSpec) -> (String, String) {
    let Some(row) = table
        .rows()
        .iter()
        .find(|row| clean_npi(&row[column]).as_deref() == Some(npi))
    else {
        return (String::new(), String::new());
    };

    let name = spec
        .name_columns
        .iter()
        .filter_map(|h| table.column_index(h))
        .filter_map(|c| clean_cell(&row[c]))
        .collect::<Vec<_>>()
        .join(" ");
    let state = spec
        .state_column
        .as_deref()
        .and_then(|h| table.column_index(h))
        .and_then(|c| clean_cell(&row[c]))
        .unwrap_or_default();
    (name, state)
}

// ============================================================================
// Frequency Analysis
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TopNpi {
    pub rank: usize,
    pub npi: String,
    pub count: usize,
    pub percentage: f64,
    pub entity_name: String,
    pub entity_state: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFrequency {
    pub spec: NpiColumnSpec,
    pub total: usize,
    pub unique: usize,
    pub top: Vec<TopNpi>,
}

impl ColumnFrequency {
    pub fn average_frequency(&self) -> f64 {
        if self.unique == 0 {
            0.0
        } else {
            self.total as f64 / self.unique as f64
        }
    }
}

/// Frequency of one column, or `None` when the column is absent or holds no
/// usable NPI.
pub fn analyze_column(table: &Table, spec: &NpiColumnSpec, top_n: usize) -> Option<ColumnFrequency> {
    let column = table.column_index(&spec.column)?;
    let values = npi_values(table, column);
    if values.is_empty() {
        return None;
    }

    let ranked = count_npis(&values);
    let top = ranked
        .iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (npi, count))| {
            let (entity_name, entity_state) = entity_details(table, column, npi, spec);
            TopNpi {
                rank: i + 1,
                npi: npi.clone(),
                count: *count,
                percentage: percent(*count, values.len()),
                entity_name,
                entity_state,
            }
        })
        .collect();

    Some(ColumnFrequency {
        spec: spec.clone(),
        total: values.len(),
        unique: ranked.len(),
        top,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcentrationLevel {
    High,
    Moderate,
    WellDistributed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationInsight {
    pub level: ConcentrationLevel,
    /// Share of the most frequent NPI
    pub top_share: f64,
    pub top3_share: f64,
    pub skewed: bool,
}

pub fn concentration(frequency: &ColumnFrequency) -> Option<ConcentrationInsight> {
    let first = frequency.top.first()?;
    let top_share = percent(first.count, frequency.total);
    let top3: usize = frequency.top.iter().take(3).map(|t| t.count).sum();
    let top3_share = percent(top3, frequency.total);

    let level = if top_share > HIGH_CONCENTRATION_PCT {
        ConcentrationLevel::High
    } else if top_share > MODERATE_CONCENTRATION_PCT {
        ConcentrationLevel::Moderate
    } else {
        ConcentrationLevel::WellDistributed
    };

    Some(ConcentrationInsight {
        level,
        top_share,
        top3_share,
        skewed: top3_share > SKEWED_TOP3_PCT,
    })
}

/// Set comparison between two NPI columns of the same table.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap {
    pub left: String,
    pub right: String,
    pub both: usize,
    pub left_only: usize,
    pub right_only: usize,
    /// `both` as a share of the left column's distinct NPIs
    pub overlap_rate: f64,
}

pub fn overlap(table: &Table, left: &str, right: &str) -> Option<Overlap> {
    table.column_index(left)?;
    table.column_index(right)?;
    let left_set = npi_set(table, left);
    let right_set = npi_set(table, right);
    let both = left_set.intersection(&right_set).count();

    Some(Overlap {
        left: left.to_string(),
        right: right.to_string(),
        both,
        left_only: left_set.len() - both,
        right_only: right_set.len() - both,
        overlap_rate: percent(both, left_set.len()),
    })
}

pub const FREQUENCY_HEADERS: [&str; 8] = [
    "Analysis_Category",
    "Rank",
    "NPI",
    "Frequency",
    "Percentage",
    "Entity_Name",
    "State",
    "Entity_Type",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyReportRow {
    pub analysis_category: String,
    pub rank: usize,
    pub npi: String,
    pub frequency: usize,
    pub percentage: f64,
    pub entity_name: String,
    pub state: String,
    pub entity_type: String,
}

pub fn frequency_report(frequencies: &[ColumnFrequency]) -> Vec<FrequencyReportRow> {
    frequencies
        .iter()
        .flat_map(|f| {
            f.top.iter().map(move |t| FrequencyReportRow {
                analysis_category: f.spec.category.clone(),
                rank: t.rank,
                npi: t.npi.clone(),
                frequency: t.count,
                percentage: round1(t.percentage),
                entity_name: t.entity_name.clone(),
                state: t.entity_state.clone(),
                entity_type: f.spec.entity_type.clone(),
            })
        })
        .collect()
}

// ============================================================================
// Reference Coverage
// ============================================================================

/// Every cleaned NPI from reference columns whose header mentions "npi".
pub fn reference_npis(table: &Table) -> FxHashSet<String> {
    let mut npis = FxHashSet::default();
    for (column, header) in table.headers().iter().enumerate() {
        if header.to_lowercase().contains("npi") {
            npis.extend(npi_values(table, column));
        }
    }
    npis
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoverageStatus {
    Found,
    Missing,
    #[serde(rename = "No NPI")]
    NoNpi,
}

impl CoverageStatus {
    pub fn of(npi: Option<&str>, reference: &FxHashSet<String>) -> Self {
        match npi {
            None => CoverageStatus::NoNpi,
            Some(n) if reference.contains(n) => CoverageStatus::Found,
            Some(_) => CoverageStatus::Missing,
        }
    }
}

pub const TOP_COVERAGE_HEADERS: [&str; 8] = [
    "Entity_Type",
    "Rank",
    "NPI",
    "Alignment_Frequency",
    "Alignment_Name",
    "Alignment_State",
    "In_Complete_Dataset",
    "Coverage_Status",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopCoverageRow {
    pub entity_type: String,
    pub rank: usize,
    pub npi: String,
    pub alignment_frequency: usize,
    pub alignment_name: String,
    pub alignment_state: String,
    pub in_complete_dataset: &'static str,
    pub coverage_status: CoverageStatus,
}

/// Top-N NPIs of a frequency column marked found/missing in the reference set.
pub fn top_coverage(frequency: &ColumnFrequency, reference: &FxHashSet<String>) -> Vec<TopCoverageRow> {
    frequency
        .top
        .iter()
        .map(|t| {
            let status = CoverageStatus::of(Some(&t.npi), reference);
            TopCoverageRow {
                entity_type: frequency.spec.entity_type.clone(),
                rank: t.rank,
                npi: t.npi.clone(),
                alignment_frequency: t.count,
                alignment_name: t.entity_name.clone(),
                alignment_state: t.entity_state.clone(),
                in_complete_dataset: if status == CoverageStatus::Found { "Yes" } else { "No" },
                coverage_status: status,
            }
        })
        .collect()
}

pub const COVERAGE_HEADERS: [&str; 10] = [
    "Record_Index",
    "Provider_First_Name",
    "Provider_Last_Name",
    "Practice_Name",
    "NPI-1",
    "NPI-1_Name",
    "NPI-1_Status",
    "NPI-2",
    "NPI-2_Name",
    "NPI-2_Status",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRow {
    pub record_index: usize,
    pub provider_first_name: String,
    pub provider_last_name: String,
    pub practice_name: String,
    pub npi_1: String,
    pub npi_1_name: String,
    pub npi_1_status: CoverageStatus,
    pub npi_2: String,
    pub npi_2_name: String,
    pub npi_2_status: CoverageStatus,
}

/// Distinct-NPI coverage of one roster column.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct UniqueCoverage {
    pub unique: usize,
    pub found: usize,
}

impl UniqueCoverage {
    fn of<'a>(npis: impl IntoIterator<Item = &'a String>, reference: &FxHashSet<String>) -> Self {
        let mut unique = 0;
        let mut found = 0;
        for npi in npis {
            unique += 1;
            if reference.contains(npi) {
                found += 1;
            }
        }
        Self { unique, found }
    }

    pub fn missing(&self) -> usize {
        self.unique - self.found
    }

    pub fn rate(&self) -> f64 {
        percent(self.found, self.unique)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterCoverage {
    pub rows: Vec<CoverageRow>,
    pub npi_1: UniqueCoverage,
    pub npi_2: UniqueCoverage,
    pub combined: UniqueCoverage,
}

/// Per-record NPI-1 / NPI-2 status against the reference set, plus
/// distinct-NPI totals.
pub fn roster_coverage(
    roster: &Table,
    schema: &QuerySchema,
    reference: &FxHashSet<String>,
) -> RosterCoverage {
    let columns = schema.resolve(roster);
    let npi_1_name = roster.column_index("NPI-1_Name");
    let npi_2_name = roster.column_index("NPI-2_Name");
    let text = |row: &[String], column: Option<usize>| {
        column.and_then(|c| clean_cell(&row[c])).unwrap_or_default()
    };

    let mut npi_1_seen: Vec<String> = Vec::new();
    let mut npi_2_seen: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(roster.len());

    for (i, row) in roster.rows().iter().enumerate() {
        let record = columns.record(i, row);
        if let Some(n) = &record.npi_1 {
            npi_1_seen.push(n.clone());
        }
        if let Some(n) = &record.npi_2 {
            npi_2_seen.push(n.clone());
        }
        rows.push(CoverageRow {
            record_index: record.row,
            provider_first_name: record.provider_first_name.clone().unwrap_or_default(),
            provider_last_name: record.provider_last_name.clone().unwrap_or_default(),
            practice_name: record.practice_name.clone().unwrap_or_default(),
            npi_1: record.npi_1.clone().unwrap_or_default(),
            npi_1_name: text(row.as_slice(), npi_1_name),
            npi_1_status: CoverageStatus::of(record.npi_1.as_deref(), reference),
            npi_2: record.npi_2.clone().unwrap_or_default(),
            npi_2_name: text(row.as_slice(), npi_2_name),
            npi_2_status: CoverageStatus::of(record.npi_2.as_deref(), reference),
        });
    }

    let npi_1_set: FxHashSet<String> = npi_1_seen.into_iter().collect();
    let npi_2_set: FxHashSet<String> = npi_2_seen.into_iter().collect();
    let combined_set: FxHashSet<String> = npi_1_set.union(&npi_2_set).cloned().collect();

    RosterCoverage {
        rows,
        npi_1: UniqueCoverage::of(&npi_1_set, reference),
        npi_2: UniqueCoverage::of(&npi_2_set, reference),
        combined: UniqueCoverage::of(&combined_set, reference),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Table {
        let data = "\
PROVIDER_FIRST_NAME,PROVIDER_LAST_NAME,Practice Name,NPI,NPI-1,NPI-1_Name,NPI-1_State,NPI-2,NPI-2_Name,NPI-2_State
Ann,Lee,Acme Clinic,111.0,111,ANN LEE,CO,900,ACME CLINIC,CO
Bob,Ray,Acme Clinic,222,222,BOB RAY,UT,900,ACME CLINIC,CO
Cy,Fox,Beta Health,111,111,ANN LEE,CO,901,BETA HEALTH,ID
Di,Orr,,nan,,,,900,ACME CLINIC,CO
";
        Table::from_reader("roster", data.as_bytes()).unwrap()
    }

    #[test]
    fn test_count_npis_ranked() {
        let values: Vec<String> = ["b", "a", "b", "c", "a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            count_npis(&values),
            vec![("b".to_string(), 3), ("a".to_string(), 2), ("c".to_string(), 1)]
        );
    }

    #[test]
    fn test_count_npis_ties_keep_first_seen() {
        let values: Vec<String> = ["z", "y", "y", "z"].iter().map(|s| s.to_string()).collect();
        let ranked = count_npis(&values);
        assert_eq!(ranked[0].0, "z");
        assert_eq!(ranked[1].0, "y");
    }

    #[test]
    fn test_analyze_column() {
        let table = roster();
        let specs = default_column_specs();
        let npi_2 = analyze_column(&table, &specs[3], 10).unwrap();
        assert_eq!(npi_2.total, 4);
        assert_eq!(npi_2.unique, 2);
        assert_eq!(npi_2.average_frequency(), 2.0);
        assert_eq!(npi_2.top[0].npi, "900");
        assert_eq!(npi_2.top[0].count, 3);
        assert_eq!(npi_2.top[0].percentage, 75.0);
        assert_eq!(npi_2.top[0].entity_name, "ACME CLINIC");
        assert_eq!(npi_2.top[0].entity_state, "CO");

        // Float-exported "111.0" counts with "111"
        let original = analyze_column(&table, &specs[0], 1).unwrap();
        assert_eq!(original.total, 3);
        assert_eq!(original.top.len(), 1);
        assert_eq!(original.top[0].npi, "111");
        assert_eq!(original.top[0].entity_name, "Ann Lee");

        // Absent column
        assert!(analyze_column(&table, &specs[1], 10).is_none());
    }

    #[test]
    fn test_concentration_levels() {
        let table = roster();
        let specs = default_column_specs();
        let npi_2 = analyze_column(&table, &specs[3], 10).unwrap();
        let insight = concentration(&npi_2).unwrap();
        assert_eq!(insight.level, ConcentrationLevel::High);
        assert!(insight.skewed);

        let spread = ColumnFrequency {
            spec: specs[0].clone(),
            total: 100,
            unique: 100,
            top: (1..=3)
                .map(|rank| TopNpi {
                    rank,
                    npi: rank.to_string(),
                    count: 1,
                    percentage: 1.0,
                    entity_name: String::new(),
                    entity_state: String::new(),
                })
                .collect(),
        };
        let insight = concentration(&spread).unwrap();
        assert_eq!(insight.level, ConcentrationLevel::WellDistributed);
        assert!(!insight.skewed);
    }

    #[test]
    fn test_overlap() {
        let table = roster();
        let o = overlap(&table, "NPI", "NPI-1").unwrap();
        assert_eq!(o.both, 2);
        assert_eq!(o.left_only, 0);
        assert_eq!(o.right_only, 0);
        assert_eq!(o.overlap_rate, 100.0);
        assert!(overlap(&table, "Practice NPI", "NPI-2").is_none());
    }

    #[test]
    fn test_frequency_report_rows() {
        let table = roster();
        let freqs: Vec<ColumnFrequency> = default_column_specs()
            .iter()
            .filter_map(|s| analyze_column(&table, s, 2))
            .collect();
        let rows = frequency_report(&freqs);
        // NPI, NPI-1, NPI-2 present with two ranks each
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].analysis_category, "Original NPI");
        assert_eq!(rows[5].entity_type, "Practice");
    }

    #[test]
    fn test_reference_npis_and_coverage() {
        let reference_table = Table::from_reader(
            "ref",
            "NPI,Group NPI,Practice\n111.0,900,A\nnan,,B\n".as_bytes(),
        )
        .unwrap();
        let reference = reference_npis(&reference_table);
        assert_eq!(reference.len(), 2);
        assert!(reference.contains("111"));

        let coverage = roster_coverage(&roster(), &QuerySchema::default(), &reference);
        assert_eq!(coverage.rows.len(), 4);
        assert_eq!(coverage.rows[0].npi_1_status, CoverageStatus::Found);
        assert_eq!(coverage.rows[1].npi_1_status, CoverageStatus::Missing);
        assert_eq!(coverage.rows[3].npi_1_status, CoverageStatus::NoNpi);
        assert_eq!(coverage.rows[3].npi_2_status, CoverageStatus::Found);
        assert_eq!(coverage.rows[0].npi_1_name, "ANN LEE");

        assert_eq!(coverage.npi_1, UniqueCoverage { unique: 2, found: 1 });
        assert_eq!(coverage.npi_2, UniqueCoverage { unique: 2, found: 1 });
        assert_eq!(coverage.combined, UniqueCoverage { unique: 4, found: 2 });
        assert_eq!(coverage.combined.missing(), 2);
        assert_eq!(coverage.combined.rate(), 50.0);
    }

    #[test]
    fn test_top_coverage() {
        let table = roster();
        let reference: FxHashSet<String> = ["900".to_string()].into_iter().collect();
        let npi_2 = analyze_column(&table, &default_column_specs()[3], 10).unwrap();
        let rows = top_coverage(&npi_2, &reference);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].coverage_status, CoverageStatus::Found);
        assert_eq!(rows[0].in_complete_dataset, "Yes");
        assert_eq!(rows[1].coverage_status, CoverageStatus::Missing);
    }
}
