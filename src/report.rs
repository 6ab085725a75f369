//! Per-record matching report.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dataset::write_csv;
use crate::error::Result;
use crate::models::{MatchResult, MatchStatus, QueryRecord};
use crate::normalize::normalize_name;
use crate::scoring::Score;

/// Report header, in column order.
pub const REPORT_HEADERS: [&str; 16] = [
    "Record_Index",
    "Record_Id",
    "Provider_First_Name",
    "Provider_Last_Name",
    "Original_Practice_Name",
    "Matching_Status",
    "Matched_Practice_Name",
    "Similarity_Score",
    "Matched_NPI",
    "Matched_Column",
    "Associated_Provider",
    "City",
    "State",
    "Tab_Source",
    "NPI-1_From_API",
    "NPI-2_From_API",
];

/// One report line. Field order matches `REPORT_HEADERS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "Record_Index")]
    pub record_index: usize,
    #[serde(rename = "Record_Id", default)]
    pub record_id: String,
    #[serde(rename = "Provider_First_Name", default)]
    pub provider_first_name: String,
    #[serde(rename = "Provider_Last_Name", default)]
    pub provider_last_name: String,
    #[serde(rename = "Original_Practice_Name", default)]
    pub original_practice_name: String,
    #[serde(rename = "Matching_Status")]
    pub matching_status: MatchStatus,
    #[serde(rename = "Matched_Practice_Name", default)]
    pub matched_practice_name: String,
    #[serde(rename = "Similarity_Score", default)]
    pub similarity_score: Score,
    #[serde(rename = "Matched_NPI", default)]
    pub matched_npi: String,
    #[serde(rename = "Matched_Column", default)]
    pub matched_column: String,
    #[serde(rename = "Associated_Provider", default)]
    pub associated_provider: String,
    #[serde(rename = "City", default)]
    pub city: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Tab_Source", default)]
    pub tab_source: String,
    #[serde(rename = "NPI-1_From_API", default)]
    pub npi_1_from_api: String,
    #[serde(rename = "NPI-2_From_API", default)]
    pub npi_2_from_api: String,
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

impl ReportRow {
    fn unmatched(position: usize, query: &QueryRecord, status: MatchStatus) -> Self {
        Self {
            record_index: position + 1,
            record_id: text(&query.record_id),
            provider_first_name: text(&query.provider_first_name),
            provider_last_name: text(&query.provider_last_name),
            original_practice_name: text(&query.practice_name),
            matching_status: status,
            matched_practice_name: String::new(),
            similarity_score: 0,
            matched_npi: String::new(),
            matched_column: String::new(),
            associated_provider: String::new(),
            city: String::new(),
            state: String::new(),
            tab_source: String::new(),
            npi_1_from_api: text(&query.npi_1),
            npi_2_from_api: text(&query.npi_2),
        }
    }

    fn from_result(position: usize, query: &QueryRecord, result: &MatchResult) -> Self {
        let mut row = Self::unmatched(position, query, result.status());
        row.similarity_score = result.score();
        if let Some(candidate) = result.candidate() {
            let record = &candidate.record;
            row.matched_practice_name = candidate.name.clone();
            row.matched_column = candidate.column.clone();
            row.matched_npi = text(&record.npi);
            row.associated_provider = text(&record.provider_name);
            row.city = text(&record.city);
            row.state = text(&record.state);
            row.tab_source = text(&record.tab_source);
        }
        row
    }
}

/// Build one row per query record, in input order.
///
/// Results are keyed by the query's practice-name text. A record whose name
/// normalizes to nothing is `NoQueryValue`; a name with no result in either
/// map is `Unmatched`.
pub fn build_report(
    queries: &[QueryRecord],
    exact_results: &FxHashMap<String, MatchResult>,
    fuzzy_results: &FxHashMap<String, MatchResult>,
) -> Vec<ReportRow> {
    queries
        .iter()
        .enumerate()
        .map(|(position, query)| {
            let text = query.query_text();
            if normalize_name(text).is_empty() {
                return ReportRow::unmatched(position, query, MatchStatus::NoQueryValue);
            }
            match exact_results.get(text).or_else(|| fuzzy_results.get(text)) {
                Some(result) => ReportRow::from_result(position, query, result),
                None => ReportRow::unmatched(position, query, MatchStatus::Unmatched),
            }
        })
        .collect()
}

pub fn write_report(path: &Path, rows: &[ReportRow]) -> Result<()> {
    write_csv(path, &REPORT_HEADERS, rows)
}

/// Read a report written by `write_report`.
pub fn read_report(path: &Path) -> Result<Vec<ReportRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateRecord, MatchedCandidate};
    use tempfile::tempdir;

    fn query(name: Option<&str>) -> QueryRecord {
        QueryRecord {
            row: 1,
            practice_name: name.map(str::to_string),
            provider_first_name: Some("Jane".to_string()),
            npi_2: Some("1999".to_string()),
            ..Default::default()
        }
    }

    fn candidate(name: &str, npi: &str) -> MatchedCandidate {
        MatchedCandidate {
            name: name.to_string(),
            column: "Practice Name".to_string(),
            record: CandidateRecord {
                row: 4,
                npi: Some(npi.to_string()),
                provider_name: Some("Smith".to_string()),
                city: Some("Denver".to_string()),
                state: Some("CO".to_string()),
                tab_source: Some("Ellkay".to_string()),
                names: vec![Some(name.to_string())],
            },
        }
    }

    #[test]
    fn test_statuses_and_fields() {
        let queries = vec![
            query(Some("Acme Clinic Inc")),
            query(Some("Saint Marys Med Grp")),
            query(Some("Nowhere Practice")),
            query(Some("N/A")),
            query(None),
            query(Some("Acme Clinic Inc")),
        ];
        let mut exact = FxHashMap::default();
        exact.insert(
            "Acme Clinic Inc".to_string(),
            MatchResult::Exact {
                query: "Acme Clinic Inc".to_string(),
                candidate: candidate("ACME CLINIC CORP", "1111"),
            },
        );
        let mut fuzzy = FxHashMap::default();
        fuzzy.insert(
            "Saint Marys Med Grp".to_string(),
            MatchResult::Fuzzy {
                query: "Saint Marys Med Grp".to_string(),
                candidate: candidate("St. Mary's Medical Group, LLC", "9988"),
                score: 84,
            },
        );
        fuzzy.insert(
            "Nowhere Practice".to_string(),
            MatchResult::Unmatched {
                query: "Nowhere Practice".to_string(),
            },
        );

        let report = build_report(&queries, &exact, &fuzzy);
        assert_eq!(report.len(), queries.len());

        let statuses: Vec<MatchStatus> = report.iter().map(|r| r.matching_status).collect();
        assert_eq!(
            statuses,
            vec![
                MatchStatus::Exact,
                MatchStatus::Fuzzy,
                MatchStatus::Unmatched,
                MatchStatus::NoQueryValue,
                MatchStatus::NoQueryValue,
                MatchStatus::Exact,
            ]
        );

        assert_eq!(report[0].similarity_score, 100);
        assert_eq!(report[0].matched_npi, "1111");
        assert_eq!(report[0].associated_provider, "Smith");
        assert_eq!(report[0].state, "CO");
        assert_eq!(report[0].tab_source, "Ellkay");
        assert_eq!(report[1].matched_npi, "9988");
        assert_eq!(report[1].similarity_score, 84);

        let na = &report[3];
        assert_eq!(na.original_practice_name, "N/A");
        assert_eq!(na.similarity_score, 0);
        assert!(na.matched_practice_name.is_empty());
        assert!(na.matched_npi.is_empty());
        assert!(na.matched_column.is_empty());
        // Roster identifiers pass through on every row
        assert_eq!(na.provider_first_name, "Jane");
        assert_eq!(na.npi_2_from_api, "1999");

        let indices: Vec<usize> = report.iter().map(|r| r.record_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_empty_queries() {
        let report = build_report(&[], &FxHashMap::default(), &FxHashMap::default());
        assert!(report.is_empty());
    }

    #[test]
    fn test_missing_result_is_unmatched() {
        let report = build_report(
            &[query(Some("Orphan Clinic"))],
            &FxHashMap::default(),
            &FxHashMap::default(),
        );
        assert_eq!(report[0].matching_status, MatchStatus::Unmatched);
    }

    #[test]
    fn test_write_and_read_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matching_report.csv");
        let rows = build_report(
            &[query(Some("N/A"))],
            &FxHashMap::default(),
            &FxHashMap::default(),
        );
        write_report(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Record_Index,Record_Id,Provider_First_Name"));
        assert!(text.contains("No Practice Name"));
        assert_eq!(read_report(&path).unwrap(), rows);
    }
}
