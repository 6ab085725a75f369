//! Column mappings for the roster (query) and reference (candidate) tables.
//!
//! Each logical field has an ordered alias list. A mapping is resolved once
//! against a table's header row; rows are then coerced into typed records.

use serde::Deserialize;

use crate::dataset::Table;
use crate::error::{ReconcileError, Result};
use crate::models::{CandidateRecord, QueryRecord};
use crate::normalize::{clean_cell, clean_npi};

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn cell(row: &[String], column: Option<usize>) -> Option<String> {
    column.and_then(|c| clean_cell(&row[c]))
}

fn npi_cell(row: &[String], column: Option<usize>) -> Option<String> {
    column.and_then(|c| clean_npi(&row[c]))
}

// ============================================================================
// Roster (query) Schema
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QuerySchema {
    pub record_id: Vec<String>,
    pub practice_name: Vec<String>,
    pub provider_first_name: Vec<String>,
    pub provider_last_name: Vec<String>,
    pub npi_1: Vec<String>,
    pub npi_2: Vec<String>,
}

impl Default for QuerySchema {
    fn default() -> Self {
        Self {
            record_id: aliases(&["Record_Id", "Record ID", "ID"]),
            practice_name: aliases(&["Practice Name", "Practice_Name"]),
            provider_first_name: aliases(&["PROVIDER_FIRST_NAME", "First Name"]),
            provider_last_name: aliases(&["PROVIDER_LAST_NAME", "Last Name"]),
            npi_1: aliases(&["NPI-1"]),
            npi_2: aliases(&["NPI-2"]),
        }
    }
}

/// Column positions of a roster table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryColumns {
    pub record_id: Option<usize>,
    pub practice_name: Option<usize>,
    pub provider_first_name: Option<usize>,
    pub provider_last_name: Option<usize>,
    pub npi_1: Option<usize>,
    pub npi_2: Option<usize>,
}

impl QuerySchema {
    /// Resolve every field that is present; none is required here.
    pub fn resolve(&self, table: &Table) -> QueryColumns {
        QueryColumns {
            record_id: table.resolve(&self.record_id),
            practice_name: table.resolve(&self.practice_name),
            provider_first_name: table.resolve(&self.provider_first_name),
            provider_last_name: table.resolve(&self.provider_last_name),
            npi_1: table.resolve(&self.npi_1),
            npi_2: table.resolve(&self.npi_2),
        }
    }

    /// Resolve for matching, where the practice-name column is required.
    pub fn resolve_for_matching(&self, table: &Table) -> Result<QueryColumns> {
        let columns = self.resolve(table);
        if columns.practice_name.is_none() {
            return Err(ReconcileError::MissingColumn {
                table: table.name().to_string(),
                tried: self.practice_name.join(", "),
            });
        }
        Ok(columns)
    }
}

impl QueryColumns {
    pub fn record(&self, index: usize, row: &[String]) -> QueryRecord {
        QueryRecord {
            row: index + 1,
            record_id: cell(row, self.record_id),
            practice_name: cell(row, self.practice_name),
            provider_first_name: cell(row, self.provider_first_name),
            provider_last_name: cell(row, self.provider_last_name),
            npi_1: npi_cell(row, self.npi_1),
            npi_2: npi_cell(row, self.npi_2),
        }
    }

    pub fn records(&self, table: &Table) -> Vec<QueryRecord> {
        table
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| self.record(i, row))
            .collect()
    }
}

// ============================================================================
// Reference (candidate) Schema
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CandidateSchema {
    pub npi: Vec<String>,
    pub provider_name: Vec<String>,
    pub city: Vec<String>,
    pub state: Vec<String>,
    pub tab_source: Vec<String>,
    /// Case-insensitive header fragments that mark a practice-name column
    pub practice_keywords: Vec<String>,
    /// Explicit practice columns; when set, keyword discovery is skipped
    pub practice_columns: Vec<String>,
}

impl Default for CandidateSchema {
    fn default() -> Self {
        Self {
            npi: aliases(&["NPI", "npi"]),
            provider_name: aliases(&["Last Name", "First Name"]),
            city: aliases(&["City", "city"]),
            state: aliases(&["State", "state"]),
            tab_source: aliases(&["tab_source", "Tab Source"]),
            practice_keywords: aliases(&[
                "practice",
                "organization",
                "medical group",
                "company",
                "facility",
                "clinic",
                "hospital",
                "group",
                "affiliation",
                "health",
                "system",
            ]),
            practice_columns: Vec::new(),
        }
    }
}

/// Column positions of a reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateColumns {
    pub npi: Option<usize>,
    pub provider_name: Option<usize>,
    pub city: Option<usize>,
    pub state: Option<usize>,
    pub tab_source: Option<usize>,
    /// (header, position) in discovery order
    pub practice: Vec<(String, usize)>,
}

impl CandidateSchema {
    pub fn resolve(&self, table: &Table) -> Result<CandidateColumns> {
        let npi = table.resolve(&self.npi);
        let provider_name = table.resolve(&self.provider_name);
        let city = table.resolve(&self.city);
        let state = table.resolve(&self.state);
        let tab_source = table.resolve(&self.tab_source);

        let practice = if self.practice_columns.is_empty() {
            let claimed = [npi, provider_name, city, state, tab_source];
            self.discover_practice_columns(table, &claimed)
        } else {
            let mut explicit = Vec::with_capacity(self.practice_columns.len());
            for header in &self.practice_columns {
                let position = table.column_index(header).ok_or_else(|| {
                    ReconcileError::MissingColumn {
                        table: table.name().to_string(),
                        tried: header.clone(),
                    }
                })?;
                explicit.push((header.clone(), position));
            }
            explicit
        };

        if practice.is_empty() {
            return Err(ReconcileError::MissingColumn {
                table: table.name().to_string(),
                tried: format!("practice columns matching {}", self.practice_keywords.join("|")),
            });
        }

        Ok(CandidateColumns {
            npi,
            provider_name,
            city,
            state,
            tab_source,
            practice,
        })
    }

    /// Headers containing any keyword, in header order. Columns already
    /// claimed by another field are not practice names.
    fn discover_practice_columns(
        &self,
        table: &Table,
        claimed: &[Option<usize>],
    ) -> Vec<(String, usize)> {
        let keywords: Vec<String> = self
            .practice_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .collect();

        table
            .headers()
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed.contains(&Some(*i)))
            .filter(|(_, header)| {
                let lower = header.to_lowercase();
                keywords.iter().any(|k| lower.contains(k.as_str()))
            })
            .map(|(i, header)| (header.clone(), i))
            .collect()
    }
}

impl CandidateColumns {
    pub fn practice_headers(&self) -> Vec<String> {
        self.practice.iter().map(|(h, _)| h.clone()).collect()
    }

    pub fn record(&self, index: usize, row: &[String]) -> CandidateRecord {
        CandidateRecord {
            row: index + 1,
            npi: npi_cell(row, self.npi),
            provider_name: cell(row, self.provider_name),
            city: cell(row, self.city),
            state: cell(row, self.state).map(|s| s.to_uppercase()),
            tab_source: cell(row, self.tab_source),
            names: self
                .practice
                .iter()
                .map(|(_, position)| clean_cell(&row[*position]))
                .collect(),
        }
    }

    pub fn records(&self, table: &Table) -> Vec<CandidateRecord> {
        table
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| self.record(i, row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(data: &str) -> Table {
        Table::from_reader("test", data.as_bytes()).unwrap()
    }

    #[test]
    fn test_query_schema_resolves_and_coerces() {
        let t = table(
            "PROVIDER_FIRST_NAME,PROVIDER_LAST_NAME,Practice Name,NPI-1,NPI-2\n\
             Jane,Doe, Acme Clinic ,1234567893.0,nan\n",
        );
        let columns = QuerySchema::default().resolve_for_matching(&t).unwrap();
        let records = columns.records(&t);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.row, 1);
        assert_eq!(r.record_id, None);
        assert_eq!(r.practice_name.as_deref(), Some("Acme Clinic"));
        assert_eq!(r.provider_first_name.as_deref(), Some("Jane"));
        assert_eq!(r.npi_1.as_deref(), Some("1234567893"));
        assert_eq!(r.npi_2, None);
    }

    #[test]
    fn test_query_schema_missing_practice_column() {
        let t = table("Name\nAcme\n");
        let err = QuerySchema::default().resolve_for_matching(&t).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingColumn { .. }));
        assert!(err.to_string().contains("Practice Name"));
    }

    #[test]
    fn test_candidate_fallback_chains() {
        let t = table("npi,city,state,First Name,Medical Group\n42.0,Boise,id,Ann,Acme\n");
        let columns = CandidateSchema::default().resolve(&t).unwrap();
        assert_eq!(columns.npi, Some(0));
        assert_eq!(columns.provider_name, Some(3));
        let record = columns.record(0, &t.rows()[0]);
        assert_eq!(record.npi.as_deref(), Some("42"));
        assert_eq!(record.city.as_deref(), Some("Boise"));
        assert_eq!(record.state.as_deref(), Some("ID"));
        assert_eq!(record.provider_name.as_deref(), Some("Ann"));
        assert_eq!(record.names, vec![Some("Acme".to_string())]);
    }

    #[test]
    fn test_practice_column_discovery() {
        let t = table("NPI,Practice Name,City,Hospital Affiliation,Tab Source,Notes\n1,a,b,c,d,e\n");
        let columns = CandidateSchema::default().resolve(&t).unwrap();
        assert_eq!(
            columns.practice_headers(),
            vec!["Practice Name".to_string(), "Hospital Affiliation".to_string()]
        );
    }

    #[test]
    fn test_explicit_practice_columns() {
        let t = table("NPI,Org,Practice Name\n1,a,b\n");
        let schema = CandidateSchema {
            practice_columns: vec!["Org".to_string()],
            ..Default::default()
        };
        let columns = schema.resolve(&t).unwrap();
        assert_eq!(columns.practice, vec![("Org".to_string(), 1)]);

        let missing = CandidateSchema {
            practice_columns: vec!["Nope".to_string()],
            ..Default::default()
        };
        assert!(missing.resolve(&t).is_err());
    }

    #[test]
    fn test_no_practice_columns_fails() {
        let t = table("NPI,City\n1,Boise\n");
        let err = CandidateSchema::default().resolve(&t).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingColumn { .. }));
    }
}
