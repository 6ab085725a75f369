//! Roster enrichment with registry NPIs.
//!
//! Each row gets a provider lookup (first + last name, NPI-1) and an
//! organization lookup (practice name, NPI-2). Results land in six columns
//! that are appended, or overwritten when the roster already has them.

use indicatif::ProgressBar;
use log::{info, warn};

use crate::dataset::Table;
use crate::error::{ReconcileError, Result};
use crate::progress::percent;
use crate::registry::{NpiLookup, RegistryRecord};
use crate::schema::QuerySchema;

pub const ENRICHMENT_COLUMNS: [&str; 6] = [
    "NPI-1",
    "NPI-1_Name",
    "NPI-1_State",
    "NPI-2",
    "NPI-2_Name",
    "NPI-2_State",
];

/// Rows between progress checkpoints
pub const CHECKPOINT_EVERY: usize = 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub total_rows: usize,
    pub processed: usize,
    pub providers_found: usize,
    pub practices_found: usize,
    /// Lookups that errored and were counted as not found
    pub lookup_failures: usize,
}

impl EnrichmentStats {
    pub fn provider_rate(&self) -> f64 {
        percent(self.providers_found, self.processed)
    }

    pub fn practice_rate(&self) -> f64 {
        percent(self.practices_found, self.processed)
    }
}

pub struct EnrichedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub stats: EnrichmentStats,
}

/// Header row with the enrichment columns appended where missing, and the
/// position of each enrichment column.
fn extend_headers(headers: &[String]) -> (Vec<String>, [usize; 6]) {
    let mut extended = headers.to_vec();
    let mut positions = [0usize; 6];
    for (slot, column) in ENRICHMENT_COLUMNS.iter().enumerate() {
        positions[slot] = match extended.iter().position(|h| h == column) {
            Some(p) => p,
            None => {
                extended.push(column.to_string());
                extended.len() - 1
            }
        };
    }
    (extended, positions)
}

fn resolve_or_warn(
    found: Result<Option<RegistryRecord>>,
    what: &str,
    stats: &mut EnrichmentStats,
) -> Option<RegistryRecord> {
    match found {
        Ok(record) => record,
        Err(e) => {
            warn!("registry lookup failed for {}: {}", what, e);
            stats.lookup_failures += 1;
            None
        }
    }
}

/// Enrich the first `limit` rows (all rows when `None`). Rows past the limit
/// keep blank enrichment columns.
pub fn enrich_roster<L: NpiLookup + ?Sized>(
    table: &Table,
    schema: &QuerySchema,
    lookup: &mut L,
    limit: Option<usize>,
    pb: &ProgressBar,
) -> Result<EnrichedTable> {
    let columns = schema.resolve(table);
    let providers = columns.provider_first_name.is_some() && columns.provider_last_name.is_some();
    let practices = columns.practice_name.is_some();
    if !providers && !practices {
        return Err(ReconcileError::MissingColumn {
            table: table.name().to_string(),
            tried: format!(
                "{} + {}, or {}",
                schema.provider_first_name.join("|"),
                schema.provider_last_name.join("|"),
                schema.practice_name.join("|")
            ),
        });
    }

    let (headers, positions) = extend_headers(table.headers());
    let width = headers.len();
    let to_process = limit.unwrap_or(table.len()).min(table.len());
    let mut stats = EnrichmentStats {
        total_rows: table.len(),
        ..Default::default()
    };

    let mut rows = Vec::with_capacity(table.len());
    for (i, source) in table.rows().iter().enumerate() {
        let mut row = source.clone();
        row.resize(width, String::new());
        for &p in &positions {
            row[p].clear();
        }

        if i < to_process {
            let record = columns.record(i, source);

            if providers {
                let first = record.provider_first_name.as_deref().unwrap_or("");
                let last = record.provider_last_name.as_deref().unwrap_or("");
                let found = resolve_or_warn(
                    lookup.find_provider(first, last),
                    &format!("provider {first} {last}"),
                    &mut stats,
                );
                if let Some(found) = found {
                    row[positions[0]] = found.npi;
                    row[positions[1]] = found.name;
                    row[positions[2]] = found.state;
                    stats.providers_found += 1;
                }
            }

            if practices {
                let practice = record.practice_name.as_deref().unwrap_or("");
                let found = resolve_or_warn(
                    lookup.find_organization(practice),
                    &format!("practice {practice}"),
                    &mut stats,
                );
                if let Some(found) = found {
                    row[positions[3]] = found.npi;
                    row[positions[4]] = found.name;
                    row[positions[5]] = found.state;
                    stats.practices_found += 1;
                }
            }

            stats.processed += 1;
            pb.inc(1);
            if stats.processed % CHECKPOINT_EVERY == 0 {
                info!(
                    "checkpoint {}/{} ({:.1}%): providers found {}, practices found {}",
                    stats.processed,
                    to_process,
                    percent(stats.processed, to_process),
                    stats.providers_found,
                    stats.practices_found
                );
            }
        }

        rows.push(row);
    }

    Ok(EnrichedTable {
        headers,
        rows,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::FakeRegistry;

    fn roster() -> Table {
        let data = "\
PROVIDER_FIRST_NAME,PROVIDER_LAST_NAME,Practice Name,NPI-2
Jane,Doe,Acme Clinic,stale
John,Roe,N/A,
,Solo,Beta Health,
";
        Table::from_reader("roster", data.as_bytes()).unwrap()
    }

    fn registry() -> FakeRegistry {
        let mut fake = FakeRegistry::default();
        fake.providers.insert(
            "Jane Doe".to_string(),
            FakeRegistry::record("1111111111", "JANE DOE", "CO"),
        );
        fake.organizations.insert(
            "Acme Clinic".to_string(),
            FakeRegistry::record("2222222222", "ACME CLINIC LLC", "CO"),
        );
        fake
    }

    /// Fake that mirrors the real client's blank-input skip rules.
    struct SkippingRegistry(FakeRegistry);

    impl NpiLookup for SkippingRegistry {
        fn find_provider(&mut self, first: &str, last: &str) -> Result<Option<RegistryRecord>> {
            if first.trim().is_empty() || last.trim().is_empty() {
                return Ok(None);
            }
            self.0.find_provider(first, last)
        }

        fn find_organization(&mut self, name: &str) -> Result<Option<RegistryRecord>> {
            if crate::normalize::is_placeholder(name) {
                return Ok(None);
            }
            self.0.find_organization(name)
        }
    }

    #[test]
    fn test_enrich_all_rows() {
        let table = roster();
        let mut lookup = SkippingRegistry(registry());
        let enriched = enrich_roster(
            &table,
            &QuerySchema::default(),
            &mut lookup,
            None,
            &ProgressBar::hidden(),
        )
        .unwrap();

        assert_eq!(
            enriched.headers,
            vec![
                "PROVIDER_FIRST_NAME",
                "PROVIDER_LAST_NAME",
                "Practice Name",
                "NPI-2",
                "NPI-1",
                "NPI-1_Name",
                "NPI-1_State",
                "NPI-2_Name",
                "NPI-2_State",
            ]
        );
        let first = &enriched.rows[0];
        assert_eq!(first[4], "1111111111");
        assert_eq!(first[5], "JANE DOE");
        assert_eq!(first[3], "2222222222");
        assert_eq!(first[8], "CO");

        assert_eq!(enriched.rows[1][3], "");
        assert!(enriched.rows.iter().all(|r| r[3] != "stale"));
        assert_eq!(enriched.stats.providers_found, 1);
        assert_eq!(enriched.stats.practices_found, 1);
        assert_eq!(enriched.stats.processed, 3);

        // Placeholder practice and blank first name never reach the registry
        assert!(!lookup.0.calls.contains(&"N/A".to_string()));
        assert!(!lookup.0.calls.iter().any(|c| c.ends_with("Solo")));
    }

    #[test]
    fn test_limit_leaves_rest_blank() {
        let table = roster();
        let mut lookup = registry();
        let enriched = enrich_roster(
            &table,
            &QuerySchema::default(),
            &mut lookup,
            Some(1),
            &ProgressBar::hidden(),
        )
        .unwrap();
        assert_eq!(enriched.rows.len(), 3);
        assert_eq!(enriched.stats.processed, 1);
        assert_eq!(lookup.calls.len(), 2);
        assert!(enriched.rows[2][4..].iter().all(String::is_empty));
    }

    #[test]
    fn test_failures_count_as_not_found() {
        let table = roster();
        let mut lookup = registry();
        lookup.failing.push("Jane Doe".to_string());
        lookup.failing.push("Acme Clinic".to_string());
        let enriched = enrich_roster(
            &table,
            &QuerySchema::default(),
            &mut lookup,
            Some(1),
            &ProgressBar::hidden(),
        )
        .unwrap();
        assert_eq!(enriched.stats.lookup_failures, 2);
        assert_eq!(enriched.stats.providers_found, 0);
        assert_eq!(enriched.rows[0][4], "");
    }

    #[test]
    fn test_missing_name_columns() {
        let table = Table::from_reader("roster", "Foo\nbar\n".as_bytes()).unwrap();
        let result = enrich_roster(
            &table,
            &QuerySchema::default(),
            &mut registry(),
            None,
            &ProgressBar::hidden(),
        );
        assert!(matches!(result, Err(ReconcileError::MissingColumn { .. })));
    }
}
