//! Candidate name index built from the practice columns of the reference dataset.
//!
//! Entries are stored column-major: every name of the first practice column
//! in file order, then the second column, and so on. That order is the
//! insertion order exact lookups resolve ties with.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use crate::error::{ReconcileError, Result};
use crate::models::{CandidateName, CandidateRecord, MatchedCandidate};
use crate::normalize::normalize_name;

pub struct CandidateNameIndex {
    columns: Vec<Arc<str>>,
    records: Vec<CandidateRecord>,
    names: Vec<CandidateName>,
    /// normalized key -> entry positions, insertion order
    by_key: FxHashMap<String, Vec<usize>>,
    /// First entry of each distinct raw name, first-seen order
    unique_raw: Vec<usize>,
    /// First entry of each distinct normalized key, first-seen order
    unique_keys: Vec<usize>,
}

impl CandidateNameIndex {
    /// Build the index. Every record must carry exactly one name cell per
    /// column; anything else is a malformed index.
    pub fn build(columns: &[String], records: Vec<CandidateRecord>) -> Result<Self> {
        if let Some(bad) = records.iter().find(|r| r.names.len() != columns.len()) {
            return Err(ReconcileError::MalformedIndex(format!(
                "row {} has {} name cells, expected {}",
                bad.row,
                bad.names.len(),
                columns.len()
            )));
        }

        let columns: Vec<Arc<str>> = columns.iter().map(|c| Arc::from(c.as_str())).collect();

        let mut names = Vec::new();
        let mut by_key: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        let mut unique_raw = Vec::new();
        let mut unique_keys = Vec::new();
        let mut seen_raw: FxHashSet<String> = FxHashSet::default();

        for (col_idx, column) in columns.iter().enumerate() {
            for (record_idx, record) in records.iter().enumerate() {
                let Some(raw) = record.names[col_idx].as_deref() else {
                    continue;
                };
                let normalized = normalize_name(raw);
                // Placeholder cells ("N/A", "none") are never matchable
                if normalized.is_empty() {
                    continue;
                }

                let position = names.len();
                let keyed = by_key.entry(normalized.clone()).or_default();
                if keyed.is_empty() {
                    unique_keys.push(position);
                }
                keyed.push(position);
                if seen_raw.insert(raw.to_string()) {
                    unique_raw.push(position);
                }

                names.push(CandidateName {
                    raw: raw.to_string(),
                    normalized,
                    column: Arc::clone(column),
                    record: record_idx,
                });
            }
        }

        Ok(Self {
            columns,
            records,
            names,
            by_key,
            unique_raw,
            unique_keys,
        })
    }

    pub fn columns(&self) -> &[Arc<str>] {
        &self.columns
    }

    pub fn records(&self) -> &[CandidateRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn entry(&self, position: usize) -> &CandidateName {
        &self.names[position]
    }

    /// First entry whose normalized form equals `key`.
    pub fn lookup(&self, key: &str) -> Option<usize> {
        if key.is_empty() {
            return None;
        }
        self.by_key.get(key).and_then(|positions| positions.first().copied())
    }

    /// Entry positions of the first occurrence of each distinct raw name.
    pub fn unique_raw_positions(&self) -> &[usize] {
        &self.unique_raw
    }

    /// Entry positions of the first occurrence of each distinct normalized key.
    pub fn unique_key_positions(&self) -> &[usize] {
        &self.unique_keys
    }

    pub fn distinct_key_count(&self) -> usize {
        self.unique_keys.len()
    }

    /// Resolve an entry into the owned candidate carried by a match result.
    pub fn matched(&self, position: usize) -> MatchedCandidate {
        let name = &self.names[position];
        MatchedCandidate {
            name: name.raw.clone(),
            column: name.column.to_string(),
            record: self.records[name.record].clone(),
        }
    }
}
