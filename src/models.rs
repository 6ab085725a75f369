//! Core data models for practice-name reconciliation.
//!
//! This module contains the typed record shapes produced at load time and
//! the match results produced by the pipeline.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::scoring::{Score, EXACT_SCORE};

// ============================================================================
// Reference (candidate) Models
// ============================================================================

/// One row of the reference dataset, coerced at load time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateRecord {
    /// 1-based data row in the source file
    pub row: usize,
    pub npi: Option<String>,
    pub provider_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub tab_source: Option<String>,
    /// Raw practice-name cells, aligned with the index's name columns
    pub names: Vec<Option<String>>,
}

/// A single (column, row) practice name held by the candidate index.
#[derive(Clone, Debug)]
pub struct CandidateName {
    pub raw: String,
    pub normalized: String,
    pub column: Arc<str>,
    /// Position of the owning record in the index
    pub record: usize,
}

// ============================================================================
// Roster (query) Models
// ============================================================================

/// One roster row. Only `practice_name` takes part in matching; the other
/// fields are carried through to the report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryRecord {
    /// 1-based data row in the roster
    pub row: usize,
    pub record_id: Option<String>,
    pub practice_name: Option<String>,
    pub provider_first_name: Option<String>,
    pub provider_last_name: Option<String>,
    pub npi_1: Option<String>,
    pub npi_2: Option<String>,
}

impl QueryRecord {
    /// Query text as it appeared in the roster ("" when absent).
    pub fn query_text(&self) -> &str {
        self.practice_name.as_deref().unwrap_or("")
    }
}

// ============================================================================
// Match Models
// ============================================================================

/// The candidate a query resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchedCandidate {
    /// Raw candidate name as it appears in the reference dataset
    pub name: String,
    pub column: String,
    pub record: CandidateRecord,
}

/// Outcome of matching one distinct query name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchResult {
    Exact {
        query: String,
        candidate: MatchedCandidate,
    },
    Fuzzy {
        query: String,
        candidate: MatchedCandidate,
        score: Score,
    },
    Unmatched {
        query: String,
    },
}

impl MatchResult {
    pub fn query(&self) -> &str {
        match self {
            MatchResult::Exact { query, .. }
            | MatchResult::Fuzzy { query, .. }
            | MatchResult::Unmatched { query } => query,
        }
    }

    pub fn score(&self) -> Score {
        match self {
            MatchResult::Exact { .. } => EXACT_SCORE,
            MatchResult::Fuzzy { score, .. } => *score,
            MatchResult::Unmatched { .. } => 0,
        }
    }

    pub fn candidate(&self) -> Option<&MatchedCandidate> {
        match self {
            MatchResult::Exact { candidate, .. } | MatchResult::Fuzzy { candidate, .. } => {
                Some(candidate)
            }
            MatchResult::Unmatched { .. } => None,
        }
    }

    pub fn status(&self) -> MatchStatus {
        match self {
            MatchResult::Exact { .. } => MatchStatus::Exact,
            MatchResult::Fuzzy { .. } => MatchStatus::Fuzzy,
            MatchResult::Unmatched { .. } => MatchStatus::Unmatched,
        }
    }
}

/// Per-record status written to the matching report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    #[serde(rename = "Matched (Exact)")]
    Exact,
    #[serde(rename = "Matched (Fuzzy)")]
    Fuzzy,
    #[serde(rename = "Not Matched")]
    Unmatched,
    #[serde(rename = "No Practice Name")]
    NoQueryValue,
}
