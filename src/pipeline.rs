//! Two-phase reconciliation: exact pass, fuzzy pass on the remainder, report.

use indicatif::ProgressBar;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::index::CandidateNameIndex;
use crate::matcher::{match_exact, FuzzyMatcher};
use crate::models::{MatchResult, MatchStatus, QueryRecord};
use crate::normalize::normalize_name;
use crate::progress::log_progress;
use crate::report::{build_report, ReportRow};
use crate::scoring::Score;

/// Distinct matchable practice names, in first-seen roster order.
/// Names that normalize to nothing are left out; the report marks them.
pub fn distinct_queries(queries: &[QueryRecord]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    queries
        .iter()
        .filter_map(|q| q.practice_name.as_deref())
        .filter(|name| !normalize_name(name).is_empty())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Outcome of the exact phase.
pub struct ExactPass {
    pub matched: FxHashMap<String, MatchResult>,
    /// Names left for the fuzzy phase, in input order
    pub remaining: Vec<String>,
}

pub fn exact_pass(names: &[String], index: &CandidateNameIndex, pb: &ProgressBar) -> ExactPass {
    let mut matched = FxHashMap::default();
    let mut remaining = Vec::new();
    let total = names.len() as u64;

    for (i, name) in names.iter().enumerate() {
        match match_exact(name, index) {
            Some(result) => {
                matched.insert(name.clone(), result);
            }
            None => remaining.push(name.clone()),
        }
        pb.inc(1);
        log_progress("exact", i as u64 + 1, total, 500);
    }

    ExactPass { matched, remaining }
}

/// Fuzzy phase. Every name gets a result, `Unmatched` below the threshold.
pub fn fuzzy_pass(
    names: &[String],
    matcher: &FuzzyMatcher<'_>,
    threshold: Score,
    pb: &ProgressBar,
) -> FxHashMap<String, MatchResult> {
    let mut results = FxHashMap::default();
    let total = names.len() as u64;

    for (i, name) in names.iter().enumerate() {
        let result = matcher
            .match_query(name, threshold)
            .unwrap_or_else(|| MatchResult::Unmatched {
                query: name.clone(),
            });
        if let MatchResult::Fuzzy { score, .. } = &result {
            debug!("fuzzy {:?} score={}", name, score);
        }
        results.insert(name.clone(), result);
        pb.inc(1);
        log_progress("fuzzy", i as u64 + 1, total, 50);
    }

    results
}

// ============================================================================
// Summary
// ============================================================================

/// Counts over distinct practice names (and over roster records where noted).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub total_records: usize,
    pub records_without_practice: usize,
    pub unique_practices: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub total_matches: usize,
    pub unmatched: usize,
    pub threshold: Score,
    pub candidate_columns: Vec<String>,
    pub candidate_names: usize,
}

impl MatchSummary {
    /// Share of distinct practice names, as a percentage.
    pub fn rate(&self, count: usize) -> f64 {
        if self.unique_practices == 0 {
            0.0
        } else {
            100.0 * count as f64 / self.unique_practices as f64
        }
    }
}

/// Everything a run produces.
pub struct Reconciliation {
    pub report: Vec<ReportRow>,
    /// One result per distinct practice name, in first-seen order
    pub results: Vec<MatchResult>,
    pub summary: MatchSummary,
}

/// Assemble results, report and summary from the two phases.
pub fn assemble(
    queries: &[QueryRecord],
    names: &[String],
    exact: ExactPass,
    fuzzy: FxHashMap<String, MatchResult>,
    index: &CandidateNameIndex,
    threshold: Score,
) -> Reconciliation {
    let report = build_report(queries, &exact.matched, &fuzzy);

    let results: Vec<MatchResult> = names
        .iter()
        .map(|name| {
            exact
                .matched
                .get(name)
                .or_else(|| fuzzy.get(name))
                .cloned()
                .unwrap_or_else(|| MatchResult::Unmatched {
                    query: name.clone(),
                })
        })
        .collect();

    let count = |status: MatchStatus| results.iter().filter(|r| r.status() == status).count();
    let exact_matches = count(MatchStatus::Exact);
    let fuzzy_matches = count(MatchStatus::Fuzzy);

    let summary = MatchSummary {
        total_records: queries.len(),
        records_without_practice: report
            .iter()
            .filter(|r| r.matching_status == MatchStatus::NoQueryValue)
            .count(),
        unique_practices: names.len(),
        exact_matches,
        fuzzy_matches,
        total_matches: exact_matches + fuzzy_matches,
        unmatched: count(MatchStatus::Unmatched),
        threshold,
        candidate_columns: index.columns().iter().map(|c| c.to_string()).collect(),
        candidate_names: index.len(),
    };

    Reconciliation {
        report,
        results,
        summary,
    }
}

/// Run both phases without progress output.
pub fn reconcile(
    queries: &[QueryRecord],
    index: &CandidateNameIndex,
    threshold: Score,
) -> Reconciliation {
    let hidden = ProgressBar::hidden();
    let names = distinct_queries(queries);
    let exact = exact_pass(&names, index, &hidden);
    let matcher = FuzzyMatcher::new(index);
    let fuzzy = fuzzy_pass(&exact.remaining, &matcher, threshold, &hidden);
    assemble(queries, &names, exact, fuzzy, index, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateRecord;
    use crate::scoring::DEFAULT_THRESHOLD;

    fn index(names: &[(&str, &str)]) -> CandidateNameIndex {
        let records = names
            .iter()
            .enumerate()
            .map(|(i, (name, npi))| CandidateRecord {
                row: i + 1,
                npi: Some(npi.to_string()),
                names: vec![Some(name.to_string())],
                ..Default::default()
            })
            .collect();
        CandidateNameIndex::build(&["Practice Name".to_string()], records).unwrap()
    }

    fn queries(names: &[Option<&str>]) -> Vec<QueryRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| QueryRecord {
                row: i + 1,
                practice_name: n.map(str::to_string),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_distinct_queries() {
        let q = queries(&[Some("Acme"), Some("n/a"), None, Some("Beta"), Some("Acme")]);
        assert_eq!(distinct_queries(&q), vec!["Acme".to_string(), "Beta".to_string()]);
    }

    #[test]
    fn test_exact_wins_over_fuzzy() {
        // A near-identical candidate listed first must not beat the exact one
        let idx = index(&[("Acme Clinics", "2222"), ("ACME CLINIC CORP", "1111")]);
        let run = reconcile(&queries(&[Some("Acme Clinic Inc")]), &idx, DEFAULT_THRESHOLD);
        assert_eq!(run.results[0].status(), MatchStatus::Exact);
        assert_eq!(run.report[0].matched_npi, "1111");
        assert_eq!(run.report[0].similarity_score, 100);
    }

    #[test]
    fn test_summary_counts() {
        let idx = index(&[
            ("ACME CLINIC CORP", "1111"),
            ("St. Mary's Medical Group, LLC", "9988"),
        ]);
        let q = queries(&[
            Some("Acme Clinic Inc"),
            Some("Saint Marys Med Grp"),
            Some("Gulf Coast Cardiology"),
            Some("N/A"),
            Some("Acme Clinic Inc"),
        ]);
        let run = reconcile(&q, &idx, DEFAULT_THRESHOLD);
        let s = &run.summary;
        assert_eq!(s.total_records, 5);
        assert_eq!(s.records_without_practice, 1);
        assert_eq!(s.unique_practices, 3);
        assert_eq!(s.exact_matches, 1);
        assert_eq!(s.fuzzy_matches, 1);
        assert_eq!(s.total_matches, 2);
        assert_eq!(s.unmatched, 1);
        assert_eq!(s.candidate_names, 2);
        assert!((s.rate(s.total_matches) - 66.666).abs() < 0.01);
        assert_eq!(run.report.len(), 5);
    }

    #[test]
    fn test_empty_index_never_matches() {
        let idx = index(&[]);
        let run = reconcile(&queries(&[Some("Acme Clinic")]), &idx, 0);
        assert_eq!(run.report[0].matching_status, MatchStatus::Unmatched);
        assert_eq!(run.summary.unmatched, 1);
    }

    #[test]
    fn test_zero_queries() {
        let idx = index(&[("Acme", "1")]);
        let run = reconcile(&[], &idx, DEFAULT_THRESHOLD);
        assert!(run.report.is_empty());
        assert_eq!(run.summary.rate(0), 0.0);
    }
}
