//! Exact and fuzzy practice-name matchers.
//!
//! Tie-break policy for fuzzy matching: candidates are scored in two passes,
//! normalized forms first and raw forms second, each pass in index
//! first-seen order. A later candidate replaces the current best only with a
//! strictly higher score, so the earliest top scorer wins.

use crate::index::CandidateNameIndex;
use crate::models::MatchResult;
use crate::normalize::normalize_name;
use crate::scoring::{key_ratio, token_sort_key, Score, MAX_FUZZY_SCORE};

// ============================================================================
// Exact Matching
// ============================================================================

/// Look up the query's normalized key. Resolves to the first entry in index
/// insertion order; empty keys never match.
pub fn match_exact(query: &str, index: &CandidateNameIndex) -> Option<MatchResult> {
    let key = normalize_name(query);
    let position = index.lookup(&key)?;
    Some(MatchResult::Exact {
        query: query.to_string(),
        candidate: index.matched(position),
    })
}

// ============================================================================
// Fuzzy Matching
// ============================================================================

/// Which comparison produced a fuzzy hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuzzyPass {
    /// normalized query vs normalized candidate
    Normalized,
    /// raw query vs raw candidate
    Raw,
}

/// Best-scoring candidate of a fuzzy search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FuzzyHit {
    /// Position of the candidate in the list that was searched
    pub position: usize,
    pub score: Score,
    pub pass: FuzzyPass,
}

/// Fuzzy score between two sort keys. Capped below the exact score so 100
/// always means an exact normalized match.
fn fuzzy_score(query_key: &str, candidate_key: &str) -> Score {
    key_ratio(query_key, candidate_key).min(MAX_FUZZY_SCORE)
}

/// Scan both passes and keep the first strictly-better score.
fn best_hit<'a, N, R>(
    normalized_query: &str,
    raw_query: &str,
    normalized: N,
    raw: R,
    threshold: Score,
) -> Option<FuzzyHit>
where
    N: IntoIterator<Item = (usize, &'a str)>,
    R: IntoIterator<Item = (usize, &'a str)>,
{
    let mut best: Option<FuzzyHit> = None;
    let passes = normalized
        .into_iter()
        .map(|(position, key)| (position, fuzzy_score(normalized_query, key), FuzzyPass::Normalized))
        .chain(
            raw.into_iter()
                .map(|(position, key)| (position, fuzzy_score(raw_query, key), FuzzyPass::Raw)),
        );

    for (position, score, pass) in passes {
        if best.map_or(true, |b| score > b.score) {
            best = Some(FuzzyHit {
                position,
                score,
                pass,
            });
        }
    }

    best.filter(|hit| hit.score >= threshold)
}

/// Score a query against a plain list of candidate names.
///
/// `position` in the returned hit indexes `candidates`. Returns `None` when
/// the query normalizes to nothing or the best score is below `threshold`.
pub fn match_fuzzy<S: AsRef<str>>(
    query: &str,
    candidates: &[S],
    threshold: Score,
) -> Option<FuzzyHit> {
    let normalized_query = normalize_name(query);
    if normalized_query.is_empty() {
        return None;
    }

    // Placeholder candidates take part in neither pass
    let usable: Vec<(usize, &str, String)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, c.as_ref(), normalize_name(c.as_ref())))
        .filter(|(_, _, normalized)| !normalized.is_empty())
        .collect();
    let normalized_keys: Vec<(usize, String)> = usable
        .iter()
        .map(|(i, _, normalized)| (*i, token_sort_key(normalized)))
        .collect();
    let raw_keys: Vec<(usize, String)> = usable
        .iter()
        .map(|(i, raw, _)| (*i, token_sort_key(raw)))
        .filter(|(_, key)| !key.is_empty())
        .collect();

    best_hit(
        &token_sort_key(&normalized_query),
        &token_sort_key(query),
        normalized_keys.iter().map(|(i, k)| (*i, k.as_str())),
        raw_keys.iter().map(|(i, k)| (*i, k.as_str())),
        threshold,
    )
}

/// Fuzzy matcher over a candidate index with sort keys computed once.
pub struct FuzzyMatcher<'i> {
    index: &'i CandidateNameIndex,
    /// (index entry, sort key of its normalized form), one per distinct key
    normalized: Vec<(usize, String)>,
    /// (index entry, sort key of its raw form), one per distinct raw name
    raw: Vec<(usize, String)>,
}

impl<'i> FuzzyMatcher<'i> {
    pub fn new(index: &'i CandidateNameIndex) -> Self {
        let normalized = index
            .unique_key_positions()
            .iter()
            .map(|&p| (p, token_sort_key(&index.entry(p).normalized)))
            .collect();
        let raw = index
            .unique_raw_positions()
            .iter()
            .map(|&p| (p, token_sort_key(&index.entry(p).raw)))
            .filter(|(_, key)| !key.is_empty())
            .collect();

        Self {
            index,
            normalized,
            raw,
        }
    }

    /// Number of candidate strings scored per query.
    pub fn comparisons_per_query(&self) -> usize {
        self.normalized.len() + self.raw.len()
    }

    /// Best fuzzy match for `query`, or `None` below `threshold`.
    pub fn match_query(&self, query: &str, threshold: Score) -> Option<MatchResult> {
        let normalized_query = normalize_name(query);
        if normalized_query.is_empty() {
            return None;
        }

        let hit = best_hit(
            &token_sort_key(&normalized_query),
            &token_sort_key(query),
            self.normalized.iter().map(|(p, k)| (*p, k.as_str())),
            self.raw.iter().map(|(p, k)| (*p, k.as_str())),
            threshold,
        )?;

        Some(MatchResult::Fuzzy {
            query: query.to_string(),
            candidate: self.index.matched(hit.position),
            score: hit.score,
        })
    }
}
