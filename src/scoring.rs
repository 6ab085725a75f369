//! Similarity scoring for practice-name matching.
//!
//! Scores are integers on a 0-100 scale. 100 is reserved for exact
//! (normalized-key) matches; fuzzy scores are capped just below it.

use once_cell::sync::Lazy;
use regex::Regex;
use strsim::normalized_levenshtein;

use crate::normalize::fold_to_ascii;

// ============================================================================
// Score Thresholds
// ============================================================================

pub type Score = u8;

/// Score carried by every exact match
pub const EXACT_SCORE: Score = 100;

/// Highest score a fuzzy match can report
pub const MAX_FUZZY_SCORE: Score = EXACT_SCORE - 1;

/// Minimum fuzzy score to accept a match
pub const DEFAULT_THRESHOLD: Score = 70;

// ============================================================================
// Regex Patterns
// ============================================================================

/// Anything that is not a lowercase ASCII letter or digit separates tokens.
pub static TOKEN_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

// ============================================================================
// Token Sort Ratio
// ============================================================================

/// Comparison form used by token-sort scoring: lowercased, punctuation turned
/// into spaces, tokens sorted alphabetically and re-joined.
/// e.g., "St. Mary's Group" → "group mary s st"
pub fn token_sort_key(s: &str) -> String {
    let folded = fold_to_ascii(s);
    let spaced = TOKEN_SEPARATORS.replace_all(&folded, " ");
    let mut tokens: Vec<&str> = spaced.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Similarity (0-100) between two precomputed sort keys.
/// An empty key on either side never scores.
pub fn key_ratio(a_key: &str, b_key: &str) -> Score {
    if a_key.is_empty() || b_key.is_empty() {
        return 0;
    }
    let similarity = normalized_levenshtein(a_key, b_key);
    (similarity * 100.0).round().clamp(0.0, 100.0) as Score
}

/// Token-order-insensitive similarity (0-100) between two strings.
pub fn token_sort_ratio(a: &str, b: &str) -> Score {
    key_ratio(&token_sort_key(a), &token_sort_key(b))
}
