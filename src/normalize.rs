//! Shared normalization functions for practice-name reconciliation.
//! Used by the matching pipeline, the registry client and the NPI reports.
//!
//! CRITICAL: `normalize_name` must stay idempotent. Exact matching compares
//! normalized keys on both sides, so any change here changes which names
//! collide. Run tests after changes.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Straight and typographic apostrophes. Deleted so "MARY'S" folds to "MARYS".
pub static APOSTROPHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"['\u{2018}\u{2019}\u{00B4}`]").unwrap());

/// Any run of characters that is not an uppercase ASCII letter or digit.
pub static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Z0-9]+").unwrap());

// ============================================================================
// TOKEN TABLES
// ============================================================================

/// Legal-entity suffixes dropped wherever they appear as a whole token.
pub static LEGAL_SUFFIXES: Lazy<FxHashSet<&str>> = Lazy::new(|| {
    ["INC", "LLC", "LLP", "CORP", "CORPORATION", "LIMITED"]
        .into_iter()
        .collect()
});

/// Domain words abbreviated consistently on both sides of a comparison.
/// No abbreviation is itself a key or a legal suffix, which keeps
/// normalization idempotent.
pub static ABBREVIATIONS: Lazy<FxHashMap<&str, &str>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert("PROFESSIONAL", "PROF");
    m.insert("ASSOCIATE", "ASSOC");
    m.insert("ASSOCIATES", "ASSOC");
    m.insert("ASSOCIATION", "ASSOC");
    m.insert("MEDICAL", "MED");
    m.insert("GROUP", "GRP");
    m.insert("HOSPITAL", "HOSP");
    m.insert("HEALTH", "HLTH");
    m.insert("SYSTEM", "SYS");
    m.insert("CENTER", "CTR");
    m.insert("SERVICE", "SVCS");
    m.insert("SERVICES", "SVCS");
    m
});

/// Placeholder values as they look after punctuation folding.
/// "n/a" arrives here as "N A"; "nan" is a spreadsheet export artifact.
pub static PLACEHOLDER_KEYS: Lazy<FxHashSet<&str>> =
    Lazy::new(|| ["NA", "N A", "NAN", "NONE"].into_iter().collect());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
/// Used to filter out accents during normalization.
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to ASCII by applying NFKD decomposition and removing combining marks.
/// e.g., "Clínica Peña" → "clinica pena"
pub fn fold_to_ascii(s: &str) -> String {
    // First strip diacritics via NFKD decomposition
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Then transliterate any remaining non-ASCII
    any_ascii(&stripped).to_lowercase()
}

/// Trim a spreadsheet cell, mapping blanks and "nan" exports to `None`.
pub fn clean_cell(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Clean an NPI cell. Float-typed exports render `1234567893` as
/// `1234567893.0`; only that trailing suffix is stripped.
pub fn clean_npi(value: &str) -> Option<String> {
    let cell = clean_cell(value)?;
    let npi = cell.strip_suffix(".0").unwrap_or(&cell).trim();
    if npi.is_empty() {
        None
    } else {
        Some(npi.to_string())
    }
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize an organization / practice name into a comparison key.
///
/// Uppercases, deletes apostrophes, turns every other non-alphanumeric run
/// into a single space, drops legal suffixes and abbreviates domain words.
/// Placeholders ("n/a", "na", "none", "nan", blanks) become `""`.
pub fn normalize_name(raw: &str) -> String {
    let folded = fold_to_ascii(raw).to_uppercase();
    let without_apostrophes = APOSTROPHES.replace_all(&folded, "");
    let spaced = NON_ALNUM.replace_all(&without_apostrophes, " ");

    let tokens: Vec<&str> = spaced
        .split_whitespace()
        .filter(|token| !LEGAL_SUFFIXES.contains(token))
        .map(|token| ABBREVIATIONS.get(token).copied().unwrap_or(token))
        .collect();
    let normalized = tokens.join(" ");

    if PLACEHOLDER_KEYS.contains(normalized.as_str()) {
        return String::new();
    }
    normalized
}

/// True when a raw value carries no usable name.
pub fn is_placeholder(raw: &str) -> bool {
    normalize_name(raw).is_empty()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_basic() {
        assert_eq!(normalize_name("Acme Clinic Inc"), "ACME CLINIC");
        assert_eq!(normalize_name("ACME CLINIC CORP"), "ACME CLINIC");
        assert_eq!(
            normalize_name("St. Mary's Medical Group, LLC"),
            "ST MARYS MED GRP"
        );
        assert_eq!(normalize_name("Saint Marys Med Grp"), "SAINT MARYS MED GRP");
    }

    #[test]
    fn test_abbreviations() {
        assert_eq!(
            normalize_name("Professional Associates of Health Services"),
            "PROF ASSOC OF HLTH SVCS"
        );
        assert_eq!(normalize_name("Regional Hospital System"), "REGIONAL HOSP SYS");
        assert_eq!(normalize_name("Cancer Center Association"), "CANCER CTR ASSOC");
        // Plural forms outside the table are left alone
        assert_eq!(normalize_name("Hospital Systems"), "HOSP SYSTEMS");
    }

    #[test]
    fn test_legal_suffix_anywhere() {
        assert_eq!(normalize_name("LLC Pediatric Partners"), "PEDIATRIC PARTNERS");
        assert_eq!(normalize_name("Smith Corporation Limited"), "SMITH");
        assert_eq!(normalize_name("Inc."), "");
    }

    #[test]
    fn test_punctuation_and_whitespace() {
        assert_eq!(normalize_name("  Ortho---Spine   & Sports  "), "ORTHO SPINE SPORTS");
        assert_eq!(normalize_name("A/B_C"), "A B C");
        assert_eq!(normalize_name("O\u{2019}Brien Family Care"), "OBRIEN FAMILY CARE");
    }

    #[test]
    fn test_placeholder_collapse() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("n/a"), "");
        assert_eq!(normalize_name("N/A"), "");
        assert_eq!(normalize_name("  NA "), "");
        assert_eq!(normalize_name("None"), "");
        assert_eq!(normalize_name("nan"), "");
        assert_eq!(normalize_name(" \t "), "");
        assert!(is_placeholder("n/a"));
        assert!(!is_placeholder("NA Family Practice"));
        // Suffixes drop first, so a suffixed placeholder is still a placeholder
        assert_eq!(normalize_name("NONE LLC"), "");
        assert!(is_placeholder("N/A Inc"));
    }

    #[test]
    fn test_idempotence() {
        let samples = [
            "St. Mary's Medical Group, LLC",
            "Acme Clinic Inc",
            "NA Inc",
            "N.A.",
            "Professional Associates",
            "  Hôpital Saint-Jean  ",
            "none",
            "Group Health Cooperative",
            "123 Main St. Medical Center, L.L.C.",
            "",
        ];
        for sample in samples {
            let once = normalize_name(sample);
            assert_eq!(normalize_name(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Clínica Peña"), "clinica pena");
        assert_eq!(normalize_name("Hôpital Saint-Jean"), "HOPITAL SAINT JEAN");
    }

    #[test]
    fn test_clean_npi() {
        assert_eq!(clean_npi("1234567893.0"), Some("1234567893".to_string()));
        assert_eq!(clean_npi(" 1234567893 "), Some("1234567893".to_string()));
        assert_eq!(clean_npi("nan"), None);
        assert_eq!(clean_npi(""), None);
        assert_eq!(clean_npi(".0"), None);
        // Only the trailing suffix goes
        assert_eq!(clean_npi("10.05"), Some("10.05".to_string()));
    }

    #[test]
    fn test_clean_cell() {
        assert_eq!(clean_cell("  Denver "), Some("Denver".to_string()));
        assert_eq!(clean_cell("NaN"), None);
        assert_eq!(clean_cell("   "), None);
    }
}
