//! Run configuration loaded from an optional TOML file.
//!
//! Every section and key is optional; missing values fall back to the
//! built-in defaults. Command-line flags are applied on top by the binaries.

use serde::Deserialize;
use std::path::Path;

use crate::error::{ReconcileError, Result};
use crate::schema::{CandidateSchema, QuerySchema};
use crate::scoring::{Score, DEFAULT_THRESHOLD, EXACT_SCORE};

/// Public NPPES registry endpoint
pub const DEFAULT_REGISTRY_URL: &str = "https://npiregistry.cms.hhs.gov/api/";

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub matching: MatchingConfig,
    pub query: QuerySchema,
    pub candidate: CandidateSchema,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum fuzzy score (inclusive)
    pub threshold: Score,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    pub version: String,
    /// Results requested per lookup; only the first is used
    pub limit: u32,
    /// Pause between consecutive calls
    pub delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            version: "2.1".to_string(),
            limit: 5,
            delay_ms: 1000,
            timeout_secs: 15,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl ReconcileConfig {
    pub fn from_toml(input: &str) -> Result<Self> {
        let config: ReconcileConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml(&input)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.matching.threshold > EXACT_SCORE {
            return Err(ReconcileError::ConfigValidation(format!(
                "matching.threshold must be at most {}, got {}",
                EXACT_SCORE, self.matching.threshold
            )));
        }
        if self.query.practice_name.is_empty() {
            return Err(ReconcileError::ConfigValidation(
                "query.practice_name needs at least one column alias".into(),
            ));
        }
        if self.candidate.practice_columns.is_empty() && self.candidate.practice_keywords.is_empty() {
            return Err(ReconcileError::ConfigValidation(
                "candidate needs practice_columns or practice_keywords".into(),
            ));
        }
        if self.registry.base_url.trim().is_empty() {
            return Err(ReconcileError::ConfigValidation(
                "registry.base_url must not be empty".into(),
            ));
        }
        if !(1..=200).contains(&self.registry.limit) {
            return Err(ReconcileError::ConfigValidation(format!(
                "registry.limit must be between 1 and 200, got {}",
                self.registry.limit
            )));
        }
        if self.registry.timeout_secs == 0 {
            return Err(ReconcileError::ConfigValidation(
                "registry.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_uses_defaults() {
        let config = ReconcileConfig::from_toml("").unwrap();
        assert_eq!(config, ReconcileConfig::default());
        assert_eq!(config.matching.threshold, 70);
        assert_eq!(config.registry.limit, 5);
        assert_eq!(config.candidate.npi, vec!["NPI".to_string(), "npi".to_string()]);
    }

    #[test]
    fn parse_partial_sections() {
        let input = r#"
[matching]
threshold = 85

[query]
practice_name = ["Group Name"]

[candidate]
practice_columns = ["Medical Group"]

[registry]
delay_ms = 0
"#;
        let config = ReconcileConfig::from_toml(input).unwrap();
        assert_eq!(config.matching.threshold, 85);
        assert_eq!(config.query.practice_name, vec!["Group Name".to_string()]);
        // Untouched aliases keep their defaults
        assert_eq!(config.query.npi_1, vec!["NPI-1".to_string()]);
        assert_eq!(config.candidate.practice_columns, vec!["Medical Group".to_string()]);
        assert_eq!(config.registry.delay_ms, 0);
        assert_eq!(config.registry.version, "2.1");
    }

    #[test]
    fn rejects_threshold_above_100() {
        let err = ReconcileConfig::from_toml("[matching]\nthreshold = 101\n").unwrap_err();
        assert!(matches!(err, ReconcileError::ConfigValidation(_)));
    }

    #[test]
    fn rejects_bad_registry_limit() {
        let err = ReconcileConfig::from_toml("[registry]\nlimit = 0\n").unwrap_err();
        assert!(err.to_string().contains("registry.limit"));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = ReconcileConfig::from_toml("[matching\nthreshold = 70").unwrap_err();
        assert!(matches!(err, ReconcileError::ConfigParse(_)));
    }

    #[test]
    fn rejects_wrong_type() {
        let err = ReconcileConfig::from_toml("[matching]\nthreshold = \"high\"\n").unwrap_err();
        assert!(matches!(err, ReconcileError::ConfigParse(_)));
    }
}
