//! NPPES NPI registry lookups.
//!
//! Calls are sequential and blocking with a fixed pause between them. There
//! is no retry: a failed call surfaces as an error and callers count it as
//! "not found".

use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::RegistryConfig;
use crate::error::{ReconcileError, Result};
use crate::normalize::is_placeholder;

/// Registry enumeration type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationType {
    /// Individual provider
    Individual,
    Organization,
}

impl EnumerationType {
    pub fn as_param(self) -> &'static str {
        match self {
            EnumerationType::Individual => "NPI-1",
            EnumerationType::Organization => "NPI-2",
        }
    }
}

/// First registry result of a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryRecord {
    pub npi: String,
    /// Organization name, or "first last" for individuals
    pub name: String,
    pub credential: String,
    pub enumeration_type: String,
    pub city: String,
    pub state: String,
}

/// Name-based NPI lookups. `Ok(None)` means the registry had no result or
/// the input was blank.
pub trait NpiLookup {
    fn find_provider(&mut self, first_name: &str, last_name: &str) -> Result<Option<RegistryRecord>>;
    fn find_organization(&mut self, name: &str) -> Result<Option<RegistryRecord>>;
}

// ============================================================================
// Response Parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    #[serde(default)]
    results: Vec<RegistryResult>,
}

#[derive(Debug, Deserialize)]
struct RegistryResult {
    /// Number or string depending on the API version
    #[serde(default)]
    number: serde_json::Value,
    #[serde(default)]
    basic: RegistryBasic,
    #[serde(default)]
    addresses: Vec<RegistryAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryBasic {
    first_name: Option<String>,
    last_name: Option<String>,
    organization_name: Option<String>,
    credential: Option<String>,
    enumeration_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryAddress {
    city: Option<String>,
    state: Option<String>,
}

fn number_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Decode a registry response body and keep its first result.
pub fn parse_first_result(body: &str, kind: EnumerationType) -> Result<Option<RegistryRecord>> {
    let response: RegistryResponse = serde_json::from_str(body)
        .map_err(|e| ReconcileError::Registry(format!("invalid response: {e}")))?;

    let Some(result) = response.results.into_iter().next() else {
        return Ok(None);
    };
    let npi = number_text(&result.number);
    if npi.is_empty() {
        return Ok(None);
    }

    let basic = result.basic;
    let name = match kind {
        EnumerationType::Organization => basic.organization_name.unwrap_or_default(),
        EnumerationType::Individual => format!(
            "{} {}",
            basic.first_name.unwrap_or_default(),
            basic.last_name.unwrap_or_default()
        )
        .trim()
        .to_string(),
    };
    let address = result.addresses.into_iter().next().unwrap_or_default();

    Ok(Some(RegistryRecord {
        npi,
        name,
        credential: basic.credential.unwrap_or_default(),
        enumeration_type: basic.enumeration_type.unwrap_or_default(),
        city: address.city.unwrap_or_default(),
        state: address.state.unwrap_or_default(),
    }))
}

// ============================================================================
// HTTP Client
// ============================================================================

pub struct NpiRegistryClient {
    http: Client,
    config: RegistryConfig,
    last_call: Option<Instant>,
}

impl NpiRegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            last_call: None,
        })
    }

    /// Sleep out whatever remains of the inter-call delay.
    fn pace(&self) {
        let delay = Duration::from_millis(self.config.delay_ms);
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < delay {
                thread::sleep(delay - elapsed);
            }
        }
    }

    fn search(
        &mut self,
        kind: EnumerationType,
        params: &[(&str, &str)],
    ) -> Result<Option<RegistryRecord>> {
        self.pace();

        let limit = self.config.limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("version", self.config.version.as_str()),
            ("enumeration_type", kind.as_param()),
            ("limit", limit.as_str()),
        ];
        query.extend_from_slice(params);
        debug!("registry lookup {:?}", query);

        let sent = self.http.get(&self.config.base_url).query(&query).send();
        self.last_call = Some(Instant::now());

        let response = sent?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReconcileError::Registry(format!("HTTP {status}")));
        }
        let body = response.text()?;
        parse_first_result(&body, kind)
    }
}

impl NpiLookup for NpiRegistryClient {
    fn find_provider(&mut self, first_name: &str, last_name: &str) -> Result<Option<RegistryRecord>> {
        let (first, last) = (first_name.trim(), last_name.trim());
        if first.is_empty() || last.is_empty() {
            return Ok(None);
        }
        self.search(
            EnumerationType::Individual,
            &[("first_name", first), ("last_name", last)],
        )
    }

    fn find_organization(&mut self, name: &str) -> Result<Option<RegistryRecord>> {
        let name = name.trim();
        if is_placeholder(name) {
            return Ok(None);
        }
        self.search(EnumerationType::Organization, &[("organization_name", name)])
    }
}
