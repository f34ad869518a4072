use serde::Deserialize;
use std::time::Duration;

use crate::state::LifecyclePolicy;

/// Main configuration structure for Fundwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    pub database: DatabaseConfig,
}

/// Crawl scheduling and fetch limits
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Number of concurrent crawl workers
    pub workers: u32,

    /// Manifests claimed per scheduler batch
    #[serde(rename = "batch-size")]
    pub batch_size: u32,

    /// Maximum concurrent requests against one host
    #[serde(rename = "max-host-conns")]
    pub max_host_conns: u32,

    /// Total time allowed for one request (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Attempts per fetch, including the first
    pub attempts: u32,

    /// Wait between fetch attempts (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Largest manifest body accepted (bytes)
    #[serde(rename = "max-bytes")]
    pub max_bytes: u64,

    /// A manifest is re-crawled once its last crawl is older than this (seconds)
    #[serde(rename = "recrawl-age-secs")]
    pub recrawl_age_secs: u64,

    /// Pause between crawl cycles (seconds)
    #[serde(rename = "interval-secs")]
    pub interval_secs: u64,

    /// How long a claim from a run that never recorded its outcome blocks
    /// the manifest (seconds)
    #[serde(rename = "claim-lease-secs", default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
}

fn default_claim_lease_secs() -> u64 {
    900
}

impl CrawlConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn recrawl_age(&self) -> Duration {
        Duration::from_secs(self.recrawl_age_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Validation inputs
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    /// Path of the ownership attestation document on each origin
    #[serde(rename = "well-known-path", default = "default_well_known_path")]
    pub well_known_path: String,

    /// JSON object mapping SPDX license ids to names
    #[serde(rename = "licenses-path", default = "default_licenses_path")]
    pub licenses_path: String,

    /// JSON object mapping programming language ids to names
    #[serde(rename = "languages-path", default = "default_languages_path")]
    pub languages_path: String,

    /// JSON object mapping currency codes to names
    #[serde(rename = "currencies-path", default = "default_currencies_path")]
    pub currencies_path: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            well_known_path: default_well_known_path(),
            licenses_path: default_licenses_path(),
            languages_path: default_languages_path(),
            currencies_path: default_currencies_path(),
        }
    }
}

fn default_well_known_path() -> String {
    "/.well-known/funding-manifest-urls".to_string()
}

fn default_licenses_path() -> String {
    "static/licenses.json".to_string()
}

fn default_languages_path() -> String {
    "static/languages.json".to_string()
}

fn default_currencies_path() -> String {
    "static/currencies.json".to_string()
}

/// Error-count thresholds for status transitions
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Consecutive failures that move an active manifest to expiring
    #[serde(rename = "expire-after-errors")]
    pub expire_after_errors: u32,

    /// Consecutive failures that disable a manifest
    #[serde(rename = "disable-after-errors")]
    pub disable_after_errors: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        let policy = LifecyclePolicy::default();
        Self {
            expire_after_errors: policy.expire_after,
            disable_after_errors: policy.disable_after,
        }
    }
}

impl LifecycleConfig {
    pub fn policy(&self) -> LifecyclePolicy {
        LifecyclePolicy::new(self.expire_after_errors, self.disable_after_errors)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}
