//! Storage module for the manifest registry
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Manifest upserts with verbatim raw sub-documents
//! - Claiming due manifests for crawling with cursor pagination
//! - Lifecycle status transitions on crawl failures
//! - Migration bookkeeping

mod schema;
mod sqlite;
mod traits;

pub use schema::{get_schema_version, initialize_schema};
pub use sqlite::{init_database, SqliteStorage};
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::ManifestStatus;
use crate::FundwatchError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;
use url::Url;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(FundwatchError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, FundwatchError> {
    SqliteStorage::new(path)
}

/// Formats a timestamp for storage
///
/// Fixed precision and a `Z` suffix keep stored timestamps ordered when
/// compared as text.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A manifest claimed for crawling
#[derive(Debug, Clone)]
pub struct ManifestJob {
    pub id: i64,
    pub url: String,
    /// `None` when the stored URL no longer parses
    pub parsed_url: Option<Url>,
    pub status: ManifestStatus,
    pub crawl_errors: u32,
    pub updated_at: String,
}

/// A stored manifest
///
/// Sub-documents are kept as the verbatim JSON text the publisher sent.
#[derive(Debug, Clone)]
pub struct ManifestRecord {
    pub id: i64,
    pub guid: String,
    pub version: String,
    pub url: String,
    pub body: String,
    pub entity: String,
    pub projects: String,
    pub channels: String,
    pub plans: String,
    pub history: String,
    pub meta: String,
    pub status: ManifestStatus,
    pub status_message: Option<String>,
    pub crawl_errors: u32,
    pub crawl_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub crawled_at: Option<String>,
    /// Set while a crawl run holds the manifest
    pub claimed_at: Option<String>,
}

/// Result of recording a crawl failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlFailure {
    pub previous: ManifestStatus,
    pub status: ManifestStatus,
    /// Consecutive failures, including this one
    pub crawl_errors: u32,
}

impl CrawlFailure {
    pub fn changed(&self) -> bool {
        self.previous != self.status
    }
}

/// Result of recording a successful crawl
#[derive(Debug, Clone)]
pub struct CrawlSuccess {
    /// Status stored before this crawl
    pub previous: ManifestStatus,
    pub record: ManifestRecord,
}

impl CrawlSuccess {
    pub fn changed(&self) -> bool {
        self.previous != self.record.status
    }
}
