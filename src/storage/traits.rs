//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::schema::Manifest;
use crate::state::{LifecyclePolicy, ManifestStatus};
use crate::storage::{CrawlFailure, CrawlSuccess, ManifestJob, ManifestRecord};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("Invalid status in database: {0}")]
    InvalidStatus(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler.
/// Only implementations of this trait write manifest status.
pub trait Storage {
    // ===== Manifest Registry =====

    /// Inserts or updates a manifest keyed by URL
    ///
    /// Used for submission: `status` is written unconditionally. Raw
    /// sub-documents are stored verbatim. The crawl-error counter and
    /// message are reset. The GUID assigned on first insert is kept.
    ///
    /// # Returns
    ///
    /// The stored record
    fn upsert_manifest(
        &mut self,
        manifest: &Manifest,
        status: ManifestStatus,
    ) -> StorageResult<ManifestRecord>;

    /// Gets a manifest by ID
    fn get_manifest(&self, id: i64) -> StorageResult<ManifestRecord>;

    /// Gets a manifest by URL
    fn get_manifest_by_url(&self, url: &str) -> StorageResult<Option<ManifestRecord>>;

    // ===== Crawl Scheduling =====

    /// Claims up to `limit` manifests due for crawling
    ///
    /// A manifest is due when its ID is greater than `cursor`, it is not
    /// disabled, it was never crawled or was last crawled more than `age`
    /// ago, and no unexpired claim is held on it. Claimed rows are stamped
    /// in the same statement, so concurrent callers receive disjoint sets.
    /// A claim ends when the crawl outcome is recorded, when it is
    /// released, or when the backend's claim lease runs out.
    ///
    /// # Returns
    ///
    /// Jobs ordered by ID
    fn get_for_crawling(
        &mut self,
        cursor: i64,
        age: Duration,
        limit: usize,
    ) -> StorageResult<Vec<ManifestJob>>;

    /// Drops the claim on a manifest without recording a crawl
    ///
    /// The manifest becomes due again as it was before it was claimed.
    fn release_claim(&mut self, id: i64) -> StorageResult<()>;

    // ===== Lifecycle =====

    /// Writes a status directly
    fn update_manifest_status(&mut self, id: i64, status: ManifestStatus) -> StorageResult<()>;

    /// Stores a freshly crawled manifest and applies the success transition
    ///
    /// The transition starts from the status stored at write time, so a
    /// manifest disabled while its crawl was in flight stays disabled.
    /// Clears the crawl-error counter and the claim, and stamps the crawl
    /// time.
    fn record_crawl_success(
        &mut self,
        id: i64,
        manifest: &Manifest,
        policy: &LifecyclePolicy,
    ) -> StorageResult<CrawlSuccess>;

    /// Records a failed crawl and applies the failure transition
    ///
    /// Clears the claim and stamps the crawl time.
    ///
    /// # Arguments
    ///
    /// * `id` - The manifest ID
    /// * `message` - Diagnostic stored on the manifest
    /// * `policy` - Thresholds for the status transition
    fn record_crawl_failure(
        &mut self,
        id: i64,
        message: &str,
        policy: &LifecyclePolicy,
    ) -> StorageResult<CrawlFailure>;

    // ===== Migrations =====

    /// Appends a schema version to the applied migrations list
    fn record_migration_version(&mut self, version: &str) -> StorageResult<()>;

    /// Gets the applied migration versions in order
    fn get_migration_versions(&self) -> StorageResult<Vec<String>>;

    // ===== Statistics =====

    /// Counts manifests in a specific status
    fn count_manifests_by_status(&self, status: ManifestStatus) -> StorageResult<u64>;

    /// Counts all manifests
    fn count_total_manifests(&self) -> StorageResult<u64>;

    /// Gets the manifests with the most consecutive crawl errors
    fn get_failing_manifests(&self, limit: usize) -> StorageResult<Vec<ManifestJob>>;
}
