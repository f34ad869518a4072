//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::schema::Manifest;
use crate::state::{LifecyclePolicy, ManifestStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{timestamp, CrawlFailure, CrawlSuccess, ManifestJob, ManifestRecord};
use crate::FundwatchError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, guid, version, url, body, entity, projects, channels, plans, \
     history, meta, status, status_message, crawl_errors, crawl_message, created_at, updated_at, \
     crawled_at, claimed_at";

const JOB_COLUMNS: &str = "id, url, status, crawl_errors, updated_at";

const MIGRATIONS_KEY: &str = "migrations";

/// How long a claim blocks other runs when its outcome is never recorded
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(15 * 60);

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    claim_lease: Duration,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(FundwatchError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, FundwatchError> {
        let conn = init_database(path)?;
        Ok(Self {
            conn,
            claim_lease: DEFAULT_CLAIM_LEASE,
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, FundwatchError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            claim_lease: DEFAULT_CLAIM_LEASE,
        })
    }

    /// Sets how long an unrecorded claim keeps a manifest from other runs
    ///
    /// A run that dies between claiming and recording leaves its claims
    /// behind; they expire after `lease`.
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    pub fn claim_lease(&self) -> Duration {
        self.claim_lease
    }
}

/// `now - age` as a stored timestamp, or `None` when it underflows
fn threshold(now: DateTime<Utc>, age: Duration) -> Option<String> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .map(timestamp)
}

fn parse_status(value: String) -> StorageResult<ManifestStatus> {
    ManifestStatus::from_db_string(&value).ok_or(StorageError::InvalidStatus(value))
}

fn status_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ManifestStatus> {
    let value: String = row.get(idx)?;
    ManifestStatus::from_db_string(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(StorageError::InvalidStatus(value.clone())),
        )
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ManifestRecord> {
    Ok(ManifestRecord {
        id: row.get(0)?,
        guid: row.get(1)?,
        version: row.get(2)?,
        url: row.get(3)?,
        body: row.get(4)?,
        entity: row.get(5)?,
        projects: row.get(6)?,
        channels: row.get(7)?,
        plans: row.get(8)?,
        history: row.get(9)?,
        meta: row.get(10)?,
        status: status_column(row, 11)?,
        status_message: row.get(12)?,
        crawl_errors: row.get(13)?,
        crawl_message: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
        crawled_at: row.get(17)?,
        claimed_at: row.get(18)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<ManifestJob> {
    let url: String = row.get(1)?;
    Ok(ManifestJob {
        id: row.get(0)?,
        parsed_url: Url::parse(&url).ok(),
        url,
        status: status_column(row, 2)?,
        crawl_errors: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Manifest Registry =====

    fn upsert_manifest(
        &mut self,
        manifest: &Manifest,
        status: ManifestStatus,
    ) -> StorageResult<ManifestRecord> {
        let now = timestamp(Utc::now());
        let guid = Uuid::new_v4().to_string();

        let id: i64 = self.conn.query_row(
            "INSERT INTO manifests (guid, version, url, body, entity, projects, channels, plans,
                history, status, crawl_errors, crawl_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, NULL, ?11, ?11)
             ON CONFLICT(url) DO UPDATE SET
                version = excluded.version,
                body = excluded.body,
                entity = excluded.entity,
                projects = excluded.projects,
                channels = excluded.channels,
                plans = excluded.plans,
                history = excluded.history,
                status = excluded.status,
                status_message = NULL,
                crawl_errors = 0,
                crawl_message = NULL,
                updated_at = excluded.updated_at
             RETURNING id",
            params![
                guid,
                manifest.version,
                manifest.url,
                manifest.body,
                manifest.entity.raw(),
                manifest.projects.raw(),
                manifest.funding.channels.raw(),
                manifest.funding.plans.raw(),
                manifest.funding.history.raw(),
                status.to_db_string(),
                now,
            ],
            |row| row.get(0),
        )?;

        self.get_manifest(id)
    }

    fn get_manifest(&self, id: i64) -> StorageResult<ManifestRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM manifests WHERE id = ?1", RECORD_COLUMNS),
                params![id],
                record_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::ManifestNotFound(format!("Manifest ID {}", id)))
    }

    fn get_manifest_by_url(&self, url: &str) -> StorageResult<Option<ManifestRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM manifests WHERE url = ?1", RECORD_COLUMNS),
                params![url],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    // ===== Crawl Scheduling =====

    fn get_for_crawling(
        &mut self,
        cursor: i64,
        age: Duration,
        limit: usize,
    ) -> StorageResult<Vec<ManifestJob>> {
        let now = Utc::now();
        // A NULL threshold (age too large to subtract) only matches NULL columns
        let crawled_before = threshold(now, age);
        let claimed_before = threshold(now, self.claim_lease);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare(&format!(
            "UPDATE manifests SET claimed_at = ?1
             WHERE id IN (
                SELECT id FROM manifests
                WHERE id > ?2
                  AND status != ?3
                  AND (crawled_at IS NULL OR crawled_at < ?4)
                  AND (claimed_at IS NULL OR claimed_at < ?5)
                ORDER BY id
                LIMIT ?6
             )
             RETURNING {}",
            JOB_COLUMNS
        ))?;

        let mut jobs = stmt
            .query_map(
                params![
                    timestamp(now),
                    cursor,
                    ManifestStatus::Disabled.to_db_string(),
                    crawled_before,
                    claimed_before,
                    limit
                ],
                job_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        jobs.sort_by_key(|job| job.id);
        Ok(jobs)
    }

    fn release_claim(&mut self, id: i64) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE manifests SET claimed_at = NULL WHERE id = ?1",
            params![id],
        )?;

        if changed == 0 {
            return Err(StorageError::ManifestNotFound(format!("Manifest ID {}", id)));
        }
        Ok(())
    }

    // ===== Lifecycle =====

    fn update_manifest_status(&mut self, id: i64, status: ManifestStatus) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE manifests SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), timestamp(Utc::now()), id],
        )?;

        if changed == 0 {
            return Err(StorageError::ManifestNotFound(format!("Manifest ID {}", id)));
        }
        Ok(())
    }

    fn record_crawl_success(
        &mut self,
        id: i64,
        manifest: &Manifest,
        policy: &LifecyclePolicy,
    ) -> StorageResult<CrawlSuccess> {
        let tx = self.conn.transaction()?;

        let status: String = tx
            .query_row(
                "SELECT status FROM manifests WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::ManifestNotFound(format!("Manifest ID {}", id)))?;

        let previous = parse_status(status)?;
        let next = policy.on_success(previous);
        let now = timestamp(Utc::now());

        tx.execute(
            "UPDATE manifests
             SET version = ?1, body = ?2, entity = ?3, projects = ?4, channels = ?5,
                 plans = ?6, history = ?7, status = ?8, crawl_errors = 0,
                 crawl_message = NULL, updated_at = ?9, crawled_at = ?9, claimed_at = NULL
             WHERE id = ?10",
            params![
                manifest.version,
                manifest.body,
                manifest.entity.raw(),
                manifest.projects.raw(),
                manifest.funding.channels.raw(),
                manifest.funding.plans.raw(),
                manifest.funding.history.raw(),
                next.to_db_string(),
                now,
                id
            ],
        )?;
        tx.commit()?;

        Ok(CrawlSuccess {
            previous,
            record: self.get_manifest(id)?,
        })
    }

    fn record_crawl_failure(
        &mut self,
        id: i64,
        message: &str,
        policy: &LifecyclePolicy,
    ) -> StorageResult<CrawlFailure> {
        let tx = self.conn.transaction()?;

        let (status, errors): (String, u32) = tx
            .query_row(
                "SELECT status, crawl_errors FROM manifests WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| StorageError::ManifestNotFound(format!("Manifest ID {}", id)))?;

        let previous = parse_status(status)?;
        let crawl_errors = errors.saturating_add(1);
        let next = policy.on_failure(previous, crawl_errors);
        let now = timestamp(Utc::now());

        tx.execute(
            "UPDATE manifests
             SET crawl_errors = ?1, crawl_message = ?2, status = ?3, updated_at = ?4,
                 crawled_at = ?4, claimed_at = NULL
             WHERE id = ?5",
            params![crawl_errors, message, next.to_db_string(), now, id],
        )?;
        tx.commit()?;

        Ok(CrawlFailure {
            previous,
            status: next,
            crawl_errors,
        })
    }

    // ===== Migrations =====

    fn record_migration_version(&mut self, version: &str) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        let mut versions = read_migrations(&tx)?;
        if versions.iter().any(|v| v == version) {
            return Ok(());
        }
        versions.push(version.to_string());

        let value = serde_json::to_string(&versions)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tx.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![MIGRATIONS_KEY, value, timestamp(Utc::now())],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_migration_versions(&self) -> StorageResult<Vec<String>> {
        read_migrations(&self.conn)
    }

    // ===== Statistics =====

    fn count_manifests_by_status(&self, status: ManifestStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM manifests WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_manifests(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM manifests", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn get_failing_manifests(&self, limit: usize) -> StorageResult<Vec<ManifestJob>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM manifests
             WHERE crawl_errors > 0
             ORDER BY crawl_errors DESC, id
             LIMIT ?1",
            JOB_COLUMNS
        ))?;

        let jobs = stmt
            .query_map(
                params![i64::try_from(limit).unwrap_or(i64::MAX)],
                job_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }
}

fn read_migrations(conn: &Connection) -> StorageResult<Vec<String>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![MIGRATIONS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        Some(value) => {
            serde_json::from_str(&value).map_err(|e| StorageError::Serialization(e.to_string()))
        }
        None => Ok(Vec::new()),
    }
}

/// Initializes a new database with the schema
///
/// # Arguments
///
/// * `path` - Path to the database file
///
/// # Returns
///
/// * `Ok(Connection)` - Database connection
/// * `Err(rusqlite::Error)` - Failed to initialize database
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
    ",
    )?;
    conn.busy_timeout(Duration::from_secs(5))?;

    initialize_schema(&conn)?;

    Ok(conn)
}
