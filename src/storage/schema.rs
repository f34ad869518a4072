//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the manifest registry.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Registered funding manifests
CREATE TABLE IF NOT EXISTS manifests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT NOT NULL UNIQUE,
    version TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    body TEXT NOT NULL,
    entity TEXT NOT NULL DEFAULT '{}',
    projects TEXT NOT NULL DEFAULT '[]',
    channels TEXT NOT NULL DEFAULT '[]',
    plans TEXT NOT NULL DEFAULT '[]',
    history TEXT NOT NULL DEFAULT '[]',
    meta TEXT NOT NULL DEFAULT '{}',
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'active', 'expiring', 'disabled')),
    status_message TEXT,
    crawl_errors INTEGER NOT NULL DEFAULT 0,
    crawl_message TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    crawled_at TEXT,
    claimed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_manifests_status ON manifests(status);
CREATE INDEX IF NOT EXISTS idx_manifests_crawled_at ON manifests(crawled_at);

-- Key/value settings; 'migrations' holds a JSON array of applied versions
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Gets the current schema version
///
/// Recorded in the `migrations` setting by `--install`.
pub fn get_schema_version() -> &'static str {
    "v1.0.0"
}
