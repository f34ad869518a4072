//! Search index collaborator
//!
//! Validated manifests are handed to a search index after they are stored.
//! Index failures never fail a crawl job; callers log them and move on.

use crate::storage::ManifestRecord;
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur while talking to the search index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Search index unavailable: {0}")]
    Unavailable(String),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Trait for search index backends
///
/// Implementations must be thread-safe; workers submit concurrently.
pub trait SearchIndex: Send + Sync {
    /// Creates the index collections if they do not exist
    fn init_schema(&self) -> IndexResult<()>;

    /// Submits a stored manifest for indexing
    ///
    /// # Arguments
    ///
    /// * `record` - The manifest as persisted, with its GUID
    fn submit(&self, record: &ManifestRecord) -> IndexResult<()>;
}

/// An index that accepts everything and only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIndex;

impl SearchIndex for NullIndex {
    fn init_schema(&self) -> IndexResult<()> {
        tracing::debug!("Search index disabled, skipping schema setup");
        Ok(())
    }

    fn submit(&self, record: &ManifestRecord) -> IndexResult<()> {
        tracing::debug!("Indexed manifest {} ({})", record.guid, record.url);
        Ok(())
    }
}

/// An index that keeps submitted manifest URLs in memory
#[derive(Debug, Default)]
pub struct MemoryIndex {
    submitted: Mutex<Vec<String>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs submitted so far, in submission order
    pub fn submitted(&self) -> Vec<String> {
        self.submitted
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

impl SearchIndex for MemoryIndex {
    fn init_schema(&self) -> IndexResult<()> {
        Ok(())
    }

    fn submit(&self, record: &ManifestRecord) -> IndexResult<()> {
        self.submitted
            .lock()
            .map_err(|_| IndexError::Unavailable("index lock poisoned".to_string()))?
            .push(record.url.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ManifestStatus;

    fn record(url: &str) -> ManifestRecord {
        ManifestRecord {
            id: 1,
            guid: "00000000-0000-4000-8000-000000000000".to_string(),
            version: "v1.0.0".to_string(),
            url: url.to_string(),
            body: "{}".to_string(),
            entity: "{}".to_string(),
            projects: "[]".to_string(),
            channels: "[]".to_string(),
            plans: "[]".to_string(),
            history: "[]".to_string(),
            meta: "{}".to_string(),
            status: ManifestStatus::Active,
            status_message: None,
            crawl_errors: 0,
            crawl_message: None,
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
            crawled_at: None,
            claimed_at: None,
        }
    }

    #[test]
    fn test_null_index_accepts() {
        let index = NullIndex;
        assert!(index.init_schema().is_ok());
        assert!(index.submit(&record("https://example.com/funding.json")).is_ok());
    }

    #[test]
    fn test_memory_index_records_submissions() {
        let index = MemoryIndex::new();
        index.submit(&record("https://a.example/funding.json")).unwrap();
        index.submit(&record("https://b.example/funding.json")).unwrap();
        assert_eq!(
            index.submitted(),
            vec![
                "https://a.example/funding.json".to_string(),
                "https://b.example/funding.json".to_string()
            ]
        );
    }

    #[test]
    fn test_index_is_object_safe() {
        let index: Box<dyn SearchIndex> = Box::new(NullIndex);
        assert!(index.init_schema().is_ok());
    }
}
