//! Statistics from the manifest registry
//!
//! This module provides functionality for extracting and displaying
//! registry statistics from the storage layer.

use crate::state::ManifestStatus;
use crate::storage::{ManifestJob, Storage};
use crate::FundwatchError;
use std::collections::HashMap;

/// Number of failing manifests listed by `--stats`
const TOP_FAILING: usize = 10;

/// Registry statistics summary
#[derive(Debug, Clone)]
pub struct RegistryStatistics {
    /// Total number of registered manifests
    pub total_manifests: u64,

    /// Count of manifests by lifecycle status
    pub manifests_by_status: HashMap<ManifestStatus, u64>,

    /// Manifests with the most consecutive crawl errors
    pub failing: Vec<ManifestJob>,

    /// Applied schema versions
    pub migrations: Vec<String>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(RegistryStatistics)` - Successfully loaded statistics
/// * `Err(FundwatchError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<RegistryStatistics, FundwatchError> {
    let total_manifests = storage.count_total_manifests()?;

    let mut manifests_by_status = HashMap::new();
    for status in ManifestStatus::all_states() {
        let count = storage.count_manifests_by_status(status)?;
        if count > 0 {
            manifests_by_status.insert(status, count);
        }
    }

    let failing = storage.get_failing_manifests(TOP_FAILING)?;
    let migrations = storage.get_migration_versions()?;

    Ok(RegistryStatistics {
        total_manifests,
        manifests_by_status,
        failing,
        migrations,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RegistryStatistics) {
    println!("=== Manifest Registry ===\n");

    println!("Overview:");
    println!("  Total manifests: {}", stats.total_manifests);
    if stats.migrations.is_empty() {
        println!("  Schema: not installed (run with --install)");
    } else {
        println!("  Schema versions: {}", stats.migrations.join(", "));
    }
    println!();

    println!("Manifests by Status:");
    for status in ManifestStatus::all_states() {
        let count = stats.manifests_by_status.get(&status).copied().unwrap_or(0);
        let percentage = if stats.total_manifests > 0 {
            (count as f64 / stats.total_manifests as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.failing.is_empty() {
        println!("Failing Manifests:");
        for job in &stats.failing {
            println!("  {} errors [{}] {}", job.crawl_errors, job.status, job.url);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Manifest;
    use crate::state::LifecyclePolicy;
    use crate::storage::SqliteStorage;

    const BODY: &[u8] = br#"{"version":"v1.0.0","entity":{"type":"individual","role":"owner","name":"Jane","email":"jane@example.com","webpageUrl":{"url":"https://example.com"}}}"#;

    #[test]
    fn test_load_statistics_empty() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.total_manifests, 0);
        assert!(stats.manifests_by_status.is_empty());
        assert!(stats.failing.is_empty());
        assert!(stats.migrations.is_empty());
    }

    #[test]
    fn test_load_statistics_counts_statuses() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let a = Manifest::parse("https://a.example/funding.json", BODY).unwrap();
        let b = Manifest::parse("https://b.example/funding.json", BODY).unwrap();

        storage.upsert_manifest(&a, ManifestStatus::Active).unwrap();
        let pending = storage.upsert_manifest(&b, ManifestStatus::Pending).unwrap();
        storage
            .record_crawl_failure(pending.id, "HTTP 500", &LifecyclePolicy::default())
            .unwrap();
        storage.record_migration_version("v1.0.0").unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.total_manifests, 2);
        assert_eq!(stats.manifests_by_status.get(&ManifestStatus::Active), Some(&1));
        assert_eq!(stats.manifests_by_status.get(&ManifestStatus::Pending), Some(&1));
        assert_eq!(stats.failing.len(), 1);
        assert_eq!(stats.failing[0].url, "https://b.example/funding.json");
        assert_eq!(stats.migrations, vec!["v1.0.0".to_string()]);
    }
}
