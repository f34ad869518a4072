//! Per-host connection limiting
//!
//! Each host gets its own semaphore, created on first use and kept for the
//! lifetime of the limiter. Acquisition waits until a permit frees up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct HostLimiter {
    max_per_host: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimiter {
    /// Creates a limiter allowing `max_per_host` concurrent holders per host
    ///
    /// A limit of zero is raised to one.
    pub fn new(max_per_host: usize) -> Self {
        Self {
            max_per_host: max_per_host.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_per_host(&self) -> usize {
        self.max_per_host
    }

    /// Waits for a permit for `host`
    ///
    /// The permit is released when dropped. Returns `None` only if the
    /// host's semaphore was closed, which this limiter never does.
    pub async fn acquire(&self, host: &str) -> Option<OwnedSemaphorePermit> {
        self.semaphore_for(host).acquire_owned().await.ok()
    }

    /// Number of permits currently free for `host`
    pub fn available(&self, host: &str) -> usize {
        self.semaphore_for(host).available_permits()
    }

    /// Number of hosts seen so far
    pub fn tracked_hosts(&self) -> usize {
        self.lock().len()
    }

    fn semaphore_for(&self, host: &str) -> Arc<Semaphore> {
        let mut hosts = self.lock();
        hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_host)))
            .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Semaphore>>> {
        // The map holds no invariants a panicking holder could break
        self.hosts.lock().unwrap_or_else(|e| e.into_inner())
    }
}
