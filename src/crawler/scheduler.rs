//! Scheduler for cursor-paginated crawl batches
//!
//! This module handles:
//! - Claiming due manifests in id order, one batch at a time
//! - Advancing the cursor past each batch
//! - The per-batch job queue drained by the worker pool

use crate::storage::{ManifestJob, Storage, StorageResult};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Walks the due set of one crawl cycle
///
/// The cursor starts below every id and moves to the last id of each
/// batch, so a cycle visits every due manifest at most once even while new
/// manifests are being registered.
#[derive(Debug, Clone)]
pub struct Scheduler {
    cursor: i64,
    age: Duration,
    batch_size: usize,
    exhausted: bool,
}

impl Scheduler {
    /// Creates a scheduler for one cycle
    ///
    /// # Arguments
    ///
    /// * `age` - Manifests last crawled more recently than this are skipped
    /// * `batch_size` - Maximum manifests claimed per batch
    pub fn new(age: Duration, batch_size: usize) -> Self {
        Self {
            cursor: 0,
            age,
            batch_size: batch_size.max(1),
            exhausted: false,
        }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Claims the next batch
    ///
    /// # Returns
    ///
    /// The claimed jobs in id order; empty once the due set is exhausted
    pub fn next_batch(&mut self, storage: &mut dyn Storage) -> StorageResult<Vec<ManifestJob>> {
        if self.exhausted {
            return Ok(Vec::new());
        }

        let jobs = storage.get_for_crawling(self.cursor, self.age, self.batch_size)?;

        match jobs.last() {
            Some(last) => self.cursor = last.id,
            None => self.exhausted = true,
        }

        tracing::debug!("Claimed {} manifests, cursor at {}", jobs.len(), self.cursor);
        Ok(jobs)
    }
}

/// A batch of jobs shared by the workers
///
/// Each job is popped by exactly one worker.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<ManifestJob>>,
}

impl JobQueue {
    pub fn new(jobs: Vec<ManifestJob>) -> Self {
        Self {
            jobs: Mutex::new(jobs.into()),
        }
    }

    pub fn pop(&self) -> Option<ManifestJob> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ManifestJob>> {
        // Popping is a single call, a panicking holder leaves the deque whole
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}
