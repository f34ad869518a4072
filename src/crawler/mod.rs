//! Crawler module for manifest fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and byte ceilings
//! - Per-host connection limiting
//! - Cursor-paginated batch scheduling
//! - Overall crawl coordination and cancellation

mod coordinator;
mod fetcher;
mod limiter;
mod scheduler;
mod signal;

pub use coordinator::{Coordinator, CrawlStats, JobOutcome};
pub use fetcher::{build_http_client, FetchError, FetchOptions, Fetcher, MAX_REDIRECTS};
pub use limiter::HostLimiter;
pub use scheduler::{JobQueue, Scheduler};
pub use signal::StopSignal;
