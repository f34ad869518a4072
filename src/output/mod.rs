//! Output module for indexing and reporting
//!
//! This module handles:
//! - Handing validated manifests to the search index
//! - Reporting registry statistics

pub mod stats;
mod traits;

pub use stats::{load_statistics, print_statistics, RegistryStatistics};
pub use traits::{IndexError, IndexResult, MemoryIndex, NullIndex, SearchIndex};
