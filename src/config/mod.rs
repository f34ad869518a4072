//! Configuration module for Fundwatch
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and loading the lookup tables the validator resolves against.
//!
//! # Example
//!
//! ```no_run
//! use fundwatch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawling with {} workers", config.crawl.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlConfig, DatabaseConfig, LifecycleConfig, SchemaConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_lookup_table,
    load_lookup_tables,
};
