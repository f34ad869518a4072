//! Fundwatch: a funding manifest crawler
//!
//! This crate periodically re-crawls published `funding.json` manifests,
//! validates them against the v1 schema, and keeps a registry of manifests
//! with a crawl lifecycle status used for downstream indexing.

pub mod config;
pub mod crawler;
pub mod output;
pub mod schema;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Fundwatch operations
#[derive(Debug, Error)]
pub enum FundwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Fetch error for {url}: {source}")]
    Fetch {
        url: String,
        source: crawler::FetchError,
    },

    #[error("Invalid manifest {url}: {source}")]
    Invalid {
        url: String,
        source: schema::ValidationError,
    },

    #[error("Search index error: {0}")]
    Index(#[from] output::IndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse lookup table {path}: {source}")]
    LookupTable {
        path: String,
        source: serde_json::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("URL exceeds {max} characters")]
    TooLong { max: usize },
}

/// Result type alias for Fundwatch operations
pub type Result<T> = std::result::Result<T, FundwatchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use schema::{Manifest, Schema, ValidationError};
pub use state::{LifecyclePolicy, ManifestStatus};
pub use url::{origin_of, parse_http_url, same_origin};
