/// Manifest lifecycle status definitions
///
/// This module defines the states a manifest moves through as it is
/// crawled and validated over time.
use std::fmt;

/// Represents the crawl/validation health of a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestStatus {
    /// Submitted (or re-submitted) and awaiting its first successful crawl
    Pending,

    /// Last crawl fetched and validated successfully
    Active,

    /// Consecutive crawl failures reached the expiry threshold; still
    /// indexed but flagged stale
    Expiring,

    /// Failures persisted past the disable threshold; no longer crawled
    Disabled,
}

impl ManifestStatus {
    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expiring => "expiring",
            Self::Disabled => "disabled",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "expiring" => Some(Self::Expiring),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }

    /// Returns all statuses in lifecycle order
    pub fn all_states() -> [Self; 4] {
        [Self::Pending, Self::Active, Self::Expiring, Self::Disabled]
    }
}

impl fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
