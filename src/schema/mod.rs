//! Funding manifest schema (v1)
//!
//! This module provides:
//! - Document types with verbatim raw sub-documents
//! - Generic bounds and membership predicates
//! - The well-known ownership check
//! - The fail-fast validator producing field-addressed errors

pub mod bounds;
mod ownership;
mod raw;
mod types;
mod validator;

use std::collections::HashMap;
use thiserror::Error;

pub use ownership::{attests, AttestationCache, OwnershipVerifier};
pub use raw::Raw;
pub use types::{
    Channel, Entity, Funding, History, Manifest, Plan, Project, UrlRef, CHANNEL_TYPES,
    ENTITY_ROLES, ENTITY_TYPES, PLAN_FREQUENCIES, PLAN_STATUSES,
};
pub use validator::Schema;

/// Major schema version accepted by the validator
pub const SCHEMA_MAJOR: &str = "v1";

/// Maximum length of any URL in a manifest
pub const MAX_URL_LEN: usize = 1024;

/// License values with this prefix must resolve in the license table
pub const LICENSE_PREFIX: &str = "spdx:";

/// Framework values with this prefix must resolve in the language table
pub const LANGUAGE_PREFIX: &str = "lang:";

/// A validation failure addressed to a field of the manifest
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{path}: {kind}")]
pub struct ValidationError {
    /// Dotted, indexed field path such as `projects[1].license`
    pub path: String,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// What went wrong with a field
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationErrorKind {
    #[error("{measure} {actual} is outside [{min}, {max}]")]
    RangeViolation {
        measure: &'static str,
        actual: String,
        min: String,
        max: String,
    },

    #[error("'{value}' is not one of: {}", .allowed.join(", "))]
    EnumMismatch { value: String, allowed: Vec<String> },

    #[error("unknown channel id '{id}'")]
    CrossReferenceMissing { id: String },

    #[error("duplicate id '{id}'")]
    DuplicateId { id: String },

    #[error("ownership not verified: {reason}")]
    OwnershipUnverified { reason: String },

    #[error("'{value}' not found in {table} table")]
    LookupMiss { table: &'static str, value: String },

    #[error("malformed: {0}")]
    Malformed(String),
}

/// Reference tables for license, language and currency lookups
///
/// Each table maps an identifier to a human-readable name.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub licenses: HashMap<String, String>,
    pub languages: HashMap<String, String>,
    pub currencies: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_path() {
        let err = ValidationError::new(
            "entity.name",
            ValidationErrorKind::RangeViolation {
                measure: "length",
                actual: "0".to_string(),
                min: "2".to_string(),
                max: "128".to_string(),
            },
        );
        assert_eq!(err.to_string(), "entity.name: length 0 is outside [2, 128]");
    }

    #[test]
    fn test_enum_mismatch_lists_allowed() {
        let kind = ValidationErrorKind::EnumMismatch {
            value: "robot".to_string(),
            allowed: vec!["individual".to_string(), "group".to_string()],
        };
        assert_eq!(kind.to_string(), "'robot' is not one of: individual, group");
    }
}
