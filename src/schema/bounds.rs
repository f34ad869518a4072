//! Generic bounds and membership predicates
//!
//! Every check takes the field path it is applied to so failures come back
//! already addressed. Ranges are closed intervals; string lengths are
//! counted in characters.

use crate::schema::{ValidationError, ValidationErrorKind};
use std::collections::HashMap;
use std::fmt::Display;
use url::Url;

/// Checks that `value` lies within `[min, max]`
///
/// Values that do not compare (NaN) are rejected.
pub fn in_range<T>(path: &str, value: T, min: T, max: T) -> Result<(), ValidationError>
where
    T: PartialOrd + Display,
{
    check(path, "value", value, min, max)
}

/// Checks that a string's character count lies within `[min, max]`
pub fn len_in_range(path: &str, value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    check(path, "length", value.chars().count(), min, max)
}

/// Checks that a list has between `min` and `max` items
pub fn count_in_range(path: &str, count: usize, min: usize, max: usize) -> Result<(), ValidationError> {
    check(path, "count", count, min, max)
}

fn check<T>(path: &str, measure: &'static str, value: T, min: T, max: T) -> Result<(), ValidationError>
where
    T: PartialOrd + Display,
{
    if value >= min && value <= max {
        return Ok(());
    }

    Err(ValidationError::new(
        path,
        ValidationErrorKind::RangeViolation {
            measure,
            actual: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        },
    ))
}

/// Checks membership in an enumerated set
pub fn in_list(path: &str, value: &str, allowed: &[&str]) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        return Ok(());
    }

    Err(ValidationError::new(
        path,
        ValidationErrorKind::EnumMismatch {
            value: value.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        },
    ))
}

/// Checks that `key` exists in a lookup table
pub fn in_table(
    path: &str,
    table: &'static str,
    key: &str,
    entries: &HashMap<String, String>,
) -> Result<(), ValidationError> {
    if entries.contains_key(key) {
        return Ok(());
    }

    Err(ValidationError::new(
        path,
        ValidationErrorKind::LookupMiss {
            table,
            value: key.to_string(),
        },
    ))
}

/// Checks an identifier: ASCII letters, digits, `-` and `_`
pub fn is_id(path: &str, value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    len_in_range(path, value, min, max)?;

    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(malformed(path, format!("'{}' is not a valid identifier", value)))
    }
}

/// Checks a tag: lowercase ASCII letters, digits and `-`
pub fn is_tag(path: &str, value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    len_in_range(path, value, min, max)?;

    if value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        Ok(())
    } else {
        Err(malformed(path, format!("'{}' is not a valid tag", value)))
    }
}

/// Checks an email address
///
/// Requires exactly one `@`, a non-empty local part and a dotted domain,
/// with no whitespace.
pub fn is_email(path: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    len_in_range(path, value, 0, max)?;

    let bad = || malformed(path, format!("'{}' is not a valid email address", value));

    if value.chars().any(char::is_whitespace) {
        return Err(bad());
    }

    let mut parts = value.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(bad()),
    };

    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");

    if local.is_empty() || !domain_ok {
        return Err(bad());
    }

    Ok(())
}

/// Checks an absolute http(s) URL of at most `max` characters
///
/// # Returns
///
/// The parsed URL, for use in ownership checks.
pub fn is_url(path: &str, value: &str, max: usize) -> Result<Url, ValidationError> {
    crate::url::parse_http_url(value, max).map_err(|e| malformed(path, e.to_string()))
}

fn malformed(path: &str, message: String) -> ValidationError {
    ValidationError::new(path, ValidationErrorKind::Malformed(message))
}
