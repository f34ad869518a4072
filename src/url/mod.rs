//! URL handling module for Fundwatch
//!
//! This module provides URL parsing, host extraction, and the origin
//! comparisons used by the ownership checks.

mod domain;
mod parse;

use url::{Origin, Url};

// Re-export main functions
pub use domain::extract_host;
pub use parse::parse_http_url;

/// Returns the origin (scheme, host, port) of a URL
///
/// Default ports are made explicit, so `https://example.com` and
/// `https://example.com:443` share an origin.
pub fn origin_of(url: &Url) -> Origin {
    url.origin()
}

/// Checks whether two URLs share the same origin
///
/// # Examples
///
/// ```
/// use url::Url;
/// use fundwatch::url::same_origin;
///
/// let manifest = Url::parse("https://example.com/funding.json").unwrap();
/// let page = Url::parse("https://example.com/about").unwrap();
/// let repo = Url::parse("https://git.example.org/project").unwrap();
///
/// assert!(same_origin(&manifest, &page));
/// assert!(!same_origin(&manifest, &repo));
/// ```
pub fn same_origin(a: &Url, b: &Url) -> bool {
    let origin = origin_of(a);
    origin.is_tuple() && origin == origin_of(b)
}

/// Builds the well-known attestation URL for a reference
///
/// The result is the reference's origin joined with `path`; the
/// reference's own path, query, and fragment are discarded.
pub fn well_known_url(reference: &Url, path: &str) -> Url {
    let mut url = reference.clone();
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    url
}
