//! Well-known ownership verification
//!
//! A manifest may reference webpages and repositories on other origins only
//! if that origin publishes a plain-text document at the well-known path
//! listing the manifest URL, one URL per line.

use crate::crawler::Fetcher;
use crate::schema::{ValidationError, ValidationErrorKind};
use crate::url::{same_origin, well_known_url};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Attestation documents fetched while validating one manifest
///
/// Keyed by well-known URL; a failed fetch is cached as its error message
/// so the origin is not retried for the next reference.
#[derive(Debug, Default)]
pub struct AttestationCache {
    documents: HashMap<String, Result<String, String>>,
}

impl AttestationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct OwnershipVerifier {
    fetcher: Arc<Fetcher>,
    well_known_path: String,
}

impl OwnershipVerifier {
    pub fn new(fetcher: Arc<Fetcher>, well_known_path: impl Into<String>) -> Self {
        Self {
            fetcher,
            well_known_path: well_known_path.into(),
        }
    }

    /// Checks that `manifest_url` may claim `reference`
    ///
    /// # Arguments
    ///
    /// * `path` - Field path reported on failure
    /// * `manifest_url` - Where the manifest was fetched from
    /// * `reference` - The webpage or repository URL being claimed
    /// * `declared` - The reference's `wellKnown` flag
    /// * `cache` - Attestations already fetched for this manifest
    pub async fn verify(
        &self,
        path: &str,
        manifest_url: &Url,
        reference: &Url,
        declared: bool,
        cache: &mut AttestationCache,
    ) -> Result<(), ValidationError> {
        if same_origin(manifest_url, reference) {
            return Ok(());
        }

        let unverified = |reason: String| {
            ValidationError::new(path, ValidationErrorKind::OwnershipUnverified { reason })
        };

        if !declared {
            return Err(unverified(format!(
                "{} is on a different origin than {} and is not marked wellKnown",
                reference, manifest_url
            )));
        }

        let document_url = well_known_url(reference, &self.well_known_path);
        let key = document_url.as_str().to_string();

        if !cache.documents.contains_key(&key) {
            let fetched = match self.fetcher.fetch(&document_url).await {
                Ok(body) => Ok(String::from_utf8_lossy(&body).into_owned()),
                Err(e) => Err(e.to_string()),
            };
            cache.documents.insert(key.clone(), fetched);
        }

        match cache.documents.get(&key) {
            Some(Ok(document)) if attests(document, manifest_url) => Ok(()),
            Some(Ok(_)) => Err(unverified(format!(
                "{} does not list {}",
                document_url, manifest_url
            ))),
            Some(Err(e)) => Err(unverified(format!(
                "{} is not reachable: {}",
                document_url, e
            ))),
            None => Err(unverified(format!("{} was not fetched", document_url))),
        }
    }
}

/// Checks whether a well-known document lists `manifest_url`
///
/// Blank lines and `#` comments are ignored. Lines are compared as parsed
/// URLs, so `https://Example.com/funding.json` matches
/// `https://example.com/funding.json`.
pub fn attests(document: &str, manifest_url: &Url) -> bool {
    document
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| Url::parse(line).ok())
        .any(|listed| &listed == manifest_url)
}
