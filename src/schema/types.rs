//! Funding manifest document types (schema v1)

use crate::schema::raw::Raw;
use crate::schema::{ValidationError, ValidationErrorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Allowed `entity.type` values
pub const ENTITY_TYPES: &[&str] = &["individual", "group", "organisation", "other"];

/// Allowed `entity.role` values
pub const ENTITY_ROLES: &[&str] = &["owner", "steward", "maintainer", "contributor", "other"];

/// Allowed `channels[n].type` values
pub const CHANNEL_TYPES: &[&str] = &["bank", "payment-provider", "cheque", "cash", "other"];

/// Allowed `plans[n].status` values
pub const PLAN_STATUSES: &[&str] = &["active", "inactive"];

/// Allowed `plans[n].frequency` values
pub const PLAN_FREQUENCIES: &[&str] = &[
    "one-time",
    "weekly",
    "fortnightly",
    "monthly",
    "yearly",
    "other",
];

/// A parsed funding manifest
///
/// `url` and `body` are not part of the JSON document; they are filled in
/// by [`Manifest::parse`] from where the document was fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,

    #[serde(skip)]
    pub url: String,

    #[serde(skip)]
    pub body: String,

    pub entity: Raw<Entity>,

    #[serde(default)]
    pub projects: Raw<Vec<Project>>,

    #[serde(default)]
    pub funding: Funding,
}

impl Manifest {
    /// Decodes a manifest fetched from `url`
    ///
    /// Decoding failures are reported as `Malformed` errors so they flow
    /// through the same handling as schema violations. The path names the
    /// section or list item that failed, such as `plans[0]`, and falls back
    /// to `manifest` when the document itself is broken.
    pub fn parse(url: &str, body: &[u8]) -> Result<Self, ValidationError> {
        let text = std::str::from_utf8(body).map_err(|e| {
            ValidationError::new(
                "manifest",
                ValidationErrorKind::Malformed(format!("body is not UTF-8: {}", e)),
            )
        })?;

        let mut manifest: Manifest =
            serde_json::from_str(text).map_err(|e| locate_decode_error(text, &e))?;

        manifest.url = url.to_string();
        manifest.body = text.to_string();
        Ok(manifest)
    }
}

/// Finds the section or list item behind a failed manifest decode
fn locate_decode_error(text: &str, error: &serde_json::Error) -> ValidationError {
    let whole = || ValidationError::new("manifest", ValidationErrorKind::Malformed(error.to_string()));

    let Ok(document) = serde_json::from_str::<Value>(text) else {
        return whole();
    };
    let funding = document.get("funding");
    let in_funding = |name: &str| funding.and_then(|f| f.get(name));

    section_error::<Entity>("entity", document.get("entity"))
        .or_else(|| item_error::<Project>("projects", document.get("projects")))
        .or_else(|| item_error::<Channel>("channels", in_funding("channels")))
        .or_else(|| item_error::<Plan>("plans", in_funding("plans")))
        .or_else(|| item_error::<History>("history", in_funding("history")))
        .unwrap_or_else(whole)
}

fn section_error<T: DeserializeOwned>(path: &str, section: Option<&Value>) -> Option<ValidationError> {
    let error = T::deserialize(section?).err()?;
    Some(ValidationError::new(
        path,
        ValidationErrorKind::Malformed(error.to_string()),
    ))
}

fn item_error<T: DeserializeOwned>(path: &str, section: Option<&Value>) -> Option<ValidationError> {
    let section = section?;
    let Some(items) = section.as_array() else {
        return Some(ValidationError::new(
            path,
            ValidationErrorKind::Malformed(format!("expected an array, found {}", section)),
        ));
    };

    items
        .iter()
        .enumerate()
        .find_map(|(n, item)| section_error::<T>(&format!("{}[{}]", path, n), Some(item)))
}

/// The `funding` section of a manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Funding {
    #[serde(default)]
    pub channels: Raw<Vec<Channel>>,

    #[serde(default)]
    pub plans: Raw<Vec<Plan>>,

    #[serde(default)]
    pub history: Raw<Vec<History>>,
}

/// A URL reference that may be proven through a well-known document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRef {
    pub url: String,

    /// Set by the publisher when the URL lives on another origin and
    /// carries a well-known attestation
    #[serde(default)]
    pub well_known: bool,
}

/// The organisation or individual publishing the manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub telephone: String,
    pub webpage_url: UrlRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub description: String,
    pub webpage_url: UrlRef,
    pub repository_url: UrlRef,
    pub license: String,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A funding destination referenced by plans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
}

/// A funding offer tied to one or more channels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub status: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    pub currency: String,
    pub frequency: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// One year of financial history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub year: i64,
    pub income: f64,
    pub expenses: f64,
    #[serde(default)]
    pub description: String,
}
