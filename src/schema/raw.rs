//! Verbatim JSON sub-documents with a derived structured view

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::ops::Deref;

/// A JSON sub-document kept both verbatim and parsed
///
/// The raw text is exactly what the publisher sent and is what gets
/// persisted. The view is read-only, so the two never drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Raw<T> {
    raw: String,
    view: T,
}

impl<T> Raw<T> {
    /// The verbatim JSON text
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The structured view parsed from the raw text
    pub fn view(&self) -> &T {
        &self.view
    }
}

impl<T> Deref for Raw<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.view
    }
}

impl<T> Default for Raw<Vec<T>> {
    fn default() -> Self {
        Self {
            raw: "[]".to_string(),
            view: Vec::new(),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Raw<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Box<RawValue> = Deserialize::deserialize(deserializer)?;
        let view = serde_json::from_str(raw.get()).map_err(de::Error::custom)?;
        Ok(Self {
            raw: raw.get().to_owned(),
            view,
        })
    }
}

impl<T> Serialize for Raw<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let raw = RawValue::from_string(self.raw.clone()).map_err(ser::Error::custom)?;
        raw.serialize(serializer)
    }
}
