//! Object metadata model
//!
//! [`FileMetadata`] mirrors the descriptive record an object store keeps next
//! to each object. Field names serialize in camelCase so the record round-trips
//! through JSON the way storage services present it.

use std::collections::BTreeMap;
use std::fmt;

use jiff::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Custom metadata key holding the public download token(s)
pub const DOWNLOAD_TOKENS_KEY: &str = "firebaseStorageDownloadTokens";

/// Resource kind reported in metadata records
pub const OBJECT_KIND: &str = "storage#object";

/// A custom metadata value: stores accept strings, some also numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Number(serde_json::Number),
}

impl MetadataValue {
    /// Borrow the value if it is textual
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            MetadataValue::Number(_) => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(s) => f.write_str(s),
            MetadataValue::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Number(value.into())
    }
}

impl From<u64> for MetadataValue {
    fn from(value: u64) -> Self {
        MetadataValue::Number(value.into())
    }
}

/// Metadata record attached to one object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Resource kind reported by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Store-wide identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Object name (its full key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Size in bytes as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<Timestamp>,

    /// Last update timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,

    /// Custom attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl FileMetadata {
    /// Size in bytes, or 0 when absent or not a decimal number
    pub fn size_bytes(&self) -> u64 {
        self.size
            .as_deref()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }

    /// Set a custom attribute
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Record a public download token in the custom attributes
    pub fn with_download_token(self, token: impl Into<String>) -> Self {
        self.with_custom(DOWNLOAD_TOKENS_KEY, token.into())
    }

    /// First download token, if one was recorded
    ///
    /// Stores keep several tokens as a comma separated list.
    pub fn download_token(&self) -> Option<&str> {
        self.metadata
            .get(DOWNLOAD_TOKENS_KEY)
            .and_then(MetadataValue::as_str)
            .and_then(|tokens| tokens.split(',').map(str::trim).find(|t| !t.is_empty()))
    }

    /// Overlay the fields set in `update` onto this record
    ///
    /// Descriptive fields present in `update` replace the current ones and
    /// custom attributes are merged key by key. Store-owned fields (kind, id,
    /// name, size, timestamps) are left untouched.
    pub fn merge(&mut self, update: &FileMetadata) {
        fn overlay(target: &mut Option<String>, value: &Option<String>) {
            if value.is_some() {
                target.clone_from(value);
            }
        }

        overlay(&mut self.content_type, &update.content_type);
        overlay(&mut self.cache_control, &update.cache_control);
        overlay(&mut self.content_disposition, &update.content_disposition);
        overlay(&mut self.content_encoding, &update.content_encoding);
        overlay(&mut self.content_language, &update.content_language);
        self.metadata.extend(update.metadata.clone());
    }

    /// Deserialize the custom attributes into a caller-defined shape
    pub fn custom_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = serde_json::to_value(&self.metadata)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Minimal stat projection of [`FileMetadata`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Size in bytes
    pub size: u64,
}

impl From<&FileMetadata> for Stat {
    fn from(metadata: &FileMetadata) -> Self {
        Self {
            size: metadata.size_bytes(),
        }
    }
}
