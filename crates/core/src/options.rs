//! Per-operation options
//!
//! Each filesystem operation that takes options has its own explicit struct.

use std::collections::BTreeMap;

use jiff::Timestamp;

use crate::metadata::MetadataValue;

/// Options for opening a write stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    /// Negotiate a resumable (multi-request) upload instead of a single-shot write
    pub resumable: bool,

    /// MIME type stored with the object
    pub content_type: Option<String>,

    /// Custom attributes stored with the object
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resumable(mut self, resumable: bool) -> Self {
        self.resumable = resumable;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Options for opening a read stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// First byte to read (inclusive)
    pub start: Option<u64>,

    /// Last byte to read (inclusive)
    pub end: Option<u64>,
}

impl ReadOptions {
    /// Read bytes `start..=end`
    pub fn range(start: u64, end: u64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// HTTP `Range` header value for these options, `None` for a full read
    pub fn http_range(&self) -> Option<String> {
        match (self.start, self.end) {
            (None, None) => None,
            (Some(start), None) => Some(format!("bytes={start}-")),
            (None, Some(end)) => Some(format!("bytes=0-{end}")),
            (Some(start), Some(end)) => Some(format!("bytes={start}-{end}")),
        }
    }
}

/// Options for signed URL generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedUrlOptions {
    /// Content type the URL is bound to
    pub content_type: Option<String>,
}

impl SignedUrlOptions {
    pub fn content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
        }
    }
}

/// What a signed URL allows its holder to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedUrlAction {
    Read,
    Write,
}

impl SignedUrlAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SignedUrlAction::Read => "read",
            SignedUrlAction::Write => "write",
        }
    }
}

/// A fully resolved signed URL request handed to the storage client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlRequest {
    pub action: SignedUrlAction,

    /// Instant after which the URL stops working
    pub expires: Timestamp,

    pub content_type: Option<String>,
}
