//! Trait definitions
//!
//! [`StorageClient`] is the object-store surface the filesystem adapter
//! consumes; an implementation exists per backend and can be mocked for
//! testing. [`OnlineFilesystem`] is the filesystem surface the adapter
//! produces for callers.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metadata::{FileMetadata, Stat};
use crate::options::{ReadOptions, SignedUrlOptions, SignedUrlRequest, WriteOptions};
use crate::token::TokenUrl;

/// Lazily produced object bytes
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Listing entry for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    /// Full object key
    pub key: String,

    /// Size in bytes, if the listing reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            updated: None,
        }
    }
}

/// Write channel to a single object
///
/// Bytes handed to [`write`](ObjectWriter::write) are not visible in the store
/// until [`finish`](ObjectWriter::finish) resolves successfully. A writer
/// dropped without finishing never publishes the object; call
/// [`abort`](ObjectWriter::abort) to release server-side state as well.
#[async_trait]
pub trait ObjectWriter: Send {
    /// Queue a chunk for upload
    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    /// Complete the upload; resolves once the store has persisted the object
    async fn finish(self: Box<Self>) -> Result<()>;

    /// Discard the upload and release any server-side state
    async fn abort(self: Box<Self>) -> Result<()>;
}

/// Key-addressed object operations for one bucket
///
/// Implementations own retry policy and authentication; callers see only the
/// outcome of each call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Name of the bucket this client addresses
    fn bucket(&self) -> &str;

    /// Open the object for reading
    async fn open_read(&self, key: &str, options: &ReadOptions) -> Result<ByteStream>;

    /// Open a write channel to the object
    async fn open_write(&self, key: &str, options: &WriteOptions)
    -> Result<Box<dyn ObjectWriter>>;

    /// Check whether the key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Download the whole object
    async fn download(&self, key: &str) -> Result<Bytes>;

    /// Delete the object; a missing key is `NotFound`
    async fn delete(&self, key: &str) -> Result<()>;

    /// List every key starting with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>>;

    /// Issue a signed URL for the object
    async fn signed_url(&self, key: &str, request: &SignedUrlRequest) -> Result<String>;

    /// Get the object's metadata record
    async fn get_metadata(&self, key: &str) -> Result<FileMetadata>;

    /// Update the object's metadata and return the stored record
    async fn set_metadata(&self, key: &str, metadata: &FileMetadata) -> Result<FileMetadata>;
}

/// Filesystem-shaped operations over an object store
#[async_trait]
pub trait OnlineFilesystem: Send + Sync {
    /// Open a write stream; see [`ObjectWriter`] for completion semantics
    async fn create_write_stream(
        &self,
        path: &str,
        options: WriteOptions,
    ) -> Result<Box<dyn ObjectWriter>>;

    /// Open a lazy read stream; a missing object surfaces as the first item
    fn create_read_stream(&self, path: &str, options: ReadOptions) -> ByteStream;

    /// Whether an object exists at `path`
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Directories are implicit in a flat namespace, so this always succeeds
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Download the whole object as raw bytes
    async fn read_file(&self, path: &str) -> Result<Bytes>;

    /// Download the whole object as UTF-8 text
    async fn read_file_to_string(&self, path: &str) -> Result<String>;

    /// Delete the object
    async fn unlink(&self, path: &str) -> Result<()>;

    /// Upload everything `source` yields to `path`
    async fn write_stream_to_file(
        &self,
        path: &str,
        source: ByteStream,
        options: WriteOptions,
    ) -> Result<()>;

    /// Names under the directory `path`, relative to it
    async fn read_dir(&self, path: &str) -> Result<Vec<String>>;

    /// Write-scoped signed URL valid until `valid_until`
    async fn get_upload_url(
        &self,
        path: &str,
        valid_until: Timestamp,
        options: SignedUrlOptions,
    ) -> Result<String>;

    /// Read-scoped signed URL valid until the start of `valid_until`'s UTC date
    async fn get_download_url(
        &self,
        path: &str,
        valid_until: Timestamp,
        options: SignedUrlOptions,
    ) -> Result<String>;

    /// Size of the object
    async fn lstat(&self, path: &str) -> Result<Stat>;

    /// Full metadata record of the object
    async fn get_metadata(&self, path: &str) -> Result<FileMetadata>;

    /// Update the metadata record of the object
    async fn set_metadata(&self, path: &str, metadata: FileMetadata) -> Result<FileMetadata>;

    /// Public token-gated download URL
    fn create_url(&self, bucket: &str, path: &str, token: &str) -> String;

    /// Fresh token and the public URL it unlocks
    fn generate_token_and_url(&self, bucket: &str, path: &str) -> TokenUrl;
}
