//! Multipart upload support
//!
//! Resumable writes stream the object to S3 in parts as bytes arrive, so
//! memory use stays bounded by one part regardless of object size.

use std::future::Future;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use bytes::{Bytes, BytesMut};
use ofs_core::{Error, ObjectWriter, Result, WriteOptions};

use crate::convert::user_metadata;
use crate::error::map_sdk_error;
use crate::writer::put_object;

/// Default part size: 64 MiB
pub const DEFAULT_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: usize = 10_000;

/// Multipart upload configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartConfig {
    /// Part size in bytes
    pub part_size: u64,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part_size(mut self, size: u64) -> Self {
        self.part_size = size.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
        self
    }

    /// Largest object this configuration can upload
    pub fn max_object_size(&self) -> u64 {
        self.part_size * MAX_PARTS as u64
    }

    fn part_len(&self) -> usize {
        usize::try_from(self.part_size).unwrap_or(usize::MAX)
    }
}

/// Progress of one multipart upload
#[derive(Debug, Clone)]
pub struct UploadState {
    /// Upload ID from S3
    pub upload_id: String,

    /// Target key
    pub key: String,

    /// Completed parts in upload order
    pub completed_parts: Vec<CompletedPart>,

    /// Bytes acknowledged by S3
    pub uploaded_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

impl UploadState {
    pub fn new(upload_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.into(),
            key: key.into(),
            completed_parts: Vec::new(),
            uploaded_bytes: 0,
        }
    }

    /// Record a part S3 acknowledged
    pub fn add_completed_part(&mut self, part_number: i32, etag: String, size: u64) {
        self.completed_parts
            .push(CompletedPart { part_number, etag });
        self.uploaded_bytes += size;
    }

    /// Get the next part number to upload
    pub fn next_part_number(&self) -> i32 {
        self.completed_parts
            .iter()
            .map(|p| p.part_number)
            .max()
            .map(|n| n + 1)
            .unwrap_or(1)
    }

    fn manifest(&self) -> CompletedMultipartUpload {
        let parts = self
            .completed_parts
            .iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect();
        CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build()
    }
}

/// Streams an object to S3 as a multipart upload
pub struct MultipartWriter {
    client: Client,
    bucket: String,
    options: WriteOptions,
    config: MultipartConfig,
    state: UploadState,
    buffer: BytesMut,
}

impl MultipartWriter {
    /// Initiate a multipart upload for `key`
    pub async fn start(
        client: Client,
        bucket: String,
        key: String,
        options: WriteOptions,
        config: MultipartConfig,
    ) -> Result<Self> {
        let response = client
            .create_multipart_upload()
            .bucket(&bucket)
            .key(&key)
            .set_content_type(options.content_type.clone())
            .set_metadata(user_metadata(&options.metadata))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &key))?;

        let upload_id = response
            .upload_id()
            .ok_or_else(|| Error::General(format!("no upload id returned for {key}")))?;
        tracing::debug!(bucket = %bucket, key = %key, upload_id, "multipart upload started");

        Ok(Self {
            client,
            bucket,
            options,
            config,
            state: UploadState::new(upload_id, key),
            buffer: BytesMut::new(),
        })
    }

    async fn upload_part(&mut self, data: Bytes) -> Result<()> {
        if self.state.completed_parts.len() >= MAX_PARTS {
            return Err(Error::InvalidArgument(format!(
                "{} exceeds the multipart limit of {} bytes",
                self.state.key,
                self.config.max_object_size()
            )));
        }

        let part_number = self.state.next_part_number();
        let size = data.len() as u64;
        let response = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.state.key)
            .upload_id(&self.state.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.state.key))?;

        let etag = response.e_tag().ok_or_else(|| {
            Error::General(format!(
                "no ETag returned for part {part_number} of {}",
                self.state.key
            ))
        })?;
        self.state
            .add_completed_part(part_number, etag.to_string(), size);
        tracing::debug!(key = %self.state.key, part_number, size, "part uploaded");
        Ok(())
    }

    async fn complete_upload(&self) -> Result<()> {
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.state.key)
            .upload_id(&self.state.upload_id)
            .multipart_upload(self.state.manifest())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.state.key))?;
        Ok(())
    }

    async fn abort_upload(&self) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.state.key)
            .upload_id(&self.state.upload_id)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.state.key))?;
        tracing::debug!(key = %self.state.key, "multipart upload aborted");
        Ok(())
    }
}

/// Run `abort` when `result` failed, keeping the original error
///
/// `finish` consumes the writer, so nothing else can release the parts
/// already stored once it fails.
async fn release_on_failure<T, F, Fut>(key: &str, result: Result<T>, abort: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if let Err(err) = &result {
        tracing::warn!(key, error = %err, "multipart upload failed, aborting");
        if let Err(abort_err) = abort().await {
            tracing::warn!(key, error = %abort_err, "failed to abort multipart upload");
        }
    }
    result
}

#[async_trait]
impl ObjectWriter for MultipartWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.buffer.extend_from_slice(&chunk);
        let part_len = self.config.part_len();
        while self.buffer.len() >= part_len {
            let part = self.buffer.split_to(part_len).freeze();
            self.upload_part(part).await?;
        }
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        let rest = this.buffer.split().freeze();

        // Too small for a part: drop the multipart upload and send one request.
        if this.state.completed_parts.is_empty() {
            this.abort_upload().await?;
            return put_object(
                &this.client,
                &this.bucket,
                &this.state.key,
                &this.options,
                rest,
            )
            .await;
        }

        let completed = async {
            if !rest.is_empty() {
                this.upload_part(rest).await?;
            }
            this.complete_upload().await
        }
        .await;
        release_on_failure(&this.state.key, completed, || this.abort_upload()).await?;

        tracing::debug!(
            key = %this.state.key,
            parts = this.state.completed_parts.len(),
            size = this.state.uploaded_bytes,
            "multipart upload completed"
        );
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        self.abort_upload().await
    }
}
