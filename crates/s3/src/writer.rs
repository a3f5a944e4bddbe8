//! Single-request uploads
//!
//! The whole body is buffered and sent with one PutObject when the writer
//! finishes, so the object appears atomically.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::{Bytes, BytesMut};
use ofs_core::{ObjectWriter, Result, WriteOptions};

use crate::convert::user_metadata;
use crate::error::map_sdk_error;

/// Upload `body` to `key` with one PutObject
pub(crate) async fn put_object(
    client: &Client,
    bucket: &str,
    key: &str,
    options: &WriteOptions,
    body: Bytes,
) -> Result<()> {
    let size = body.len();
    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .set_content_type(options.content_type.clone())
        .set_metadata(user_metadata(&options.metadata))
        .body(ByteStream::from(body))
        .send()
        .await
        .map_err(|e| map_sdk_error(e, key))?;

    tracing::debug!(bucket, key, size, "object uploaded");
    Ok(())
}

/// Buffers the object in memory and uploads it on finish
pub struct PutWriter {
    client: Client,
    bucket: String,
    key: String,
    options: WriteOptions,
    buffer: BytesMut,
}

impl PutWriter {
    pub fn new(client: Client, bucket: String, key: String, options: WriteOptions) -> Self {
        Self {
            client,
            bucket,
            key,
            options,
            buffer: BytesMut::new(),
        }
    }
}

#[async_trait]
impl ObjectWriter for PutWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<()> {
        let Self {
            client,
            bucket,
            key,
            options,
            buffer,
        } = *self;
        put_object(&client, &bucket, &key, &options, buffer.freeze()).await
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        tracing::debug!(key = %self.key, "discarding buffered upload");
        Ok(())
    }
}
