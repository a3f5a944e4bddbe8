//! In-memory storage client
//!
//! Keeps every object of one bucket in a sorted map. Listing order is
//! lexicographic, as on S3 and GCS.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use jiff::Timestamp;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::metadata::{FileMetadata, OBJECT_KIND};
use crate::options::{ReadOptions, SignedUrlRequest, WriteOptions};
use crate::token::encode_component;
use crate::traits::{ByteStream, ObjectSummary, ObjectWriter, StorageClient};

/// Chunk size of read streams
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    metadata: FileMetadata,
}

type ObjectMap = Arc<RwLock<BTreeMap<String, StoredObject>>>;

/// In-memory [`StorageClient`] for one bucket
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    bucket: String,
    objects: ObjectMap,
}

impl MemoryStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::default(),
        }
    }

    /// Store an object directly, with store-generated metadata
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        let key = key.into();
        let data = data.into();
        let metadata = object_metadata(&self.bucket, &key, data.len(), &WriteOptions::default());
        self.objects
            .write()
            .insert(key, StoredObject { data, metadata });
    }

    /// Store an object with exactly the given metadata record
    pub fn insert_with_metadata(
        &self,
        key: impl Into<String>,
        data: impl Into<Bytes>,
        metadata: FileMetadata,
    ) {
        self.objects.write().insert(
            key.into(),
            StoredObject {
                data: data.into(),
                metadata,
            },
        );
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn get(&self, key: &str) -> Result<StoredObject> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

fn object_metadata(bucket: &str, key: &str, size: usize, options: &WriteOptions) -> FileMetadata {
    let now = Timestamp::now();
    FileMetadata {
        kind: Some(OBJECT_KIND.to_string()),
        id: Some(format!("{bucket}/{key}")),
        name: Some(key.to_string()),
        content_type: options.content_type.clone(),
        size: Some(size.to_string()),
        time_created: Some(now),
        updated: Some(now),
        metadata: options.metadata.clone(),
        ..Default::default()
    }
}

/// Slice `data` to the inclusive range in `options`
fn select_range(data: &Bytes, options: &ReadOptions) -> Result<Bytes> {
    let len = data.len() as u64;
    let start = options.start.unwrap_or(0);
    if options.start.is_none() && options.end.is_none() {
        return Ok(data.clone());
    }
    if start >= len {
        return Err(Error::InvalidArgument(format!(
            "range start {start} is beyond object size {len}"
        )));
    }
    let end = options.end.map_or(len, |end| end.saturating_add(1).min(len));
    if end <= start {
        return Err(Error::InvalidArgument(format!(
            "range end {end} precedes start {start}"
        )));
    }
    Ok(data.slice(start as usize..end as usize))
}

#[async_trait]
impl StorageClient for MemoryStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn open_read(&self, key: &str, options: &ReadOptions) -> Result<ByteStream> {
        let data = select_range(&self.get(key)?.data, options)?;
        let chunks: Vec<Result<Bytes>> = (0..data.len())
            .step_by(CHUNK_SIZE)
            .map(|offset| Ok(data.slice(offset..(offset + CHUNK_SIZE).min(data.len()))))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn open_write(
        &self,
        key: &str,
        options: &WriteOptions,
    ) -> Result<Box<dyn ObjectWriter>> {
        Ok(Box::new(MemoryWriter {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            options: options.clone(),
            buffer: Vec::new(),
            objects: Arc::clone(&self.objects),
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().contains_key(key))
    }

    async fn download(&self, key: &str) -> Result<Bytes> {
        Ok(self.get(key)?.data)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
        let objects = self.objects.read();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                size: Some(object.data.len() as u64),
                updated: object.metadata.updated,
            })
            .collect())
    }

    async fn signed_url(&self, key: &str, request: &SignedUrlRequest) -> Result<String> {
        if request.expires <= Timestamp::now() {
            return Err(Error::InvalidArgument(format!(
                "expiration {} is in the past",
                request.expires
            )));
        }

        let mut url = format!(
            "memory://{}/{}?action={}&expires={}",
            self.bucket,
            encode_component(key),
            request.action.as_str(),
            request.expires.as_second()
        );
        if let Some(content_type) = &request.content_type {
            url.push_str("&contentType=");
            url.push_str(&encode_component(content_type));
        }
        Ok(url)
    }

    async fn get_metadata(&self, key: &str) -> Result<FileMetadata> {
        Ok(self.get(key)?.metadata)
    }

    async fn set_metadata(&self, key: &str, metadata: &FileMetadata) -> Result<FileMetadata> {
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        object.metadata.merge(metadata);
        object.metadata.updated = Some(Timestamp::now());
        Ok(object.metadata.clone())
    }
}

/// Buffers chunks and commits the object on finish
struct MemoryWriter {
    bucket: String,
    key: String,
    options: WriteOptions,
    buffer: Vec<u8>,
    objects: ObjectMap,
}

#[async_trait]
impl ObjectWriter for MemoryWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<()> {
        let MemoryWriter {
            bucket,
            key,
            options,
            buffer,
            objects,
        } = *self;
        let metadata = object_metadata(&bucket, &key, buffer.len(), &options);
        objects.write().insert(
            key,
            StoredObject {
                data: Bytes::from(buffer),
                metadata,
            },
        );
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
