//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the StorageClient trait from ofs-core.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::MetadataDirective;
use aws_smithy_types::retry::RetryConfig;
use aws_smithy_types::timeout::TimeoutConfig;
use futures::StreamExt;
use jiff::Timestamp;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use ofs_core::{
    ByteStream, ConfigManager, Error, FileMetadata, ObjectFilesystem, ObjectSummary,
    ObjectWriter, Profile, ProfileManager, ReadOptions, Result, SignedUrlAction,
    SignedUrlRequest, StorageClient, WriteOptions,
};

use crate::convert::{metadata_from_head, summary_from_object, user_metadata};
use crate::error::map_sdk_error;
use crate::multipart::{MultipartConfig, MultipartWriter};
use crate::writer::PutWriter;

/// Characters escaped in the key part of an `x-amz-copy-source` header
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// S3 storage client bound to one bucket
#[derive(Debug, Clone)]
pub struct S3Storage {
    inner: aws_sdk_s3::Client,
    bucket: String,
    multipart: MultipartConfig,
}

impl S3Storage {
    /// Create a new S3 client from a profile
    pub async fn new(profile: &Profile) -> Result<Self> {
        if profile.bucket.is_empty() {
            return Err(Error::Config(format!(
                "profile '{}' has no bucket",
                profile.name
            )));
        }

        let credentials = aws_credential_types::Credentials::new(
            profile.access_key.clone(),
            profile.secret_key.clone(),
            None, // session token
            None, // expiry
            "ofs-static-credentials",
        );

        let retry = profile.retry_config();
        let retry_config = RetryConfig::standard()
            .with_max_attempts(retry.max_attempts)
            .with_initial_backoff(Duration::from_millis(retry.initial_backoff_ms))
            .with_max_backoff(Duration::from_millis(retry.max_backoff_ms));

        let timeout = profile.timeout_config();
        let timeout_config = TimeoutConfig::builder()
            .connect_timeout(Duration::from_millis(timeout.connect_ms))
            .read_timeout(Duration::from_millis(timeout.read_ms))
            .build();

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(profile.region.clone()))
            .endpoint_url(&profile.endpoint)
            .retry_config(retry_config)
            .timeout_config(timeout_config)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(profile.path_style())
            .build();

        tracing::debug!(
            profile = %profile.name,
            endpoint = %profile.endpoint,
            bucket = %profile.bucket,
            "S3 client configured"
        );

        Ok(Self::from_client(
            aws_sdk_s3::Client::from_conf(s3_config),
            profile.bucket.clone(),
        ))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            inner: client,
            bucket: bucket.into(),
            multipart: MultipartConfig::default(),
        }
    }

    /// Use `config` for resumable writes
    pub fn with_multipart_config(mut self, config: MultipartConfig) -> Self {
        self.multipart = config;
        self
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    async fn head(&self, key: &str) -> Result<HeadObjectOutput> {
        self.inner
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))
    }
}

/// `x-amz-copy-source` value addressing `key` in `bucket`
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE))
}

/// Lifetime left until `expires`, rejecting instants that already passed
fn presign_duration(expires: Timestamp, now: Timestamp) -> Result<Duration> {
    let remaining = expires.duration_since(now);
    if remaining.is_negative() || remaining.is_zero() {
        return Err(Error::InvalidArgument(format!(
            "expiration {expires} is not in the future"
        )));
    }
    Duration::try_from(remaining).map_err(|e| Error::InvalidArgument(e.to_string()))
}

#[async_trait]
impl StorageClient for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn open_read(&self, key: &str, options: &ReadOptions) -> Result<ByteStream> {
        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(options.http_range())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        let body = futures::stream::unfold(response.body, |mut body| async move {
            body.next()
                .await
                .map(|chunk| (chunk.map_err(|e| Error::Network(e.to_string())), body))
        });
        Ok(body.boxed())
    }

    async fn open_write(
        &self,
        key: &str,
        options: &WriteOptions,
    ) -> Result<Box<dyn ObjectWriter>> {
        if options.resumable {
            let writer = MultipartWriter::start(
                self.inner.clone(),
                self.bucket.clone(),
                key.to_string(),
                options.clone(),
                self.multipart.clone(),
            )
            .await?;
            Ok(Box::new(writer))
        } else {
            Ok(Box::new(PutWriter::new(
                self.inner.clone(),
                self.bucket.clone(),
                key.to_string(),
                options.clone(),
            )))
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn download(&self, key: &str) -> Result<bytes::Bytes> {
        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .into_bytes();

        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // DeleteObject succeeds on absent keys; HEAD first to report them.
        self.head(key).await?;

        self.inner
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .inner
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, prefix))?;

            objects.extend(response.contents().iter().filter_map(summary_from_object));

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(prefix, count = objects.len(), "listed objects");
        Ok(objects)
    }

    async fn signed_url(&self, key: &str, request: &SignedUrlRequest) -> Result<String> {
        let expires_in = presign_duration(request.expires, Timestamp::now())?;
        // Rejects lifetimes over the SigV4 limit of one week.
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;

        let presigned = match request.action {
            SignedUrlAction::Read => self
                .inner
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .set_response_content_type(request.content_type.clone())
                .presigned(config)
                .await
                .map_err(|e| map_sdk_error(e, key))?,
            SignedUrlAction::Write => self
                .inner
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .set_content_type(request.content_type.clone())
                .presigned(config)
                .await
                .map_err(|e| map_sdk_error(e, key))?,
        };

        Ok(presigned.uri().to_string())
    }

    async fn get_metadata(&self, key: &str) -> Result<FileMetadata> {
        let head = self.head(key).await?;
        Ok(metadata_from_head(&self.bucket, key, &head))
    }

    async fn set_metadata(&self, key: &str, metadata: &FileMetadata) -> Result<FileMetadata> {
        let mut merged = self.get_metadata(key).await?;
        merged.merge(metadata);

        // S3 metadata is immutable; copy the object onto itself to replace it.
        self.inner
            .copy_object()
            .copy_source(copy_source(&self.bucket, key))
            .bucket(&self.bucket)
            .key(key)
            .metadata_directive(MetadataDirective::Replace)
            .set_content_type(merged.content_type.clone())
            .set_cache_control(merged.cache_control.clone())
            .set_content_disposition(merged.content_disposition.clone())
            .set_content_encoding(merged.content_encoding.clone())
            .set_content_language(merged.content_language.clone())
            .set_metadata(user_metadata(&merged.metadata))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        tracing::debug!(bucket = %self.bucket, key, "object metadata replaced");
        self.get_metadata(key).await
    }
}

/// Open the filesystem described by the named profile
///
/// Reads the configuration file, resolves `profile_name` and applies the
/// configured filesystem settings.
pub async fn connect(profile_name: &str) -> Result<ObjectFilesystem> {
    let config_manager = ConfigManager::new()?;
    let settings = config_manager.load()?.filesystem;
    let profile = ProfileManager::with_config_manager(config_manager).get(profile_name)?;

    let storage = S3Storage::new(&profile).await?;
    Ok(ObjectFilesystem::with_settings(Arc::new(storage), settings))
}
