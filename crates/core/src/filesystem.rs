//! Filesystem adapter over a storage client
//!
//! [`ObjectFilesystem`] turns filesystem-style requests into calls on an
//! injected [`StorageClient`]. It keeps no state of its own: every existence
//! check, listing and metadata read goes to the client, and client errors are
//! returned unchanged except where an operation documents a normalization.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use jiff::Timestamp;
use jiff::tz::TimeZone;
use serde::de::DeserializeOwned;

use crate::config::FilesystemSettings;
use crate::error::{Error, Result};
use crate::metadata::{FileMetadata, Stat};
use crate::options::{
    ReadOptions, SignedUrlAction, SignedUrlOptions, SignedUrlRequest, WriteOptions,
};
use crate::path::{dir_prefix, relative_name, validate_key};
use crate::token::{TokenUrl, create_url_with_base, generate_token_and_url_with_base};
use crate::traits::{ByteStream, ObjectWriter, OnlineFilesystem, StorageClient};

/// Filesystem view of one bucket
#[derive(Clone)]
pub struct ObjectFilesystem {
    client: Arc<dyn StorageClient>,
    settings: FilesystemSettings,
}

impl ObjectFilesystem {
    /// Create an adapter with default settings
    pub fn new(client: Arc<dyn StorageClient>) -> Self {
        Self::with_settings(client, FilesystemSettings::default())
    }

    pub fn with_settings(client: Arc<dyn StorageClient>, settings: FilesystemSettings) -> Self {
        Self { client, settings }
    }

    /// The injected storage client
    pub fn client(&self) -> &Arc<dyn StorageClient> {
        &self.client
    }

    pub fn settings(&self) -> &FilesystemSettings {
        &self.settings
    }

    /// Bucket addressed by the storage client
    pub fn bucket(&self) -> &str {
        self.client.bucket()
    }

    /// Fetch the custom attributes of `path` as a caller-defined record
    pub async fn get_metadata_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_metadata(path).await?.custom_as()
    }
}

impl std::fmt::Debug for ObjectFilesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectFilesystem")
            .field("bucket", &self.client.bucket())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Start of the UTC calendar date containing `instant`
///
/// Download URLs honour only the date part of their requested expiry, so a
/// URL requested until `2024-05-01T18:30Z` stops working at `2024-05-01T00:00Z`.
pub fn truncate_to_date(instant: Timestamp) -> Result<Timestamp> {
    instant
        .to_zoned(TimeZone::UTC)
        .date()
        .to_zoned(TimeZone::UTC)
        .map(|zoned| zoned.timestamp())
        .map_err(|e| Error::InvalidArgument(format!("invalid expiry {instant}: {e}")))
}

#[async_trait]
impl OnlineFilesystem for ObjectFilesystem {
    async fn create_write_stream(
        &self,
        path: &str,
        options: WriteOptions,
    ) -> Result<Box<dyn ObjectWriter>> {
        let key = validate_key(path)?;
        tracing::debug!(path, resumable = options.resumable, "opening write stream");
        self.client.open_write(key, &options).await
    }

    fn create_read_stream(&self, path: &str, options: ReadOptions) -> ByteStream {
        tracing::debug!(path, "opening read stream");
        let client = Arc::clone(&self.client);
        let key = path.to_string();
        stream::once(async move {
            validate_key(&key)?;
            client.open_read(&key, &options).await
        })
        .try_flatten()
        .boxed()
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let key = validate_key(path)?;
        match self.client.exists(key).await {
            Err(e) if e.is_not_found() => Ok(false),
            other => other,
        }
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        tracing::debug!(path, "mkdir is a no-op on a flat namespace");
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        let key = validate_key(path)?;
        tracing::debug!(path, "downloading file");
        self.client.download(key).await
    }

    async fn read_file_to_string(&self, path: &str) -> Result<String> {
        let data = self.read_file(path).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    async fn unlink(&self, path: &str) -> Result<()> {
        let key = validate_key(path)?;
        tracing::debug!(path, "deleting file");
        self.client.delete(key).await
    }

    async fn write_stream_to_file(
        &self,
        path: &str,
        mut source: ByteStream,
        options: WriteOptions,
    ) -> Result<()> {
        let mut writer = self.create_write_stream(path, options).await?;
        let mut written = 0_u64;

        while let Some(next) = source.next().await {
            let result = match next {
                Ok(chunk) => {
                    written += chunk.len() as u64;
                    writer.write(chunk).await
                }
                Err(e) => Err(e),
            };

            if let Err(err) = result {
                tracing::warn!(path, error = %err, "upload failed, aborting");
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(path, error = %abort_err, "failed to abort upload");
                }
                return Err(err);
            }
        }

        writer.finish().await?;
        tracing::debug!(path, bytes = written, "upload finished");
        Ok(())
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<String>> {
        let prefix = dir_prefix(path);
        let objects = self.client.list(&prefix).await?;
        Ok(objects
            .iter()
            .filter_map(|object| relative_name(&prefix, &object.key))
            .map(str::to_string)
            .collect())
    }

    async fn get_upload_url(
        &self,
        path: &str,
        valid_until: Timestamp,
        options: SignedUrlOptions,
    ) -> Result<String> {
        let key = validate_key(path)?;
        let request = SignedUrlRequest {
            action: SignedUrlAction::Write,
            expires: valid_until,
            content_type: Some(
                options
                    .content_type
                    .unwrap_or_else(|| self.settings.upload_content_type.clone()),
            ),
        };
        self.client.signed_url(key, &request).await
    }

    async fn get_download_url(
        &self,
        path: &str,
        valid_until: Timestamp,
        options: SignedUrlOptions,
    ) -> Result<String> {
        let key = validate_key(path)?;
        let request = SignedUrlRequest {
            action: SignedUrlAction::Read,
            expires: truncate_to_date(valid_until)?,
            content_type: options.content_type,
        };
        self.client.signed_url(key, &request).await
    }

    async fn lstat(&self, path: &str) -> Result<Stat> {
        let metadata = self.get_metadata(path).await?;
        Ok(Stat::from(&metadata))
    }

    async fn get_metadata(&self, path: &str) -> Result<FileMetadata> {
        let key = validate_key(path)?;
        self.client.get_metadata(key).await
    }

    async fn set_metadata(&self, path: &str, metadata: FileMetadata) -> Result<FileMetadata> {
        let key = validate_key(path)?;
        tracing::debug!(path, "updating metadata");
        self.client.set_metadata(key, &metadata).await
    }

    fn create_url(&self, bucket: &str, path: &str, token: &str) -> String {
        create_url_with_base(&self.settings.download_base_url, bucket, path, token)
    }

    fn generate_token_and_url(&self, bucket: &str, path: &str) -> TokenUrl {
        generate_token_and_url_with_base(&self.settings.download_base_url, bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockStorageClient, ObjectSummary};
    use parking_lot::Mutex;

    fn fs_with(mock: MockStorageClient) -> ObjectFilesystem {
        ObjectFilesystem::new(Arc::new(mock))
    }

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[derive(Debug, Default, PartialEq)]
    struct WriterLog {
        chunks: Vec<Bytes>,
        finished: bool,
        aborted: bool,
    }

    struct RecordingWriter {
        log: Arc<Mutex<WriterLog>>,
        fail_finish: bool,
    }

    #[async_trait]
    impl ObjectWriter for RecordingWriter {
        async fn write(&mut self, chunk: Bytes) -> Result<()> {
            self.log.lock().chunks.push(chunk);
            Ok(())
        }

        async fn finish(self: Box<Self>) -> Result<()> {
            if self.fail_finish {
                return Err(Error::Network("connection reset".into()));
            }
            self.log.lock().finished = true;
            Ok(())
        }

        async fn abort(self: Box<Self>) -> Result<()> {
            self.log.lock().aborted = true;
            Ok(())
        }
    }

    fn recording_client(log: &Arc<Mutex<WriterLog>>, fail_finish: bool) -> MockStorageClient {
        let log = Arc::clone(log);
        let mut mock = MockStorageClient::new();
        mock.expect_open_write()
            .withf(|key: &str, options: &WriteOptions| key == "up/a.bin" && !options.resumable)
            .times(1)
            .returning(move |_, _| {
                Ok(Box::new(RecordingWriter {
                    log: Arc::clone(&log),
                    fail_finish,
                }))
            });
        mock
    }

    #[tokio::test]
    async fn test_exists_maps_not_found_to_false() {
        let mut mock = MockStorageClient::new();
        mock.expect_exists()
            .returning(|key| Err(Error::NotFound(key.to_string())));
        let fs = fs_with(mock);
        assert!(!fs.exists("missing.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_propagates_transport_errors() {
        let mut mock = MockStorageClient::new();
        mock.expect_exists()
            .returning(|_| Err(Error::Network("timeout".into())));
        let fs = fs_with(mock);
        assert!(matches!(
            fs.exists("a.txt").await,
            Err(Error::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_mkdir_makes_no_storage_call() {
        // Any call on a mock without expectations panics.
        let fs = fs_with(MockStorageClient::new());
        fs.mkdir("new/dir").await.unwrap();
        fs.mkdir("").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_dir_normalizes_trailing_separator() {
        let mut mock = MockStorageClient::new();
        mock.expect_list()
            .withf(|prefix: &str| prefix == "a/b/")
            .times(2)
            .returning(|prefix| {
                Ok(vec![
                    ObjectSummary::new(prefix),
                    ObjectSummary::new(format!("{prefix}z.txt")),
                    ObjectSummary::new(format!("{prefix}c/d.txt")),
                    ObjectSummary::new(format!("{prefix}a.txt")),
                ])
            });
        let fs = fs_with(mock);

        let with_slash = fs.read_dir("a/b/").await.unwrap();
        let without_slash = fs.read_dir("a/b").await.unwrap();

        assert_eq!(with_slash, vec!["z.txt", "c/d.txt", "a.txt"]);
        assert_eq!(with_slash, without_slash);
    }

    #[tokio::test]
    async fn test_read_dir_root_lists_whole_bucket() {
        let mut mock = MockStorageClient::new();
        mock.expect_list()
            .withf(|prefix: &str| prefix.is_empty())
            .times(2)
            .returning(|_| Ok(vec![ObjectSummary::new("top.txt")]));
        let fs = fs_with(mock);
        assert_eq!(fs.read_dir("").await.unwrap(), vec!["top.txt"]);
        assert_eq!(fs.read_dir("/").await.unwrap(), vec!["top.txt"]);
    }

    #[tokio::test]
    async fn test_download_url_truncates_expiry_to_date() {
        let mut mock = MockStorageClient::new();
        mock.expect_signed_url()
            .withf(|key: &str, request: &SignedUrlRequest| {
                key == "videos/a.mp4"
                    && request.action == SignedUrlAction::Read
                    && request.content_type.is_none()
            })
            .times(2)
            .returning(|_, request| Ok(format!("signed?expires={}", request.expires)));
        let fs = fs_with(mock);

        let morning = fs
            .get_download_url(
                "videos/a.mp4",
                ts("2030-03-14T08:15:00Z"),
                SignedUrlOptions::default(),
            )
            .await
            .unwrap();
        let evening = fs
            .get_download_url(
                "videos/a.mp4",
                ts("2030-03-14T23:59:59Z"),
                SignedUrlOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(morning, evening);
        assert_eq!(morning, "signed?expires=2030-03-14T00:00:00Z");
    }

    #[tokio::test]
    async fn test_download_url_passes_content_type_when_set() {
        let mut mock = MockStorageClient::new();
        mock.expect_signed_url()
            .withf(|_: &str, request: &SignedUrlRequest| {
                request.content_type.as_deref() == Some("video/mp4")
            })
            .returning(|_, _| Ok("signed".to_string()));
        let fs = fs_with(mock);

        let url = fs
            .get_download_url(
                "a.mp4",
                ts("2030-01-01T12:00:00Z"),
                SignedUrlOptions::content_type("video/mp4"),
            )
            .await
            .unwrap();
        assert_eq!(url, "signed");
    }

    #[tokio::test]
    async fn test_upload_url_uses_default_content_type() {
        let valid_until = ts("2030-03-14T08:15:30Z");
        let mut mock = MockStorageClient::new();
        mock.expect_signed_url()
            .withf(move |key: &str, request: &SignedUrlRequest| {
                key == "up/a.bin"
                    && request.action == SignedUrlAction::Write
                    && request.expires == valid_until
                    && request.content_type.as_deref() == Some("application/octet-stream")
            })
            .returning(|_, _| Ok("put-url".to_string()));
        let fs = fs_with(mock);

        let url = fs
            .get_upload_url("up/a.bin", valid_until, SignedUrlOptions::default())
            .await
            .unwrap();
        assert_eq!(url, "put-url");
    }

    #[tokio::test]
    async fn test_upload_url_content_type_override() {
        let mut mock = MockStorageClient::new();
        mock.expect_signed_url()
            .withf(|_: &str, request: &SignedUrlRequest| {
                request.content_type.as_deref() == Some("image/png")
            })
            .returning(|_, _| Ok("put-url".to_string()));
        let settings = FilesystemSettings {
            upload_content_type: "video/mp4".to_string(),
            ..Default::default()
        };
        let fs = ObjectFilesystem::with_settings(Arc::new(mock), settings);

        fs.get_upload_url(
            "a.png",
            ts("2030-01-01T00:00:00Z"),
            SignedUrlOptions::content_type("image/png"),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_upload_url_propagates_client_rejection() {
        let mut mock = MockStorageClient::new();
        mock.expect_signed_url()
            .returning(|_, _| Err(Error::InvalidArgument("expiry in the past".into())));
        let fs = fs_with(mock);

        let result = fs
            .get_upload_url("a", ts("2000-01-01T00:00:00Z"), SignedUrlOptions::default())
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_lstat_parses_size() {
        let mut mock = MockStorageClient::new();
        mock.expect_get_metadata().returning(|_| {
            Ok(FileMetadata {
                size: Some("1024".into()),
                ..Default::default()
            })
        });
        let fs = fs_with(mock);
        assert_eq!(fs.lstat("a.bin").await.unwrap(), Stat { size: 1024 });
    }

    #[tokio::test]
    async fn test_lstat_tolerates_missing_or_bad_size() {
        let mut mock = MockStorageClient::new();
        mock.expect_get_metadata()
            .withf(|key: &str| key == "no-size")
            .returning(|_| Ok(FileMetadata::default()));
        mock.expect_get_metadata()
            .withf(|key: &str| key == "bad-size")
            .returning(|_| {
                Ok(FileMetadata {
                    size: Some("n/a".into()),
                    ..Default::default()
                })
            });
        let fs = fs_with(mock);

        assert_eq!(fs.lstat("no-size").await.unwrap().size, 0);
        assert_eq!(fs.lstat("bad-size").await.unwrap().size, 0);
    }

    #[tokio::test]
    async fn test_lstat_propagates_not_found() {
        let mut mock = MockStorageClient::new();
        mock.expect_get_metadata()
            .returning(|key| Err(Error::NotFound(key.to_string())));
        let fs = fs_with(mock);
        assert!(fs.lstat("gone").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_set_metadata_passes_record_through() {
        let update = FileMetadata {
            content_type: Some("text/plain".into()),
            ..Default::default()
        }
        .with_custom("owner", "alice");
        let expected = update.clone();

        let mut mock = MockStorageClient::new();
        mock.expect_set_metadata()
            .withf(move |key: &str, metadata: &FileMetadata| {
                key == "a.txt" && *metadata == expected
            })
            .returning(|_, metadata| {
                let mut stored = metadata.clone();
                stored.size = Some("5".into());
                Ok(stored)
            });
        let fs = fs_with(mock);

        let stored = fs.set_metadata("a.txt", update).await.unwrap();
        assert_eq!(stored.size.as_deref(), Some("5"));
        assert_eq!(stored.metadata.get("owner"), Some(&"alice".into()));
    }

    #[tokio::test]
    async fn test_get_metadata_as_typed_record() {
        #[derive(serde::Deserialize)]
        struct Owner {
            owner: String,
        }

        let mut mock = MockStorageClient::new();
        mock.expect_get_metadata()
            .returning(|_| Ok(FileMetadata::default().with_custom("owner", "alice")));
        let fs = fs_with(mock);

        let owner: Owner = fs.get_metadata_as("a.txt").await.unwrap();
        assert_eq!(owner.owner, "alice");
    }

    #[tokio::test]
    async fn test_read_stream_missing_object_errors_on_first_poll() {
        let mut mock = MockStorageClient::new();
        mock.expect_open_read()
            .times(1)
            .returning(|key, _| Err(Error::NotFound(key.to_string())));
        let fs = fs_with(mock);

        let mut stream = fs.create_read_stream("missing.bin", ReadOptions::default());
        let first = stream.next().await.unwrap();
        assert!(first.unwrap_err().is_not_found());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_read_stream_is_lazy() {
        // No expectation: opening must not touch the client until polled.
        let fs = fs_with(MockStorageClient::new());
        let _stream = fs.create_read_stream("a.bin", ReadOptions::default());
    }

    #[tokio::test]
    async fn test_read_stream_forwards_range() {
        let mut mock = MockStorageClient::new();
        mock.expect_open_read()
            .withf(|key: &str, options: &ReadOptions| {
                key == "a.bin" && *options == ReadOptions::range(0, 3)
            })
            .returning(|_, _| {
                Ok(stream::iter(vec![Ok(Bytes::from_static(b"abcd"))]).boxed())
            });
        let fs = fs_with(mock);

        let chunks: Vec<Bytes> = fs
            .create_read_stream("a.bin", ReadOptions::range(0, 3))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks, vec![Bytes::from_static(b"abcd")]);
    }

    #[tokio::test]
    async fn test_read_file_to_string_decodes_lossily() {
        let mut mock = MockStorageClient::new();
        mock.expect_download()
            .returning(|_| Ok(Bytes::from_static(b"caf\xc3\xa9 \xff")));
        let fs = fs_with(mock);
        assert_eq!(fs.read_file_to_string("a.txt").await.unwrap(), "café \u{fffd}");
    }

    #[tokio::test]
    async fn test_unlink_propagates_not_found() {
        let mut mock = MockStorageClient::new();
        mock.expect_delete()
            .returning(|key| Err(Error::NotFound(key.to_string())));
        let fs = fs_with(mock);
        assert!(fs.unlink("gone.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_empty_path_rejected_before_client_call() {
        let fs = fs_with(MockStorageClient::new());
        assert!(matches!(fs.read_file("").await, Err(Error::InvalidPath(_))));
        assert!(matches!(fs.unlink("").await, Err(Error::InvalidPath(_))));
        assert!(matches!(fs.exists("").await, Err(Error::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_write_stream_to_file_finishes_after_all_chunks() {
        let log = Arc::new(Mutex::new(WriterLog::default()));
        let fs = fs_with(recording_client(&log, false));

        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ])
        .boxed();
        fs.write_stream_to_file("up/a.bin", source, WriteOptions::default())
            .await
            .unwrap();

        let log = log.lock();
        assert_eq!(log.chunks, vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")]);
        assert!(log.finished);
        assert!(!log.aborted);
    }

    #[tokio::test]
    async fn test_write_stream_to_file_source_error_aborts() {
        let log = Arc::new(Mutex::new(WriterLog::default()));
        let fs = fs_with(recording_client(&log, false));

        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(Error::General("source closed".into())),
            Ok(Bytes::from_static(b"never")),
        ])
        .boxed();
        let err = fs
            .write_stream_to_file("up/a.bin", source, WriteOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "source closed");
        let log = log.lock();
        assert_eq!(log.chunks.len(), 1);
        assert!(log.aborted);
        assert!(!log.finished);
    }

    #[tokio::test]
    async fn test_write_stream_to_file_destination_error_fails() {
        let log = Arc::new(Mutex::new(WriterLog::default()));
        let fs = fs_with(recording_client(&log, true));

        let source = stream::iter(vec![Ok(Bytes::from_static(b"ab"))]).boxed();
        let result = fs
            .write_stream_to_file("up/a.bin", source, WriteOptions::default())
            .await;

        assert!(matches!(result, Err(Error::Network(_))));
        assert!(!log.lock().finished);
    }

    #[test]
    fn test_create_url_uses_configured_base() {
        let settings = FilesystemSettings {
            download_base_url: "http://localhost:9199/v0/b".to_string(),
            ..Default::default()
        };
        let fs = ObjectFilesystem::with_settings(Arc::new(MockStorageClient::new()), settings);

        assert_eq!(
            fs.create_url("media", "a b/c.mp4", "tok"),
            "http://localhost:9199/v0/b/media/o/a%20b%2Fc.mp4?alt=media&token=tok"
        );

        let generated = fs.generate_token_and_url("media", "a.mp4");
        assert_eq!(
            generated.url,
            fs.create_url("media", "a.mp4", &generated.token)
        );
    }

    #[test]
    fn test_truncate_to_date() {
        assert_eq!(
            truncate_to_date(ts("2024-02-29T23:59:59.999Z")).unwrap(),
            ts("2024-02-29T00:00:00Z")
        );
        assert_eq!(
            truncate_to_date(ts("2024-03-01T00:00:00Z")).unwrap(),
            ts("2024-03-01T00:00:00Z")
        );
    }
}
