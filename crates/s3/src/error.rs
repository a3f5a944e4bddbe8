//! Translation of SDK failures into ofs-core errors

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use ofs_core::Error;

/// Coarse classification of a failed S3 call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    NotFound,
    MissingBucket,
    InvalidArgument,
    Transport,
}

fn classify(code: Option<&str>, status: Option<u16>) -> Kind {
    match code {
        Some("NoSuchKey" | "NotFound") => Kind::NotFound,
        Some("NoSuchBucket") => Kind::MissingBucket,
        Some(
            "InvalidArgument" | "InvalidRequest" | "KeyTooLongError" | "InvalidRange"
            | "EntityTooSmall" | "EntityTooLarge",
        ) => Kind::InvalidArgument,
        // HEAD responses carry no body, so a 404 arrives without an error code.
        _ if status == Some(404) => Kind::NotFound,
        _ => Kind::Transport,
    }
}

/// Map an SDK error for `key` onto the ofs error kinds
pub(crate) fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, key: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    match classify(err.code(), status) {
        Kind::NotFound => Error::NotFound(key.to_string()),
        Kind::MissingBucket => {
            Error::InvalidArgument(format!("bucket does not exist while accessing {key}"))
        }
        Kind::InvalidArgument => Error::InvalidArgument(format!(
            "{key}: {}",
            err.message().unwrap_or("rejected by storage service")
        )),
        Kind::Transport => Error::Network(DisplayErrorContext(&err).to_string()),
    }
}
