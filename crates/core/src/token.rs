//! Token-gated public download URLs
//!
//! An alternative to provider-signed URLs: the object's metadata carries a
//! random token and anyone presenting it in the URL may download the object.
//! Generation is pure; persisting the token is up to the caller (see
//! [`FileMetadata::with_download_token`](crate::FileMetadata::with_download_token)).

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default base for public download URLs
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://firebasestorage.googleapis.com/v0/b";

/// Characters left as-is by JavaScript's `encodeURIComponent`
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A generated token and the URL it unlocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUrl {
    pub token: String,
    pub url: String,
}

/// Percent-encode a key as a single URL component (`/` included)
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Build the public download URL for `path` under [`DEFAULT_DOWNLOAD_BASE_URL`]
pub fn create_url(bucket: &str, path: &str, token: &str) -> String {
    create_url_with_base(DEFAULT_DOWNLOAD_BASE_URL, bucket, path, token)
}

/// Build the public download URL for `path` under a custom base
pub fn create_url_with_base(base: &str, bucket: &str, path: &str, token: &str) -> String {
    format!(
        "{}/{bucket}/o/{}?alt=media&token={token}",
        base.trim_end_matches('/'),
        encode_component(path)
    )
}

/// Generate a random download token (UUID v4, 122 random bits)
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a fresh token and its public URL under [`DEFAULT_DOWNLOAD_BASE_URL`]
pub fn generate_token_and_url(bucket: &str, path: &str) -> TokenUrl {
    generate_token_and_url_with_base(DEFAULT_DOWNLOAD_BASE_URL, bucket, path)
}

/// Generate a fresh token and its public URL under a custom base
pub fn generate_token_and_url_with_base(base: &str, bucket: &str, path: &str) -> TokenUrl {
    let token = generate_token();
    let url = create_url_with_base(base, bucket, path, &token);
    TokenUrl { token, url }
}
