//! Error types for ofs-core
//!
//! Storage clients translate their backend failures into this enum, and the
//! filesystem adapter hands them back to callers unchanged.

use thiserror::Error;

/// Result type alias for ofs-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ofs-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path rejected before reaching the storage client
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Storage client rejected a path or option
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Profile not found
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport or storage service failure
    #[error("Network error: {0}")]
    Network(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Whether this error reports a missing object
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
