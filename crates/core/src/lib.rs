//! ofs-core: filesystem semantics over flat-namespace object storage
//!
//! This crate provides the core of online-fs, including:
//! - The `StorageClient` trait every object-store backend implements
//! - The `ObjectFilesystem` adapter exposing the `OnlineFilesystem` operations
//! - The object metadata model and per-operation options
//! - Token-gated public download URLs
//! - Configuration and storage profile management
//! - An in-memory storage client
//!
//! This crate is independent of any specific cloud SDK, so the adapter can be
//! tested against mocks or `MemoryStorage` and pointed at any backend.

pub mod config;
pub mod error;
pub mod filesystem;
pub mod memory;
pub mod metadata;
pub mod options;
pub mod path;
pub mod profile;
pub mod token;
pub mod traits;

pub use config::{Config, ConfigManager, FilesystemSettings};
pub use error::{Error, Result};
pub use filesystem::ObjectFilesystem;
pub use memory::MemoryStorage;
pub use metadata::{DOWNLOAD_TOKENS_KEY, FileMetadata, MetadataValue, OBJECT_KIND, Stat};
pub use options::{ReadOptions, SignedUrlAction, SignedUrlOptions, SignedUrlRequest, WriteOptions};
pub use profile::{Profile, ProfileManager};
pub use token::{TokenUrl, create_url, generate_token_and_url};
pub use traits::{ByteStream, ObjectSummary, ObjectWriter, OnlineFilesystem, StorageClient};
