//! ofs-s3: S3 storage client for online-fs
//!
//! This crate provides the implementation of the StorageClient trait
//! using the aws-sdk-s3 crate. It is the only crate that directly
//! depends on the AWS SDK.

pub mod client;
mod convert;
mod error;
pub mod multipart;
pub mod writer;

pub use client::{S3Storage, connect};
pub use multipart::MultipartConfig;
