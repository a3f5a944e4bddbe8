//! Path handling for flat object keys
//!
//! Object stores have no directories. A "directory" here is a key prefix that
//! ends with `/`, and listing it means querying every key that starts with it.

use crate::error::{Error, Result};

/// Separator used by convention between key segments
pub const SEPARATOR: char = '/';

/// Reject paths that cannot name an object
pub fn validate_key(path: &str) -> Result<&str> {
    if path.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".into()));
    }
    Ok(path)
}

/// Normalize a directory path into a listing prefix
///
/// The bucket root (the empty path or separators only) maps to the empty
/// prefix. Any other path gets a trailing separator appended if it lacks one.
pub fn dir_prefix(path: &str) -> String {
    if path.chars().all(|c| c == SEPARATOR) {
        String::new()
    } else if path.ends_with(SEPARATOR) {
        path.to_string()
    } else {
        format!("{path}{SEPARATOR}")
    }
}

/// Name of `key` relative to `prefix`
///
/// Returns `None` when the key is outside the prefix or equals the prefix
/// itself (a literal placeholder object for the "directory").
pub fn relative_name<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix).filter(|name| !name.is_empty())
}
