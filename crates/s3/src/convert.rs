//! Conversions between S3 responses and ofs-core records

use std::collections::{BTreeMap, HashMap};

use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::primitives::DateTime;
use aws_sdk_s3::types::Object;
use jiff::Timestamp;
use ofs_core::{DOWNLOAD_TOKENS_KEY, FileMetadata, MetadataValue, OBJECT_KIND, ObjectSummary};

fn timestamp(value: &DateTime) -> Option<Timestamp> {
    Timestamp::from_second(value.secs()).ok()
}

/// S3 lowercases user metadata keys; restore the casing of well-known ones.
fn metadata_key(key: &str) -> String {
    if key.eq_ignore_ascii_case(DOWNLOAD_TOKENS_KEY) {
        DOWNLOAD_TOKENS_KEY.to_string()
    } else {
        key.to_string()
    }
}

/// Build the metadata record for `key` from a HeadObject response
pub(crate) fn metadata_from_head(bucket: &str, key: &str, head: &HeadObjectOutput) -> FileMetadata {
    let updated = head.last_modified().and_then(timestamp);
    let metadata = head
        .metadata()
        .map(|user| {
            user.iter()
                .map(|(k, v)| (metadata_key(k), MetadataValue::from(v.as_str())))
                .collect()
        })
        .unwrap_or_default();

    FileMetadata {
        kind: Some(OBJECT_KIND.to_string()),
        id: Some(format!("{bucket}/{key}")),
        name: Some(key.to_string()),
        content_type: head.content_type().map(str::to_string),
        size: head.content_length().map(|n| n.to_string()),
        // Objects are immutable, so the last write is also the creation time.
        time_created: updated,
        updated,
        cache_control: head.cache_control().map(str::to_string),
        content_disposition: head.content_disposition().map(str::to_string),
        content_encoding: head.content_encoding().map(str::to_string),
        content_language: head.content_language().map(str::to_string),
        metadata,
    }
}

/// User metadata headers for a write, `None` when there is nothing to send
pub(crate) fn user_metadata(
    metadata: &BTreeMap<String, MetadataValue>,
) -> Option<HashMap<String, String>> {
    if metadata.is_empty() {
        return None;
    }
    Some(
        metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect(),
    )
}

pub(crate) fn summary_from_object(object: &Object) -> Option<ObjectSummary> {
    let key = object.key()?;
    Some(ObjectSummary {
        key: key.to_string(),
        size: object.size().and_then(|s| u64::try_from(s).ok()),
        updated: object.last_modified().and_then(timestamp),
    })
}
