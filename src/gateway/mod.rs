pub mod s3;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

pub use s3::S3Gateway;

/// Key/folder separator used throughout the synthetic hierarchy.
pub const DELIMITER: char = '/';

/// Snapshot of one stored object at listing time. Never mutated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// Final path segment of a key.
pub fn base_name(key: &str) -> &str {
    key.rsplit(DELIMITER).next().unwrap_or(key)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSummary {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

/// One page of a listing call. `next_token` absent means the listing is
/// exhausted.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectRecord>,
    pub common_prefixes: Vec<String>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignedOp {
    Upload,
    Download,
}

/// Raw primitives of the backing object store. Everything above this trait
/// derives hierarchy and bulk behavior from these calls; everything below it
/// (the actual store) is an external system.
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>>;

    /// Delimiter-grouped or flat listing under a prefix, one page at a time.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: Option<usize>,
    ) -> Result<ObjectPage>;

    async fn get_object_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord>;

    /// Issue a time-limited signed URL for one operation on one object.
    /// Expiry is enforced by the store, not by this process.
    async fn presign(
        &self,
        op: SignedOp,
        bucket: &str,
        key: &str,
        ttl_secs: u32,
        content_type: Option<&str>,
    ) -> Result<String>;
}
