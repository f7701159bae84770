//! Deterministic in-memory gateway for exercising the core against scripted
//! listings, pagination, and injected failures.

use async_trait::async_trait;
use bucketview::error::{Error, Result};
use bucketview::gateway::{
    BucketSummary, ObjectPage, ObjectRecord, ObjectStoreGateway, SignedOp,
};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::io::AsyncRead;

type BucketMap = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

pub struct MemoryGateway {
    buckets: Mutex<BucketMap>,
    page_size: usize,
    fail_delete: Mutex<HashSet<String>>,
    fail_list_on_call: Mutex<Option<usize>>,
    calls: AtomicUsize,
    list_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryGateway {
    pub fn new(page_size: usize) -> Self {
        Self {
            buckets: Mutex::new(BTreeMap::new()),
            page_size,
            fail_delete: Mutex::new(HashSet::new()),
            fail_list_on_call: Mutex::new(None),
            calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default();
    }

    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
    }

    /// Make every delete of this key fail without removing it.
    pub fn fail_on_delete(&self, key: &str) {
        self.fail_delete.lock().unwrap().insert(key.to_string());
    }

    /// Make the nth listing call (1-based) fail, so mid-enumeration page
    /// fetch failures can be scripted.
    pub fn fail_on_list_call(&self, n: usize) {
        *self.fail_list_on_call.lock().unwrap() = Some(n);
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.len())
            .unwrap_or(0)
    }

    /// Total gateway calls of any kind so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Delete calls alone, failed ones included.
    pub fn delete_call_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn record(key: &str, data: &[u8]) -> ObjectRecord {
        ObjectRecord {
            key: key.to_string(),
            size: data.len() as u64,
            last_modified: None,
            etag: None,
        }
    }
}

#[async_trait]
impl ObjectStoreGateway for MemoryGateway {
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>> {
        self.record_call();
        Ok(self
            .buckets
            .lock()
            .unwrap()
            .keys()
            .map(|name| BucketSummary {
                name: name.clone(),
                created: None,
            })
            .collect())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: Option<usize>,
    ) -> Result<ObjectPage> {
        self.record_call();
        let list_call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_list_on_call.lock().unwrap() == Some(list_call) {
            return Err(Error::StoreUnavailable(
                "injected listing failure".to_string(),
            ));
        }
        let buckets = self.buckets.lock().unwrap();
        let objects = buckets.get(bucket).ok_or(Error::NoSuchBucket)?;

        let matched: Vec<(&String, &Vec<u8>)> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .collect();

        if let Some(delim) = delimiter {
            // Grouped listing: one level only, no pagination needed in tests.
            let mut grouped = BTreeSet::new();
            let mut direct = Vec::new();
            for (key, data) in matched {
                let rest = &key[prefix.len()..];
                match rest.find(delim) {
                    Some(idx) => {
                        grouped.insert(format!("{}{}{}", prefix, &rest[..idx], delim));
                    }
                    None => direct.push(Self::record(key, data)),
                }
            }
            return Ok(ObjectPage {
                objects: direct,
                common_prefixes: grouped.into_iter().collect(),
                next_token: None,
            });
        }

        let start: usize = continuation_token
            .map(|t| t.parse().expect("opaque token minted by this gateway"))
            .unwrap_or(0);
        let limit = max_keys.unwrap_or(self.page_size).min(self.page_size);
        let page: Vec<ObjectRecord> = matched
            .iter()
            .skip(start)
            .take(limit)
            .map(|(key, data)| Self::record(key, data))
            .collect();
        let consumed = start + page.len();
        let next_token = (consumed < matched.len()).then(|| consumed.to_string());

        Ok(ObjectPage {
            objects: page,
            common_prefixes: Vec::new(),
            next_token,
        })
    }

    async fn get_object_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        self.record_call();
        let buckets = self.buckets.lock().unwrap();
        let data = buckets
            .get(bucket)
            .ok_or(Error::NoSuchBucket)?
            .get(key)
            .cloned()
            .ok_or(Error::NoSuchKey)?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: Option<&str>,
    ) -> Result<()> {
        self.record_call();
        let mut buckets = self.buckets.lock().unwrap();
        buckets
            .get_mut(bucket)
            .ok_or(Error::NoSuchBucket)?
            .insert(key.to_string(), body.to_vec());
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.record_call();
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.lock().unwrap().contains(key) {
            return Err(Error::StoreUnavailable("injected delete failure".to_string()));
        }
        let mut buckets = self.buckets.lock().unwrap();
        // Deletes are idempotent, as in S3.
        buckets.get_mut(bucket).ok_or(Error::NoSuchBucket)?.remove(key);
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord> {
        self.record_call();
        let buckets = self.buckets.lock().unwrap();
        let data = buckets
            .get(bucket)
            .ok_or(Error::NoSuchBucket)?
            .get(key)
            .ok_or(Error::NoSuchKey)?;
        Ok(Self::record(key, data))
    }

    async fn presign(
        &self,
        op: SignedOp,
        bucket: &str,
        key: &str,
        ttl_secs: u32,
        _content_type: Option<&str>,
    ) -> Result<String> {
        self.record_call();
        let op = match op {
            SignedOp::Upload => "upload",
            SignedOp::Download => "download",
        };
        Ok(format!(
            "https://sign.invalid/{}/{}?op={}&ttl={}",
            bucket, key, op, ttl_secs
        ))
    }
}

/// Entry names from a finished zip, read off the central directory.
pub fn zip_entry_names(bytes: &[u8]) -> Vec<String> {
    const EOCD_LEN: usize = 22;
    assert!(bytes.len() >= EOCD_LEN, "zip shorter than its own trailer");

    let eocd = bytes.len() - EOCD_LEN;
    assert_eq!(&bytes[eocd..eocd + 4], b"PK\x05\x06", "missing end-of-central-directory");

    let entry_count = u16::from_le_bytes([bytes[eocd + 10], bytes[eocd + 11]]) as usize;
    let mut offset = u32::from_le_bytes([
        bytes[eocd + 16],
        bytes[eocd + 17],
        bytes[eocd + 18],
        bytes[eocd + 19],
    ]) as usize;

    let mut names = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        assert_eq!(&bytes[offset..offset + 4], b"PK\x01\x02", "bad central directory record");
        let name_len = u16::from_le_bytes([bytes[offset + 28], bytes[offset + 29]]) as usize;
        let extra_len = u16::from_le_bytes([bytes[offset + 30], bytes[offset + 31]]) as usize;
        let comment_len = u16::from_le_bytes([bytes[offset + 32], bytes[offset + 33]]) as usize;
        let name = &bytes[offset + 46..offset + 46 + name_len];
        names.push(String::from_utf8(name.to_vec()).expect("entry name is UTF-8"));
        offset += 46 + name_len + extra_len + comment_len;
    }
    names
}
