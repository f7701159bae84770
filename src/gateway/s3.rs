//! S3-compatible gateway over plain HTTP with AWS Signature Version 4.
//!
//! Talks to AWS S3, MinIO, and other S3-compatible stores without pulling in
//! the full AWS SDK. Error responses are decoded structurally from the S3
//! error XML so that "bucket gone" and "key gone" surface as distinct
//! variants instead of message strings.

use super::{BucketSummary, ObjectPage, ObjectRecord, ObjectStoreGateway, SignedOp};
use crate::{
    config::StoreConfig,
    error::{Error, Result},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub struct S3Gateway {
    config: StoreConfig,
    client: Client,
}

impl S3Gateway {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        self.config.endpoint.trim_end_matches('/').to_string()
    }

    /// URL of the service root (bucket listing).
    fn service_url(&self) -> String {
        format!("{}/", self.endpoint())
    }

    fn build_url(&self, bucket: &str, key: &str) -> String {
        let endpoint = self.endpoint();
        let key = key.trim_start_matches('/');

        if self.config.path_style {
            // Path-style: https://endpoint/bucket/key
            if key.is_empty() {
                format!("{}/{}", endpoint, bucket)
            } else {
                format!("{}/{}/{}", endpoint, bucket, key)
            }
        } else {
            // Virtual-hosted style: https://bucket.endpoint/key
            let endpoint_without_scheme = endpoint
                .replace("https://", "")
                .replace("http://", "");
            let scheme = if endpoint.starts_with("http://") {
                "http"
            } else {
                "https"
            };

            if key.is_empty() {
                format!("{}://{}.{}", scheme, bucket, endpoint_without_scheme)
            } else {
                format!("{}://{}.{}/{}", scheme, bucket, endpoint_without_scheme, key)
            }
        }
    }

    /// Canonical query string: URI-encoded pairs sorted by name, as SigV4
    /// requires. The same string goes into the request URL so the signature
    /// always matches what is sent.
    fn canonical_query(params: &[(&str, &str)]) -> String {
        let mut encoded: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| {
                (
                    urlencoding::encode(k).into_owned(),
                    urlencoding::encode(v).into_owned(),
                )
            })
            .collect();
        encoded.sort();
        encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn sign_request(
        &self,
        method: &str,
        url: &str,
        headers: &mut HashMap<String, String>,
        payload_hash: &str,
    ) -> Result<String> {
        let now: DateTime<Utc> = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        headers.insert("x-amz-date".to_string(), amz_date.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.to_string());

        let parsed = url::Url::parse(url)
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;
        let host = host_header(&parsed);
        let path = parsed.path().to_string();
        let query = parsed.query().unwrap_or("").to_string();

        headers.insert("host".to_string(), host);

        let mut signed_headers: Vec<&str> = headers.keys().map(|s| s.as_str()).collect();
        signed_headers.sort();
        let signed_headers_str = signed_headers.join(";");

        let mut canonical_headers = String::new();
        for header in &signed_headers {
            if let Some(value) = headers.get(*header) {
                canonical_headers.push_str(&format!("{}:{}\n", header.to_lowercase(), value.trim()));
            }
        }

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, query, canonical_headers, signed_headers_str, payload_hash
        );
        let canonical_request_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date, credential_scope, canonical_request_hash
        );

        let signing_key = self.signing_key(&date_stamp);
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        Ok(format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.config.access_key_id, credential_scope, signed_headers_str, signature
        ))
    }

    fn signing_key(&self, date_stamp: &str) -> Vec<u8> {
        let secret = format!("AWS4{}", self.config.secret_access_key);
        let mut key = hmac_sha256(secret.as_bytes(), date_stamp.as_bytes());
        key = hmac_sha256(&key, self.config.region.as_bytes());
        key = hmac_sha256(&key, b"s3");
        key = hmac_sha256(&key, b"aws4_request");
        key
    }

    async fn s3_request(
        &self,
        method: Method,
        url: String,
        query_params: Option<&[(&str, &str)]>,
        body: Option<Bytes>,
        extra_headers: Option<&[(&str, &str)]>,
    ) -> Result<Response> {
        let mut url = url;
        if let Some(params) = query_params {
            let query = Self::canonical_query(params);
            if !query.is_empty() {
                url = format!("{}?{}", url, query);
            }
        }

        let payload = body.as_deref().unwrap_or(&[]);
        let payload_hash = hex::encode(Sha256::digest(payload));

        let mut headers = HashMap::new();
        if let Some(extra) = extra_headers {
            for (k, v) in extra {
                headers.insert(k.to_string(), v.to_string());
            }
        }
        let authorization = self.sign_request(method.as_str(), &url, &mut headers, &payload_hash)?;

        let mut request = self.client.request(method, &url);
        for (key, value) in headers {
            request = request.header(&key, &value);
        }
        request = request.header("Authorization", authorization);

        if let Some(body_data) = body {
            request = request.body(body_data);
        }

        request
            .send()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))
    }

    /// Map a non-success response to a structured error by decoding the S3
    /// error XML code. 404s without a parseable body fall back on whether a
    /// key was involved.
    async fn decode_error(response: Response, key: Option<&str>) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(err) = serde_xml_rs::from_str::<ErrorResponse>(&body) {
            return match err.code.as_str() {
                "NoSuchBucket" => Error::NoSuchBucket,
                "NoSuchKey" | "NoSuchObject" | "NotFound" => Error::NoSuchKey,
                code => Error::StoreUnavailable(format!("{} ({})", err.message, code)),
            };
        }

        if status == StatusCode::NOT_FOUND {
            return match key {
                Some(_) => Error::NoSuchKey,
                None => Error::NoSuchBucket,
            };
        }

        Error::StoreUnavailable(format!("unexpected status {}: {}", status, body))
    }
}

#[async_trait]
impl ObjectStoreGateway for S3Gateway {
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>> {
        let response = self
            .s3_request(Method::GET, self.service_url(), None, None, None)
            .await?;

        if !response.status().is_success() {
            return Err(Self::decode_error(response, None).await);
        }

        let xml = response
            .text()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let parsed: ListAllMyBucketsResult = serde_xml_rs::from_str(&xml)
            .map_err(|e| Error::StoreUnavailable(format!("bad bucket list XML: {}", e)))?;

        Ok(parsed
            .buckets
            .bucket
            .into_iter()
            .map(|b| BucketSummary {
                name: b.name,
                created: b.creation_date,
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
        let max_keys_str;
        let mut params: Vec<(&str, &str)> = vec![("list-type", "2")];
        if !prefix.is_empty() {
            params.push(("prefix", prefix));
        }
        if let Some(d) = delimiter {
            params.push(("delimiter", d));
        }
        if let Some(token) = continuation_token {
            params.push(("continuation-token", token));
        }
        if let Some(n) = max_keys {
            max_keys_str = n.to_string();
            params.push(("max-keys", &max_keys_str));
        }

        let response = self
            .s3_request(
                Method::GET,
                self.build_url(bucket, ""),
                Some(&params),
                None,
                None,
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::decode_error(response, None).await);
        }

        let xml = response
            .text()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        let parsed: ListBucketResult = serde_xml_rs::from_str(&xml)
            .map_err(|e| Error::StoreUnavailable(format!("bad listing XML: {}", e)))?;

        debug!(
            bucket,
            prefix,
            objects = parsed.contents.len(),
            prefixes = parsed.common_prefixes.len(),
            truncated = parsed.is_truncated,
            "listed one page"
        );

        Ok(ObjectPage {
            objects: parsed
                .contents
                .into_iter()
                .map(|c| ObjectRecord {
                    key: c.key,
                    size: c.size,
                    last_modified: c.last_modified,
                    etag: c.etag.map(|e| e.trim_matches('"').to_string()),
                })
                .collect(),
            common_prefixes: parsed.common_prefixes.into_iter().map(|p| p.prefix).collect(),
            next_token: parsed.next_continuation_token,
        })
    }

    async fn get_object_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let response = self
            .s3_request(Method::GET, self.build_url(bucket, key), None, None, None)
            .await?;

        if !response.status().is_success() {
            return Err(Self::decode_error(response, Some(key)).await);
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(stream)))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<()> {
        let extra: Vec<(&str, &str)> = content_type
            .map(|ct| vec![("content-type", ct)])
            .unwrap_or_default();

        let response = self
            .s3_request(
                Method::PUT,
                self.build_url(bucket, key),
                None,
                Some(body),
                Some(&extra),
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::decode_error(response, Some(key)).await);
        }
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let response = self
            .s3_request(Method::DELETE, self.build_url(bucket, key), None, None, None)
            .await?;

        // S3 deletes are idempotent; 204 and 404-on-body-less both count.
        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::ACCEPTED => Ok(()),
            _ => Err(Self::decode_error(response, Some(key)).await),
        }
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord> {
        let response = self
            .s3_request(Method::HEAD, self.build_url(bucket, key), None, None, None)
            .await?;

        if !response.status().is_success() {
            // HEAD responses carry no body to decode.
            return match response.status() {
                StatusCode::NOT_FOUND => Err(Error::NoSuchKey),
                status => Err(Error::StoreUnavailable(format!(
                    "HEAD failed with status {}",
                    status
                ))),
            };
        }

        let size = response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let last_modified = response
            .headers()
            .get("last-modified")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim_matches('"').to_string());

        Ok(ObjectRecord {
            key: key.to_string(),
            size,
            last_modified,
            etag,
        })
    }

    async fn presign(
        &self,
        op: SignedOp,
        bucket: &str,
        key: &str,
        ttl_secs: u32,
        content_type: Option<&str>,
    ) -> Result<String> {
        let method = match op {
            SignedOp::Upload => "PUT",
            SignedOp::Download => "GET",
        };

        let now: DateTime<Utc> = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let credential = format!("{}/{}", self.config.access_key_id, credential_scope);

        let url = self.build_url(bucket, key);
        let parsed = url::Url::parse(&url)
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;
        let host = host_header(&parsed);
        let path_part = parsed.path();

        // Content type is signed as a header for uploads only.
        let (signed_headers, canonical_headers) = match (op, content_type) {
            (SignedOp::Upload, Some(ct)) => (
                "content-type;host".to_string(),
                format!("content-type:{}\nhost:{}\n", ct, host),
            ),
            _ => ("host".to_string(), format!("host:{}\n", host)),
        };

        let query_params = format!(
            "X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Credential={}&X-Amz-Date={}&X-Amz-Expires={}&X-Amz-SignedHeaders={}",
            urlencoding::encode(&credential),
            amz_date,
            ttl_secs,
            urlencoding::encode(&signed_headers),
        );

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\nUNSIGNED-PAYLOAD",
            method, path_part, query_params, canonical_headers, signed_headers
        );
        let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date, credential_scope, canonical_hash
        );

        let signing_key = self.signing_key(&date_stamp);
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        Ok(format!("{}?{}&X-Amz-Signature={}", url, query_params, signature))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Host header value, with the port kept for non-default ports.
fn host_header(url: &url::Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<Contents>,
    #[serde(default)]
    common_prefixes: Vec<CommonPrefix>,
    next_continuation_token: Option<String>,
    #[serde(default)]
    is_truncated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Contents {
    key: String,
    #[serde(default)]
    size: u64,
    last_modified: Option<DateTime<Utc>>,
    #[serde(rename = "ETag")]
    etag: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommonPrefix {
    prefix: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAllMyBucketsResult {
    buckets: Buckets,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Buckets {
    #[serde(default)]
    bucket: Vec<BucketEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketEntry {
    name: String,
    creation_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    code: String,
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(path_style: bool) -> StoreConfig {
        StoreConfig {
            endpoint: "http://localhost:9000".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            path_style,
            request_timeout_secs: 60,
        }
    }

    #[test]
    fn build_url_path_style() {
        let gateway = S3Gateway::new(&test_config(true)).unwrap();
        assert_eq!(
            gateway.build_url("test-bucket", "path/to/file.txt"),
            "http://localhost:9000/test-bucket/path/to/file.txt"
        );
    }

    #[test]
    fn build_url_virtual_hosted() {
        let gateway = S3Gateway::new(&test_config(false)).unwrap();
        assert_eq!(
            gateway.build_url("my-bucket", "path/to/file.txt"),
            "http://my-bucket.localhost:9000/path/to/file.txt"
        );
    }

    #[test]
    fn canonical_query_is_sorted_and_encoded() {
        let q = S3Gateway::canonical_query(&[
            ("prefix", "img/sub folder/"),
            ("list-type", "2"),
            ("delimiter", "/"),
        ]);
        assert_eq!(q, "delimiter=%2F&list-type=2&prefix=img%2Fsub%20folder%2F");
    }

    #[tokio::test]
    async fn presign_download_echoes_expiry() {
        let gateway = S3Gateway::new(&test_config(true)).unwrap();
        let url = gateway
            .presign(SignedOp::Download, "docs", "a.txt", 120, None)
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/docs/a.txt?"));
        assert!(url.contains("X-Amz-Expires=120"));
        assert!(url.contains("X-Amz-SignedHeaders=host"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn presign_upload_signs_content_type() {
        let gateway = S3Gateway::new(&test_config(true)).unwrap();
        let url = gateway
            .presign(SignedOp::Upload, "docs", "a.txt", 300, Some("image/png"))
            .await
            .unwrap();

        assert!(url.contains("X-Amz-SignedHeaders=content-type%3Bhost"));
    }

    #[test]
    fn listing_xml_decodes_structurally() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <Name>docs</Name>
  <Prefix></Prefix>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>abc123</NextContinuationToken>
  <Contents>
    <Key>a.txt</Key>
    <LastModified>2026-01-05T08:30:00.000Z</LastModified>
    <ETag>"9a0364b9e99bb480dd25e1f0284c8555"</ETag>
    <Size>42</Size>
  </Contents>
  <CommonPrefixes>
    <Prefix>img/</Prefix>
  </CommonPrefixes>
</ListBucketResult>"#;

        let parsed: ListBucketResult = serde_xml_rs::from_str(xml).unwrap();
        assert_eq!(parsed.contents.len(), 1);
        assert_eq!(parsed.contents[0].key, "a.txt");
        assert_eq!(parsed.contents[0].size, 42);
        assert_eq!(parsed.common_prefixes[0].prefix, "img/");
        assert_eq!(parsed.next_continuation_token.as_deref(), Some("abc123"));
        assert!(parsed.is_truncated);
    }

    #[test]
    fn error_xml_maps_to_variants() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchBucket</Code><Message>The specified bucket does not exist</Message></Error>"#;
        let parsed: ErrorResponse = serde_xml_rs::from_str(xml).unwrap();
        assert_eq!(parsed.code, "NoSuchBucket");
    }
}
