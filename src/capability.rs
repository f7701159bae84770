//! Time-limited capability URLs for direct client upload and download.

use crate::error::{Error, Result};
use crate::gateway::{ObjectStoreGateway, SignedOp};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TTL_SECS: u32 = 300;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRequest {
    pub operation: SignedOp,
    pub bucket_name: String,
    pub key: String,
    pub content_type: Option<String>,
    pub expires_in: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCapability {
    pub url: String,
    pub operation: SignedOp,
    pub bucket_name: String,
    pub key: String,
    pub expires_in: u32,
}

pub struct CapabilityUrlIssuer<'a> {
    gateway: &'a dyn ObjectStoreGateway,
    default_ttl_secs: u32,
}

impl<'a> CapabilityUrlIssuer<'a> {
    pub fn new(gateway: &'a dyn ObjectStoreGateway, default_ttl_secs: u32) -> Self {
        Self {
            gateway,
            default_ttl_secs,
        }
    }

    /// Each call issues a fresh capability; nothing is cached and expiry is
    /// enforced by the store once the URL is out.
    pub async fn issue(&self, request: &CapabilityRequest) -> Result<IssuedCapability> {
        if request.key.is_empty() {
            return Err(Error::InvalidRequest("object key is required".to_string()));
        }
        if request.operation == SignedOp::Upload && request.content_type.is_none() {
            return Err(Error::InvalidRequest(
                "uploads require a content type".to_string(),
            ));
        }

        let expires_in = request.expires_in.unwrap_or(self.default_ttl_secs);
        let url = self
            .gateway
            .presign(
                request.operation,
                &request.bucket_name,
                &request.key,
                expires_in,
                request.content_type.as_deref(),
            )
            .await?;

        Ok(IssuedCapability {
            url,
            operation: request.operation,
            bucket_name: request.bucket_name.clone(),
            key: request.key.clone(),
            expires_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_rejects_unknown_values_at_the_boundary() {
        let parsed: std::result::Result<CapabilityRequest, _> = serde_json::from_str(
            r#"{"operation":"append","bucketName":"docs","key":"a.txt"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn operation_parses_closed_set() {
        let parsed: CapabilityRequest = serde_json::from_str(
            r#"{"operation":"download","bucketName":"docs","key":"a.txt","expiresIn":120}"#,
        )
        .unwrap();
        assert_eq!(parsed.operation, SignedOp::Download);
        assert_eq!(parsed.expires_in, Some(120));
    }
}
