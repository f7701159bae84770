//! Bulk delete coordination over explicit keys and folder prefixes.

use crate::enumerate::{Exclusion, RecursiveEnumerator};
use crate::error::{Error, Result};
use crate::gateway::ObjectStoreGateway;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A mixed selection of explicit keys and whole folder prefixes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    pub bucket_name: String,
    #[serde(default)]
    pub file_keys: Vec<String>,
    #[serde(default)]
    pub folder_prefixes: Vec<String>,
}

impl BulkRequest {
    pub fn item_count(&self) -> usize {
        self.file_keys.len() + self.folder_prefixes.len()
    }

    /// Enforced before any gateway call.
    pub fn validate(&self, cap: usize) -> Result<()> {
        if self.item_count() == 0 {
            return Err(Error::InvalidRequest(
                "at least one file key or folder prefix is required".to_string(),
            ));
        }
        if self.item_count() > cap {
            return Err(Error::InvalidRequest(format!(
                "at most {} items may be selected per request",
                cap
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub succeeded_keys: Vec<String>,
    pub failed_keys: Vec<String>,
}

impl BulkOutcome {
    pub fn fully_successful(&self) -> bool {
        self.failed_keys.is_empty()
    }
}

pub struct BulkDeleteCoordinator<'a> {
    gateway: &'a dyn ObjectStoreGateway,
    item_cap: usize,
}

impl<'a> BulkDeleteCoordinator<'a> {
    pub fn new(gateway: &'a dyn ObjectStoreGateway, item_cap: usize) -> Self {
        Self { gateway, item_cap }
    }

    /// Resolve the full key set, then delete each key individually. A single
    /// failed delete is recorded and the loop continues; deleting a folder
    /// removes everything under it, placeholder markers included.
    ///
    /// Per-key deletes rather than one batch call: some S3-compatible
    /// backends reject batch-delete payload forms, and per-key results give
    /// exact failure attribution.
    pub async fn delete_many(&self, request: &BulkRequest) -> Result<BulkOutcome> {
        request.validate(self.item_cap)?;

        let keys = self.resolve_keys(request).await?;
        if keys.is_empty() {
            return Err(Error::EmptySelection);
        }

        debug!(
            bucket = %request.bucket_name,
            keys = keys.len(),
            "starting bulk delete"
        );

        let mut outcome = BulkOutcome::default();
        for key in keys {
            match self.gateway.delete_object(&request.bucket_name, &key).await {
                Ok(()) => outcome.succeeded_keys.push(key),
                Err(e) => {
                    warn!(bucket = %request.bucket_name, key = %key, error = %e, "delete failed");
                    outcome.failed_keys.push(key);
                }
            }
        }

        Ok(outcome)
    }

    /// Explicit keys plus every key under each folder prefix, deduplicated
    /// in first-seen order. The whole set is resolved before the first
    /// destructive call.
    async fn resolve_keys(&self, request: &BulkRequest) -> Result<Vec<String>> {
        let enumerator = RecursiveEnumerator::new(self.gateway);
        let mut keys = request.file_keys.clone();

        for prefix in &request.folder_prefixes {
            keys.extend(
                enumerator
                    .collect_keys(&request.bucket_name, prefix, Exclusion::None)
                    .await?,
            );
        }

        let mut seen = HashSet::new();
        keys.retain(|key| seen.insert(key.clone()));
        Ok(keys)
    }
}
