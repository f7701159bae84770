use crate::{
    error::{Error, Result},
    listing::list_directory,
    server::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub async fn list_buckets(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let mut buckets = state.gateway.list_buckets().await?;
    // Newest first.
    buckets.sort_by(|a, b| b.created.cmp(&a.created));

    Ok(Json(json!({
        "buckets": buckets,
        "connected": true,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BrowseParams {
    #[serde(default)]
    pub prefix: String,
}

pub async fn browse_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(params): Query<BrowseParams>,
) -> Result<impl IntoResponse> {
    let view = match list_directory(state.gateway.as_ref(), &bucket, &params.prefix).await {
        Ok(view) => view,
        Err(Error::NoSuchBucket) => {
            // Stale reference, not a defect: the bucket was deleted under us.
            // Callers redirect on this code instead of rendering an error.
            debug!(bucket = %bucket, "browse hit a deleted bucket");
            return Err(Error::NoSuchBucket);
        }
        Err(e) => return Err(e),
    };

    Ok(Json(json!({
        "bucketName": bucket,
        "currentPrefix": params.prefix,
        "totalSize": view.total_file_size(),
        "objectCount": view.items.len(),
        "directory": view,
    })))
}
