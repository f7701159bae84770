use crate::{
    bulk::{BulkDeleteCoordinator, BulkRequest},
    error::{Error, Result},
    server::AppState,
};
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub async fn delete_mixed(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkRequest>,
) -> Result<impl IntoResponse> {
    let coordinator =
        BulkDeleteCoordinator::new(state.gateway.as_ref(), state.config.limits.bulk_item_cap);
    let outcome = coordinator.delete_many(&request).await?;

    if !outcome.fully_successful() {
        return Err(Error::PartialFailure {
            failed: outcome.failed_keys,
        });
    }

    info!(
        bucket = %request.bucket_name,
        deleted = outcome.succeeded_keys.len(),
        "bulk delete complete"
    );

    Ok(Json(json!({
        "success": true,
        "deletedCount": outcome.succeeded_keys.len(),
        "fileCount": request.file_keys.len(),
        "folderCount": request.folder_prefixes.len(),
    })))
}
