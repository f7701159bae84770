use crate::{
    enumerate::{Exclusion, RecursiveEnumerator},
    error::Result,
    folders::{create_folder, CreateFolderRequest},
    server::AppState,
};
use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateFolderRequest>,
) -> Result<impl IntoResponse> {
    let created = create_folder(state.gateway.as_ref(), &request).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("folder \"{}\" created", created.folder_name),
        "folderName": created.folder_name,
        "folderPrefix": created.folder_prefix,
        "placeholderKey": created.placeholder_key,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFilesRequest {
    pub bucket_name: String,
    pub folder_prefix: String,
}

/// Flat preview of what a folder-scoped bulk action will affect.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FolderFilesRequest>,
) -> Result<impl IntoResponse> {
    let enumerator = RecursiveEnumerator::new(state.gateway.as_ref());
    let files = enumerator
        .collect_keys(
            &request.bucket_name,
            &request.folder_prefix,
            Exclusion::PlaceholderMarkers,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "totalFiles": files.len(),
        "files": files,
    })))
}
