use crate::{
    archive::{entries_for_keys, resolve_entries, ArchiveEntry, ArchiveStreamAssembler, EntryNaming},
    bulk::BulkRequest,
    error::{Error, Result},
    gateway::base_name,
    server::AppState,
};
use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatDownloadRequest {
    pub bucket_name: String,
    #[serde(default)]
    pub object_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDownloadRequest {
    pub bucket_name: String,
    pub folder_prefix: String,
}

/// Flat multi-object download: entry names are base names only.
pub async fn download_zip(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FlatDownloadRequest>,
) -> Result<Response> {
    if request.object_keys.is_empty() {
        return Err(Error::InvalidRequest(
            "at least one object key is required".to_string(),
        ));
    }
    if request.object_keys.len() > state.config.limits.flat_key_cap {
        return Err(Error::InvalidRequest(format!(
            "at most {} objects may be downloaded per request",
            state.config.limits.flat_key_cap
        )));
    }

    let entries = entries_for_keys(&request.object_keys, EntryNaming::BaseName);
    let filename = format!("{}-files.zip", request.bucket_name);
    Ok(stream_archive(&state, request.bucket_name, entries, &filename))
}

/// Mixed download: explicit files keep base names, folder contents keep
/// their full paths inside the archive.
pub async fn download_mixed(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkRequest>,
) -> Result<Response> {
    request.validate(state.config.limits.bulk_item_cap)?;

    let entries = resolve_entries(
        state.gateway.as_ref(),
        &request.bucket_name,
        &request.file_keys,
        &request.folder_prefixes,
    )
    .await?;
    if entries.is_empty() {
        return Err(Error::EmptySelection);
    }

    let filename = format!("{}-mixed.zip", request.bucket_name);
    Ok(stream_archive(&state, request.bucket_name, entries, &filename))
}

/// Whole-folder download preserving the hierarchy, folder itself included.
pub async fn download_folder(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FolderDownloadRequest>,
) -> Result<Response> {
    if request.folder_prefix.is_empty() {
        return Err(Error::InvalidRequest(
            "a folder prefix is required".to_string(),
        ));
    }

    let entries = resolve_entries(
        state.gateway.as_ref(),
        &request.bucket_name,
        &[],
        std::slice::from_ref(&request.folder_prefix),
    )
    .await?;
    if entries.is_empty() {
        return Err(Error::EmptySelection);
    }

    let folder_name = base_name(request.folder_prefix.trim_end_matches('/'));
    let filename = format!("{}.zip", folder_name);
    Ok(stream_archive(&state, request.bucket_name, entries, &filename))
}

fn stream_archive(
    state: &AppState,
    bucket: String,
    entries: Vec<ArchiveEntry>,
    filename: &str,
) -> Response {
    info!(bucket = %bucket, entries = entries.len(), filename, "streaming archive");

    let assembler = ArchiveStreamAssembler::new(
        state.gateway.clone(),
        state.config.limits.archive_channel_capacity,
    );
    let stream = assembler.stream(bucket, entries);

    Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| Error::Stream("failed to build response".to_string()).into_response())
}
