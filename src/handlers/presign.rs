use crate::{
    capability::{CapabilityRequest, CapabilityUrlIssuer},
    error::Result,
    server::AppState,
};
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

pub async fn issue(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CapabilityRequest>,
) -> Result<impl IntoResponse> {
    let issuer = CapabilityUrlIssuer::new(
        state.gateway.as_ref(),
        state.config.limits.presign_default_ttl_secs,
    );
    let capability = issuer.issue(&request).await?;

    Ok(Json(json!({
        "success": true,
        "url": capability.url,
        "operation": capability.operation,
        "bucketName": capability.bucket_name,
        "key": capability.key,
        "expiresIn": capability.expires_in,
    })))
}
