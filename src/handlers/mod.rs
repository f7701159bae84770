pub mod browse;
pub mod bulk;
pub mod download;
pub mod folder;
pub mod presign;

use axum::http::StatusCode;
use axum::response::IntoResponse;

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
