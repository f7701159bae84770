use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Bucket not found")]
    NoSuchBucket,

    #[error("Object not found")]
    NoSuchKey,

    #[error("No objects matched the request")]
    EmptySelection,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{} object(s) failed", failed.len())]
    PartialFailure { failed: Vec<String> },

    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::NoSuchBucket => StatusCode::NOT_FOUND,
            Error::NoSuchKey => StatusCode::NOT_FOUND,
            Error::EmptySelection => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::StoreUnavailable(_) => StatusCode::BAD_GATEWAY,
            Error::Stream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &str {
        match self {
            Error::InvalidRequest(_) => "InvalidRequest",
            Error::NoSuchBucket => "NoSuchBucket",
            Error::NoSuchKey => "NoSuchKey",
            Error::EmptySelection => "EmptySelection",
            Error::Conflict(_) => "Conflict",
            Error::PartialFailure { .. } => "PartialFailure",
            Error::StoreUnavailable(_) => "StoreUnavailable",
            Error::Stream(_) => "StreamError",
            _ => "InternalError",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "success": false,
            "error": self.error_code(),
            "message": self.to_string(),
        });

        if let Error::PartialFailure { failed } = &self {
            body["failedKeys"] = json!(failed);
            body["failedCount"] = json!(failed.len());
        }

        (status, Json(body)).into_response()
    }
}
