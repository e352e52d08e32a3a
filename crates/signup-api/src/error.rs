use std::path::PathBuf;

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use signup_types::api::ErrorResponse;
use tracing::error;

pub const MISSING_IDENTITY: &str = "Username and email are required";
pub const INVALID_FILE_NAME: &str = "Invalid attachment filename";

/// Everything `POST /register` can fail with.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("{}", body_error_message(.0))]
    MalformedBody(#[from] MultipartError),

    #[error("Email already registered")]
    Conflict,

    #[error("failed to write upload {}", path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist registration: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl RegisterError {
    pub fn status(&self) -> StatusCode {
        match self {
            RegisterError::Validation(_) => StatusCode::BAD_REQUEST,
            // Carries 413 when the body limit was hit, 400 for parse errors.
            RegisterError::MalformedBody(e) => e.status(),
            RegisterError::Conflict => StatusCode::CONFLICT,
            RegisterError::StorageWrite { .. } | RegisterError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn body_error_message(e: &MultipartError) -> &'static str {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        "Request body too large"
    } else {
        "Malformed multipart body"
    }
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Registration failed: {:?}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
