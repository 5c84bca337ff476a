use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("File type not allowed: {filename}")]
    PolicyRejected { filename: String },

    #[error("File {filename} exceeds the maximum upload size of {limit} bytes")]
    PayloadTooLarge { filename: String, limit: u64 },

    #[error("I/O error while storing {filename}: {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn io(filename: &str, source: std::io::Error) -> Self {
        AppError::Io {
            filename: filename.to_string(),
            source,
        }
    }

    /// Stable, machine-readable error kind for response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::PolicyRejected { .. } => "policy_rejected",
            AppError::PayloadTooLarge { .. } => "too_large",
            AppError::Io { source, .. } if source.kind() == std::io::ErrorKind::TimedOut => {
                "timeout"
            }
            AppError::Io { .. } | AppError::Internal(_) => "internal",
        }
    }

    /// Original client filename of the part that failed, if any.
    pub fn filename(&self) -> Option<&str> {
        match self {
            AppError::PolicyRejected { filename }
            | AppError::PayloadTooLarge { filename, .. }
            | AppError::Io { filename, .. } => Some(filename),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PolicyRejected { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Io { source, .. } if source.kind() == std::io::ErrorKind::TimedOut => {
                StatusCode::REQUEST_TIMEOUT
            }
            AppError::Io { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let filename = self.filename().map(|s| s.to_string());

        let message = match &self {
            AppError::Io { source, .. } if source.kind() == std::io::ErrorKind::TimedOut => {
                tracing::warn!("Upload timed out: {}", self);
                "Timed out waiting for upload data".to_string()
            }
            AppError::Io { .. } => {
                tracing::error!("Upload I/O error: {:?}", self);
                "Internal Server Error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
            "filename": filename,
        }));

        (status, body).into_response()
    }
}
