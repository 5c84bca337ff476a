use crate::AppState;
use crate::api::error::AppError;
use crate::models::UploadResponse;
use axum::{
    Json,
    extract::{Multipart, State},
};
use futures::TryStreamExt;
use std::time::Duration;
use tokio_util::io::StreamReader;

/// Bytes a failed request may still send before we stop listening.
const DRAIN_LIMIT_BYTES: usize = 4 * 1024 * 1024;

#[utoipa::path(
    post,
    path = "/upload",
    request_body(
        content = UploadForm,
        content_type = "multipart/form-data",
        description = "One or more file parts"
    ),
    params(
        ("x-upload-token" = String, Header, description = "Shared upload secret (or Authorization: Bearer)")
    ),
    responses(
        (status = 200, description = "All parts stored, in request order", body = UploadResponse),
        (status = 400, description = "Malformed multipart body or no file part"),
        (status = 401, description = "Missing or invalid upload token"),
        (status = 408, description = "Client stopped sending data"),
        (status = 413, description = "A part exceeded the maximum upload size"),
        (status = 415, description = "A part's extension is not allowed"),
        (status = 500, description = "Storage failure")
    ),
    tag = "uploads"
)]
pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut session = state.uploads.session();

    let result: Result<(), AppError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let Some(original_filename) = field.file_name().map(|s| s.to_string()) else {
                tracing::debug!("Ignoring non-file field {:?}", field.name());
                continue;
            };

            let body_with_io_error = field.map_err(std::io::Error::other);
            let reader = StreamReader::new(body_with_io_error);

            session.accept(&original_filename, reader).await?;
        }
        Ok(())
    }
    .await;

    match result {
        Ok(()) => Ok(Json(UploadResponse {
            files: session.finish()?,
        })),
        Err(e) => {
            // Consume the rest of the body so the client gets the error instead of a TCP reset
            tracing::warn!("Upload failed: {}. Draining remaining request body...", e);
            drain(&mut multipart, state.config.drain_timeout).await;
            Err(e)
        }
    }
}

/// Reads and discards what is left of the body, bounded in bytes and time.
async fn drain(multipart: &mut Multipart, limit: Duration) {
    let discard = async {
        let mut total = 0usize;
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(chunk)) = field.chunk().await {
                total += chunk.len();
                if total > DRAIN_LIMIT_BYTES {
                    return false;
                }
            }
        }
        true
    };

    match tokio::time::timeout(limit, discard).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(
            "Request body still going after {} bytes, not draining further",
            DRAIN_LIMIT_BYTES
        ),
        Err(_) => tracing::warn!("Request body not finished within {:?}, giving up", limit),
    }
}
