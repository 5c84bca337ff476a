use crate::AppState;
use crate::models::LimitsResponse;
use crate::utils::size::human_bytes;
use axum::{Json, extract::State};

/// Lets clients check size and type limits before sending a large payload.
#[utoipa::path(
    get,
    path = "/limits",
    responses(
        (status = 200, description = "Configured upload limits", body = LimitsResponse)
    ),
    tag = "uploads"
)]
pub async fn get_limits(State(state): State<AppState>) -> Json<LimitsResponse> {
    let config = &state.config;
    Json(LimitsResponse {
        max_upload_bytes: config.max_upload_bytes,
        max_upload_human: human_bytes(config.max_upload_bytes),
        upload_dir: config.upload_dir.display().to_string(),
        allow_overwrite: config.allow_overwrite,
        allowed_extensions: config.allowed_extensions.clone(),
        uploads_enabled: config.uploads_enabled(),
    })
}
