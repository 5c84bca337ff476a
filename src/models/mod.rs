use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// A file that was published and hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredFile {
    /// Name on disk, after sanitizing and collision handling
    pub name: String,
    /// Filename as sent by the client
    pub original_name: String,
    /// Bytes stored
    pub size: u64,
    /// Lowercase hex SHA-256 of the stored content
    pub sha256: String,
    #[schema(value_type = String)]
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub files: Vec<StoredFile>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LimitsResponse {
    pub max_upload_bytes: u64,
    pub max_upload_human: String,
    pub upload_dir: String,
    pub allow_overwrite: bool,
    pub allowed_extensions: Vec<String>,
    pub uploads_enabled: bool,
}

/// Multipart form accepted by `POST /upload`. Only used for the API docs;
/// every part carrying a filename is stored.
#[derive(ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
