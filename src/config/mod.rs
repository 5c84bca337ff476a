use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Extensions accepted when `ALLOWED_EXTENSIONS` is not set.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    ".zip", ".tar.gz", ".tgz", ".7z", ".rar", ".txt", ".csv", ".pdf",
];

/// Upload pipeline configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Destination directory (default: "./uploads")
    pub upload_dir: PathBuf,

    /// Shared secret expected on upload requests. `None` disables uploads.
    pub upload_token: Option<String>,

    /// Maximum bytes accepted per file part (default: 10 GiB)
    pub max_upload_bytes: u64,

    /// Replace existing files instead of picking a " (n)" name (default: false)
    pub allow_overwrite: bool,

    /// Lowercase suffixes a stored name must end with. Empty means anything goes.
    pub allowed_extensions: Vec<String>,

    /// Block size for streaming writes and hashing (default: 1 MiB)
    pub chunk_size: usize,

    /// Concurrent hash jobs on the blocking pool (default: 4)
    pub hash_workers: usize,

    /// Idle timeout for a single read from the client (default: disabled)
    pub read_timeout: Option<Duration>,

    /// How long a failed request keeps reading the rest of its body so the
    /// client sees the error (default: 5 s)
    pub drain_timeout: Duration,

    /// Leftover temp files older than this are removed at startup (default: 24 h)
    pub staging_cleanup_age: Duration,

    /// Listen address (default: "0.0.0.0:8000")
    pub bind_addr: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            upload_token: None,
            max_upload_bytes: 10 * 1024 * 1024 * 1024, // 10 GiB
            allow_overwrite: false,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            chunk_size: 1024 * 1024, // 1 MiB
            hash_workers: 4,
            read_timeout: None,
            drain_timeout: Duration::from_secs(5),
            staging_cleanup_age: Duration::from_secs(24 * 3600),
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key/value source. Unparseable values fall
    /// back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        Self {
            upload_dir: lookup("UPLOAD_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            upload_token: lookup("UPLOAD_TOKEN")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default.max_upload_bytes),

            allow_overwrite: lookup("ALLOW_OVERWRITE")
                .map(|v| parse_flag(&v))
                .unwrap_or(default.allow_overwrite),

            allowed_extensions: lookup("ALLOWED_EXTENSIONS")
                .map(|v| parse_extensions(&v))
                .unwrap_or(default.allowed_extensions),

            chunk_size: lookup("CHUNK_SIZE")
                .and_then(|v| v.trim().parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(default.chunk_size),

            hash_workers: lookup("HASH_WORKERS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(default.hash_workers),

            read_timeout: lookup("UPLOAD_READ_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),

            drain_timeout: lookup("UPLOAD_DRAIN_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.drain_timeout),

            staging_cleanup_age: lookup("STAGING_CLEANUP_AGE_HOURS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
                .unwrap_or(default.staging_cleanup_age),

            bind_addr: lookup("BIND_ADDR")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.bind_addr),
        }
    }

    /// Uploads are only served when a shared secret is configured.
    pub fn uploads_enabled(&self) -> bool {
        self.upload_token.is_some()
    }

    /// Small limits and an explicit token, for tests and local runs.
    pub fn development(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            upload_token: Some("dev-token".to_string()),
            max_upload_bytes: 16 * 1024 * 1024,
            chunk_size: 64 * 1024,
            hash_workers: 2,
            ..Self::default()
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Splits a comma-separated list into normalized suffixes: trimmed,
/// lowercased, with a leading dot.
pub fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| if s.starts_with('.') { s } else { format!(".{}", s) })
        .collect()
}
