use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::services::naming::UploadName;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// `~` never survives filename sanitizing, so no published name can carry
/// this prefix and the startup sweep only ever sees our own temp files.
pub const TEMP_PREFIX: &str = ".~upload-";
pub const TEMP_SUFFIX: &str = ".part";

/// A fully written, fsynced temp file waiting to be published.
///
/// Dropping it removes the file, so every path that does not publish it
/// (errors, cancelled requests) cleans up.
#[derive(Debug)]
pub struct TempArtifact {
    path: TempPath,
    size: u64,
}

impl TempArtifact {
    pub(crate) fn from_parts(path: TempPath, size: u64) -> Self {
        Self { path, size }
    }

    pub(crate) fn into_parts(self) -> (TempPath, u64) {
        (self.path, self.size)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Removes the temp file now. A file that is already gone is not an error.
    pub fn discard(self) {
        discard_temp(self.path);
    }
}

fn discard_temp(path: TempPath) {
    let shown = path.to_path_buf();
    match path.close() {
        Ok(()) => tracing::debug!("Removed temp artifact {}", shown.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!(
            "Failed to remove temp artifact {}: {}",
            shown.display(),
            e
        ),
    }
}

/// Streams a part into a temp file next to its destination, never writing
/// more than `max_bytes`.
#[derive(Debug, Clone)]
pub struct BoundedSink {
    dir: PathBuf,
    max_bytes: u64,
    chunk_size: usize,
    read_timeout: Option<Duration>,
}

impl BoundedSink {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.upload_dir.clone(),
            max_bytes: config.max_upload_bytes,
            chunk_size: config.chunk_size.max(1),
            read_timeout: config.read_timeout,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub async fn write<R>(&self, name: &UploadName, mut reader: R) -> Result<TempArtifact, AppError>
    where
        R: AsyncRead + Unpin,
    {
        // Same directory as the destination so the later rename stays on one filesystem
        let (file, temp_path) = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .rand_bytes(16)
            .tempfile_in(&self.dir)
            .map_err(|e| AppError::io(&name.original, e))?
            .into_parts();

        tracing::debug!(
            "Staging {:?} in {}",
            name.original,
            temp_path.display()
        );

        let mut file = tokio::fs::File::from_std(file);
        let written = self.copy_bounded(&mut reader, &mut file, name).await;
        drop(file);

        match written {
            Ok(size) => Ok(TempArtifact::from_parts(temp_path, size)),
            Err(err) => {
                discard_temp(temp_path);
                Err(err)
            }
        }
    }

    async fn copy_bounded<R>(
        &self,
        reader: &mut R,
        file: &mut tokio::fs::File,
        name: &UploadName,
    ) -> Result<u64, AppError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;

        loop {
            let n = self
                .read_block(reader, &mut buffer)
                .await
                .map_err(|e| AppError::io(&name.original, e))?;
            if n == 0 {
                break;
            }

            // Checked before writing, so the file never holds more than the limit
            if total + n as u64 > self.max_bytes {
                tracing::warn!(
                    "Upload {:?} exceeded {} bytes, aborting",
                    name.original,
                    self.max_bytes
                );
                return Err(AppError::PayloadTooLarge {
                    filename: name.original.clone(),
                    limit: self.max_bytes,
                });
            }

            file.write_all(&buffer[..n])
                .await
                .map_err(|e| AppError::io(&name.original, e))?;
            total += n as u64;
        }

        file.flush()
            .await
            .map_err(|e| AppError::io(&name.original, e))?;
        file.sync_all()
            .await
            .map_err(|e| AppError::io(&name.original, e))?;

        Ok(total)
    }

    async fn read_block<R>(&self, reader: &mut R, buffer: &mut [u8]) -> io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, reader.read(buffer))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no upload data received for {:?}", limit),
                    )
                })?,
            None => reader.read(buffer).await,
        }
    }
}

/// Deletes temp artifacts left behind by a previous process (crash, SIGKILL)
/// that are older than `older_than`. Returns how many were removed.
pub async fn sweep_stale_artifacts(dir: &Path, older_than: Duration) -> io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !(name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < older_than {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove stale {}: {}", name, e),
        }
    }

    Ok(removed)
}
