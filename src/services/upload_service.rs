use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::models::StoredFile;
use crate::services::hasher::ContentHasher;
use crate::services::naming::{NameResolver, UploadName};
use crate::services::publisher::{AtomicPublisher, PublishError};
use crate::services::sink::{BoundedSink, TempArtifact};
use std::path::PathBuf;
use tokio::io::AsyncRead;

/// How many times a part is re-resolved after losing a no-clobber rename.
const MAX_PUBLISH_ATTEMPTS: usize = 32;

/// Runs one file part through sanitize → write → publish → hash.
pub struct UploadService {
    resolver: NameResolver,
    sink: BoundedSink,
    publisher: AtomicPublisher,
    hasher: ContentHasher,
}

impl UploadService {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            resolver: NameResolver::new(config),
            sink: BoundedSink::new(config),
            publisher: AtomicPublisher::new(config.allow_overwrite),
            hasher: ContentHasher::new(config.hash_workers, config.chunk_size),
        }
    }

    /// Starts the per-request sequence of parts.
    pub fn session(&self) -> UploadSession<'_> {
        UploadSession {
            service: self,
            stored: Vec::new(),
            state: SessionState::Receiving,
        }
    }

    pub async fn store_part<R>(&self, original: &str, reader: R) -> Result<StoredFile, AppError>
    where
        R: AsyncRead + Unpin,
    {
        let name = self.resolver.prepare(original)?;
        tracing::debug!("Receiving {:?} as {:?}", name.original, name.sanitized);

        let artifact = self.sink.write(&name, reader).await?;
        let size = artifact.size();

        let path = self.publish(&name, artifact).await?;

        // The file is already in place; a failure here leaves it on disk
        let sha256 = self
            .hasher
            .digest(&path)
            .await
            .map_err(|e| AppError::io(&name.original, e))?;

        let stored_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.sanitized.clone());

        tracing::info!(
            "Stored {:?} as {} ({} bytes, sha256 {})",
            name.original,
            path.display(),
            size,
            sha256
        );

        Ok(StoredFile {
            name: stored_name,
            original_name: name.original,
            size,
            sha256,
            path,
        })
    }

    async fn publish(
        &self,
        name: &UploadName,
        mut artifact: TempArtifact,
    ) -> Result<PathBuf, AppError> {
        for attempt in 1..=MAX_PUBLISH_ATTEMPTS {
            // Resolved right before the rename, against the directory as it is now
            let target = self.resolver.resolve(name).await?;

            match self.publisher.publish(artifact, target).await {
                Ok(path) => return Ok(path),
                Err(PublishError::Collision(returned)) => {
                    tracing::debug!(
                        "Name for {:?} was taken concurrently (attempt {}), re-resolving",
                        name.original,
                        attempt
                    );
                    artifact = returned;
                }
                Err(PublishError::Io { artifact, source }) => {
                    artifact.discard();
                    return Err(AppError::io(&name.original, source));
                }
                Err(PublishError::Aborted(source)) => {
                    return Err(AppError::io(&name.original, source));
                }
            }
        }

        artifact.discard();
        Err(AppError::Internal(format!(
            "no free name for {:?} after {} attempts",
            name.original, MAX_PUBLISH_ATTEMPTS
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Receiving,
    Failed,
}

/// Ordered parts of one authorized request.
///
/// Parts are stored strictly one after another. The first failure fails the
/// session; parts stored before it stay on disk and are not rolled back.
pub struct UploadSession<'a> {
    service: &'a UploadService,
    stored: Vec<StoredFile>,
    state: SessionState,
}

impl<'a> UploadSession<'a> {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stored(&self) -> &[StoredFile] {
        &self.stored
    }

    pub async fn accept<R>(&mut self, original: &str, reader: R) -> Result<&StoredFile, AppError>
    where
        R: AsyncRead + Unpin,
    {
        if self.state == SessionState::Failed {
            return Err(AppError::Internal(
                "upload already failed, no further parts accepted".to_string(),
            ));
        }

        match self.service.store_part(original, reader).await {
            Ok(file) => {
                let idx = self.stored.len();
                self.stored.push(file);
                Ok(&self.stored[idx])
            }
            Err(err) => {
                self.state = SessionState::Failed;
                if !self.stored.is_empty() {
                    let kept: Vec<&str> = self.stored.iter().map(|f| f.name.as_str()).collect();
                    tracing::warn!(
                        "Upload failed on {:?}; earlier parts remain stored: {:?}",
                        original,
                        kept
                    );
                }
                Err(err)
            }
        }
    }

    /// All parts in request order, once every part has been stored.
    pub fn finish(self) -> Result<Vec<StoredFile>, AppError> {
        match self.state {
            SessionState::Failed => Err(AppError::Internal(
                "finish called on a failed upload".to_string(),
            )),
            SessionState::Receiving if self.stored.is_empty() => {
                Err(AppError::BadRequest("No file provided".to_string()))
            }
            SessionState::Receiving => Ok(self.stored),
        }
    }
}
