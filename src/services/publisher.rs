use crate::services::sink::TempArtifact;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum PublishError {
    /// The target appeared after it was resolved and overwrite is off.
    /// The artifact is handed back so the caller can pick another name.
    Collision(TempArtifact),
    /// Rename failed; the caller still owns (and must drop) the artifact.
    Io {
        artifact: TempArtifact,
        source: io::Error,
    },
    /// The blocking rename task died. The artifact went down with it.
    Aborted(io::Error),
}

/// Promotes temp artifacts to their final name with one rename.
#[derive(Debug, Clone, Copy)]
pub struct AtomicPublisher {
    allow_overwrite: bool,
}

impl AtomicPublisher {
    pub fn new(allow_overwrite: bool) -> Self {
        Self { allow_overwrite }
    }

    /// With overwrite this is `rename(2)`, replacing whatever is at `target`.
    /// Without it the rename refuses to replace an existing entry, so two
    /// uploads racing for the same resolved name cannot both land there.
    pub async fn publish(
        &self,
        artifact: TempArtifact,
        target: PathBuf,
    ) -> Result<PathBuf, PublishError> {
        let allow_overwrite = self.allow_overwrite;
        let (temp, size) = artifact.into_parts();
        let dest = target.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            if allow_overwrite {
                temp.persist(&dest)
            } else {
                temp.persist_noclobber(&dest)
            }
        })
        .await;

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!("Published {}", target.display());
                Ok(target)
            }
            Ok(Err(e)) => {
                let artifact = TempArtifact::from_parts(e.path, size);
                if !allow_overwrite && e.error.kind() == io::ErrorKind::AlreadyExists {
                    Err(PublishError::Collision(artifact))
                } else {
                    Err(PublishError::Io {
                        artifact,
                        source: e.error,
                    })
                }
            }
            Err(join_err) => Err(PublishError::Aborted(io::Error::other(format!(
                "rename task failed: {}",
                join_err
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::services::naming::UploadName;
    use crate::services::sink::BoundedSink;
    use std::path::Path;

    async fn stage(dir: &Path, data: &[u8]) -> TempArtifact {
        let sink = BoundedSink::new(&UploadConfig::development(dir));
        let name = UploadName {
            original: "a.txt".to_string(),
            sanitized: "a.txt".to_string(),
        };
        sink.write(&name, data).await.unwrap()
    }

    fn count_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_publish_moves_temp_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = stage(dir.path(), b"payload").await;
        let temp_path = artifact.path().to_path_buf();
        let target = dir.path().join("a.txt");

        let published = AtomicPublisher::new(false)
            .publish(artifact, target.clone())
            .await
            .unwrap();

        assert_eq!(published, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"payload");
        assert!(!temp_path.exists());
        assert_eq!(count_entries(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_noclobber_reports_collision_and_returns_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.txt");
        std::fs::write(&target, b"existing").unwrap();

        let artifact = stage(dir.path(), b"new").await;
        let err = AtomicPublisher::new(false)
            .publish(artifact, target.clone())
            .await
            .unwrap_err();

        let artifact = match err {
            PublishError::Collision(artifact) => artifact,
            other => panic!("expected collision, got {:?}", other),
        };
        assert_eq!(std::fs::read(&target).unwrap(), b"existing");
        assert_eq!(std::fs::read(artifact.path()).unwrap(), b"new");

        drop(artifact);
        assert_eq!(count_entries(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.txt");
        std::fs::write(&target, b"old content that is longer").unwrap();

        let artifact = stage(dir.path(), b"new").await;
        AtomicPublisher::new(true)
            .publish(artifact, target.clone())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert_eq!(count_entries(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_failed_rename_hands_back_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = stage(dir.path(), b"data").await;
        let target = dir.path().join("missing-subdir").join("a.txt");

        let err = AtomicPublisher::new(true)
            .publish(artifact, target)
            .await
            .unwrap_err();

        match err {
            PublishError::Io { artifact, source } => {
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
                assert!(artifact.path().exists());
                artifact.discard();
            }
            other => panic!("expected Io, got {:?}", other),
        }
        assert_eq!(count_entries(dir.path()), 0);
    }
}
