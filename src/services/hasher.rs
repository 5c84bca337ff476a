use crate::utils::hash::hash_file;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// SHA-256 of published files, computed on the blocking pool.
///
/// At most `workers` files are hashed at once; further requests wait for a
/// permit instead of piling more work onto the blocking threads.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    permits: Arc<Semaphore>,
    block_size: usize,
}

impl ContentHasher {
    pub fn new(workers: usize, block_size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            block_size: block_size.max(1),
        }
    }

    pub async fn digest(&self, path: &Path) -> io::Result<String> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| io::Error::other("hash pool is closed"))?;

        let path = path.to_path_buf();
        let block_size = self.block_size;

        tokio::task::spawn_blocking(move || {
            // Released when the blocking job ends, even if the caller went away
            let _permit = permit;
            hash_file(&path, block_size)
        })
        .await
        .map_err(|e| io::Error::other(format!("hash task failed: {}", e)))?
    }

    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}
