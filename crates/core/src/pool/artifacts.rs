//! Per-chunk intermediate artifacts.
//!
//! Each successful chunk is written to `<scratch_dir>/<run_id>/chunk_<id>.json`
//! so a failed or aborted run leaves something to inspect.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::planner::ChunkId;
use crate::solver::PartialResult;

/// The scratch folder of one run.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    run_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(scratch_dir: &Path, run_id: &str) -> Self {
        Self {
            run_dir: scratch_dir.join(run_id),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn path_for(&self, chunk_id: ChunkId) -> PathBuf {
        self.run_dir.join(format!("chunk_{:06}.json", chunk_id.0))
    }

    /// Persists a partial result and returns its path.
    pub async fn write(&self, partial: &PartialResult) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.run_dir).await?;
        let path = self.path_for(partial.chunk_id);
        let bytes = serde_json::to_vec(partial).map_err(io::Error::other)?;

        // Write then rename so a half-written file is never mistaken for a result.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(chunk_id = %partial.chunk_id, path = %path.display(), "Chunk artifact written");
        Ok(path)
    }

    /// Loads a previously written artifact. Blocking; the merger runs off the runtime.
    pub fn load(path: &Path) -> io::Result<PartialResult> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Removes the run folder. Failure is logged, never fatal.
    pub async fn cleanup(&self) {
        match tokio::fs::remove_dir_all(&self.run_dir).await {
            Ok(()) => debug!(path = %self.run_dir.display(), "Removed intermediate artifacts"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove intermediate folder {}: {}",
                self.run_dir.display(),
                e
            ),
        }
    }
}
