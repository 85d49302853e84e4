//! The configuration bundle handed to the worker process.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::OrchestratorError;
use crate::config::RunConfig;

/// Bundle format version.
pub const BUNDLE_VERSION: u32 = 1;

/// Everything the worker needs to run, written as one JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerBundle {
    pub version: u32,
    pub run_id: String,
    /// SHA-256 of the serialized `config`, hex encoded.
    pub config_hash: String,
    pub config: RunConfig,
}

impl WorkerBundle {
    pub fn new(run_id: impl Into<String>, config: RunConfig) -> Result<Self, OrchestratorError> {
        let config_hash = hash_config(&config)?;
        Ok(Self {
            version: BUNDLE_VERSION,
            run_id: run_id.into(),
            config_hash,
            config,
        })
    }

    /// File name used inside the scratch folder.
    pub fn file_name(&self) -> String {
        format!("bundle_{}.json", self.run_id)
    }

    /// Writes the bundle into `dir` and returns its path.
    pub async fn write(&self, dir: &Path) -> Result<PathBuf, OrchestratorError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(self.file_name());
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| OrchestratorError::Bundle(e.to_string()))?;
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Reads a bundle and checks its version and hash.
    pub async fn read(path: &Path) -> Result<Self, OrchestratorError> {
        let bytes = tokio::fs::read(path).await?;
        let bundle: WorkerBundle = serde_json::from_slice(&bytes)
            .map_err(|e| OrchestratorError::Bundle(format!("{}: {}", path.display(), e)))?;

        if bundle.version != BUNDLE_VERSION {
            return Err(OrchestratorError::Bundle(format!(
                "unsupported bundle version {}",
                bundle.version
            )));
        }
        let actual = hash_config(&bundle.config)?;
        if actual != bundle.config_hash {
            return Err(OrchestratorError::Bundle(format!(
                "config hash mismatch: bundle says {}, content is {}",
                bundle.config_hash, actual
            )));
        }
        Ok(bundle)
    }
}

fn hash_config(config: &RunConfig) -> Result<String, OrchestratorError> {
    let bytes =
        serde_json::to_vec(config).map_err(|e| OrchestratorError::Bundle(e.to_string()))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let bundle = WorkerBundle::new("run-42", fixtures::run_config(dir.path())).unwrap();
        assert_eq!(bundle.config_hash.len(), 64);

        let path = bundle.write(dir.path()).await.unwrap();
        assert!(path.ends_with("bundle_run-42.json"));

        let read = WorkerBundle::read(&path).await.unwrap();
        assert_eq!(read.run_id, "run-42");
        assert_eq!(read.config_hash, bundle.config_hash);
    }

    #[tokio::test]
    async fn test_tampered_bundle_rejected() {
        let dir = TempDir::new().unwrap();
        let mut bundle = WorkerBundle::new("run-1", fixtures::run_config(dir.path())).unwrap();
        bundle.config.pool.max_processes += 1;
        let path = bundle.write(dir.path()).await.unwrap();

        let err = WorkerBundle::read(&path).await.unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
    }
}
