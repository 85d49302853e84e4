//! Staged output files.
//!
//! Sinks write to `<output>.partial` next to each final path. The staged
//! files replace the final outputs only once every table is finished, so a
//! failed merge never leaves partial outputs behind.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Staged path for a final output path.
pub fn staged_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".partial");
    path.with_file_name(name)
}

/// The staged files of one merge, keyed by final path.
#[derive(Debug)]
pub struct StagedOutputs {
    /// (staged, final); outputs sharing a file appear once.
    files: Vec<(PathBuf, PathBuf)>,
}

impl StagedOutputs {
    /// Stages `paths`, removing staged files left over by an earlier run.
    pub fn prepare<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> io::Result<Self> {
        let mut files: Vec<(PathBuf, PathBuf)> = Vec::new();
        for path in paths {
            if files.iter().any(|(_, target)| target == path) {
                continue;
            }
            let staged = staged_path(path);
            remove_if_exists(&staged)?;
            files.push((staged, path.clone()));
        }
        Ok(Self { files })
    }

    /// Where the sink for `path` writes.
    pub fn path_for(&self, path: &Path) -> PathBuf {
        self.files
            .iter()
            .find(|(_, target)| target == path)
            .map(|(staged, _)| staged.clone())
            .unwrap_or_else(|| staged_path(path))
    }

    /// Moves every staged file over its final path.
    ///
    /// On failure the staged files not yet promoted are removed.
    pub fn promote(mut self) -> io::Result<()> {
        let files = std::mem::take(&mut self.files);
        for (i, (staged, target)) in files.iter().enumerate() {
            if let Err(e) = std::fs::rename(staged, target) {
                self.files = files[i..].to_vec();
                self.discard();
                return Err(e);
            }
            debug!(path = %target.display(), "Output promoted");
        }
        Ok(())
    }

    /// Removes every staged file. Failures are logged.
    pub fn discard(&mut self) {
        for (staged, _) in self.files.drain(..) {
            match remove_if_exists(&staged) {
                Ok(()) => debug!(path = %staged.display(), "Removed staged output"),
                Err(e) => warn!("Failed to remove staged output {}: {}", staged.display(), e),
            }
        }
    }
}

impl Drop for StagedOutputs {
    fn drop(&mut self) {
        self.discard();
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
