//! Local pool of files used as upload payloads.
//!
//! The directory is listed on every pick so files can be added or removed
//! while a test is running.

use std::io;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

/// A file chosen from the pool, read into memory.
#[derive(Debug, Clone)]
pub struct ExampleFile {
    pub path: PathBuf,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Directory of example files.
#[derive(Debug, Clone)]
pub struct ExampleFiles {
    dir: PathBuf,
}

impl ExampleFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists regular, non-hidden files directly inside the directory, sorted
    /// by path. A missing directory yields an empty list.
    pub async fn list(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !entry.file_type().await?.is_file() {
                continue;
            }
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    /// Picks one file uniformly at random and reads it.
    ///
    /// Returns `Ok(None)` when the pool is empty.
    pub async fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> io::Result<Option<ExampleFile>> {
        let paths = self.list().await?;
        let Some(path) = paths.choose(rng).cloned() else {
            return Ok(None);
        };

        let bytes = tokio::fs::read(&path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Some(ExampleFile {
            path,
            filename,
            bytes,
        }))
    }

    /// Logs the pool size at startup so an empty pool is noticed early.
    pub async fn log_inventory(&self) {
        match self.list().await {
            Ok(paths) if paths.is_empty() => warn!(
                dir = %self.dir.display(),
                "No example files found, upload tasks will be skipped"
            ),
            Ok(paths) => info!(
                dir = %self.dir.display(),
                files = paths.len(),
                "Example files available"
            ),
            Err(e) => warn!(
                dir = %self.dir.display(),
                error = %e,
                "Failed to list example files"
            ),
        }
    }
}
