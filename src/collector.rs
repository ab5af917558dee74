//! Image folder collection.
//!
//! Walks a directory tree, picks out every image file and reads them with
//! bounded concurrency. The result is always in sorted logical-name order, so
//! registering a folder gives the same ids and paths on every run.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::fs::read_dir;

use crate::error::{Error, Result};
use crate::path_utils::{is_hidden_file, logical_name, path_to_string_lossy};
use crate::types::image_media_type;

/// Limits the number of files read at the same time
const MAX_CONCURRENT_READS: usize = 16;

/// One image found below the collection root.
#[derive(Debug, Clone)]
pub struct CollectedImage {
    /// Path relative to the collection root, `/`-separated.
    pub name: String,
    pub path: PathBuf,
    pub data: Vec<u8>,
}

/// Collects image files below a base directory.
#[derive(Debug)]
pub struct ImageCollector<'a> {
    base_directory: &'a Path,
}

impl<'a> ImageCollector<'a> {
    pub fn new(base_directory: &'a Path) -> Self {
        Self { base_directory }
    }

    /// Recursively lists image files, sorted by logical name.
    ///
    /// Hidden files and directories are skipped, as is every file whose
    /// extension is not a known image type.
    pub async fn collect_paths(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut pending = vec![self.base_directory.to_path_buf()];
        let mut found = Vec::new();

        while let Some(directory) = pending.pop() {
            let mut entries = read_dir(&directory).await.map_err(|e| Error::SourceRetrieval {
                origin: path_to_string_lossy(&directory),
                error: e,
            })?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if is_hidden_file(&path) {
                    continue;
                }
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if image_media_type(&path).is_err() {
                    log::debug!("Skipping non-image file {}", path_to_string_lossy(&path));
                    continue;
                }
                found.push((logical_name(self.base_directory, &path)?, path));
            }
        }

        found.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(found)
    }

    /// Lists and reads every image below the base directory.
    pub async fn collect(&self) -> Result<Vec<CollectedImage>> {
        let paths = self.collect_paths().await?;
        log::debug!(
            "Reading {} images from {}",
            paths.len(),
            path_to_string_lossy(self.base_directory)
        );

        stream::iter(paths)
            .map(|(name, path)| async move {
                let data = tokio::fs::read(&path)
                    .await
                    .map_err(|e| Error::SourceRetrieval {
                        origin: path_to_string_lossy(&path),
                        error: e,
                    })?;
                Ok::<_, Error>(CollectedImage { name, path, data })
            })
            .buffered(MAX_CONCURRENT_READS)
            .try_collect()
            .await
    }
}
