//! Request-scoped scratch files for conversion artifacts.
//!
//! Every artifact is created inside the configured scratch directory with a
//! random, exclusively-created name and is removed from disk when its
//! [`ScratchPath`] guard is dropped, whichever way the request ends.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tempfile::TempPath;
use thiserror::Error;
use tokio::{fs::File, io::AsyncWriteExt};

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("failed to prepare scratch directory `{path}`: {source}")]
    Init { path: PathBuf, source: io::Error },
    #[error("failed to allocate `{category}` scratch file: {source}")]
    Allocate { category: String, source: io::Error },
    #[error("failed to {op} scratch file `{path}`: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

/// Allocator for uniquely named scratch files below one directory.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: PathBuf,
}

impl ScratchSpace {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ScratchError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ScratchError::Init {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Allocate a new, empty scratch file named `<category>-<random>.<extension>`.
    pub fn allocate(
        &self,
        category: &str,
        extension: &str,
    ) -> Result<ScratchPath, ScratchError> {
        let prefix = format!("{category}-");
        let suffix = format!(".{extension}");
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(&self.dir)
            .map_err(|source| ScratchError::Allocate {
                category: category.to_string(),
                source,
            })?;

        // Only the path is kept; handles are opened per use and closed on drop.
        Ok(ScratchPath {
            path: file.into_temp_path(),
        })
    }
}

/// A scratch file on disk, deleted when dropped.
#[derive(Debug)]
pub struct ScratchPath {
    path: TempPath,
}

impl ScratchPath {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the artifact for reading and writing.
    pub async fn open_read_write(&self) -> Result<File, ScratchError> {
        tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.path())
            .await
            .map_err(|source| self.io_error("open", source))
    }

    pub async fn open_read(&self) -> Result<File, ScratchError> {
        File::open(self.path())
            .await
            .map_err(|source| self.io_error("open", source))
    }

    /// Replace the artifact's content with `bytes`.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), ScratchError> {
        let mut file = self.open_read_write().await?;
        file.set_len(0)
            .await
            .map_err(|source| self.io_error("truncate", source))?;
        file.write_all(bytes)
            .await
            .map_err(|source| self.io_error("write", source))?;
        file.flush()
            .await
            .map_err(|source| self.io_error("flush", source))
    }

    fn io_error(&self, op: &'static str, source: io::Error) -> ScratchError {
        ScratchError::Io {
            op,
            path: self.path().to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn allocations_are_unique_across_threads() {
        let dir = TempDir::new().expect("temp dir");
        let scratch = Arc::new(ScratchSpace::new(dir.path()).expect("scratch"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let scratch = scratch.clone();
                thread::spawn(move || {
                    (0..32)
                        .map(|_| scratch.allocate("html-source", "html").expect("allocate"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let artifacts: Vec<ScratchPath> = handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("thread"))
            .collect();
        let names: HashSet<_> = artifacts.iter().map(|a| a.path().to_path_buf()).collect();

        assert_eq!(names.len(), 8 * 32);
    }

    #[test]
    fn names_carry_category_and_extension() {
        let dir = TempDir::new().expect("temp dir");
        let scratch = ScratchSpace::new(dir.path()).expect("scratch");
        let artifact = scratch.allocate("rtf-target", "rtf").expect("allocate");

        let name = artifact
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name")
            .to_string();
        assert!(name.starts_with("rtf-target-"), "unexpected name {name}");
        assert!(name.ends_with(".rtf"), "unexpected name {name}");
        assert_eq!(artifact.path().parent(), Some(dir.path()));
    }

    #[tokio::test]
    async fn artifacts_are_removed_on_drop() {
        let dir = TempDir::new().expect("temp dir");
        let scratch = ScratchSpace::new(dir.path().join("nested")).expect("scratch");

        let artifact = scratch.allocate("html-source", "html").expect("allocate");
        artifact.write(b"<p>hello</p>").await.expect("write");
        let path = artifact.path().to_path_buf();
        assert_eq!(tokio::fs::read(&path).await.expect("read"), b"<p>hello</p>");

        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn write_replaces_previous_content() {
        let dir = TempDir::new().expect("temp dir");
        let scratch = ScratchSpace::new(dir.path()).expect("scratch");
        let artifact = scratch.allocate("html-source", "html").expect("allocate");

        artifact.write(b"a much longer first body").await.expect("write");
        artifact.write(b"short").await.expect("rewrite");

        assert_eq!(tokio::fs::read(artifact.path()).await.expect("read"), b"short");
    }
}
