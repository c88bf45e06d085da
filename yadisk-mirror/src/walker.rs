//! Depth-first enumeration of the local source tree.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::paths::{PathError, relative_to, remote_path_for};

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("failed to map {path:?} to a remote path: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: PathError,
    },
}

/// One local file or directory visited by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub local_path: PathBuf,
    pub relative_path: PathBuf,
    pub remote_path: String,
    pub is_dir: bool,
}

/// Lazily walks `root`, yielding the root itself first and every directory
/// before its contents. Siblings come in file-name order.
///
/// The first read error ends the walk: it is yielded once and the iterator
/// is exhausted afterwards.
pub struct TreeWalker {
    root: PathBuf,
    remote_root: String,
    inner: walkdir::IntoIter,
    failed: bool,
}

impl TreeWalker {
    pub fn new(root: &Path, remote_root: &str) -> Self {
        let inner = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Self {
            root: root.to_path_buf(),
            remote_root: remote_root.to_string(),
            inner,
            failed: false,
        }
    }

    fn entry_for(&self, entry: walkdir::DirEntry) -> Result<SourceEntry, WalkError> {
        let local_path = entry.path().to_path_buf();
        let is_dir = entry.file_type().is_dir();
        let relative_path = relative_to(&self.root, &local_path)
            .map_err(|source| WalkError::Path {
                path: local_path.clone(),
                source,
            })?
            .to_path_buf();
        let remote_path =
            remote_path_for(&self.remote_root, &relative_path).map_err(|source| {
                WalkError::Path {
                    path: local_path.clone(),
                    source,
                }
            })?;
        Ok(SourceEntry {
            local_path,
            relative_path,
            remote_path,
            is_dir,
        })
    }
}

impl Iterator for TreeWalker {
    type Item = Result<SourceEntry, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = match self.inner.next()? {
            Ok(entry) => self.entry_for(entry),
            Err(source) => Err(WalkError::Read {
                path: source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone()),
                source,
            }),
        };
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}
