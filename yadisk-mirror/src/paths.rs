use std::path::{Component, Path};

use thiserror::Error;

const STAGING_SUFFIX: &str = ".tmp";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("{0:?} is not under the source root")]
    OutsideRoot(std::path::PathBuf),
    #[error("path component {0:?} is not valid UTF-8")]
    NonUtf8(String),
    #[error("path contains unsupported component")]
    UnsupportedComponent,
}

/// Maps a path relative to the source root onto the remote tree.
///
/// Remote paths always use `/`; the empty relative path is the remote root.
pub fn remote_path_for(remote_root: &str, relative: &Path) -> Result<String, PathError> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| PathError::NonUtf8(part.to_string_lossy().into_owned()))?;
                parts.push(part);
            }
            Component::CurDir => continue,
            Component::RootDir | Component::ParentDir | Component::Prefix(_) => {
                return Err(PathError::UnsupportedComponent);
            }
        }
    }
    if parts.is_empty() {
        return Ok(remote_root.to_string());
    }
    Ok(format!(
        "{}/{}",
        remote_root.trim_end_matches('/'),
        parts.join("/")
    ))
}

/// Remote name a file is uploaded under before being renamed into place.
///
/// Yandex Disk throttles uploads of some extensions (mp4, zip, ...), so the
/// bytes land under a neutral suffix first.
pub fn staging_path_for(remote_path: &str) -> String {
    format!("{remote_path}{STAGING_SUFFIX}")
}

pub fn relative_to<'a>(root: &Path, path: &'a Path) -> Result<&'a Path, PathError> {
    path.strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot(path.to_path_buf()))
}
