use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::paths::staging_path_for;
use crate::remote::{RemoteError, RemoteStore};
use crate::retry::RetryPolicy;
use crate::transfer::{TransferError, TransferReport, upload_resumable};
use crate::walker::SourceEntry;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to get upload link for {path}: {source}")]
    UploadLink {
        path: String,
        #[source]
        source: RemoteError,
    },
    #[error("upload failed: {0}")]
    Transfer(#[from] TransferError),
    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: String,
        to: String,
        #[source]
        source: RemoteError,
    },
    #[error("upload cancelled")]
    Cancelled,
}

impl TaskError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            TaskError::Cancelled | TaskError::Transfer(TransferError::Cancelled)
        )
    }
}

/// One file's trip to the remote: upload under the staging name, then
/// rename into place.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub local_path: PathBuf,
    pub remote_path: String,
    pub staging_path: String,
}

impl UploadTask {
    pub fn new(local_path: impl Into<PathBuf>, remote_path: impl Into<String>) -> Self {
        let remote_path = remote_path.into();
        Self {
            local_path: local_path.into(),
            staging_path: staging_path_for(&remote_path),
            remote_path,
        }
    }

    pub fn from_entry(entry: &SourceEntry) -> Self {
        Self::new(&entry.local_path, &entry.remote_path)
    }

    pub async fn run<R: RemoteStore>(
        &self,
        remote: &R,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        info!(path = ?self.local_path, remote = %self.remote_path, "start uploading file");

        // Overwrite so a stale staging file from an earlier run never blocks us.
        let link = cancel
            .run_until_cancelled(remote.upload_link(&self.staging_path, true))
            .await
            .ok_or(TaskError::Cancelled)?
            .map_err(|source| TaskError::UploadLink {
                path: self.staging_path.clone(),
                source,
            })?;

        let report = upload_resumable(remote, &self.local_path, &link, policy, cancel).await?;

        cancel
            .run_until_cancelled(remote.move_to(&self.staging_path, &self.remote_path, true))
            .await
            .ok_or(TaskError::Cancelled)?
            .map_err(|source| TaskError::Move {
                from: self.staging_path.clone(),
                to: self.remote_path.clone(),
                source,
            })?;

        info!(
            path = ?self.local_path,
            remote = %self.remote_path,
            bytes = report.size,
            attempts = report.attempts,
            resumed_from = report.resumed_from,
            "file uploaded"
        );
        Ok(report)
    }
}
