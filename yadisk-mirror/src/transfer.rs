use std::io::{self, SeekFrom};
use std::path::Path;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncSeekExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;
use yadisk_core::ContentRange;

use crate::remote::{RemoteError, RemoteStore};
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to query uploaded bytes: {0}")]
    ResumeOffset(#[source] RemoteError),
    #[error("upload target reports {offset} bytes of a {size}-byte file")]
    OffsetPastEnd { offset: u64, size: u64 },
    #[error("max attempts reached ({attempts})")]
    MaxAttempts {
        attempts: u32,
        #[source]
        last: Option<RemoteError>,
    },
    #[error("transfer cancelled")]
    Cancelled,
}

/// Outcome of a completed resumable upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Offset the successful attempt started from.
    pub resumed_from: u64,
    pub size: u64,
}

/// Uploads the whole of `source` to a pre-issued upload `target`.
///
/// Every attempt first asks the target how many bytes it already holds and
/// sends only the rest. A failed offset query ends the transfer at once;
/// failed PUTs are retried per `policy`.
pub async fn upload_resumable<R: RemoteStore>(
    remote: &R,
    source: &Path,
    target: &Url,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<TransferReport, TransferError> {
    let mut file = File::open(source).await?;
    let size = file.metadata().await?.len();
    let mut last = None;

    for attempt in 0..policy.max_attempts() {
        let offset = cancel
            .run_until_cancelled(remote.resume_offset(target))
            .await
            .ok_or(TransferError::Cancelled)?
            .map_err(TransferError::ResumeOffset)?;
        let range = ContentRange::new(offset, size)
            .map_err(|_| TransferError::OffsetPastEnd { offset, size })?;

        file.seek(SeekFrom::Start(offset)).await?;
        // The clone shares the file position set above.
        let body = file.try_clone().await?;
        debug!(path = ?source, attempt, offset, range = %range, "sending upload body");

        let sent = cancel
            .run_until_cancelled(remote.upload_chunk(target, range, body))
            .await
            .ok_or(TransferError::Cancelled)?;
        match sent {
            Ok(()) => {
                return Ok(TransferReport {
                    attempts: attempt + 1,
                    resumed_from: offset,
                    size,
                });
            }
            Err(err) => {
                warn!(path = ?source, attempt, offset, error = %err, "upload attempt failed");
                last = Some(err);
            }
        }

        if let Some(delay) = policy.next_delay(attempt) {
            cancel
                .run_until_cancelled(tokio::time::sleep(delay))
                .await
                .ok_or(TransferError::Cancelled)?;
        }
    }

    Err(TransferError::MaxAttempts {
        attempts: policy.max_attempts(),
        last,
    })
}
