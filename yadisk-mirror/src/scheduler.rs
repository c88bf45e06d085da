use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::MirrorConfig;
use crate::remote::RemoteStore;
use crate::task::UploadTask;
use crate::walker::{SourceEntry, TreeWalker, WalkError};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("error walking directory: {0}")]
    Walk(#[from] WalkError),
    #[error("mirror run interrupted")]
    Cancelled,
}

/// Per-run counts. Failures are informational and never fail the run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorSummary {
    pub dirs_created: usize,
    pub dirs_existing: usize,
    pub dirs_failed: usize,
    pub files_uploaded: usize,
    pub files_failed: usize,
}

#[derive(Default)]
struct Counters {
    dirs_created: AtomicUsize,
    dirs_existing: AtomicUsize,
    dirs_failed: AtomicUsize,
    files_uploaded: AtomicUsize,
    files_failed: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MirrorSummary {
        MirrorSummary {
            dirs_created: self.dirs_created.load(Ordering::Relaxed),
            dirs_existing: self.dirs_existing.load(Ordering::Relaxed),
            dirs_failed: self.dirs_failed.load(Ordering::Relaxed),
            files_uploaded: self.files_uploaded.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
        }
    }
}

/// Walks the source tree and mirrors it onto `remote`.
///
/// Directories are created inline, in walk order, so a directory exists
/// before anything inside it is uploaded. Files are uploaded by background
/// tasks, at most `config.workers` at a time.
pub struct Mirror<R> {
    remote: Arc<R>,
    config: Arc<MirrorConfig>,
}

impl<R: RemoteStore> Mirror<R> {
    pub fn new(remote: Arc<R>, config: MirrorConfig) -> Self {
        Self {
            remote,
            config: Arc::new(config),
        }
    }

    /// Returns once the walk is over and every dispatched upload has
    /// finished, whatever their outcome.
    pub async fn run(&self, cancel: CancellationToken) -> Result<MirrorSummary, MirrorError> {
        let permits = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let tracker = TaskTracker::new();
        let counters = Arc::new(Counters::default());

        let dispatched = self
            .dispatch(&permits, &tracker, &counters, &cancel)
            .await;

        tracker.close();
        if !tracker.is_empty() {
            debug!(pending = tracker.len(), "waiting for uploads to finish");
        }
        tracker.wait().await;
        dispatched?;

        if cancel.is_cancelled() {
            return Err(MirrorError::Cancelled);
        }
        let summary = counters.snapshot();
        info!(
            dirs_created = summary.dirs_created,
            dirs_existing = summary.dirs_existing,
            dirs_failed = summary.dirs_failed,
            files_uploaded = summary.files_uploaded,
            files_failed = summary.files_failed,
            "mirror finished"
        );
        Ok(summary)
    }

    async fn dispatch(
        &self,
        permits: &Arc<Semaphore>,
        tracker: &TaskTracker,
        counters: &Arc<Counters>,
        cancel: &CancellationToken,
    ) -> Result<(), MirrorError> {
        let walker = TreeWalker::new(&self.config.source_root, &self.config.remote_root);
        for entry in walker {
            if cancel.is_cancelled() {
                return Err(MirrorError::Cancelled);
            }
            let entry = entry?;
            if entry.is_dir {
                self.create_dir(&entry, counters, cancel).await?;
                continue;
            }

            // The semaphore is owned by this run and never closed.
            let Some(Ok(permit)) = cancel
                .run_until_cancelled(Arc::clone(permits).acquire_owned())
                .await
            else {
                return Err(MirrorError::Cancelled);
            };

            let task = UploadTask::from_entry(&entry);
            let remote = Arc::clone(&self.remote);
            let policy = self.config.retry;
            let counters = Arc::clone(counters);
            let cancel = cancel.clone();
            tracker.spawn(async move {
                let _permit = permit;
                match task.run(remote.as_ref(), &policy, &cancel).await {
                    Ok(_) => Counters::bump(&counters.files_uploaded),
                    Err(err) if err.is_cancelled() => {
                        debug!(path = ?task.local_path, "upload interrupted");
                    }
                    Err(err) => {
                        warn!(path = ?task.local_path, error = %err, "error uploading file");
                        Counters::bump(&counters.files_failed);
                    }
                }
            });
        }
        Ok(())
    }

    async fn create_dir(
        &self,
        entry: &SourceEntry,
        counters: &Counters,
        cancel: &CancellationToken,
    ) -> Result<(), MirrorError> {
        info!(remote = %entry.remote_path, "create directory");
        let created = cancel
            .run_until_cancelled(self.remote.create_dir(&entry.remote_path))
            .await
            .ok_or(MirrorError::Cancelled)?;
        match created {
            Ok(()) => Counters::bump(&counters.dirs_created),
            Err(err) if err.is_conflict() => {
                debug!(remote = %entry.remote_path, "directory already exists");
                Counters::bump(&counters.dirs_existing);
            }
            Err(err) => {
                warn!(remote = %entry.remote_path, error = %err, "error creating directory");
                Counters::bump(&counters.dirs_failed);
            }
        }
        Ok(())
    }
}
