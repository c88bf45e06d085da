//! In-memory [`RemoteStore`] that records every call.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use url::Url;
use yadisk_core::{ContentRange, DiskInfo, YadiskError};

use crate::remote::{RemoteError, RemoteStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    CreateDir(String),
    UploadLink { path: String, overwrite: bool },
    ResumeOffset(Url),
    UploadChunk { target: Url, range: ContentRange },
    Move { from: String, to: String, overwrite: bool },
}

#[derive(Default)]
pub struct FakeRemote {
    calls: Mutex<Vec<RemoteCall>>,
    chunks: Mutex<Vec<(ContentRange, Vec<u8>)>>,
    offset: u64,
    failing_offset_query: bool,
    put_failures: AtomicU32,
    failing_dirs: HashSet<String>,
    existing_dirs: HashSet<String>,
    failing_links: HashSet<String>,
    failing_move: bool,
    local_removals: HashMap<String, PathBuf>,
    upload_delay: Option<Duration>,
    links_issued: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn api_error(status: StatusCode) -> RemoteError {
    RemoteError::Api(YadiskError::Api {
        status,
        body: String::new(),
    })
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_failing_offset_query(mut self) -> Self {
        self.failing_offset_query = true;
        self
    }

    pub fn with_put_failures(self, failures: u32) -> Self {
        self.put_failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn with_failing_dir(mut self, path: &str) -> Self {
        self.failing_dirs.insert(path.to_string());
        self
    }

    pub fn with_existing_dir(mut self, path: &str) -> Self {
        self.existing_dirs.insert(path.to_string());
        self
    }

    pub fn with_failing_link(mut self, path: &str) -> Self {
        self.failing_links.insert(path.to_string());
        self
    }

    pub fn with_failing_move(mut self) -> Self {
        self.failing_move = true;
        self
    }

    /// Deletes `local` from disk when `create_dir(remote)` is called.
    pub fn with_local_removal(mut self, remote: &str, local: PathBuf) -> Self {
        self.local_removals.insert(remote.to_string(), local);
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn chunks(&self) -> Vec<(ContentRange, Vec<u8>)> {
        self.chunks.lock().unwrap().clone()
    }

    pub fn put_attempts(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: RemoteCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RemoteStore for FakeRemote {
    async fn check_access(&self) -> Result<DiskInfo, RemoteError> {
        Ok(DiskInfo {
            total_space: 1024,
            used_space: 0,
            trash_size: 0,
            is_paid: false,
        })
    }

    async fn create_dir(&self, path: &str) -> Result<(), RemoteError> {
        self.record(RemoteCall::CreateDir(path.to_string()));
        if let Some(local) = self.local_removals.get(path) {
            std::fs::remove_dir_all(local).unwrap();
        }
        if self.failing_dirs.contains(path) {
            return Err(api_error(StatusCode::FORBIDDEN));
        }
        if self.existing_dirs.contains(path) {
            return Err(api_error(StatusCode::CONFLICT));
        }
        Ok(())
    }

    async fn upload_link(&self, path: &str, overwrite: bool) -> Result<Url, RemoteError> {
        self.record(RemoteCall::UploadLink {
            path: path.to_string(),
            overwrite,
        });
        if self.failing_links.contains(path) {
            return Err(api_error(StatusCode::NOT_FOUND));
        }
        let n = self.links_issued.fetch_add(1, Ordering::SeqCst);
        Ok(Url::parse(&format!("https://upload.test/target/{n}")).unwrap())
    }

    async fn resume_offset(&self, target: &Url) -> Result<u64, RemoteError> {
        self.record(RemoteCall::ResumeOffset(target.clone()));
        if self.failing_offset_query {
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR));
        }
        Ok(self.offset)
    }

    async fn upload_chunk(
        &self,
        target: &Url,
        range: ContentRange,
        body: File,
    ) -> Result<(), RemoteError> {
        self.record(RemoteCall::UploadChunk {
            target: target.clone(),
            range,
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        let mut bytes = Vec::new();
        body.take(range.len())
            .read_to_end(&mut bytes)
            .await
            .unwrap();
        self.chunks.lock().unwrap().push((range, bytes));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failed = self
            .put_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(RemoteError::Api(YadiskError::UploadRejected {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "try again".to_string(),
            }));
        }
        Ok(())
    }

    async fn move_to(&self, from: &str, to: &str, overwrite: bool) -> Result<(), RemoteError> {
        self.record(RemoteCall::Move {
            from: from.to_string(),
            to: to.to_string(),
            overwrite,
        });
        if self.failing_move {
            return Err(api_error(StatusCode::INSUFFICIENT_STORAGE));
        }
        Ok(())
    }
}
