use std::future::Future;
use std::time::Duration;

use reqwest::{Body, StatusCode};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;
use yadisk_core::{
    ContentRange, DiskInfo, MoveOutcome, OperationStatus, YadiskClient, YadiskError,
};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Api(#[from] YadiskError),
    #[error("remote operation {0} failed")]
    OperationFailed(Url),
    #[error("remote operation {url} still running after {polls} status checks")]
    OperationTimedOut { url: Url, polls: u32 },
}

impl RemoteError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RemoteError::Api(err) => err.status(),
            _ => None,
        }
    }

    /// The target path already exists.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }
}

/// The operations a mirror run needs from the storage service.
pub trait RemoteStore: Send + Sync + 'static {
    fn check_access(&self) -> impl Future<Output = Result<DiskInfo, RemoteError>> + Send;

    fn create_dir(&self, path: &str) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn upload_link(
        &self,
        path: &str,
        overwrite: bool,
    ) -> impl Future<Output = Result<Url, RemoteError>> + Send;

    /// Bytes the upload target has already received.
    fn resume_offset(&self, target: &Url) -> impl Future<Output = Result<u64, RemoteError>> + Send;

    /// Sends `range.len()` bytes read from `body`'s current position.
    fn upload_chunk(
        &self,
        target: &Url,
        range: ContentRange,
        body: File,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Moves `from` to `to` and returns once the move has finished.
    fn move_to(
        &self,
        from: &str,
        to: &str,
        overwrite: bool,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// [`RemoteStore`] backed by the Yandex Disk REST API.
#[derive(Clone)]
pub struct YadiskRemote {
    client: YadiskClient,
    poll_interval: Duration,
    poll_limit: u32,
}

impl YadiskRemote {
    pub fn new(client: YadiskClient, poll_interval: Duration, poll_limit: u32) -> Self {
        Self {
            client,
            poll_interval,
            poll_limit: poll_limit.max(1),
        }
    }

    async fn wait_for_operation(&self, url: Url) -> Result<(), RemoteError> {
        for poll in 0..self.poll_limit {
            match self.client.get_operation_status(url.as_str()).await? {
                OperationStatus::Success => return Ok(()),
                OperationStatus::Failure => return Err(RemoteError::OperationFailed(url)),
                OperationStatus::InProgress => {
                    debug!(operation = %url, poll, "move still in progress");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
        Err(RemoteError::OperationTimedOut {
            url,
            polls: self.poll_limit,
        })
    }
}

impl RemoteStore for YadiskRemote {
    async fn check_access(&self) -> Result<DiskInfo, RemoteError> {
        Ok(self.client.get_disk_info().await?)
    }

    async fn create_dir(&self, path: &str) -> Result<(), RemoteError> {
        self.client.create_folder(path).await?;
        Ok(())
    }

    async fn upload_link(&self, path: &str, overwrite: bool) -> Result<Url, RemoteError> {
        Ok(self.client.get_upload_link(path, overwrite).await?.href)
    }

    async fn resume_offset(&self, target: &Url) -> Result<u64, RemoteError> {
        Ok(self.client.get_uploaded_bytes(target).await?)
    }

    async fn upload_chunk(
        &self,
        target: &Url,
        range: ContentRange,
        body: File,
    ) -> Result<(), RemoteError> {
        let stream = ReaderStream::new(body.take(range.len()));
        self.client
            .put_upload_range(target, range, Body::wrap_stream(stream))
            .await?;
        Ok(())
    }

    async fn move_to(&self, from: &str, to: &str, overwrite: bool) -> Result<(), RemoteError> {
        match self.client.move_resource(from, to, overwrite).await? {
            MoveOutcome::Done(_) => Ok(()),
            MoveOutcome::InProgress(link) => self.wait_for_operation(link.href).await,
        }
    }
}
