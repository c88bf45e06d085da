use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Body, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::upload::ContentRange;

const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net";

#[derive(Debug, Error)]
pub enum YadiskError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("upload returned {status} instead of 201 Created: {body}")]
    UploadRejected { status: StatusCode, body: String },
    #[error("upload target reported an invalid byte count: {0:?}")]
    InvalidOffset(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct YadiskClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl YadiskClient {
    pub fn new(token: impl Into<String>) -> Result<Self, YadiskError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, YadiskError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub async fn get_disk_info(&self) -> Result<DiskInfo, YadiskError> {
        let url = self.endpoint("/v1/disk")?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn create_folder(&self, path: &str) -> Result<TransferLink, YadiskError> {
        let mut url = self.endpoint("/v1/disk/resources")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .put(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Moves `from` to `path`. The API answers 201 when the move is already
    /// done and 202 with an operation link when it finishes in the background.
    pub async fn move_resource(
        &self,
        from: &str,
        path: &str,
        overwrite: bool,
    ) -> Result<MoveOutcome, YadiskError> {
        let mut url = self.endpoint("/v1/disk/resources/move")?;
        url.query_pairs_mut()
            .append_pair("from", from)
            .append_pair("path", path)
            .append_pair("overwrite", if overwrite { "true" } else { "false" });
        let response = self
            .http
            .put(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let accepted = response.status() == StatusCode::ACCEPTED;
        let link: TransferLink = Self::handle_response(response).await?;
        Ok(if accepted {
            MoveOutcome::InProgress(link)
        } else {
            MoveOutcome::Done(link)
        })
    }

    pub async fn get_operation_status(
        &self,
        operation_url: &str,
    ) -> Result<OperationStatus, YadiskError> {
        let url = Url::parse(operation_url)?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let info: OperationInfo = Self::handle_response(response).await?;
        Ok(info.status)
    }

    pub async fn get_upload_link(
        &self,
        path: &str,
        overwrite: bool,
    ) -> Result<TransferLink, YadiskError> {
        let mut url = self.endpoint("/v1/disk/resources/upload")?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("overwrite", if overwrite { "true" } else { "false" });
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Asks the upload target how many bytes it already holds.
    ///
    /// Upload links are pre-signed, so no credential is sent. A target that
    /// has not seen any data yet answers 404, which counts as zero bytes.
    pub async fn get_uploaded_bytes(&self, upload_url: &Url) -> Result<u64, YadiskError> {
        let response = self.http.head(upload_url.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !status.is_success() {
            return Err(YadiskError::Api {
                status,
                body: String::new(),
            });
        }
        let Some(value) = response.headers().get(CONTENT_LENGTH) else {
            return Ok(0);
        };
        let text = value.to_str().unwrap_or_default().trim();
        text.parse::<u64>()
            .map_err(|_| YadiskError::InvalidOffset(text.to_string()))
    }

    /// Sends one ranged PUT to an upload target. Only `201 Created` counts as
    /// a completed upload; every other status is returned as
    /// [`YadiskError::UploadRejected`].
    pub async fn put_upload_range(
        &self,
        upload_url: &Url,
        range: ContentRange,
        body: impl Into<Body>,
    ) -> Result<(), YadiskError> {
        let response = self
            .http
            .put(upload_url.clone())
            .header(CONTENT_RANGE, range.to_string())
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, range.len())
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::CREATED {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(YadiskError::UploadRejected { status, body })
    }

    fn auth_header_value(&self) -> String {
        format!("OAuth {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, YadiskError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, YadiskError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(YadiskError::Api { status, body })
        }
    }
}

impl YadiskError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            YadiskError::Api { status, .. } | YadiskError::UploadRejected { status, .. } => {
                Some(*status)
            }
            YadiskError::Request(err) => err.status(),
            _ => None,
        }
    }

    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            YadiskError::Api { status, .. } | YadiskError::UploadRejected { status, .. } => {
                Some(classify_api_status(*status))
            }
            _ => None,
        }
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_EARLY
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DiskInfo {
    pub total_space: u64,
    pub used_space: u64,
    #[serde(default)]
    pub trash_size: u64,
    #[serde(default)]
    pub is_paid: bool,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OperationStatus {
    Success,
    Failure,
    InProgress,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OperationInfo {
    pub status: OperationStatus,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TransferLink {
    pub href: Url,
    pub method: String,
    #[serde(default)]
    pub templated: bool,
}

#[derive(Debug)]
pub enum MoveOutcome {
    Done(TransferLink),
    InProgress(TransferLink),
}
