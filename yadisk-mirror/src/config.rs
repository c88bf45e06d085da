use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

pub const DEFAULT_REMOTE_ROOT: &str = "disk:/";
pub const DEFAULT_API_URL: &str = "https://cloud-api.yandex.net";
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;
pub const DEFAULT_RETRY_UNIT_MS: u64 = 1000;
const DEFAULT_MOVE_POLL_MS: u64 = 500;
const DEFAULT_MOVE_POLL_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("workers must be at least 1")]
    NoWorkers,
    #[error("max attempts must be at least 1")]
    NoAttempts,
    #[error("remote root is empty")]
    EmptyRemoteRoot,
    #[error("source root {0:?} is not a directory")]
    SourceNotDirectory(PathBuf),
}

/// Everything a mirror run needs, built once at startup.
#[derive(Clone, Debug)]
pub struct MirrorConfig {
    pub source_root: PathBuf,
    pub remote_root: String,
    pub workers: usize,
    pub retry: RetryPolicy,
    pub move_poll_interval: Duration,
    pub move_poll_limit: u32,
}

impl MirrorConfig {
    pub fn new(source_root: impl Into<PathBuf>, remote_root: impl Into<String>) -> Self {
        Self {
            source_root: source_root.into(),
            remote_root: remote_root.into(),
            workers: DEFAULT_WORKERS,
            retry: RetryPolicy::new(
                DEFAULT_MAX_ATTEMPTS,
                Duration::from_millis(DEFAULT_RETRY_UNIT_MS),
            ),
            move_poll_interval: Duration::from_millis(DEFAULT_MOVE_POLL_MS),
            move_poll_limit: DEFAULT_MOVE_POLL_LIMIT,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_move_polling(mut self, interval: Duration, limit: u32) -> Self {
        self.move_poll_interval = interval;
        self.move_poll_limit = limit;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.retry.max_attempts() == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if self.remote_root.trim().is_empty() {
            return Err(ConfigError::EmptyRemoteRoot);
        }
        if !self.source_root.is_dir() {
            return Err(ConfigError::SourceNotDirectory(self.source_root.clone()));
        }
        Ok(())
    }
}

/// Expands a leading `~` the way a shell would, for values that arrive
/// through the environment or quoted arguments.
pub fn expand_with_home(value: &str, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return PathBuf::from(value);
    };
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}
