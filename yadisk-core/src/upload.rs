use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("offset {start} is past the end of a {total}-byte body")]
pub struct RangeError {
    pub start: u64,
    pub total: u64,
}

/// The span of a resumed upload body: bytes `start..total` of a `total`-byte
/// file, rendered as an HTTP `Content-Range` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    start: u64,
    total: u64,
}

impl ContentRange {
    pub fn new(start: u64, total: u64) -> Result<Self, RangeError> {
        if start > total {
            return Err(RangeError { start, total });
        }
        Ok(Self { start, total })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of body bytes this range carries.
    pub fn len(&self) -> u64 {
        self.total - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.total
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // An empty span has no first/last byte; RFC 9110 writes it as "*".
        if self.is_empty() {
            write!(f, "bytes */{}", self.total)
        } else {
            write!(f, "bytes {}-{}/{}", self.start, self.total - 1, self.total)
        }
    }
}
