use std::time::Duration;

/// Attempt cap and linear backoff for chunk uploads.
///
/// After failed attempt `i` (0-based) the uploader waits `i * 2` units, so
/// the first retry is immediate. There is no jitter and no ceiling other
/// than the attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self { max_attempts, unit }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt.saturating_mul(2))
    }

    /// Delay before the attempt that follows `attempt`, or `None` when
    /// `attempt` was the last one allowed.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt.saturating_add(1) < self.max_attempts).then(|| self.delay(attempt))
    }
}
