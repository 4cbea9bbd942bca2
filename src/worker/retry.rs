/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Capped, linear retry policy: a failed job is requeued until it has been
/// retried `max_retries` times, then marked failed. No backoff is applied
/// beyond the processor's poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// What to do with a job whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue with this retry count.
    Retry { retry_count: u32 },
    /// Give up; this many attempts were made in total.
    Fail { attempts: u32 },
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Total attempts a job gets, the original plus retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count < self.max_retries {
            RetryDecision::Retry {
                retry_count: retry_count + 1,
            }
        } else {
            RetryDecision::Fail {
                attempts: retry_count.saturating_add(1),
            }
        }
    }
}
