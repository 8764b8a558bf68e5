use std::time::Duration;

/// Decides whether a failed upstream call is attempted again.
///
/// `attempt` is the number of attempts made so far (starting at 1). Returning
/// `None` gives up; the failure is then logged and the registry keeps its state.
pub trait RetryPolicy: Send + Sync {
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Single attempt, no retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Up to `max_attempts` attempts, doubling the delay after each failure.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub max_attempts: u32,
    pub initial: Duration,
}

impl ExponentialBackoff {
    pub fn new(max_attempts: u32, initial: Duration) -> Self {
        Self {
            max_attempts,
            initial,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.initial.saturating_mul(factor))
    }
}
