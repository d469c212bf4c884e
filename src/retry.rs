//! One retry/backoff policy shared by every call site that retries,
//! so the schedule cannot drift between them.

use std::thread;
use std::time::Duration;

use log::warn;

use crate::errors::ObsError;

/// Bounded exponential backoff: retry `k` (1-based) is preceded by a
/// sleep of `base_delay * 2^(k-1)`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay to sleep before retry `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        // cap the exponent so a misconfigured retry count cannot overflow
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay * 2u32.pow(exponent)
    }

    /// Total attempts including the initial one.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Runs `operation` up to `total_attempts` times, sleeping the
    /// backoff schedule between attempts, and returns the first
    /// success or the last error.
    pub fn run<T, F>(&self, what: &str, mut operation: F) -> Result<T, ObsError>
    where
        F: FnMut() -> Result<T, ObsError>,
    {
        let mut last_error = None;
        for attempt in 0..self.total_attempts() {
            if attempt > 0 {
                thread::sleep(self.delay_before(attempt));
            }
            match operation() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "{what} failed (attempt {}/{}): {e}",
                        attempt + 1,
                        self.total_attempts()
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ObsError::Request(format!("{what} failed"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_doubles_from_the_base_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_before(1), Duration::from_millis(500));
        assert_eq!(policy.delay_before(2), Duration::from_secs(1));
        assert_eq!(policy.delay_before(3), Duration::from_secs(2));
        assert_eq!(policy.total_attempts(), 4);
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_millis(1));
        // capped exponent keeps this finite
        assert_eq!(policy.delay_before(40), Duration::from_millis(1 << 16));
    }

    #[test]
    fn run_returns_first_success() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let mut calls = 0;
        let result = policy.run("op", || {
            calls += 1;
            if calls < 2 {
                Err(ObsError::Request("transient".to_string()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn run_surfaces_the_last_error_after_exhaustion() {
        let policy = RetryPolicy::new(1, Duration::from_millis(1));
        let mut calls = 0;
        let result: Result<(), _> = policy.run("op", || {
            calls += 1;
            Err(ObsError::Request(format!("failure {calls}")))
        });
        assert_eq!(calls, 2);
        match result {
            Err(ObsError::Request(message)) => assert_eq!(message, "failure 2"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
