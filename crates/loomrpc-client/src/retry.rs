use std::time::Duration;

/// Strategy bounding how many times a call attempt is re-run.
///
/// The policy is outcome-blind: transport failures and application-level
/// failures both count as "not yet succeeded". It only answers two
/// questions: how many attempts, and how long to pause before each retry.
pub trait RetryPolicy: Send + Sync {
    /// Total attempt budget, including the first attempt. Always >= 1.
    fn max_attempts(&self) -> u32;

    /// Delay before `attempt` (numbered from 2; the first attempt never
    /// waits). `None` means retry immediately.
    fn backoff(&self, attempt: u32) -> Option<Duration> {
        let _ = attempt;
        None
    }
}

/// Retries up to `attempts` times with no delay in between.
pub struct RetryNTimes {
    attempts: u32,
}

impl RetryNTimes {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }
}

impl RetryPolicy for RetryNTimes {
    fn max_attempts(&self) -> u32 {
        self.attempts
    }
}

/// Exponential backoff between attempts, capped at a maximum delay.
///
/// Attempt 2 waits `initial_backoff`, each further attempt multiplies the
/// previous delay by `multiplier` up to `max_backoff`.
pub struct ExponentialBackoff {
    attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    pub fn new(attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_backoff,
            max_backoff,
            multiplier: 2.0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(50), Duration::from_millis(5000))
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn max_attempts(&self) -> u32 {
        self.attempts
    }

    fn backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt < 2 {
            return None;
        }
        let exponent = (attempt - 2) as i32;
        let delay = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = delay.min(self.max_backoff.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_n_times_minimum_one_attempt() {
        assert_eq!(RetryNTimes::new(0).max_attempts(), 1);
        assert_eq!(RetryNTimes::new(3).max_attempts(), 3);
    }

    #[test]
    fn test_retry_n_times_has_no_backoff() {
        let policy = RetryNTimes::new(3);
        assert_eq!(policy.backoff(2), None);
        assert_eq!(policy.backoff(3), None);
    }

    #[test]
    fn test_exponential_backoff_progression() {
        let policy = ExponentialBackoff::new(
            5,
            Duration::from_millis(50),
            Duration::from_millis(5000),
        );

        assert_eq!(policy.backoff(1), None);
        assert_eq!(policy.backoff(2), Some(Duration::from_millis(50)));
        assert_eq!(policy.backoff(3), Some(Duration::from_millis(100)));
        assert_eq!(policy.backoff(4), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_exponential_backoff_caps_at_max() {
        let policy = ExponentialBackoff::new(
            20,
            Duration::from_millis(50),
            Duration::from_millis(200),
        );

        assert_eq!(policy.backoff(4), Some(Duration::from_millis(200)));
        assert_eq!(policy.backoff(15), Some(Duration::from_millis(200)));
    }
}
