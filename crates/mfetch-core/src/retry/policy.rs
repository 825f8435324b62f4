use std::time::Duration;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempts are exhausted; the job becomes terminally failed.
    NoRetry,
    /// Make the job claimable again after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff with an attempt cap.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after attempt number `attempt` failed:
    /// `base * 2^(attempt-1)`, capped at `max_delay`. `attempt` is 1-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1);
        let multiplier = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decide what happens after `attempts_made` attempts, the last of which failed.
    pub fn decide(&self, attempts_made: u32) -> RetryDecision {
        if attempts_made >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff(attempts_made))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_one_second() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_secs(1));
        assert_eq!(p.backoff(2), Duration::from_secs(2));
        assert_eq!(p.backoff(3), Duration::from_secs(4));
        assert_eq!(p.backoff(4), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let p = RetryPolicy {
            max_attempts: 100,
            ..RetryPolicy::default()
        };
        let mut prev = Duration::ZERO;
        for attempt in 1..80 {
            let d = p.backoff(attempt);
            assert!(d >= prev, "attempt {attempt} went backwards");
            assert!(d <= p.max_delay);
            prev = d;
        }
        assert_eq!(p.backoff(64), p.max_delay);
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1), RetryDecision::RetryAfter(Duration::from_secs(1)));
        assert_eq!(p.decide(2), RetryDecision::RetryAfter(Duration::from_secs(2)));
        assert_eq!(p.decide(3), RetryDecision::NoRetry);
        assert_eq!(p.decide(7), RetryDecision::NoRetry);
    }

    #[test]
    fn single_attempt_policy_never_retries() {
        let p = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert_eq!(p.decide(1), RetryDecision::NoRetry);
    }
}
