//! Retry budget and backoff between attempts.

use std::time::Duration;

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { delay: Duration },
    /// `base * factor^attempt`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        /// Spread the delay by +/- 50%.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed {
            delay: Duration::from_millis(500),
        }
    }
}

impl Backoff {
    /// Delay before retry `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt.min(i32::MAX as u32) as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds.max(0.0));

                if !jitter {
                    return delay;
                }

                let delay_ms = delay.as_millis() as u64;
                let jitter_ms = delay_ms / 2;
                let offset = fastrand::u64(0..=jitter_ms * 2);
                Duration::from_millis((delay_ms + offset).saturating_sub(jitter_ms))
            }
        }
    }
}

/// How many times a failed exchange is re-attempted and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retry_attempts + 1`.
    pub max_retry_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 2,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    pub fn fixed(delay: Duration, max_retry_attempts: u32) -> Self {
        Self {
            max_retry_attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    pub fn exponential(base: Duration, max: Duration, max_retry_attempts: u32) -> Self {
        Self {
            max_retry_attempts,
            backoff: Backoff::Exponential {
                base,
                factor: 2.0,
                max,
                jitter: true,
            },
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retry_attempts: 0,
            backoff: Backoff::Fixed {
                delay: Duration::ZERO,
            },
        }
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retry_attempts.saturating_add(1)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}
