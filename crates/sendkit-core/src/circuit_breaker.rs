//! Circuit breaker guarding one downstream dependency.
//!
//! ```text
//! Closed   → Open:     consecutive failures reach the threshold
//! Open     → HalfOpen: open_duration elapsed, next caller becomes the probe
//! HalfOpen → Closed:   probe succeeded
//! HalfOpen → Open:     probe failed
//! ```
//!
//! Outcomes are reported through the [`Admission`] that let a call in, so a
//! call admitted while Closed can't resolve a probe it didn't own.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::ValidationError;

/// Runtime circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_duration: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.failure_threshold == 0 {
            return Err(ValidationError::ZeroFailureThreshold);
        }
        Ok(())
    }
}

/// Point-in-time copy of the breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
}

/// Decision for one incoming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed; the call passes through.
    Allowed,
    /// This call is the single HalfOpen trial.
    Probe,
    /// Short-circuited; the breaker may admit a probe after `retry_after`.
    Rejected { retry_after: Duration },
}

impl Admission {
    pub const fn is_rejected(self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// State change caused by a reported outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Opened { consecutive_failures: u32 },
    Reset,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

impl CircuitInner {
    fn open(&mut self) -> Transition {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.probe_in_flight = false;
        Transition::Opened {
            consecutive_failures: self.consecutive_failures,
        }
    }
}

/// Thread-safe circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decides whether a call may reach the dependency.
    pub fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|opened_at| opened_at.elapsed())
                    .unwrap_or(self.config.open_duration);

                if elapsed >= self.config.open_duration {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    Admission::Probe
                } else {
                    Admission::Rejected {
                        retry_after: self.config.open_duration - elapsed,
                    }
                }
            }
            CircuitState::HalfOpen if inner.probe_in_flight => Admission::Rejected {
                retry_after: Duration::ZERO,
            },
            CircuitState::HalfOpen => {
                inner.probe_in_flight = true;
                Admission::Probe
            }
        }
    }

    pub fn record_success(&self, admission: Admission) -> Option<Transition> {
        let mut inner = self.lock();
        match (admission, inner.state) {
            (Admission::Probe, CircuitState::HalfOpen) => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.probe_in_flight = false;
                Some(Transition::Reset)
            }
            (Admission::Allowed, CircuitState::Closed) => {
                inner.consecutive_failures = 0;
                None
            }
            _ => None,
        }
    }

    pub fn record_failure(&self, admission: Admission) -> Option<Transition> {
        let mut inner = self.lock();
        match (admission, inner.state) {
            (Admission::Probe, CircuitState::HalfOpen) => Some(inner.open()),
            (Admission::Allowed, CircuitState::Closed) => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                if inner.consecutive_failures >= self.config.failure_threshold {
                    Some(inner.open())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Gives back an admission whose outcome says nothing about the
    /// dependency, such as a cancelled call. A released probe lets the next
    /// caller probe instead.
    pub fn release(&self, admission: Admission) {
        if admission == Admission::Probe {
            let mut inner = self.lock();
            if inner.state == CircuitState::HalfOpen {
                inner.probe_in_flight = false;
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        let inner = self.lock();
        CircuitBreakerState {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            opened_at: inner.opened_at,
        }
    }
}
