//! Retry and circuit-breaker decorator.
//!
//! The breaker wraps the whole retry sequence: one admission covers every
//! attempt, and only the final outcome is reported to the breaker.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::circuit_breaker::{Admission, CircuitBreaker, CircuitBreakerConfig, Transition};
use crate::error::PipelineError;
use crate::retry::RetryConfig;
use crate::sender::{SendFuture, Sender};
use crate::unit::{Payload, RequestUnit};

/// How a retry sequence ended, as far as the breaker is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Failed,
    Cancelled,
    Rejected,
}

/// Applies retry-with-backoff, then circuit breaking, around an inner sender.
///
/// Never returns `Err`: invalid units come back with a `request rejected`
/// entry and status 400.
pub struct ResilientSender<S> {
    inner: S,
    retry: RetryConfig,
    breaker: Arc<CircuitBreaker>,
}

impl<S: Sender> ResilientSender<S> {
    pub fn new(inner: S, retry: RetryConfig, breaker: CircuitBreakerConfig) -> Self {
        Self::with_breaker(inner, retry, Arc::new(CircuitBreaker::new(breaker)))
    }

    /// Uses an existing breaker, letting several senders trip together.
    pub fn with_breaker(inner: S, retry: RetryConfig, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            inner,
            retry,
            breaker,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn send_with_retry<T: Payload>(
        &self,
        template: RequestUnit<T>,
        cancel: &CancellationToken,
    ) -> (RequestUnit<T>, Outcome) {
        let mut carried = template.error_list.clone();
        let mut attempt: u32 = 0;

        loop {
            let mut request = template.clone();
            request.error_list = carried.clone();
            request.retries = attempt;

            debug!(
                request_id = %request.request_id,
                path = %request.request_path,
                attempt,
                "attempting request"
            );

            let mut result = match self.inner.send(request, cancel).await {
                Ok(result) => result,
                Err(validation_error) => {
                    let mut rejected = template;
                    rejected.error_list = carried;
                    rejected.retries = attempt;
                    rejected.record(PipelineError::Rejected(validation_error));
                    return (rejected, Outcome::Rejected);
                }
            };
            result.retries = attempt;

            if result.is_success() {
                return (result, Outcome::Succeeded);
            }
            if cancel.is_cancelled() {
                return (result, Outcome::Cancelled);
            }
            if attempt >= self.retry.max_retry_attempts {
                return (result, Outcome::Failed);
            }

            let delay = self.retry.delay_for_attempt(attempt);
            attempt += 1;
            let entry = format!(
                "retry {attempt}: {}",
                result.last_error().unwrap_or("request failed")
            );
            warn!(
                request_id = %result.request_id,
                path = %result.request_path,
                attempt,
                status = result.status_code,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );
            carried.push(entry);

            let slept = tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                _ = cancel.cancelled() => false,
            };
            if !slept {
                result.error_list = carried;
                result.retries = attempt;
                result.record(PipelineError::Cancelled);
                return (result, Outcome::Cancelled);
            }
        }
    }

    fn report(&self, admission: Admission, outcome: Outcome, unit: &RequestUnit<impl Sized>) {
        let transition = match outcome {
            Outcome::Succeeded => self.breaker.record_success(admission),
            Outcome::Failed => self.breaker.record_failure(admission),
            Outcome::Cancelled | Outcome::Rejected => {
                self.breaker.release(admission);
                None
            }
        };

        match transition {
            Some(Transition::Opened {
                consecutive_failures,
            }) => warn!(
                path = %unit.request_path,
                consecutive_failures,
                open_secs = self.breaker.config().open_duration.as_secs(),
                "circuit breaker opened"
            ),
            Some(Transition::Reset) => info!(path = %unit.request_path, "circuit breaker reset"),
            None => {}
        }
    }
}

impl<S: Sender> Sender for ResilientSender<S> {
    fn send<'a, T: Payload>(
        &'a self,
        mut unit: RequestUnit<T>,
        cancel: &'a CancellationToken,
    ) -> SendFuture<'a, T> {
        Box::pin(async move {
            if let Err(validation_error) = unit.validate() {
                unit.record(PipelineError::Rejected(validation_error));
                return Ok(unit);
            }

            let admission = self.breaker.admit();
            if let Admission::Rejected { retry_after } = admission {
                debug!(
                    request_id = %unit.request_id,
                    path = %unit.request_path,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "short-circuited by open breaker"
                );
                unit.record(PipelineError::BreakerOpen { retry_after });
                return Ok(unit);
            }

            let (unit, outcome) = self.send_with_retry(unit, cancel).await;
            self.report(admission, outcome, &unit);
            Ok(unit)
        })
    }
}
