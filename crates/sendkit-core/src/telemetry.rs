//! Timing decorator.

use time::OffsetDateTime;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::sender::{SendFuture, Sender};
use crate::unit::{Payload, RequestUnit};

/// Stamps `elapsed_ms` and `completed_at` on every unit it returns.
///
/// A `ValidationError` from the inner sender is recorded on the unit instead
/// of being returned, so this decorator never yields `Err`.
pub struct TelemetrySender<S> {
    inner: S,
}

impl<S: Sender> TelemetrySender<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Sender> Sender for TelemetrySender<S> {
    fn send<'a, T: Payload>(
        &'a self,
        unit: RequestUnit<T>,
        cancel: &'a CancellationToken,
    ) -> SendFuture<'a, T> {
        Box::pin(async move {
            let started = Instant::now();
            info!(
                request_id = %unit.request_id,
                method = %unit.method,
                path = %unit.request_path,
                "request started"
            );

            let snapshot = unit.clone();
            let mut unit = match self.inner.send(unit, cancel).await {
                Ok(unit) => unit,
                Err(validation_error) => {
                    let mut rejected = snapshot;
                    rejected.record(PipelineError::Rejected(validation_error));
                    rejected
                }
            };

            unit.elapsed_ms = started.elapsed().as_millis() as u64;
            unit.completed_at = Some(OffsetDateTime::now_utc());

            if unit.is_success() {
                info!(
                    request_id = %unit.request_id,
                    path = %unit.request_path,
                    status = unit.status_code,
                    elapsed_ms = unit.elapsed_ms,
                    retries = unit.retries,
                    "request succeeded"
                );
            } else {
                warn!(
                    request_id = %unit.request_id,
                    path = %unit.request_path,
                    status = unit.status_code,
                    elapsed_ms = unit.elapsed_ms,
                    errors = unit.error_list.len(),
                    last_error = unit.last_error().unwrap_or_default(),
                    "request failed"
                );
            }

            Ok(unit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct SlowSender {
        delay: Duration,
    }

    impl Sender for SlowSender {
        fn send<'a, T: Payload>(
            &'a self,
            mut unit: RequestUnit<T>,
            _cancel: &'a CancellationToken,
        ) -> SendFuture<'a, T> {
            Box::pin(async move {
                unit.validate()?;
                tokio::time::sleep(self.delay).await;
                unit.record(PipelineError::Status { status: 502 });
                Ok(unit)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_is_still_timed() {
        let sender = TelemetrySender::new(SlowSender {
            delay: Duration::from_millis(250),
        });

        let unit = sender
            .send(RequestUnit::<String>::get("/slow"), &CancellationToken::new())
            .await
            .expect("never errs");

        assert_eq!(unit.status_code, 502);
        assert!(unit.elapsed_ms >= 250);
        assert!(unit.completed_at.is_some());
    }

    #[tokio::test]
    async fn inner_validation_error_becomes_an_entry() {
        let sender = TelemetrySender::new(SlowSender {
            delay: Duration::ZERO,
        });

        let unit = sender
            .send(RequestUnit::<String>::get(""), &CancellationToken::new())
            .await
            .expect("validation is trapped");

        assert_eq!(unit.status_code, 400);
        assert_eq!(unit.error_list.len(), 1);
        assert!(unit.error_list[0].starts_with("request rejected"));
        assert!(unit.completed_at.is_some());
    }
}
