//! Cache decorator keyed on the request path.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheStore, MemoryCache};
use crate::codec::{Codec, JsonCodec};
use crate::error::CacheError;
use crate::sender::{SendFuture, Sender};
use crate::unit::{Payload, RequestUnit};

/// Short-circuits repeat requests for the same path within the unit's TTL.
///
/// The key is `request_path` alone, so two methods or bodies sharing a path
/// share an entry. Whatever the inner sender returned is stored, failed
/// outcomes included. Cache faults are logged and never fail the request.
pub struct CachingSender<S> {
    inner: S,
    store: Arc<dyn CacheStore>,
    codec: JsonCodec,
    enabled: bool,
}

impl<S: Sender> CachingSender<S> {
    pub fn new(inner: S) -> Self {
        Self::with_store(inner, Arc::new(MemoryCache::new()))
    }

    pub fn with_store(inner: S, store: Arc<dyn CacheStore>) -> Self {
        Self {
            inner,
            store,
            codec: JsonCodec::new(),
            enabled: true,
        }
    }

    /// A disabled decorator delegates every call untouched.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn lookup<T: Payload>(&self, key: &str) -> Result<Option<RequestUnit<T>>, CacheError> {
        let Some(stored) = self.store.get(key).await? else {
            return Ok(None);
        };

        self.codec
            .decode::<RequestUnit<T>>(&stored)
            .map(Some)
            .map_err(|error| CacheError::Deserialize {
                key: key.to_string(),
                message: error.to_string(),
            })
    }

    async fn remember<T: Payload>(&self, unit: &RequestUnit<T>) -> Result<(), CacheError> {
        let key = unit.request_path.as_str();
        let value = self
            .codec
            .encode(unit)
            .map_err(|error| CacheError::Serialize {
                key: key.to_string(),
                message: error.to_string(),
            })?;

        self.store.set(key, value, ttl_for(unit.cache_duration_minutes)).await
    }
}

fn ttl_for(minutes: i64) -> Duration {
    Duration::from_secs(u64::try_from(minutes).unwrap_or(0).saturating_mul(60))
}

impl<S: Sender> Sender for CachingSender<S> {
    fn send<'a, T: Payload>(
        &'a self,
        unit: RequestUnit<T>,
        cancel: &'a CancellationToken,
    ) -> SendFuture<'a, T> {
        Box::pin(async move {
            if !self.enabled || !unit.caching_enabled() {
                return self.inner.send(unit, cancel).await;
            }
            unit.validate()?;

            match self.lookup::<T>(&unit.request_path).await {
                Ok(Some(cached)) => {
                    debug!(
                        request_id = %unit.request_id,
                        path = %unit.request_path,
                        "cache hit"
                    );
                    return Ok(cached);
                }
                Ok(None) => {}
                Err(cache_error) => warn!(
                    path = %unit.request_path,
                    error = %cache_error,
                    "cache read failed"
                ),
            }

            let unit = self.inner.send(unit, cancel).await?;

            if cancel.is_cancelled() {
                return Ok(unit);
            }
            if let Err(cache_error) = self.remember(&unit).await {
                warn!(
                    path = %unit.request_path,
                    error = %cache_error,
                    "cache write failed"
                );
            }

            Ok(unit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheFuture;
    use crate::error::ValidationError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSender {
        calls: AtomicUsize,
    }

    impl Sender for CountingSender {
        fn send<'a, T: Payload>(
            &'a self,
            mut unit: RequestUnit<T>,
            _cancel: &'a CancellationToken,
        ) -> SendFuture<'a, T> {
            Box::pin(async move {
                unit.validate()?;
                let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                unit.status_code = 200;
                unit.response = serde_json::from_value(serde_json::json!({ "call": call })).ok();
                Ok(unit)
            })
        }
    }

    struct BrokenStore;

    impl CacheStore for BrokenStore {
        fn get<'a>(&'a self, _key: &'a str) -> CacheFuture<'a, Option<String>> {
            Box::pin(async { Err(CacheError::Unavailable("offline".into())) })
        }

        fn set<'a>(&'a self, _key: &'a str, _value: String, _ttl: Duration) -> CacheFuture<'a, ()> {
            Box::pin(async { Err(CacheError::Unavailable("offline".into())) })
        }
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_cache() {
        let sender = CachingSender::new(CountingSender::default());
        let cancel = CancellationToken::new();

        let first = sender
            .send(RequestUnit::<serde_json::Value>::get("/x"), &cancel)
            .await
            .expect("valid unit");
        let second = sender
            .send(RequestUnit::<serde_json::Value>::get("/x"), &cancel)
            .await
            .expect("valid unit");

        assert_eq!(sender.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn non_positive_minutes_bypass_the_cache() {
        let sender = CachingSender::new(CountingSender::default());
        let cancel = CancellationToken::new();

        for minutes in [0, -5] {
            sender
                .send(RequestUnit::<serde_json::Value>::get("/x").with_cache_minutes(minutes), &cancel)
                .await
                .expect("valid unit");
        }

        assert_eq!(sender.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_decorator_always_delegates() {
        let sender = CachingSender::new(CountingSender::default()).with_enabled(false);
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            sender
                .send(RequestUnit::<serde_json::Value>::get("/x"), &cancel)
                .await
                .expect("valid unit");
        }

        assert_eq!(sender.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_goes_back_to_inner() {
        let sender = CachingSender::new(CountingSender::default());
        let cancel = CancellationToken::new();

        sender
            .send(RequestUnit::<serde_json::Value>::get("/x"), &cancel)
            .await
            .expect("valid unit");
        tokio::time::advance(Duration::from_secs(61)).await;
        let refreshed = sender
            .send(RequestUnit::<serde_json::Value>::get("/x"), &cancel)
            .await
            .expect("valid unit");

        assert_eq!(sender.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshed.response, Some(serde_json::json!({ "call": 2 })));
    }

    #[tokio::test]
    async fn store_failures_do_not_fail_the_request() {
        let sender = CachingSender::with_store(CountingSender::default(), Arc::new(BrokenStore));

        let unit = sender
            .send(RequestUnit::<serde_json::Value>::get("/x"), &CancellationToken::new())
            .await
            .expect("valid unit");

        assert!(unit.is_success());
        assert_eq!(sender.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_error_propagates() {
        let sender = CachingSender::new(CountingSender::default());

        let error = sender
            .send(RequestUnit::<serde_json::Value>::get(""), &CancellationToken::new())
            .await
            .expect_err("empty path is invalid");

        assert_eq!(error, ValidationError::EmptyRequestPath);
        assert_eq!(sender.inner().calls.load(Ordering::SeqCst), 0);
    }
}
