//! Stock decorator stack assembled from a [`PipelineConfig`].

use std::sync::Arc;

use crate::cache::{CacheStore, MemoryCache};
use crate::caching::CachingSender;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::PipelineConfig;
use crate::error::ValidationError;
use crate::http_client::{ReqwestTransport, Transport};
use crate::resilience::ResilientSender;
use crate::sender::HttpSender;
use crate::telemetry::TelemetrySender;

/// Telemetry → Caching → Resilient → Http.
///
/// Cache hits skip the breaker entirely and are still timed.
pub type Pipeline = TelemetrySender<CachingSender<ResilientSender<HttpSender>>>;

pub struct PipelineBuilder {
    config: PipelineConfig,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn CacheStore>>,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            transport: None,
            cache: None,
            breaker: None,
        }
    }

    /// Defaults to [`ReqwestTransport`].
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Defaults to a fresh [`MemoryCache`].
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Shares a breaker with other pipelines instead of creating one.
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn build(self) -> Result<Pipeline, ValidationError> {
        self.config.validate()?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let mut http = HttpSender::new(transport).with_timeout_ms(self.config.timeout_ms);
        if let Some(base_url) = &self.config.base_url {
            http = http.with_base_url(base_url.clone());
        }

        let breaker = self
            .breaker
            .unwrap_or_else(|| Arc::new(CircuitBreaker::new(self.config.breaker_config())));
        let resilient = ResilientSender::with_breaker(http, self.config.retry_config(), breaker);

        let cache = self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new()));
        let caching = CachingSender::with_store(resilient, cache).with_enabled(self.config.cache.enabled);

        Ok(TelemetrySender::new(caching))
    }
}
