//! # Sendkit Core
//!
//! Resilient HTTP send pipeline and bounded-concurrency task scheduler.
//!
//! ## Overview
//!
//! - **Request units** carrying one exchange and its outcome
//! - **Senders** that capture operational failures on the unit instead of
//!   returning them
//! - **Decorators** for caching, retry with circuit breaking, and timing
//! - **Scheduler** running many units under a concurrency cap
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`batch`] | Request units as scheduler tasks |
//! | [`cache`] | Cache store trait and in-memory store |
//! | [`caching`] | Path-keyed caching decorator |
//! | [`circuit_breaker`] | Three-state breaker with single-probe half-open |
//! | [`client`] | Typed GET/POST/PUT/DELETE helpers |
//! | [`codec`] | Body encoding and decoding |
//! | [`config`] | Pipeline configuration and env overrides |
//! | [`error`] | Error types |
//! | [`http_client`] | Transport abstraction and reqwest transport |
//! | [`pipeline`] | Stock decorator stack |
//! | [`resilience`] | Retry then breaker decorator |
//! | [`retry`] | Retry budget and backoff |
//! | [`scheduler`] | Bounded-concurrency scheduler |
//! | [`sender`] | Sender trait and transport-backed sender |
//! | [`telemetry`] | Timing decorator |
//! | [`unit`] | Request unit |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sendkit_core::{PipelineBuilder, PipelineConfig, RequestUnit, Sender};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = PipelineBuilder::new(PipelineConfig::from_env()?).build()?;
//!
//!     let unit = RequestUnit::<serde_json::Value>::get("https://httpbin.org/json");
//!     let unit = pipeline.send(unit, &CancellationToken::new()).await?;
//!
//!     println!("{} in {}ms: {:?}", unit.status_code, unit.elapsed_ms, unit.error_list);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ TelemetrySender  │  elapsed_ms, completed_at
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ CachingSender    │────▶│ CacheStore       │
//! └────────┬─────────┘     └──────────────────┘
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ ResilientSender  │────▶│ CircuitBreaker   │
//! └────────┬─────────┘     └──────────────────┘
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ HttpSender       │────▶│ Transport        │
//! └──────────────────┘     │ (reqwest/mock)   │
//!                          └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Only invalid input is returned as `Err`. Everything else lands on the unit:
//!
//! ```rust
//! use sendkit_core::RequestUnit;
//!
//! fn report(unit: &RequestUnit<serde_json::Value>) {
//!     if unit.is_success() {
//!         println!("ok: {}", unit.status_code);
//!     } else {
//!         for entry in &unit.error_list {
//!             eprintln!("{}: {entry}", unit.status_code);
//!         }
//!     }
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod caching;
pub mod circuit_breaker;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http_client;
pub mod pipeline;
pub mod resilience;
pub mod retry;
pub mod scheduler;
pub mod sender;
pub mod telemetry;
pub mod unit;

// Request units and senders
pub use sender::{HttpSender, SendFuture, Sender};
pub use unit::{Payload, RequestUnit, ResultAge, DEFAULT_CACHE_MINUTES};

// Decorators
pub use caching::CachingSender;
pub use resilience::ResilientSender;
pub use telemetry::TelemetrySender;

// Circuit breaker
pub use circuit_breaker::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitState,
    Transition,
};

// Caching
pub use cache::{CacheFuture, CacheStore, MemoryCache};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Scheduling
pub use batch::{run_requests, RequestTask};
pub use scheduler::{ConcurrentScheduler, RunSummary, SchedulerConfig, TaskData, TaskModel, TaskStats};

// Client, codec, transport
pub use client::{JsonClient, ResponseContent};
pub use codec::{Codec, CodecError, JsonCodec};
pub use http_client::{
    HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError,
    TransportErrorKind, TransportFuture,
};

// Configuration
pub use config::{BreakerSettings, CacheSettings, PipelineConfig, RetrySettings};
pub use pipeline::{Pipeline, PipelineBuilder};

// Error types
pub use error::{CacheError, PipelineError, TaskError, ValidationError};
