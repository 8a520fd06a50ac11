//! Scripted in-memory transport shared by the behavior tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sendkit_core::{
    HttpRequest, HttpResponse, PipelineBuilder, PipelineConfig, RetrySettings, Transport,
    TransportError, TransportFuture,
};

pub type Reply = Result<HttpResponse, TransportError>;

/// Replays queued replies in call order, then repeats `fallback` forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn always(reply: Reply) -> Arc<Self> {
        Self::scripted(Vec::new(), reply)
    }

    pub fn scripted(script: Vec<Reply>, fallback: Reply) -> Arc<Self> {
        Arc::new(Self::build(script, fallback, Duration::ZERO))
    }

    /// Every call waits `delay` before answering.
    pub fn slow(delay: Duration, reply: Reply) -> Arc<Self> {
        Self::scripted_slow(Vec::new(), reply, delay)
    }

    pub fn scripted_slow(script: Vec<Reply>, fallback: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(script, fallback, delay))
    }

    fn build(script: Vec<Reply>, fallback: Reply, delay: Duration) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().expect("requests lock").push(request);
        let reply = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            reply
        })
    }
}

pub fn ok(body: &str) -> Reply {
    Ok(HttpResponse::ok_json(body))
}

pub fn status(code: u16) -> Reply {
    Ok(HttpResponse::new(code, ""))
}

pub fn timeout() -> Reply {
    Err(TransportError::timeout("deadline elapsed"))
}

pub fn refused() -> Reply {
    Err(TransportError::connect("connection refused"))
}

/// Base URL set, short fixed retry delay, everything else default.
pub fn config(max_retry_attempts: u32) -> PipelineConfig {
    PipelineConfig {
        base_url: Some(String::from("https://api.example.test")),
        retry: RetrySettings {
            max_retry_attempts,
            retry_delay_ms: 10,
            ..RetrySettings::default()
        },
        ..PipelineConfig::default()
    }
}

pub fn pipeline(
    config: PipelineConfig,
    transport: &Arc<ScriptedTransport>,
) -> sendkit_core::Pipeline {
    PipelineBuilder::new(config)
        .with_transport(Arc::clone(transport) as Arc<dyn Transport>)
        .build()
        .expect("valid pipeline config")
}
