//! Sender contract and the transport-backed leaf sender.
//!
//! A [`Sender`] takes ownership of a [`RequestUnit`], performs one exchange
//! and hands the unit back with its result fields populated. Decorators in
//! [`crate::caching`], [`crate::resilience`] and [`crate::telemetry`] wrap any
//! sender and implement the same trait.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::codec::{Codec, JsonCodec};
use crate::error::{PipelineError, ValidationError};
use crate::http_client::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::unit::{Payload, RequestUnit};

pub type SendFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<RequestUnit<T>, ValidationError>> + Send + 'a>>;

/// Executes one request unit.
///
/// Operational failures (transport, timeout, non-2xx, decode, cancellation)
/// are captured on the returned unit. Only invalid input is returned as
/// `Err`.
pub trait Sender: Send + Sync {
    fn send<'a, T: Payload>(
        &'a self,
        unit: RequestUnit<T>,
        cancel: &'a CancellationToken,
    ) -> SendFuture<'a, T>;
}

impl<S: Sender> Sender for Arc<S> {
    fn send<'a, T: Payload>(
        &'a self,
        unit: RequestUnit<T>,
        cancel: &'a CancellationToken,
    ) -> SendFuture<'a, T> {
        (**self).send(unit, cancel)
    }
}

/// Leaf sender: validates, calls the transport, decodes the body.
#[derive(Clone)]
pub struct HttpSender<C = JsonCodec> {
    transport: Arc<dyn Transport>,
    codec: C,
    base_url: Option<String>,
    timeout_ms: u64,
}

impl HttpSender<JsonCodec> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            codec: JsonCodec::new(),
            base_url: None,
            timeout_ms: 3_000,
        }
    }
}

impl<C: Codec> HttpSender<C> {
    pub fn with_codec<N: Codec>(self, codec: N) -> HttpSender<N> {
        HttpSender {
            transport: self.transport,
            codec,
            base_url: self.base_url,
            timeout_ms: self.timeout_ms,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Absolute paths pass through; relative ones are joined to the base URL.
    pub fn resolve_url(&self, request_path: &str) -> String {
        let path = request_path.trim();
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path.to_string(),
        }
    }

    fn build_request<T>(&self, unit: &RequestUnit<T>) -> HttpRequest {
        let mut request = HttpRequest::new(unit.method, self.resolve_url(&unit.request_path))
            .with_timeout_ms(self.timeout_ms);
        request.headers = unit.headers.clone();
        request.body = unit.request_body.clone();
        request
    }

    fn apply_response<T: Payload>(&self, unit: &mut RequestUnit<T>, response: HttpResponse) {
        unit.status_code = response.status;

        if !response.is_success() {
            unit.record(PipelineError::Status {
                status: response.status,
            });
            return;
        }

        match self.codec.decode::<T>(&response.body) {
            Ok(payload) => unit.response = Some(payload),
            Err(codec_error) => {
                error!(
                    request_id = %unit.request_id,
                    path = %unit.request_path,
                    error = %codec_error,
                    "response body did not decode"
                );
                unit.record(PipelineError::Decode(codec_error));
            }
        }
    }

    fn apply_transport_error<T>(unit: &mut RequestUnit<T>, transport_error: TransportError) {
        error!(
            request_id = %unit.request_id,
            path = %unit.request_path,
            error = %transport_error,
            "transport call failed"
        );
        unit.record(PipelineError::Transport(transport_error));
    }
}

impl<C: Codec> Sender for HttpSender<C> {
    fn send<'a, T: Payload>(
        &'a self,
        mut unit: RequestUnit<T>,
        cancel: &'a CancellationToken,
    ) -> SendFuture<'a, T> {
        Box::pin(async move {
            unit.validate()?;

            if cancel.is_cancelled() {
                unit.record(PipelineError::Cancelled);
                return Ok(unit);
            }

            let request = self.build_request(&unit);
            debug!(
                request_id = %unit.request_id,
                method = %request.method,
                url = %request.url,
                "sending request"
            );

            let outcome = tokio::select! {
                outcome = self.transport.execute(request) => Some(outcome),
                _ = cancel.cancelled() => None,
            };

            match outcome {
                Some(Ok(response)) => self.apply_response(&mut unit, response),
                Some(Err(transport_error)) => Self::apply_transport_error(&mut unit, transport_error),
                None => unit.record(PipelineError::Cancelled),
            }

            Ok(unit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpMethod, TransportFuture};
    use std::sync::Mutex;

    struct RecordingTransport {
        response: Result<HttpResponse, TransportError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingTransport {
        fn returning(response: Result<HttpResponse, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl Transport for RecordingTransport {
        fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    #[tokio::test]
    async fn successful_exchange_decodes_payload() {
        let transport = RecordingTransport::returning(Ok(HttpResponse::ok_json("{\"a\":1}")));
        let sender = HttpSender::new(transport.clone()).with_base_url("https://api.example.test/");
        let unit = RequestUnit::<serde_json::Value>::get("/x").with_cache_minutes(0);

        let unit = sender
            .send(unit, &CancellationToken::new())
            .await
            .expect("valid unit");

        assert_eq!(unit.status_code, 200);
        assert_eq!(unit.response, Some(serde_json::json!({ "a": 1 })));
        assert!(unit.error_list.is_empty());
        assert_eq!(transport.recorded()[0].url, "https://api.example.test/x");
    }

    #[tokio::test]
    async fn body_and_headers_reach_the_transport() {
        let transport = RecordingTransport::returning(Ok(HttpResponse::new(201, "\"created\"")));
        let sender = HttpSender::new(transport.clone());
        let unit = RequestUnit::<String>::new(HttpMethod::Post, "https://api.example.test/items")
            .with_body("{\"name\":\"n\"}")
            .with_header("X-Trace", "t-1");

        let unit = sender.send(unit, &CancellationToken::new()).await.expect("valid unit");
        assert_eq!(unit.response.as_deref(), Some("created"));

        let request = &transport.recorded()[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some("{\"name\":\"n\"}"));
        assert_eq!(request.headers.get("x-trace").map(String::as_str), Some("t-1"));
    }

    #[tokio::test]
    async fn non_success_status_is_captured_without_decoding() {
        let transport = RecordingTransport::returning(Ok(HttpResponse::new(404, "not json")));
        let sender = HttpSender::new(transport);

        let unit = sender
            .send(RequestUnit::<serde_json::Value>::get("https://h.test/missing"), &CancellationToken::new())
            .await
            .expect("valid unit");

        assert_eq!(unit.status_code, 404);
        assert!(unit.response.is_none());
        assert_eq!(unit.error_list, vec![String::from("upstream returned status 404")]);
    }

    #[tokio::test]
    async fn decode_failure_keeps_transport_status() {
        let transport = RecordingTransport::returning(Ok(HttpResponse::ok_json("<html>")));
        let sender = HttpSender::new(transport);

        let unit = sender
            .send(RequestUnit::<serde_json::Value>::get("https://h.test/x"), &CancellationToken::new())
            .await
            .expect("valid unit");

        assert_eq!(unit.status_code, 200);
        assert!(unit.response.is_none());
        assert!(unit.error_list[0].starts_with("decode error:"));
    }

    #[tokio::test]
    async fn plain_text_body_fills_string_unit() {
        let transport = RecordingTransport::returning(Ok(HttpResponse::new(200, "hello world")));
        let sender = HttpSender::new(transport);

        let unit = sender
            .send(RequestUnit::<String>::get("https://h.test/greeting"), &CancellationToken::new())
            .await
            .expect("valid unit");

        assert_eq!(unit.status_code, 200);
        assert_eq!(unit.response.as_deref(), Some("hello world"));
        assert!(unit.error_list.is_empty());
        assert!(unit.is_success());
    }

    #[tokio::test]
    async fn transport_failure_sets_synthetic_status() {
        let transport = RecordingTransport::returning(Err(TransportError::connect("refused")));
        let sender = HttpSender::new(transport);

        let unit = sender
            .send(RequestUnit::<serde_json::Value>::get("https://h.test/x"), &CancellationToken::new())
            .await
            .expect("valid unit");

        assert_eq!(unit.status_code, 503);
        assert_eq!(
            unit.error_list,
            vec![String::from("transport error: connection failed: refused")]
        );
    }

    #[tokio::test]
    async fn empty_path_fails_fast_without_transport_call() {
        let transport = RecordingTransport::returning(Ok(HttpResponse::ok_json("{}")));
        let sender = HttpSender::new(transport.clone());

        let error = sender
            .send(RequestUnit::<serde_json::Value>::get(""), &CancellationToken::new())
            .await
            .expect_err("empty path is invalid");

        assert_eq!(error, ValidationError::EmptyRequestPath);
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let transport = RecordingTransport::returning(Ok(HttpResponse::ok_json("{}")));
        let sender = HttpSender::new(transport.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let unit = sender
            .send(RequestUnit::<serde_json::Value>::get("https://h.test/x"), &cancel)
            .await
            .expect("valid unit");

        assert_eq!(unit.status_code, 500);
        assert_eq!(unit.error_list, vec![String::from("request cancelled")]);
        assert!(transport.recorded().is_empty());
    }

    #[test]
    fn absolute_paths_ignore_base_url() {
        let sender = HttpSender::new(RecordingTransport::returning(Ok(HttpResponse::ok_json("{}"))))
            .with_base_url("https://base.test");

        assert_eq!(sender.resolve_url("http://other.test/a"), "http://other.test/a");
        assert_eq!(sender.resolve_url("a/b"), "https://base.test/a/b");
    }
}
