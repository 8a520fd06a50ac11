//! Typed convenience client over any [`Sender`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::codec::{Codec, JsonCodec};
use crate::http_client::HttpMethod;
use crate::sender::Sender;
use crate::unit::{Payload, RequestUnit};

/// Decoded content or the reason there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResponseContent<R> {
    Success { content: R, status: u16 },
    Failure { message: String, status: u16 },
}

impl<R> ResponseContent<R> {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub const fn status(&self) -> u16 {
        match self {
            Self::Success { status, .. } | Self::Failure { status, .. } => *status,
        }
    }

    pub fn content(&self) -> Option<&R> {
        match self {
            Self::Success { content, .. } => Some(content),
            Self::Failure { .. } => None,
        }
    }

    pub fn into_content(self) -> Option<R> {
        match self {
            Self::Success { content, .. } => Some(content),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }

    fn from_unit(unit: RequestUnit<R>) -> Self {
        let status = unit.status_code;
        let succeeded = (200..300).contains(&status);
        match unit.response {
            Some(content) if succeeded => Self::Success { content, status },
            _ => {
                let message = if unit.error_list.is_empty() {
                    String::from("request returned no content")
                } else {
                    unit.error_list.join("; ")
                };
                Self::Failure { message, status }
            }
        }
    }
}

/// GET/POST/PUT/DELETE helpers that encode payloads and unwrap the unit.
///
/// Caching is always disabled for calls made through this client.
#[derive(Debug, Clone)]
pub struct JsonClient<S, C = JsonCodec> {
    sender: S,
    codec: C,
}

impl<S: Sender> JsonClient<S, JsonCodec> {
    pub fn new(sender: S) -> Self {
        Self {
            sender,
            codec: JsonCodec::new(),
        }
    }
}

impl<S: Sender, C: Codec> JsonClient<S, C> {
    pub fn with_codec(sender: S, codec: C) -> Self {
        Self { sender, codec }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub async fn get<R: Payload>(&self, path: &str, cancel: &CancellationToken) -> ResponseContent<R> {
        self.execute(RequestUnit::new(HttpMethod::Get, path), cancel)
            .await
    }

    pub async fn delete<R: Payload>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> ResponseContent<R> {
        self.execute(RequestUnit::new(HttpMethod::Delete, path), cancel)
            .await
    }

    pub async fn post<P: Serialize, R: Payload>(
        &self,
        path: &str,
        payload: &P,
        cancel: &CancellationToken,
    ) -> ResponseContent<R> {
        self.post_with_headers(path, payload, &BTreeMap::new(), cancel)
            .await
    }

    pub async fn post_with_headers<P: Serialize, R: Payload>(
        &self,
        path: &str,
        payload: &P,
        headers: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> ResponseContent<R> {
        let unit = headers.iter().fold(
            RequestUnit::new(HttpMethod::Post, path),
            |unit, (name, value)| unit.with_header(name.as_str(), value.as_str()),
        );
        self.execute_with_payload(unit, payload, cancel).await
    }

    pub async fn put<P: Serialize, R: Payload>(
        &self,
        path: &str,
        payload: &P,
        cancel: &CancellationToken,
    ) -> ResponseContent<R> {
        self.execute_with_payload(RequestUnit::new(HttpMethod::Put, path), payload, cancel)
            .await
    }

    async fn execute_with_payload<P: Serialize, R: Payload>(
        &self,
        unit: RequestUnit<R>,
        payload: &P,
        cancel: &CancellationToken,
    ) -> ResponseContent<R> {
        match self.codec.encode(payload) {
            Ok(body) => self.execute(unit.with_body(body), cancel).await,
            Err(codec_error) => ResponseContent::Failure {
                message: codec_error.to_string(),
                status: 500,
            },
        }
    }

    async fn execute<R: Payload>(
        &self,
        unit: RequestUnit<R>,
        cancel: &CancellationToken,
    ) -> ResponseContent<R> {
        match self.sender.send(unit.with_cache_minutes(0), cancel).await {
            Ok(unit) => ResponseContent::from_unit(unit),
            Err(validation_error) => ResponseContent::Failure {
                message: validation_error.to_string(),
                status: 400,
            },
        }
    }
}
