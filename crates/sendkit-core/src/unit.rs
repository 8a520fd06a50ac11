//! Request unit: one request/response exchange and its outcome.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{PipelineError, ValidationError};
use crate::http_client::HttpMethod;

/// Bound satisfied by every response type a sender can decode and a cache can
/// store.
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Cache lifetime applied to units that don't set one.
pub const DEFAULT_CACHE_MINUTES: i64 = 1;

/// Mutable record carrying one request's parameters and its eventual outcome.
///
/// Identity (`request_id`, `request_path`, `method`) is fixed at construction;
/// result fields are filled in as the unit passes through senders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestUnit<T> {
    pub request_id: Uuid,
    pub request_path: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub request_body: Option<String>,
    pub response: Option<T>,
    pub status_code: u16,
    pub error_list: Vec<String>,
    pub elapsed_ms: u64,
    pub completed_at: Option<OffsetDateTime>,
    pub cache_duration_minutes: i64,
    pub retries: u32,
    pub iteration: u32,
}

impl<T> RequestUnit<T> {
    pub fn new(method: HttpMethod, request_path: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            request_path: request_path.into(),
            method,
            headers: BTreeMap::new(),
            request_body: None,
            response: None,
            status_code: 0,
            error_list: Vec::new(),
            elapsed_ms: 0,
            completed_at: None,
            cache_duration_minutes: DEFAULT_CACHE_MINUTES,
            retries: 0,
            iteration: 0,
        }
    }

    pub fn get(request_path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, request_path)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cache_minutes(mut self, minutes: i64) -> Self {
        self.cache_duration_minutes = minutes;
        self
    }

    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = iteration;
        self
    }

    /// Checks the fields a sender needs before touching the transport.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.request_path.trim().is_empty() {
            return Err(ValidationError::EmptyRequestPath);
        }
        Ok(())
    }

    pub fn caching_enabled(&self) -> bool {
        self.cache_duration_minutes > 0
    }

    /// Appends a captured failure and applies its status, if it carries one.
    pub fn record(&mut self, error: PipelineError) {
        if let Some(status) = error.status_code() {
            self.status_code = status;
        }
        self.error_list.push(error.to_string());
    }

    pub fn push_error(&mut self, entry: impl Into<String>) {
        self.error_list.push(entry.into());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error_list.last().map(String::as_str)
    }

    /// A populated response with a 2xx status is the only definition of success.
    pub fn is_success(&self) -> bool {
        self.response.is_some() && (200..300).contains(&self.status_code)
    }

    /// Age of a completed result relative to `now`; `None` before completion.
    pub fn result_age(&self, now: OffsetDateTime) -> Option<ResultAge> {
        self.completed_at
            .map(|completed_at| ResultAge::between(completed_at, now))
    }
}

/// Human-readable age of a completed result.
///
/// Any sub-second remainder rounds up to the next whole second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultAge {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl ResultAge {
    fn between(earlier: OffsetDateTime, later: OffsetDateTime) -> Self {
        let millis = (later - earlier).whole_milliseconds().max(0) as u64;
        let total_seconds = millis.div_ceil(1_000);

        Self {
            days: total_seconds / 86_400,
            hours: (total_seconds % 86_400) / 3_600,
            minutes: (total_seconds % 3_600) / 60,
            seconds: total_seconds % 60,
        }
    }
}

impl Display for ResultAge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} days, {} hours, {} minutes, {} seconds",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}
