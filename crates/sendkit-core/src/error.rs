use std::time::Duration;

use thiserror::Error;

use crate::codec::CodecError;
use crate::http_client::TransportError;

/// Validation and contract errors exposed by `sendkit-core`.
///
/// These are the only errors a sender returns as `Err`; every operational
/// failure is captured on the request unit instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("request path cannot be empty")]
    EmptyRequestPath,
    #[error("invalid method '{value}', expected one of GET, POST, PUT, DELETE")]
    InvalidMethod { value: String },
    #[error("invalid header '{value}', expected NAME:VALUE")]
    InvalidHeader { value: String },

    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("max_task_count must be at least 1")]
    ZeroTaskCount,

    #[error("failure_threshold must be at least 1")]
    ZeroFailureThreshold,
    #[error("timeout_ms must be at least 1")]
    ZeroTimeout,
    #[error("base_url must start with http:// or https://: '{value}'")]
    InvalidBaseUrl { value: String },
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnvValue { name: &'static str, value: String },
}

/// Operational failures captured into a request unit's error list.
///
/// The `Display` output is the error-list entry; [`PipelineError::status_code`]
/// is the status written to the unit alongside it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("decode error: {0}")]
    Decode(#[from] CodecError),
    #[error("circuit breaker is open; retry after {}ms", .retry_after.as_millis())]
    BreakerOpen { retry_after: Duration },
    #[error("request cancelled")]
    Cancelled,
    #[error("request rejected: {0}")]
    Rejected(#[from] ValidationError),
}

impl PipelineError {
    /// Status recorded on the unit when this failure is captured.
    ///
    /// Returns `None` when the failure happened after a real transport
    /// response and the transport status must be preserved.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport(error) => Some(error.status_hint()),
            Self::Status { status } => Some(*status),
            Self::Decode(_) => None,
            Self::BreakerOpen { .. } => Some(503),
            Self::Cancelled => Some(500),
            Self::Rejected(_) => Some(400),
        }
    }
}

/// Failure of a cache store operation. Never fatal to a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache entry for '{key}' could not be serialized: {message}")]
    Serialize { key: String, message: String },
    #[error("cache entry for '{key}' could not be deserialized: {message}")]
    Deserialize { key: String, message: String },
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Failure of one scheduled task. Other tasks in the run are unaffected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task {task_id} failed: {message}")]
    Failed { task_id: u32, message: String },
    #[error("task {task_id} panicked: {message}")]
    Panicked { task_id: u32, message: String },
    #[error("task {task_id} was aborted")]
    Aborted { task_id: u32 },
}

impl TaskError {
    pub const fn task_id(&self) -> u32 {
        match self {
            Self::Failed { task_id, .. }
            | Self::Panicked { task_id, .. }
            | Self::Aborted { task_id } => *task_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::TransportErrorKind;

    #[test]
    fn pipeline_errors_map_to_synthetic_statuses() {
        let timeout = PipelineError::from(TransportError::new(
            TransportErrorKind::Timeout,
            "deadline elapsed",
        ));
        assert_eq!(timeout.status_code(), Some(408));
        assert_eq!(timeout.to_string(), "transport error: timeout: deadline elapsed");

        let open = PipelineError::BreakerOpen {
            retry_after: Duration::from_millis(1500),
        };
        assert_eq!(open.status_code(), Some(503));
        assert_eq!(open.to_string(), "circuit breaker is open; retry after 1500ms");

        assert_eq!(PipelineError::Cancelled.status_code(), Some(500));
        assert_eq!(
            PipelineError::Decode(CodecError::EmptyInput).status_code(),
            None
        );
    }

    #[test]
    fn rejected_wraps_validation_message() {
        let error = PipelineError::from(ValidationError::EmptyRequestPath);
        assert_eq!(error.to_string(), "request rejected: request path cannot be empty");
    }
}
