//! Error types for SetuIO
//!
//! # Error Recovery Strategies
//!
//! Different error types require different recovery approaches:
//!
//! ## Transient Errors (Retry Recommended)
//!
//! - **`Io`**: TCP connect or stream error. A failed connect surfaces in the
//!   command result; the caller decides whether to retry with a new `start`.
//!
//! ## Protocol Errors (Session Terminated)
//!
//! - **`Protocol`**: The IMU endpoint violated the wire format (oversized
//!   payload, truncated frame). The session is closed and a disconnect event
//!   is published; a fresh `start` opens a new session.
//!
//! ## Pipeline Errors (Fail Fast to Caller)
//!
//! - **`PipelineStopped`**: Command submitted while the pipeline is not
//!   running. Callers get this immediately instead of queueing into nothing.
//! - **`DuplicateCorrelation`**: Two in-flight requests reused a correlation
//!   id. The second caller is rejected; the first request is unaffected.
//! - **`ExecuteTimeout`**: The caller's wait budget elapsed before the
//!   result was dispatched. The pending slot is withdrawn.
//!
//! ## Configuration Errors (Fix and Restart)
//!
//! - **`Config`**: Configuration file is missing, malformed, or fails
//!   validation.
//!
//! Handler-level failures (ownership violations, unknown command types,
//! connect refusals) are **not** expressed through this enum: the command
//! handler converts them into `ModelResult` values so the processing loop
//! never unwinds.

use thiserror::Error;

/// Errors that can occur in SetuIO
///
/// See module-level documentation for recovery strategies.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Command pipeline is not running")]
    PipelineStopped,

    #[error("Correlation id already pending: {0}")]
    DuplicateCorrelation(String),

    #[error("Command requires a correlation id")]
    MissingCorrelation,

    #[error("Timed out waiting for result of {0}")]
    ExecuteTimeout(String),

    #[error("Controller has no pipeline attached")]
    PipelineNotAttached,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Protocol("payload length 2000000 exceeds limit".to_string());
        assert_eq!(
            err.to_string(),
            "Protocol violation: payload length 2000000 exceeds limit"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
