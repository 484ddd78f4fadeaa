//! Remote log sink boundary.
//!
//! The sink is an append-only, sequenced log: a named group containing
//! streams, where each append may return an ordering token that must be
//! supplied on the next append to the same stream.
//!
//! - [`LogSink`]: the consumed API, implemented by [`CloudWatchLogs`] and by
//!   test stubs
//! - [`SinkClient`]: owns one destination stream and its ordering token

pub mod client;
pub mod cloudwatch;
pub mod signature;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use client::SinkClient;
pub use cloudwatch::CloudWatchLogs;
pub use signature::Credentials;

/// Errors returned by a [`LogSink`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The group or stream being created already exists.
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// The sink rejected the call (auth, throttling, bad ordering token, ...).
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// The call never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be understood.
    #[error("invalid sink response: {0}")]
    InvalidResponse(String),

    /// The client cannot be built from the given settings.
    #[error("sink misconfigured: {0}")]
    Configuration(String),
}

/// A single log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub message: String,
}

/// Append-only sequenced log API.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Create a log group. Fails with [`SinkError::AlreadyExists`] if present.
    async fn create_log_group(&self, group: &str) -> Result<(), SinkError>;

    /// Create a stream inside a group. Fails with [`SinkError::AlreadyExists`] if present.
    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError>;

    /// Current ordering token of the first stream whose name starts with `prefix`.
    async fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Option<String>, SinkError>;

    /// Append entries, returning the ordering token for the next append.
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<Option<String>, SinkError>;
}
