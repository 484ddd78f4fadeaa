//! Single-writer session to one log group/stream pair.

use std::sync::Arc;

use tracing::{error, info};

use super::{LogEvent, LogSink, SinkError};
use crate::health::HealthFlag;

/// Owns the destination stream and its ordering token.
///
/// Appends take `&mut self`, so whoever owns the client is the only writer of
/// the token. The token is replaced only after a successful append.
pub struct SinkClient {
    sink: Arc<dyn LogSink>,
    group: String,
    stream: String,
    sequence_token: Option<String>,
}

impl SinkClient {
    pub fn new(
        sink: Arc<dyn LogSink>,
        group: impl Into<String>,
        stream: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            group: group.into(),
            stream: stream.into(),
            sequence_token: None,
        }
    }

    /// Provision the destination, degrading `health` on failure.
    ///
    /// Returns `None` when the group or stream cannot be created; the caller
    /// keeps running without a sink.
    pub async fn provision(
        sink: Arc<dyn LogSink>,
        group: impl Into<String>,
        stream: impl Into<String>,
        health: &HealthFlag,
    ) -> Option<Self> {
        let mut client = Self::new(sink, group, stream);

        match client.ensure_destination().await {
            Ok(()) => {
                info!(
                    log_group = %client.group,
                    log_stream = %client.stream,
                    has_sequence_token = client.sequence_token.is_some(),
                    "sink_configured"
                );
                Some(client)
            }
            Err(e) => {
                error!(
                    log_group = %client.group,
                    log_stream = %client.stream,
                    error = %e,
                    "sink_setup_failed"
                );
                health.mark_degraded("log sink provisioning failed");
                None
            }
        }
    }

    /// Create the group and stream if absent. "Already exists" is success.
    ///
    /// When the stream already existed its current ordering token is adopted.
    pub async fn ensure_destination(&mut self) -> Result<(), SinkError> {
        match self.sink.create_log_group(&self.group).await {
            Ok(()) => info!(log_group = %self.group, "sink_log_group_created"),
            Err(SinkError::AlreadyExists(_)) => {
                info!(log_group = %self.group, "sink_log_group_exists")
            }
            Err(e) => return Err(e),
        }

        match self.sink.create_log_stream(&self.group, &self.stream).await {
            Ok(()) => info!(log_stream = %self.stream, "sink_log_stream_created"),
            Err(SinkError::AlreadyExists(_)) => {
                self.sequence_token = self
                    .sink
                    .describe_log_streams(&self.group, &self.stream)
                    .await?;
                info!(
                    log_stream = %self.stream,
                    has_sequence_token = self.sequence_token.is_some(),
                    "sink_log_stream_exists"
                );
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }

    /// Append one entry, threading the held ordering token.
    ///
    /// Returns the token that the next append will use. On error the held
    /// token is left untouched.
    pub async fn append(
        &mut self,
        message: &str,
        timestamp_ms: i64,
    ) -> Result<Option<String>, SinkError> {
        let events = [LogEvent {
            timestamp: timestamp_ms,
            message: message.to_string(),
        }];

        let next = self
            .sink
            .put_log_events(
                &self.group,
                &self.stream,
                &events,
                self.sequence_token.as_deref(),
            )
            .await?;

        self.sequence_token = next.clone();
        Ok(next)
    }

    pub fn sequence_token(&self) -> Option<&str> {
        self.sequence_token.as_deref()
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }
}
