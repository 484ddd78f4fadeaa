//! CloudWatch Logs client over the JSON 1.1 protocol.
//!
//! Each operation is a signed `POST /` with an `X-Amz-Target` header naming
//! the operation and a JSON body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::signature::{sign_request, Credentials, SigningParams, CONTENT_TYPE};
use super::{LogEvent, LogSink, SinkError};
use crate::Config;

const SERVICE: &str = "logs";
const TARGET_PREFIX: &str = "Logs_20140328";
const ALREADY_EXISTS: &str = "ResourceAlreadyExistsException";

/// HTTP client for the CloudWatch Logs API.
#[derive(Debug, Clone)]
pub struct CloudWatchLogs {
    client: Client,
    endpoint: Url,
    host: String,
    region: String,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<String>,
    rejected_log_events_info: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsResponse {
    #[serde(default)]
    log_streams: Vec<LogStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStream {
    upload_sequence_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

impl CloudWatchLogs {
    /// Create a client for `endpoint` (e.g. `https://logs.us-east-1.amazonaws.com`).
    pub fn new(
        endpoint: &str,
        region: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            SinkError::Configuration(format!("invalid endpoint {}: {}", endpoint, e))
        })?;

        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(SinkError::Configuration(format!(
                    "endpoint {} has no host",
                    endpoint
                )))
            }
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            host,
            region: region.into(),
            credentials,
        })
    }

    /// Create a client from application configuration.
    ///
    /// Fails when no static credentials are configured.
    pub fn from_config(config: &Config) -> Result<Self, SinkError> {
        let (access_key_id, secret_access_key) = match (
            config.aws_access_key_id.clone(),
            config.aws_secret_access_key.clone(),
        ) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(SinkError::Configuration(
                    "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set".to_string(),
                ))
            }
        };

        Self::new(
            &config.sink_endpoint(),
            config.region.clone(),
            Credentials {
                access_key_id,
                secret_access_key,
                session_token: config.aws_session_token.clone(),
            },
            config.sink_request_timeout,
        )
    }

    /// Invoke one API operation and decode its response.
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        body: Value,
    ) -> Result<T, SinkError> {
        let target = format!("{}.{}", TARGET_PREFIX, operation);
        let body = serde_json::to_vec(&body)
            .map_err(|e| SinkError::InvalidResponse(format!("failed to encode request: {}", e)))?;

        let signed = sign_request(
            &SigningParams {
                credentials: &self.credentials,
                region: &self.region,
                service: SERVICE,
                host: &self.host,
                target: &target,
            },
            &body,
            chrono::Utc::now(),
        );

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Date", &signed.amz_date)
            .header("X-Amz-Target", &target)
            .header("Authorization", &signed.authorization);

        if let Some(token) = &self.credentials.session_token {
            request = request.header("X-Amz-Security-Token", token);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        debug!(
            operation = operation,
            status = status.as_u16(),
            body_length = bytes.len(),
            "cloudwatch_response"
        );

        if !status.is_success() {
            return Err(service_error(status.as_u16(), &bytes));
        }

        // Some operations answer with an empty body
        let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes[..]
        };

        serde_json::from_slice(bytes).map_err(|e| SinkError::InvalidResponse(e.to_string()))
    }
}

/// Map an error response body to a [`SinkError`].
fn service_error(status: u16, body: &[u8]) -> SinkError {
    let parsed: Option<ErrorResponse> = serde_json::from_slice(body).ok();

    let (code, message) = match parsed {
        Some(err) if !err.error_type.is_empty() => {
            // "com.amazonaws.logs#ResourceAlreadyExistsException" → last segment
            let code = err
                .error_type
                .rsplit('#')
                .next()
                .unwrap_or(&err.error_type)
                .to_string();
            (code, err.message)
        }
        _ => (
            format!("HTTP{}", status),
            String::from_utf8_lossy(&body[..body.len().min(500)]).to_string(),
        ),
    };

    if code == ALREADY_EXISTS {
        SinkError::AlreadyExists(message)
    } else {
        SinkError::Service { code, message }
    }
}

#[async_trait]
impl LogSink for CloudWatchLogs {
    async fn create_log_group(&self, group: &str) -> Result<(), SinkError> {
        self.call::<Value>("CreateLogGroup", json!({ "logGroupName": group }))
            .await
            .map(|_| ())
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        self.call::<Value>(
            "CreateLogStream",
            json!({ "logGroupName": group, "logStreamName": stream }),
        )
        .await
        .map(|_| ())
    }

    async fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Option<String>, SinkError> {
        let response: DescribeLogStreamsResponse = self
            .call(
                "DescribeLogStreams",
                json!({ "logGroupName": group, "logStreamNamePrefix": prefix }),
            )
            .await?;

        Ok(response
            .log_streams
            .into_iter()
            .next()
            .and_then(|stream| stream.upload_sequence_token))
    }

    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<Option<String>, SinkError> {
        let mut body = json!({
            "logGroupName": group,
            "logStreamName": stream,
            "logEvents": events,
        });
        if let Some(token) = sequence_token {
            body["sequenceToken"] = json!(token);
        }

        let response: PutLogEventsResponse = self.call("PutLogEvents", body).await?;

        if let Some(rejected) = &response.rejected_log_events_info {
            warn!(rejected = %rejected, "cloudwatch_log_events_rejected");
        }

        Ok(response.next_sequence_token)
    }
}
