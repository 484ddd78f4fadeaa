//! Configuration module for environment variable parsing.
//!
//! Every setting has a default so the server starts with an empty environment;
//! unparsable values are logged and replaced by the default.

use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the web server binds to
    pub host: IpAddr,

    /// Port for the web server to listen on
    pub port: u16,

    /// AWS region hosting the log group
    pub region: String,

    /// Optional CloudWatch Logs endpoint override (e.g. a local emulator)
    pub cloudwatch_endpoint: Option<String>,

    /// Destination log group
    pub log_group: String,

    /// Prefix of the date-suffixed log stream
    pub log_stream_prefix: String,

    /// How long the delivery worker waits on an empty queue before re-checking shutdown
    pub poll_interval: Duration,

    /// How long shutdown waits for the delivery worker to drain the queue
    pub shutdown_grace_period: Duration,

    /// Per-request timeout for calls to the log sink
    pub sink_request_timeout: Duration,

    // =========================================================================
    // Credentials
    // =========================================================================

    pub aws_access_key_id: Option<String>,

    pub aws_secret_access_key: Option<String>,

    pub aws_session_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        Config {
            host: parse_var("HOST", IpAddr::from([0, 0, 0, 0])),

            port: parse_var("PORT", 8080),

            cloudwatch_endpoint: non_empty_var("CLOUDWATCH_ENDPOINT"),

            region,

            log_group: env::var("LOG_GROUP_NAME").unwrap_or_else(|_| "appl_audit_log".to_string()),

            log_stream_prefix: env::var("LOG_STREAM_PREFIX")
                .unwrap_or_else(|_| "webhook".to_string()),

            poll_interval: Duration::from_millis(parse_var("DELIVERY_POLL_INTERVAL_MS", 500)),

            shutdown_grace_period: Duration::from_millis(parse_var(
                "SHUTDOWN_GRACE_PERIOD_MS",
                5000,
            )),

            sink_request_timeout: Duration::from_millis(parse_var(
                "SINK_REQUEST_TIMEOUT_MS",
                10_000,
            )),

            aws_access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),

            aws_secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),

            aws_session_token: non_empty_var("AWS_SESSION_TOKEN"),
        }
    }

    /// Endpoint of the CloudWatch Logs API, honouring the override.
    pub fn sink_endpoint(&self) -> String {
        self.cloudwatch_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://logs.{}.amazonaws.com", self.region))
    }

    /// Name of today's log stream, e.g. `webhook-2026-02-17`.
    pub fn log_stream_name(&self) -> String {
        format!(
            "{}-{}",
            self.log_stream_prefix,
            chrono::Local::now().format("%Y-%m-%d")
        )
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr,
{
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
