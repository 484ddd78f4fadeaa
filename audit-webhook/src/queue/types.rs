//! Message types carried by the delivery queue.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message attached to every accepted webhook delivery.
pub const WEBHOOK_RECEIVED: &str = "Webhook received";

// =============================================================================
// Audit Event
// =============================================================================

/// Kind of audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Login,
    PasswordChange,
    AclChange,
}

/// Free-form message block of an audit event.
///
/// Only `detail` is recognised; any other properties are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A validated audit event.
///
/// Built from a payload that already passed [`crate::schema::validate_audit_log`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditEvent {
    /// Timestamp as sent, `YYYY-MM-DD HH:MM:SS.mmm ±HHMM`
    pub date: String,
    pub application: String,
    /// Dotted-quad address as sent
    pub ipaddr: String,
    pub userid: String,
    /// Whether the audited action succeeded
    pub result: bool,
    pub eventtype: EventType,
    pub message: EventMessage,
}

impl AuditEvent {
    /// Convert a validated JSON payload into a typed event.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

// =============================================================================
// Delivery Request
// =============================================================================

/// One unit of work for the delivery worker.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    /// Human-readable message heading the log entry
    pub message: String,
    /// Validated payload as received, appended below the message
    pub payload: Option<Value>,
}

impl DeliveryRequest {
    pub fn new(message: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            message: message.into(),
            payload,
        }
    }

    /// Delivery request for an accepted webhook.
    ///
    /// Takes the payload that passed validation rather than the typed
    /// [`AuditEvent`], so the relayed record keeps the sender's key order.
    pub fn webhook(payload: Value) -> Self {
        Self::new(WEBHOOK_RECEIVED, Some(payload))
    }

    /// Render the log entry text: the message, then the payload as
    /// pretty-printed JSON on the following lines.
    pub fn render(&self) -> String {
        match &self.payload {
            Some(payload) => match serde_json::to_string_pretty(payload) {
                Ok(json) => format!("{}\n{}", self.message, json),
                Err(_) => self.message.clone(),
            },
            None => self.message.clone(),
        }
    }
}
