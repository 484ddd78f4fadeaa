//! Webhook and health endpoint handlers.
//!
//! The webhook handler only validates and enqueues; it never waits for the
//! entry to reach the log sink.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::health::HealthFlag;
use crate::queue::{AuditEvent, DeliveryQueue, DeliveryRequest};
use crate::schema::validate_audit_log;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub queue: DeliveryQueue,
    pub health: HealthFlag,
}

impl AppState {
    pub fn new(queue: DeliveryQueue, health: HealthFlag) -> Self {
        Self { queue, health }
    }
}

/// JSON body of every response.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

type Reply = (StatusCode, Json<ApiResponse>);

fn reply(
    code: StatusCode,
    status: &'static str,
    message: &'static str,
    detail: Option<String>,
) -> Reply {
    (
        code,
        Json(ApiResponse {
            status,
            message,
            detail,
        }),
    )
}

// =============================================================================
// Health Check
// =============================================================================

/// `GET /up`: 200 while healthy, 503 once the health flag is degraded.
pub async fn health_check(State(state): State<AppState>) -> Reply {
    if state.health.is_degraded() {
        reply(
            StatusCode::SERVICE_UNAVAILABLE,
            "error",
            "Audit log webhook server is experiencing issues, please examine logs",
            None,
        )
    } else {
        reply(
            StatusCode::OK,
            "ok",
            "Audit log webhook server is running",
            None,
        )
    }
}

// =============================================================================
// Audit Webhook
// =============================================================================

/// `POST /`: validate an audit event and queue it for delivery.
///
/// - 400 when the body is not JSON or violates the schema
/// - 503 when the server is shutting down
/// - 500 on unexpected errors
pub async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> Reply {
    info!(body_length = body.len(), "webhook_received");

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "webhook_invalid_json");
            return reply(
                StatusCode::BAD_REQUEST,
                "error",
                "Invalid JSON",
                Some(e.to_string()),
            );
        }
    };

    if let Err(violation) = validate_audit_log(&payload) {
        warn!(detail = %violation, "webhook_validation_failed");
        return reply(
            StatusCode::BAD_REQUEST,
            "error",
            "Invalid audit log format",
            Some(violation.to_string()),
        );
    }

    let event = match AuditEvent::from_value(payload.clone()) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "webhook_event_conversion_failed");
            return reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "error",
                "Server error",
                Some(e.to_string()),
            );
        }
    };

    info!(
        application = %event.application,
        userid = %event.userid,
        eventtype = ?event.eventtype,
        result = event.result,
        "webhook_validated"
    );

    match state.queue.push(DeliveryRequest::webhook(payload)) {
        Ok(queue_size) => info!(queue_size = queue_size, "delivery_enqueued"),
        Err(e) => {
            warn!(error = %e, "delivery_enqueue_rejected");
            return reply(
                StatusCode::SERVICE_UNAVAILABLE,
                "error",
                "Server is shutting down",
                None,
            );
        }
    }

    reply(
        StatusCode::OK,
        "success",
        "Webhook received and processed",
        None,
    )
}

/// Any other path or method.
pub async fn not_found() -> Reply {
    reply(StatusCode::NOT_FOUND, "error", "Not Found", None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::web::router;

    fn state() -> AppState {
        AppState::new(DeliveryQueue::new(), HealthFlag::new())
    }

    fn valid_event() -> Value {
        json!({
            "date": "2026-02-17 14:30:45.123 -0500",
            "application": "test.com",
            "ipaddr": "192.168.1.1",
            "userid": "user1",
            "result": true,
            "eventtype": "login",
            "message": {"detail": "test"}
        })
    }

    async fn send(state: &AppState, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();

        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn json_body(value: &Value) -> Body {
        Body::from(serde_json::to_vec(value).unwrap())
    }

    #[tokio::test]
    async fn test_valid_event_enqueued() {
        let state = state();
        let (status, body) = send(&state, "POST", "/", json_body(&valid_event())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "success", "message": "Webhook received and processed"})
        );
        assert_eq!(state.queue.len(), 1);

        let queued = state
            .queue
            .pop_timeout(std::time::Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(queued.message, "Webhook received");
        assert_eq!(queued.payload.unwrap(), valid_event());
    }

    #[tokio::test]
    async fn test_queued_payload_keeps_sender_key_order() {
        let state = state();
        let raw = concat!(
            r#"{"userid":"user1","message":{"detail":"test"},"eventtype":"login","#,
            r#""result":true,"ipaddr":"192.168.1.1","application":"test.com","#,
            r#""date":"2026-02-17 14:30:45.123 -0500"}"#
        );

        let (status, _) = send(&state, "POST", "/", Body::from(raw)).await;
        assert_eq!(status, StatusCode::OK);

        let queued = state
            .queue
            .pop_timeout(std::time::Duration::from_millis(10))
            .await
            .unwrap();
        let keys: Vec<&str> = queued
            .payload
            .as_ref()
            .and_then(Value::as_object)
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            keys,
            ["userid", "message", "eventtype", "result", "ipaddr", "application", "date"]
        );
        assert!(queued.render().starts_with("Webhook received\n{\n  \"userid\": \"user1\""));
    }

    #[tokio::test]
    async fn test_invalid_json_rejected_without_enqueue() {
        let state = state();
        let (status, body) = send(&state, "POST", "/", Body::from("{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Invalid JSON");
        assert!(body["detail"].as_str().is_some());
        assert_eq!(state.queue.len(), 0);
    }

    #[tokio::test]
    async fn test_schema_violation_rejected_with_detail() {
        let state = state();
        let mut event = valid_event();
        event.as_object_mut().unwrap().remove("userid");

        let (status, body) = send(&state, "POST", "/", json_body(&event)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid audit log format");
        assert!(body["detail"].as_str().unwrap().contains("userid"));
        assert_eq!(state.queue.len(), 0);
    }

    #[tokio::test]
    async fn test_validation_failure_does_not_affect_health() {
        let state = state();
        send(&state, "POST", "/", json_body(&json!({"eventtype": "logout"}))).await;
        assert!(!state.health.is_degraded());
    }

    #[tokio::test]
    async fn test_enqueue_after_close_is_unavailable() {
        let state = state();
        state.queue.close();

        let (status, body) = send(&state, "POST", "/", json_body(&valid_event())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Server is shutting down");
    }

    #[tokio::test]
    async fn test_health_check_reflects_flag_permanently() {
        let state = state();

        let (status, body) = send(&state, "GET", "/up", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "Audit log webhook server is running");

        state.health.mark_degraded("test");

        for _ in 0..3 {
            let (status, body) = send(&state, "GET", "/up", Body::empty()).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body["status"], "error");
        }
    }

    #[tokio::test]
    async fn test_unknown_routes_are_not_found() {
        let state = state();

        let routes = [
            ("GET", "/"),
            ("GET", "/health"),
            ("POST", "/up"),
            ("POST", "/events"),
            ("DELETE", "/"),
        ];
        for (method, uri) in routes {
            let (status, body) = send(&state, method, uri, Body::empty()).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
            assert_eq!(body["message"], "Not Found");
        }
        assert_eq!(state.queue.len(), 0);
    }
}
