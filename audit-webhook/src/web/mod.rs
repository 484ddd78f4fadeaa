//! Web server module for receiving audit webhooks.
//!
//! Routes:
//! - `POST /`: validate an audit event and enqueue it for delivery
//! - `GET /up`: health check backed by the process health flag
//!
//! Everything else answers 404.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health_check, not_found, receive_webhook, ApiResponse, AppState};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/up", get(health_check).fallback(not_found))
        .route("/", post(receive_webhook).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
