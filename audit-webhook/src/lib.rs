//! Audit log webhook receiver.
//!
//! Accepts audit events over HTTP, validates them against a fixed schema and
//! relays accepted events to CloudWatch Logs from a single background worker.
//!
//! ## Architecture
//!
//! ```text
//! POST / → schema → DeliveryQueue → DeliveryWorker → SinkClient → CloudWatch Logs
//!                                         │
//! GET /up ← HealthFlag ←──────────────────┘ (on failure)
//! ```

pub mod config;
pub mod health;
pub mod queue;
pub mod schema;
pub mod shutdown;
pub mod sink;
pub mod web;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use health::HealthFlag;
pub use queue::{AuditEvent, DeliveryQueue, DeliveryRequest};
pub use schema::{validate_audit_log, SchemaViolation};
pub use sink::{CloudWatchLogs, LogSink, SinkClient, SinkError};
pub use web::{router, AppState};
pub use worker::{DeliveryWorker, DrainOutcome, WorkerHandle};
