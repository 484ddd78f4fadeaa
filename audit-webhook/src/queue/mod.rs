//! Delivery queue decoupling webhook handling from the log sink.
//!
//! ## Architecture
//!
//! ```text
//! POST / → validate → DeliveryQueue → DeliveryWorker → CloudWatch Logs
//! ```

pub mod delivery;
pub mod types;

pub use delivery::{DeliveryQueue, QueueError};
pub use types::{AuditEvent, DeliveryRequest, EventMessage, EventType, WEBHOOK_RECEIVED};
