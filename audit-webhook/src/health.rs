//! Process-wide health flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::error;

/// One-way healthy → degraded indicator.
///
/// Set by sink provisioning and by the delivery worker; read by `GET /up`.
/// Once degraded it stays degraded for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct HealthFlag {
    degraded: Arc<AtomicBool>,
}

impl HealthFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the process degraded. Logs only on the first transition.
    pub fn mark_degraded(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            error!(reason = %reason, "health_degraded");
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }
}
