//! Background delivery worker.
//!
//! A single task drains the [`DeliveryQueue`] and appends each entry to the
//! log sink, one at a time and in queue order, threading the ordering token
//! from one append to the next. Delivery is at-most-once: a failed append is
//! logged, degrades the health flag and is dropped.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::health::HealthFlag;
use crate::queue::{DeliveryQueue, DeliveryRequest};
use crate::sink::SinkClient;

/// Counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Entries appended to the sink
    pub delivered: u64,
    /// Entries whose append failed
    pub failed: u64,
    /// Entries discarded because no sink is available
    pub dropped: u64,
}

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The worker emptied the queue and stopped.
    Completed(DeliveryStats),
    /// The grace period ran out; `abandoned` entries were still queued.
    TimedOut { abandoned: usize },
    /// The worker task panicked.
    Crashed,
}

pub struct DeliveryWorker {
    queue: DeliveryQueue,
    sink: Option<SinkClient>,
    health: HealthFlag,
    poll_interval: Duration,
    stats: DeliveryStats,
}

impl DeliveryWorker {
    /// Create a worker. With `sink: None` every entry is popped and dropped.
    pub fn new(
        queue: DeliveryQueue,
        sink: Option<SinkClient>,
        health: HealthFlag,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            sink,
            health,
            poll_interval,
            stats: DeliveryStats::default(),
        }
    }

    /// Run the worker on its own task.
    pub fn spawn(self) -> WorkerHandle {
        let queue = self.queue.clone();
        let task = tokio::spawn(self.run());
        WorkerHandle { queue, task }
    }

    /// Process entries until the queue is closed and empty.
    pub async fn run(mut self) -> DeliveryStats {
        info!(
            sink_available = self.sink.is_some(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "delivery_worker_started"
        );

        loop {
            let Some(request) = self.queue.pop_timeout(self.poll_interval).await else {
                if self.queue.is_closed() && self.queue.is_empty() {
                    break;
                }
                continue;
            };

            self.deliver(request).await;
            self.queue.task_done();
        }

        info!(
            delivered = self.stats.delivered,
            failed = self.stats.failed,
            dropped = self.stats.dropped,
            "delivery_worker_stopped"
        );

        self.stats
    }

    async fn deliver(&mut self, request: DeliveryRequest) {
        let Some(sink) = self.sink.as_mut() else {
            debug!(message = %request.message, "delivery_dropped_no_sink");
            self.stats.dropped += 1;
            return;
        };

        info!(
            message = %request.message,
            queue_size = self.queue.len(),
            "delivery_processing"
        );

        let entry = request.render();
        let timestamp_ms = chrono::Utc::now().timestamp_millis();

        match sink.append(&entry, timestamp_ms).await {
            Ok(next_token) => {
                info!(
                    log_group = %sink.group(),
                    log_stream = %sink.stream(),
                    has_next_token = next_token.is_some(),
                    "delivery_succeeded"
                );
                self.stats.delivered += 1;
            }
            Err(e) => {
                error!(
                    log_group = %sink.group(),
                    log_stream = %sink.stream(),
                    error = %e,
                    "delivery_failed"
                );
                self.health.mark_degraded("log sink append failed");
                self.stats.failed += 1;
            }
        }
    }
}

/// Handle to a spawned [`DeliveryWorker`].
pub struct WorkerHandle {
    queue: DeliveryQueue,
    task: JoinHandle<DeliveryStats>,
}

impl WorkerHandle {
    /// Close the queue and give the worker `grace` to deliver what is left.
    ///
    /// Entries still queued when the grace period ends are abandoned.
    pub async fn drain(mut self, grace: Duration) -> DrainOutcome {
        self.queue.close();

        info!(
            queue_size = self.queue.len(),
            grace_period_ms = grace.as_millis() as u64,
            "delivery_worker_draining"
        );

        match timeout(grace, &mut self.task).await {
            Ok(Ok(stats)) => {
                info!("delivery_worker_drained");
                DrainOutcome::Completed(stats)
            }
            Ok(Err(e)) => {
                error!(error = %e, "delivery_worker_crashed");
                DrainOutcome::Crashed
            }
            Err(_) => {
                self.task.abort();
                let abandoned = self.queue.len();
                warn!(abandoned = abandoned, "delivery_worker_drain_timed_out");
                DrainOutcome::TimedOut { abandoned }
            }
        }
    }
}
