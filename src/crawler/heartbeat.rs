use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::storage::JobStore;

/// Rate-limited lease renewal for the currently-held job.
///
/// The worker calls `maybe_heartbeat` at every stage boundary; this
/// controller turns that into at most one store call per interval. The
/// timestamp advances on every send attempt, successful or not, so a
/// failing store is retried on the next interval rather than hammered at
/// every boundary.
pub struct HeartbeatController {
    store: Arc<dyn JobStore>,
    worker_id: String,
    interval: Duration,
    last_sent: Option<Instant>,
}

impl HeartbeatController {
    pub fn new(store: Arc<dyn JobStore>, worker_id: String, interval: Duration) -> Self {
        Self {
            store,
            worker_id,
            interval,
            last_sent: None,
        }
    }

    /// Forget the previous send time. Called when a new job is claimed so
    /// the first boundary of the new job renews the lease immediately.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }

    /// Renew the lease on `job_id` unless one was sent within the interval.
    ///
    /// Failures are logged and swallowed: a lost lease is recoverable via
    /// rescue, interrupting job progress is not.
    pub async fn maybe_heartbeat(&mut self, job_id: &str) {
        if let Some(last) = self.last_sent {
            if last.elapsed() < self.interval {
                return;
            }
        }

        self.last_sent = Some(Instant::now());

        if let Err(e) = self.store.heartbeat(job_id, &self.worker_id).await {
            warn!("Heartbeat for job {} failed: {:#}", job_id, e);
        }
    }
}
