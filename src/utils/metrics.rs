use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// In-process counters for one worker's lifetime.
///
/// Owned and mutated by the worker loop alone, so no locking is involved.
/// A summary line is logged on every rescue pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerMetrics {
    /// When this worker started counting
    pub started_at: DateTime<Utc>,

    /// Jobs driven to completed
    pub jobs_completed: u64,

    /// Jobs driven to failed
    pub jobs_failed: u64,

    /// Fetch attempts made
    pub urls_fetched: u64,

    /// Fetch attempts that ended in a transport failure
    pub fetch_failures: u64,

    /// Stale jobs returned to the queue by this worker's rescue passes
    pub jobs_rescued: u64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            jobs_completed: 0,
            jobs_failed: 0,
            urls_fetched: 0,
            fetch_failures: 0,
            jobs_rescued: 0,
        }
    }

    /// One-line summary for periodic logging
    pub fn summary(&self) -> String {
        let uptime_secs = (Utc::now() - self.started_at).num_seconds().max(0);
        format!(
            "uptime={}s completed={} failed={} fetched={} fetch_errors={} rescued={}",
            uptime_secs,
            self.jobs_completed,
            self.jobs_failed,
            self.urls_fetched,
            self.fetch_failures,
            self.jobs_rescued
        )
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
