pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use crate::crawler::job::{CrawlJob, PageEntity, SnapshotStage, UrlOutcome, UrlQueueEntry};
use crate::seo::actions::Action;
use crate::seo::extractor::SeoSignals;

// Re-export common types
pub use postgres::PostgresStore;

/// Transactional job and page store shared by all workers.
///
/// Cross-worker correctness lives entirely behind this trait: claims are
/// atomic (exactly one concurrent claimant wins), leases expire, and rescue
/// returns abandoned work to the queue. The worker holds no state of its
/// own beyond the heartbeat timer.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically claim the oldest queued job for this worker, if any
    async fn claim_next_job(&self, worker_id: &str) -> Result<Option<CrawlJob>>;

    /// Return jobs whose lease expired to the queue; yields the count rescued
    async fn rescue_stale_jobs(&self, lease_minutes: i64) -> Result<u64>;

    /// Mark a claimed job as running
    async fn start_job(&self, job_id: &str) -> Result<()>;

    /// Renew the lease on a held job
    async fn heartbeat(&self, job_id: &str, worker_id: &str) -> Result<()>;

    /// Record pipeline progress against the job's snapshot
    async fn set_snapshot_stage(&self, snapshot_id: &str, stage: SnapshotStage) -> Result<()>;

    /// Add URL entries to a job's fetch queue. `urls` holds the URLs as
    /// submitted and `normalized_urls` their storage forms, index-aligned;
    /// an already-enqueued normalized URL is kept as is
    async fn enqueue_urls(
        &self,
        job_id: &str,
        site_id: &str,
        snapshot_id: &str,
        urls: &[String],
        normalized_urls: &[String],
        depth: i32,
    ) -> Result<()>;

    /// Claim the next pending URL entry under a bounded lock
    async fn claim_next_url(
        &self,
        job_id: &str,
        worker_id: &str,
        lock_minutes: i64,
    ) -> Result<Option<UrlQueueEntry>>;

    /// Record the fetch outcome against a URL entry and release its lock
    async fn mark_url_result(&self, queue_id: &str, outcome: &UrlOutcome) -> Result<()>;

    /// Move a job to its terminal status, with the failure reason if any
    async fn complete_job(&self, job_id: &str, success: bool, error: Option<&str>) -> Result<()>;

    /// Find or create the page row for a normalized URL
    async fn upsert_page(&self, site_id: &str, url: &str) -> Result<PageEntity>;

    /// Write derived metrics for a page within a snapshot, replacing any
    /// previous row for the same pair
    async fn upsert_page_metrics(
        &self,
        snapshot_id: &str,
        page_id: &str,
        signals: &SeoSignals,
        depth: i32,
    ) -> Result<()>;

    /// Append recommended actions for a page; duplicates by action type are
    /// kept from the earlier write
    async fn insert_actions(
        &self,
        snapshot_id: &str,
        page_id: &str,
        actions: &[Action],
    ) -> Result<()>;
}
