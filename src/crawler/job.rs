use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// A crawl job claimed from the shared queue.
///
/// The job row is owned by the store; the worker only reads it and drives it
/// through `queued -> running -> completed | failed` via store calls.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CrawlJob {
    /// Unique identifier for the job
    pub id: String,

    /// Site this job crawls for
    pub site_id: String,

    /// Snapshot the derived metrics belong to
    pub snapshot_id: String,

    /// URL the crawl starts from, as submitted
    pub seed_url: String,

    /// Current status ("queued", "running", "completed", "failed")
    pub status: String,
}

/// One URL pending fetch within a job. In the current single-page scope at
/// most one entry exists per job: the seed at depth 0.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UrlQueueEntry {
    /// Unique identifier for the queue entry
    pub id: String,

    /// Job this entry belongs to
    pub job_id: String,

    /// URL to fetch
    pub url: String,

    /// Depth in the crawl tree (0 for the seed)
    pub depth: i32,
}

/// A page row, unique per (site_id, normalized URL). Created or reused on
/// first successful fetch, never deleted by the worker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PageEntity {
    /// Unique identifier for the page
    pub id: String,

    /// Site the page belongs to
    pub site_id: String,

    /// Normalized URL of the page
    pub url: String,
}

/// Pipeline stage labels recorded against the snapshot for observability.
/// Stages only ever move forward; a crash mid-job leaves the last stage as
/// an accurate partial-progress marker for the rescue pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStage {
    Discovering,
    Analyzing,
    Finalizing,
}

impl SnapshotStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStage::Discovering => "discovering",
            SnapshotStage::Analyzing => "analyzing",
            SnapshotStage::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for SnapshotStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch outcome recorded against a URL queue entry, success or failure.
/// Recorded unconditionally so an entry is never left claimed-but-unresolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlOutcome {
    /// Whether the fetch completed
    pub success: bool,

    /// HTTP status code, if a response was received
    pub http_status: Option<i32>,

    /// Content type of the response
    pub content_type: Option<String>,

    /// URL actually reached after redirects
    pub final_url: Option<String>,

    /// Canonical URL declared by the page, if any
    pub canonical_url: Option<String>,

    /// Error text for failed fetches
    pub error: Option<String>,
}
