pub mod fetcher;
pub mod heartbeat;
pub mod job;
pub mod normalize;
pub mod runner;

// Re-export common types
pub use fetcher::{FetchOutcome, HttpFetcher, PageFetcher};
pub use job::{CrawlJob, PageEntity, SnapshotStage, UrlOutcome, UrlQueueEntry};
pub use runner::{generate_worker_id, TickOutcome, Worker};
