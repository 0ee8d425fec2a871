use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::{thread_rng, Rng};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cli::config::WorkerSettings;
use crate::crawler::fetcher::{FetchOutcome, PageFetcher};
use crate::crawler::heartbeat::HeartbeatController;
use crate::crawler::job::{CrawlJob, SnapshotStage, UrlOutcome, UrlQueueEntry};
use crate::crawler::normalize::normalize;
use crate::seo::actions::generate_actions;
use crate::seo::extractor::{extract, SeoSignals};
use crate::storage::JobStore;
use crate::utils::metrics::WorkerMetrics;

/// Result of one iteration of the outer loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A job was claimed and driven to a terminal status
    Processed,
    /// No job was claimable
    Idle,
    /// An uncaught error ended the iteration; the caller should back off
    Backoff,
}

/// Build a unique worker identity from the host name and a random suffix
pub fn generate_worker_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());

    format!("{}-{}", host, Uuid::new_v4())
}

/// The job lifecycle state machine.
///
/// One worker runs one job at a time; concurrency across the fleet comes
/// entirely from the store's atomic claims. The loop is factored so that
/// `tick` performs exactly one iteration and reports what happened, and
/// `run` owns the sleeps. Tests drive `tick` directly and never wait.
pub struct Worker {
    store: Arc<dyn JobStore>,
    fetcher: Arc<dyn PageFetcher>,
    settings: WorkerSettings,
    worker_id: String,
    heartbeat: HeartbeatController,
    metrics: WorkerMetrics,
    iteration: u64,
}

impl Worker {
    pub fn new(
        store: Arc<dyn JobStore>,
        fetcher: Arc<dyn PageFetcher>,
        settings: WorkerSettings,
        worker_id: String,
    ) -> Self {
        let heartbeat = HeartbeatController::new(
            store.clone(),
            worker_id.clone(),
            Duration::from_secs(settings.heartbeat_interval_secs),
        );

        Self {
            store,
            fetcher,
            settings,
            worker_id,
            heartbeat,
            metrics: WorkerMetrics::new(),
            iteration: 0,
        }
    }

    /// Run until the process is killed. A per-job failure never exits.
    pub async fn run(&mut self) -> Result<()> {
        info!("Worker {} entering the claim loop", self.worker_id);

        loop {
            match self.tick().await {
                TickOutcome::Processed => {}
                TickOutcome::Idle => {
                    // Jittered so a fleet of workers does not poll in lockstep
                    let base = self.settings.poll_interval_ms;
                    let delay = {
                        let mut rng = thread_rng();
                        rng.gen_range(base * 3 / 4..=base * 5 / 4)
                    };
                    sleep(Duration::from_millis(delay)).await;
                }
                TickOutcome::Backoff => {
                    sleep(Duration::from_millis(self.settings.backoff_ms)).await;
                }
            }
        }
    }

    /// One iteration: rescue on cadence, claim, process.
    pub async fn tick(&mut self) -> TickOutcome {
        self.iteration += 1;

        if self.iteration % self.settings.rescue_every == 0 {
            self.run_rescue().await;
        }

        let job = match self.store.claim_next_job(&self.worker_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return TickOutcome::Idle,
            Err(e) => {
                error!("Failed to claim a job: {:#}", e);
                return TickOutcome::Backoff;
            }
        };

        info!("Claimed job {} (seed {})", job.id, job.seed_url);
        self.heartbeat.reset();
        self.heartbeat.maybe_heartbeat(&job.id).await;

        match self.process_job(&job).await {
            Ok(()) => TickOutcome::Processed,
            Err(e) => {
                error!("Job {} aborted: {:#}", job.id, e);
                TickOutcome::Backoff
            }
        }
    }

    /// Return abandoned jobs to the queue and log a progress summary
    async fn run_rescue(&mut self) {
        match self
            .store
            .rescue_stale_jobs(self.settings.job_lease_minutes)
            .await
        {
            Ok(0) => {}
            Ok(rescued) => {
                info!("Rescued {} stale job(s)", rescued);
                self.metrics.jobs_rescued += rescued;
            }
            Err(e) => warn!("Stale-job rescue failed: {:#}", e),
        }

        info!("Worker summary: {}", self.metrics.summary());
    }

    /// Drive a claimed job through its stages to a terminal status.
    ///
    /// A fetch failure is handled here (mark URL, fail job) and returns Ok;
    /// only errors that leave the job in an unknown state propagate to the
    /// tick boundary for backoff, where rescue eventually reclaims the job.
    async fn process_job(&mut self, job: &CrawlJob) -> Result<()> {
        self.store
            .start_job(&job.id)
            .await
            .context("Failed to mark job as running")?;
        self.heartbeat.maybe_heartbeat(&job.id).await;

        self.store
            .set_snapshot_stage(&job.snapshot_id, SnapshotStage::Discovering)
            .await?;
        self.heartbeat.maybe_heartbeat(&job.id).await;

        let seed = normalize(&job.seed_url);
        self.store
            .enqueue_urls(
                &job.id,
                &job.site_id,
                &job.snapshot_id,
                &[job.seed_url.clone()],
                &[seed],
                0,
            )
            .await?;
        self.heartbeat.maybe_heartbeat(&job.id).await;

        self.store
            .set_snapshot_stage(&job.snapshot_id, SnapshotStage::Analyzing)
            .await?;
        self.heartbeat.maybe_heartbeat(&job.id).await;

        let entry = self
            .store
            .claim_next_url(&job.id, &self.worker_id, self.settings.url_lock_minutes)
            .await?;

        let entry = match entry {
            Some(entry) => entry,
            None => {
                // An empty crawl is not an error
                debug!("Job {} has no claimable URL entry", job.id);
                self.store.complete_job(&job.id, true, None).await?;
                self.metrics.jobs_completed += 1;
                return Ok(());
            }
        };

        let outcome = self.fetcher.fetch(&entry.url).await;
        self.heartbeat.maybe_heartbeat(&job.id).await;
        self.metrics.urls_fetched += 1;

        if !outcome.is_ok() {
            return self.fail_fetched_job(job, &entry, &outcome).await;
        }

        if let Some(html) = &outcome.html {
            let signals = extract(html, &outcome.final_url);

            self.store
                .mark_url_result(&entry.id, &url_success(&outcome, &signals))
                .await?;
            self.heartbeat.maybe_heartbeat(&job.id).await;

            if let Err(e) = self.persist_analysis(job, &entry, &outcome, &signals).await {
                // The job must not stay running after a persistence failure;
                // record the failure best-effort, then surface the error.
                let reason = format!("{:#}", e);
                if let Err(complete_err) = self
                    .store
                    .complete_job(&job.id, false, Some(reason.as_str()))
                    .await
                {
                    warn!(
                        "Failed to record failure of job {}: {:#}",
                        job.id, complete_err
                    );
                }
                self.metrics.jobs_failed += 1;
                return Err(e);
            }
        } else {
            // Non-HTML target: the fetch is recorded, nothing to analyze
            debug!(
                "Job {} fetched a non-HTML resource ({:?})",
                job.id, outcome.content_type
            );
            self.store
                .mark_url_result(&entry.id, &url_skipped(&outcome))
                .await?;
            self.heartbeat.maybe_heartbeat(&job.id).await;
        }

        self.store
            .set_snapshot_stage(&job.snapshot_id, SnapshotStage::Finalizing)
            .await?;
        self.heartbeat.maybe_heartbeat(&job.id).await;

        self.store.complete_job(&job.id, true, None).await?;
        self.metrics.jobs_completed += 1;
        info!("Job {} completed", job.id);

        Ok(())
    }

    /// Record a failed fetch against the URL entry and fail the job.
    /// Handled entirely here; the loop proceeds without backoff.
    async fn fail_fetched_job(
        &mut self,
        job: &CrawlJob,
        entry: &UrlQueueEntry,
        outcome: &FetchOutcome,
    ) -> Result<()> {
        let error = outcome
            .error
            .clone()
            .unwrap_or_else(|| "fetch failed".to_string());

        self.metrics.fetch_failures += 1;

        self.store
            .mark_url_result(
                &entry.id,
                &UrlOutcome {
                    success: false,
                    http_status: outcome.status.map(i32::from),
                    content_type: outcome.content_type.clone(),
                    final_url: Some(outcome.final_url.clone()),
                    canonical_url: None,
                    error: Some(error.clone()),
                },
            )
            .await?;
        self.heartbeat.maybe_heartbeat(&job.id).await;

        self.store
            .complete_job(&job.id, false, Some(error.as_str()))
            .await?;
        self.metrics.jobs_failed += 1;
        warn!("Job {} failed: {}", job.id, error);

        Ok(())
    }

    /// Persist the derived signals: page row, metrics row, actions.
    /// Action insert failures are logged and swallowed; the first two are
    /// load-bearing and propagate.
    async fn persist_analysis(
        &mut self,
        job: &CrawlJob,
        entry: &UrlQueueEntry,
        outcome: &FetchOutcome,
        signals: &SeoSignals,
    ) -> Result<()> {
        let page = self
            .store
            .upsert_page(&job.site_id, &normalize(&outcome.final_url))
            .await
            .context("Failed to upsert page")?;
        self.heartbeat.maybe_heartbeat(&job.id).await;

        self.store
            .upsert_page_metrics(&job.snapshot_id, &page.id, signals, entry.depth)
            .await
            .context("Failed to upsert page metrics")?;
        self.heartbeat.maybe_heartbeat(&job.id).await;

        let actions = generate_actions(signals);
        if !actions.is_empty() {
            if let Err(e) = self
                .store
                .insert_actions(&job.snapshot_id, &page.id, &actions)
                .await
            {
                warn!("Failed to record actions for page {}: {:#}", page.id, e);
            }
        }
        self.heartbeat.maybe_heartbeat(&job.id).await;

        Ok(())
    }
}

fn url_success(outcome: &FetchOutcome, signals: &SeoSignals) -> UrlOutcome {
    UrlOutcome {
        success: true,
        http_status: outcome.status.map(i32::from),
        content_type: outcome.content_type.clone(),
        final_url: Some(outcome.final_url.clone()),
        canonical_url: signals.canonical_url.clone(),
        error: None,
    }
}

fn url_skipped(outcome: &FetchOutcome) -> UrlOutcome {
    UrlOutcome {
        success: true,
        http_status: outcome.status.map(i32::from),
        content_type: outcome.content_type.clone(),
        final_url: Some(outcome.final_url.clone()),
        canonical_url: None,
        error: None,
    }
}
