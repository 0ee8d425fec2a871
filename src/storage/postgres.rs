use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use tracing::debug;
use uuid::Uuid;

use crate::cli::config::StoreSettings;
use crate::crawler::job::{CrawlJob, PageEntity, SnapshotStage, UrlOutcome, UrlQueueEntry};
use crate::seo::actions::Action;
use crate::seo::extractor::SeoSignals;
use crate::storage::JobStore;

/// PostgreSQL implementation of the job store.
///
/// Claims use `FOR UPDATE SKIP LOCKED` so concurrent workers never block on
/// each other; a contended row is simply invisible to the losers. Leases are
/// plain timestamp columns compared against `now()`, so no server-side jobs
/// are needed to expire them.
pub struct PostgresStore {
    /// PostgreSQL connection pool
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Connect to the store and make sure the schema exists
    pub async fn connect(settings: &StoreSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.database_url)
            .await
            .context("Failed to connect to PostgreSQL job store")?;

        let store = Self { pool };
        store.ensure_schema().await?;

        debug!("Connected to PostgreSQL job store");

        Ok(store)
    }

    /// Create the worker-facing tables if they do not exist yet.
    /// Production deployments migrate these ahead of time; this keeps a
    /// fresh development database usable without a separate step.
    async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS crawl_jobs (
                id TEXT PRIMARY KEY,
                site_id TEXT NOT NULL,
                snapshot_id TEXT NOT NULL,
                seed_url TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                claimed_by TEXT,
                heartbeat_at TIMESTAMPTZ,
                error TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                stage TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE TABLE IF NOT EXISTS url_queue (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL,
                site_id TEXT NOT NULL,
                snapshot_id TEXT NOT NULL,
                source_url TEXT NOT NULL,
                url TEXT NOT NULL,
                depth INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                locked_by TEXT,
                locked_until TIMESTAMPTZ,
                http_status INTEGER,
                content_type TEXT,
                final_url TEXT,
                canonical_url TEXT,
                error TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (job_id, url)
            )",
            "CREATE TABLE IF NOT EXISTS pages (
                id TEXT PRIMARY KEY,
                site_id TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (site_id, url)
            )",
            "CREATE TABLE IF NOT EXISTS page_snapshot_metrics (
                snapshot_id TEXT NOT NULL,
                page_id TEXT NOT NULL,
                has_title BOOLEAN NOT NULL,
                has_meta_description BOOLEAN NOT NULL,
                has_h1 BOOLEAN NOT NULL,
                h1_count INTEGER NOT NULL,
                indexable BOOLEAN NOT NULL,
                canonical_ok BOOLEAN NOT NULL,
                canonical_url TEXT,
                schema_types JSONB NOT NULL DEFAULT '[]',
                structural_score INTEGER NOT NULL,
                depth INTEGER NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (snapshot_id, page_id)
            )",
            "CREATE TABLE IF NOT EXISTS actions (
                id TEXT PRIMARY KEY,
                snapshot_id TEXT NOT NULL,
                page_id TEXT NOT NULL,
                action_type TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                severity TEXT NOT NULL,
                priority TEXT NOT NULL,
                steps JSONB NOT NULL DEFAULT '[]',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (snapshot_id, page_id, action_type)
            )",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to ensure job store schema")?;
        }

        debug!("Ensured job store schema exists");

        Ok(())
    }
}

#[async_trait]
impl JobStore for PostgresStore {
    async fn claim_next_job(&self, worker_id: &str) -> Result<Option<CrawlJob>> {
        // The subquery picks the oldest claimable row; SKIP LOCKED makes
        // concurrent claimants pick different rows instead of waiting.
        let query = "UPDATE crawl_jobs
             SET claimed_by = $1, heartbeat_at = NOW(), updated_at = NOW()
             WHERE id = (
                 SELECT id FROM crawl_jobs
                 WHERE status = 'queued' AND claimed_by IS NULL
                 ORDER BY created_at
                 FOR UPDATE SKIP LOCKED
                 LIMIT 1
             )
             RETURNING id, site_id, snapshot_id, seed_url, status";

        let job = sqlx::query_as::<_, CrawlJob>(query)
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to claim next job")?;

        if let Some(job) = &job {
            debug!("Claimed job {} for site {}", job.id, job.site_id);
        }

        Ok(job)
    }

    async fn rescue_stale_jobs(&self, lease_minutes: i64) -> Result<u64> {
        // Release expired URL locks first so a rescued job finds its entry
        // claimable again.
        sqlx::query(
            "UPDATE url_queue
             SET locked_by = NULL, locked_until = NULL, updated_at = NOW()
             WHERE status = 'pending'
               AND locked_until IS NOT NULL
               AND locked_until < NOW()",
        )
        .execute(&self.pool)
        .await
        .context("Failed to release expired URL locks")?;

        let query = "UPDATE crawl_jobs
             SET claimed_by = NULL, status = 'queued', updated_at = NOW()
             WHERE status IN ('queued', 'running')
               AND claimed_by IS NOT NULL
               AND heartbeat_at < NOW() - make_interval(mins => $1)";

        let result = sqlx::query(query)
            .bind(lease_minutes as i32)
            .execute(&self.pool)
            .await
            .context("Failed to rescue stale jobs")?;

        Ok(result.rows_affected())
    }

    async fn start_job(&self, job_id: &str) -> Result<()> {
        sqlx::query("UPDATE crawl_jobs SET status = 'running', updated_at = NOW() WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .context("Failed to mark job as running")?;

        Ok(())
    }

    async fn heartbeat(&self, job_id: &str, worker_id: &str) -> Result<()> {
        // Scoped to the current holder so a rescued-and-reclaimed job is not
        // revived by a worker that lost its lease.
        sqlx::query(
            "UPDATE crawl_jobs SET heartbeat_at = NOW()
             WHERE id = $1 AND claimed_by = $2",
        )
        .bind(job_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .context("Failed to send heartbeat")?;

        Ok(())
    }

    async fn set_snapshot_stage(&self, snapshot_id: &str, stage: SnapshotStage) -> Result<()> {
        sqlx::query(
            "INSERT INTO snapshots (id, stage, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (id) DO UPDATE SET stage = $2, updated_at = NOW()",
        )
        .bind(snapshot_id)
        .bind(stage.as_str())
        .execute(&self.pool)
        .await
        .context(format!("Failed to set snapshot stage to {}", stage))?;

        debug!("Snapshot {} entered stage {}", snapshot_id, stage);

        Ok(())
    }

    async fn enqueue_urls(
        &self,
        job_id: &str,
        site_id: &str,
        snapshot_id: &str,
        urls: &[String],
        normalized_urls: &[String],
        depth: i32,
    ) -> Result<()> {
        // The normalized form is what gets fetched and deduplicated on;
        // the submitted form is kept for traceability.
        for (url, normalized) in urls.iter().zip(normalized_urls) {
            sqlx::query(
                "INSERT INTO url_queue (id, job_id, site_id, snapshot_id, source_url, url, depth)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (job_id, url) DO NOTHING",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(job_id)
            .bind(site_id)
            .bind(snapshot_id)
            .bind(url)
            .bind(normalized)
            .bind(depth)
            .execute(&self.pool)
            .await
            .context(format!("Failed to enqueue URL: {}", normalized))?;
        }

        debug!("Enqueued {} URL(s) for job {}", urls.len(), job_id);

        Ok(())
    }

    async fn claim_next_url(
        &self,
        job_id: &str,
        worker_id: &str,
        lock_minutes: i64,
    ) -> Result<Option<UrlQueueEntry>> {
        let query = "UPDATE url_queue
             SET locked_by = $2,
                 locked_until = NOW() + make_interval(mins => $3),
                 updated_at = NOW()
             WHERE id = (
                 SELECT id FROM url_queue
                 WHERE job_id = $1
                   AND status = 'pending'
                   AND (locked_until IS NULL OR locked_until < NOW())
                 ORDER BY depth, created_at
                 FOR UPDATE SKIP LOCKED
                 LIMIT 1
             )
             RETURNING id, job_id, url, depth";

        let entry = sqlx::query_as::<_, UrlQueueEntry>(query)
            .bind(job_id)
            .bind(worker_id)
            .bind(lock_minutes as i32)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to claim next URL entry")?;

        Ok(entry)
    }

    async fn mark_url_result(&self, queue_id: &str, outcome: &UrlOutcome) -> Result<()> {
        let status = if outcome.success { "completed" } else { "failed" };

        sqlx::query(
            "UPDATE url_queue
             SET status = $2,
                 http_status = $3,
                 content_type = $4,
                 final_url = $5,
                 canonical_url = $6,
                 error = $7,
                 locked_until = NULL,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(queue_id)
        .bind(status)
        .bind(outcome.http_status)
        .bind(&outcome.content_type)
        .bind(&outcome.final_url)
        .bind(&outcome.canonical_url)
        .bind(&outcome.error)
        .execute(&self.pool)
        .await
        .context("Failed to record URL fetch outcome")?;

        Ok(())
    }

    async fn complete_job(&self, job_id: &str, success: bool, error: Option<&str>) -> Result<()> {
        let status = if success { "completed" } else { "failed" };

        sqlx::query(
            "UPDATE crawl_jobs
             SET status = $2, error = $3, claimed_by = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(status)
        .bind(error)
        .execute(&self.pool)
        .await
        .context(format!("Failed to mark job as {}", status))?;

        debug!("Job {} finished with status {}", job_id, status);

        Ok(())
    }

    async fn upsert_page(&self, site_id: &str, url: &str) -> Result<PageEntity> {
        // The no-op DO UPDATE makes RETURNING yield the existing row on
        // conflict instead of returning nothing.
        let query = "INSERT INTO pages (id, site_id, url)
             VALUES ($1, $2, $3)
             ON CONFLICT (site_id, url) DO UPDATE SET url = EXCLUDED.url
             RETURNING id, site_id, url";

        let page = sqlx::query_as::<_, PageEntity>(query)
            .bind(Uuid::new_v4().to_string())
            .bind(site_id)
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .context(format!("Failed to upsert page: {}", url))?;

        Ok(page)
    }

    async fn upsert_page_metrics(
        &self,
        snapshot_id: &str,
        page_id: &str,
        signals: &SeoSignals,
        depth: i32,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO page_snapshot_metrics (
                 snapshot_id, page_id, has_title, has_meta_description, has_h1,
                 h1_count, indexable, canonical_ok, canonical_url, schema_types,
                 structural_score, depth, updated_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
             ON CONFLICT (snapshot_id, page_id) DO UPDATE SET
                 has_title = $3,
                 has_meta_description = $4,
                 has_h1 = $5,
                 h1_count = $6,
                 indexable = $7,
                 canonical_ok = $8,
                 canonical_url = $9,
                 schema_types = $10,
                 structural_score = $11,
                 depth = $12,
                 updated_at = NOW()",
        )
        .bind(snapshot_id)
        .bind(page_id)
        .bind(signals.has_title)
        .bind(signals.has_meta_description)
        .bind(signals.has_h1)
        .bind(signals.h1_count as i32)
        .bind(signals.indexable)
        .bind(signals.canonical_ok)
        .bind(&signals.canonical_url)
        .bind(Json(&signals.schema_types))
        .bind(signals.structural_score)
        .bind(depth)
        .execute(&self.pool)
        .await
        .context("Failed to upsert page metrics")?;

        debug!(
            "Stored metrics for page {} in snapshot {} (score {})",
            page_id, snapshot_id, signals.structural_score
        );

        Ok(())
    }

    async fn insert_actions(
        &self,
        snapshot_id: &str,
        page_id: &str,
        actions: &[Action],
    ) -> Result<()> {
        for action in actions {
            sqlx::query(
                "INSERT INTO actions (
                     id, snapshot_id, page_id, action_type, title, description,
                     severity, priority, steps
                 )
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (snapshot_id, page_id, action_type) DO NOTHING",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(snapshot_id)
            .bind(page_id)
            .bind(&action.action_type)
            .bind(&action.title)
            .bind(&action.description)
            .bind(action.severity.as_str())
            .bind(action.priority.as_str())
            .bind(Json(&action.steps))
            .execute(&self.pool)
            .await
            .context(format!("Failed to insert action: {}", action.action_type))?;
        }

        Ok(())
    }
}
