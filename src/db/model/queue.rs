//! Durable polling job queue, backed by a plain table in the model
//! database. Workers lease rows with `SELECT ... FOR UPDATE SKIP LOCKED`
//! so concurrent pollers never contend for the same block, and a periodic
//! `sweep` reclaims jobs whose lease expired without a completion.

use anyhow::Context;
use chrono::{Duration, Utc};
use deadpool_postgres::Pool;
use uuid::Uuid;

use super::processing::{JobStatus, ProcessingJob};

#[derive(Clone)]
pub struct JobQueue {
    pool: Pool,
    lease_duration: Duration,
    max_attempts: i32,
}

impl JobQueue {
    pub fn new(pool: Pool, lease_seconds: i64, max_attempts: i32) -> Self {
        Self { pool, lease_duration: Duration::seconds(lease_seconds), max_attempts }
    }

    /// Insert one job per block number, skipping any already queued.
    pub async fn enqueue(&self, block_numbers: &[i64]) -> anyhow::Result<usize> {
        if block_numbers.is_empty() {
            return Ok(0);
        }
        let client = self.pool.get().await?;
        let mut inserted = 0usize;
        for block_number in block_numbers {
            let rows = client
                .execute(
                    "INSERT INTO processing_job (id, block_number, status, attempts, max_attempts, created_at) \
                     VALUES ($1, $2, $3, 0, $4, now()) \
                     ON CONFLICT (block_number) DO NOTHING",
                    &[&Uuid::new_v4(), block_number, &JobStatus::Pending.as_str(), &self.max_attempts],
                )
                .await
                .context("enqueue")?;
            inserted += rows as usize;
        }
        Ok(inserted)
    }

    /// Like `enqueue`, but resets an already-`done`/`failed` job back to
    /// `pending` instead of skipping it -- backs the CLI's `--force` flag
    /// for reprocessing blocks that already succeeded.
    pub async fn enqueue_forced(&self, block_numbers: &[i64]) -> anyhow::Result<usize> {
        if block_numbers.is_empty() {
            return Ok(0);
        }
        let client = self.pool.get().await?;
        let mut affected = 0usize;
        for block_number in block_numbers {
            let rows = client
                .execute(
                    "INSERT INTO processing_job (id, block_number, status, attempts, max_attempts, created_at) \
                     VALUES ($1, $2, $3, 0, $4, now()) \
                     ON CONFLICT (block_number) DO UPDATE SET \
                       status = $3, attempts = 0, leased_by = NULL, leased_until = NULL, last_error = NULL",
                    &[&Uuid::new_v4(), block_number, &JobStatus::Pending.as_str(), &self.max_attempts],
                )
                .await
                .context("enqueue_forced")?;
            affected += rows as usize;
        }
        Ok(affected)
    }

    /// Lease up to `limit` pending (or lease-expired) jobs for `worker_id`.
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers never pick the
    /// same row.
    pub async fn lease(&self, worker_id: &str, limit: i64) -> anyhow::Result<Vec<ProcessingJob>> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let rows = tx
            .query(
                "SELECT id, block_number, status, attempts, max_attempts, leased_by, leased_until, last_error, created_at \
                 FROM processing_job \
                 WHERE (status = $1) \
                    OR (status = $2 AND leased_until < now()) \
                 ORDER BY block_number ASC \
                 LIMIT $3 \
                 FOR UPDATE SKIP LOCKED",
                &[&JobStatus::Pending.as_str(), &JobStatus::Leased.as_str(), &limit],
            )
            .await
            .context("lease: select")?;

        let leased_until = Utc::now() + self.lease_duration;
        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.get(0);
            tx.execute(
                "UPDATE processing_job SET status = $1, leased_by = $2, leased_until = $3, \
                   attempts = attempts + 1 WHERE id = $4",
                &[&JobStatus::Leased.as_str(), &worker_id, &leased_until, &id],
            )
            .await
            .context("lease: update")?;

            jobs.push(ProcessingJob {
                id,
                block_number: row.get(1),
                status: JobStatus::Leased,
                attempts: row.get::<_, i32>(3) + 1,
                max_attempts: row.get(4),
                leased_by: Some(worker_id.to_string()),
                leased_until: Some(leased_until),
                last_error: row.get(7),
                created_at: row.get(8),
            });
        }

        tx.commit().await.context("lease: commit")?;
        Ok(jobs)
    }

    pub async fn complete(&self, job_id: Uuid) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE processing_job SET status = $1, leased_by = NULL, leased_until = NULL \
                 WHERE id = $2",
                &[&JobStatus::Done.as_str(), &job_id],
            )
            .await
            .context("complete")?;
        Ok(())
    }

    /// Record a failure. Re-queues for retry unless attempts have exhausted
    /// `max_attempts`, in which case the job is parked as `failed` for the
    /// `failed` CLI mode to surface.
    pub async fn fail(&self, job_id: Uuid, error: &str) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE processing_job SET \
                   status = CASE WHEN attempts >= max_attempts THEN $1 ELSE $2 END, \
                   leased_by = NULL, leased_until = NULL, last_error = $3 \
                 WHERE id = $4",
                &[&JobStatus::Failed.as_str(), &JobStatus::Pending.as_str(), &error, &job_id],
            )
            .await
            .context("fail")?;
        Ok(())
    }

    /// Count of jobs still `pending` or `leased` -- used by batch CLI modes
    /// to detect when the queue has fully drained.
    pub async fn pending_count(&self) -> anyhow::Result<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT count(*) FROM processing_job WHERE status = $1 OR status = $2",
                &[&JobStatus::Pending.as_str(), &JobStatus::Leased.as_str()],
            )
            .await
            .context("pending_count")?;
        Ok(row.get(0))
    }

    /// Reclaim leases that expired without a `complete`/`fail` call (crashed
    /// worker). Returns the number of jobs reclaimed.
    pub async fn sweep(&self) -> anyhow::Result<u64> {
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                "UPDATE processing_job SET status = $1, leased_by = NULL, leased_until = NULL \
                 WHERE status = $2 AND leased_until < now()",
                &[&JobStatus::Pending.as_str(), &JobStatus::Leased.as_str()],
            )
            .await
            .context("sweep")?;
        Ok(rows)
    }

    pub async fn failed_jobs(&self) -> anyhow::Result<Vec<ProcessingJob>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, block_number, status, attempts, max_attempts, leased_by, leased_until, last_error, created_at \
                 FROM processing_job WHERE status = $1 ORDER BY block_number ASC",
                &[&JobStatus::Failed.as_str()],
            )
            .await
            .context("failed_jobs")?;
        Ok(rows
            .into_iter()
            .map(|row| ProcessingJob {
                id: row.get(0),
                block_number: row.get(1),
                status: JobStatus::Failed,
                attempts: row.get(3),
                max_attempts: row.get(4),
                leased_by: row.get(5),
                leased_until: row.get(6),
                last_error: row.get(7),
                created_at: row.get(8),
            })
            .collect())
    }
}
