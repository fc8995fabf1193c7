/*!
 * Repository layer for the job store.
 *
 * Every state change is a single guarded UPDATE (or a transaction), so two
 * workers can never hold the same job and a worker that lost its job to a
 * reclaim cannot overwrite the new owner's state.
 */

use anyhow::Result;
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use super::connection::DatabaseConnection;
use super::models::{now_timestamp, JobInput, JobRecord, JobStats, JobStatus};

const JOB_COLUMNS: &str = "id, status, progress, input_kind, input_ref, input_hash, target_language, \
     source_language, tier, preserve_formatting, chunk_options, result, failure_reason, attempts, \
     max_attempts, worker_id, available_at, created_at, updated_at, started_at, finished_at";

/// Jobs moved by one reclaim sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimSummary {
    pub requeued: usize,
    pub failed: usize,
}

/// Repository for job store operations
#[derive(Clone, Debug)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Hex SHA-256 fingerprint of a document
    pub fn hash_text(text: &str) -> String {
        Self::hash_bytes(text.as_bytes())
    }

    pub fn hash_bytes(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    pub async fn insert_job(&self, job: &JobRecord) -> Result<()> {
        let job = job.clone();
        let chunk_options = job.chunk_options.as_ref().map(serde_json::to_string).transpose()?;

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO jobs (
                        id, status, progress, input_kind, input_ref, input_hash, target_language,
                        source_language, tier, preserve_formatting, chunk_options, result, failure_reason,
                        attempts, max_attempts, worker_id, available_at, created_at, updated_at,
                        started_at, finished_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
                    "#,
                    params![
                        job.id,
                        job.status.to_string(),
                        job.progress,
                        job.input.kind(),
                        job.input.reference(),
                        job.input_hash,
                        job.target_language,
                        job.source_language,
                        job.tier.as_str(),
                        job.preserve_formatting,
                        chunk_options,
                        job.result,
                        job.failure_reason,
                        job.attempts,
                        job.max_attempts,
                        job.worker_id,
                        job.available_at,
                        job.created_at,
                        job.updated_at,
                        job.started_at,
                        job.finished_at,
                    ],
                )?;
                debug!("Inserted job {} ({} tier)", job.id, job.tier);
                Ok(())
            })
            .await
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<JobRecord>> {
        let id = id.to_string();
        self.db.execute_async(move |conn| Self::get_job_sync(conn, &id)).await
    }

    /// Get a job by id (synchronous version for use within transactions)
    fn get_job_sync(conn: &Connection, id: &str) -> Result<Option<JobRecord>> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS);
        let job = conn.query_row(&sql, [id], parse_job_row).optional()?;
        Ok(job)
    }

    /// Most recently created jobs, optionally filtered by status
    pub async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<JobRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut jobs = Vec::new();
                match status {
                    Some(status) => {
                        let sql = format!(
                            "SELECT {} FROM jobs WHERE status = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                            JOB_COLUMNS
                        );
                        let mut stmt = conn.prepare(&sql)?;
                        let rows = stmt.query_map(params![status.to_string(), limit as i64], parse_job_row)?;
                        for row in rows {
                            jobs.push(row?);
                        }
                    }
                    None => {
                        let sql = format!(
                            "SELECT {} FROM jobs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                            JOB_COLUMNS
                        );
                        let mut stmt = conn.prepare(&sql)?;
                        let rows = stmt.query_map(params![limit as i64], parse_job_row)?;
                        for row in rows {
                            jobs.push(row?);
                        }
                    }
                }
                Ok(jobs)
            })
            .await
    }

    /// Atomically take the oldest claimable job.
    ///
    /// Claiming marks the job active, counts the attempt and resets its
    /// progress, since every attempt starts from scratch.
    pub async fn claim_next(&self, worker_id: &str) -> Result<Option<JobRecord>> {
        let worker_id = worker_id.to_string();

        self.db
            .transaction_async(move |tx| {
                let now = now_timestamp();
                let candidate: Option<String> = tx
                    .query_row(
                        r#"
                        SELECT id FROM jobs
                        WHERE status = 'queued' AND available_at <= ?1
                        ORDER BY created_at ASC, rowid ASC
                        LIMIT 1
                        "#,
                        [&now],
                        |row| row.get(0),
                    )
                    .optional()?;

                let Some(id) = candidate else {
                    return Ok(None);
                };

                tx.execute(
                    r#"
                    UPDATE jobs
                    SET status = 'active', attempts = attempts + 1, progress = 0, worker_id = ?1,
                        started_at = ?2, updated_at = ?2, finished_at = NULL
                    WHERE id = ?3 AND status = 'queued'
                    "#,
                    params![worker_id, now, id],
                )?;

                Self::get_job_sync(tx, &id)
            })
            .await
    }

    /// Raise an active job's progress; lower values are ignored.
    ///
    /// Returns false when the job is no longer active for this worker.
    pub async fn update_progress(&self, id: &str, worker_id: &str, progress: u8) -> Result<bool> {
        let id = id.to_string();
        let worker_id = worker_id.to_string();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE jobs
                    SET progress = MIN(100, MAX(progress, ?1)), updated_at = ?2
                    WHERE id = ?3 AND worker_id = ?4 AND status = 'active'
                    "#,
                    params![progress, now_timestamp(), id, worker_id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Store the result of an active job and mark it completed
    pub async fn complete(&self, id: &str, worker_id: &str, result: String) -> Result<bool> {
        let id = id.to_string();
        let worker_id = worker_id.to_string();

        self.db
            .execute_async(move |conn| {
                let now = now_timestamp();
                let changed = conn.execute(
                    r#"
                    UPDATE jobs
                    SET status = 'completed', progress = 100, result = ?1, failure_reason = NULL,
                        worker_id = NULL, finished_at = ?2, updated_at = ?2
                    WHERE id = ?3 AND worker_id = ?4 AND status = 'active'
                    "#,
                    params![result, now, id, worker_id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Put an active job back in the queue, claimable from `available_at`
    pub async fn requeue(&self, id: &str, worker_id: &str, reason: &str, available_at: String) -> Result<bool> {
        let id = id.to_string();
        let worker_id = worker_id.to_string();
        let reason = reason.to_string();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE jobs
                    SET status = 'queued', failure_reason = ?1, worker_id = NULL,
                        available_at = ?2, updated_at = ?3
                    WHERE id = ?4 AND worker_id = ?5 AND status = 'active'
                    "#,
                    params![reason, available_at, now_timestamp(), id, worker_id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Terminally fail an active job
    pub async fn mark_failed(&self, id: &str, worker_id: &str, reason: &str) -> Result<bool> {
        let id = id.to_string();
        let worker_id = worker_id.to_string();
        let reason = reason.to_string();

        self.db
            .execute_async(move |conn| {
                let now = now_timestamp();
                let changed = conn.execute(
                    r#"
                    UPDATE jobs
                    SET status = 'failed', failure_reason = ?1, result = NULL, worker_id = NULL,
                        finished_at = ?2, updated_at = ?2
                    WHERE id = ?3 AND worker_id = ?4 AND status = 'active'
                    "#,
                    params![reason, now, id, worker_id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Release active jobs not touched since `cutoff`.
    ///
    /// Jobs with attempts left go back to the queue immediately; the rest fail.
    pub async fn reclaim_stale(&self, cutoff: String) -> Result<ReclaimSummary> {
        self.db
            .transaction_async(move |tx| {
                let now = now_timestamp();

                let failed = tx.execute(
                    r#"
                    UPDATE jobs
                    SET status = 'failed',
                        failure_reason = 'Abandoned by its worker after ' || attempts || ' attempt(s)',
                        worker_id = NULL, finished_at = ?1, updated_at = ?1
                    WHERE status = 'active' AND updated_at < ?2 AND attempts >= max_attempts
                    "#,
                    params![now, cutoff],
                )?;

                let requeued = tx.execute(
                    r#"
                    UPDATE jobs
                    SET status = 'queued', failure_reason = 'Abandoned by its worker',
                        worker_id = NULL, available_at = ?1, updated_at = ?1
                    WHERE status = 'active' AND updated_at < ?2
                    "#,
                    params![now, cutoff],
                )?;

                Ok(ReclaimSummary { requeued, failed })
            })
            .await
    }

    /// Give a failed job a fresh attempt budget.
    ///
    /// Returns false when the job does not exist or has not failed.
    pub async fn retry(&self, id: &str) -> Result<bool> {
        let id = id.to_string();

        self.db
            .execute_async(move |conn| {
                let now = now_timestamp();
                let changed = conn.execute(
                    r#"
                    UPDATE jobs
                    SET status = 'queued', attempts = 0, progress = 0, result = NULL, failure_reason = NULL,
                        worker_id = NULL, available_at = ?1, updated_at = ?1, started_at = NULL, finished_at = NULL
                    WHERE id = ?2 AND status = 'failed'
                    "#,
                    params![now, id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Delete every failed job, returning how many were removed
    pub async fn clean_failed(&self) -> Result<usize> {
        self.db
            .execute_async(|conn| Ok(conn.execute("DELETE FROM jobs WHERE status = 'failed'", [])?))
            .await
    }

    pub async fn stats(&self) -> Result<JobStats> {
        self.db
            .execute_async(|conn| {
                let mut stats = JobStats::default();

                let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
                let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
                for row in rows {
                    let (status, count) = row?;
                    let count = count as u64;
                    match status.parse::<JobStatus>()? {
                        JobStatus::Queued => stats.queued = count,
                        JobStatus::Active => stats.active = count,
                        JobStatus::Completed => stats.completed = count,
                        JobStatus::Failed => stats.failed = count,
                    }
                }

                let delayed: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM jobs WHERE status = 'queued' AND available_at > ?1",
                    [now_timestamp()],
                    |row| row.get(0),
                )?;
                stats.delayed = delayed as u64;

                Ok(stats)
            })
            .await
    }
}

fn conversion_error<E>(column: usize, error: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, error.into())
}

fn parse_job_row(row: &Row) -> rusqlite::Result<JobRecord> {
    let input_kind: String = row.get(3)?;
    let input = JobInput::from_columns(&input_kind, row.get(4)?).map_err(|e| conversion_error(3, e))?;

    let chunk_options = row
        .get::<_, Option<String>>(10)?
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| conversion_error(10, e))?;

    Ok(JobRecord {
        id: row.get(0)?,
        status: row
            .get::<_, String>(1)?
            .parse()
            .map_err(|e: anyhow::Error| conversion_error(1, e))?,
        progress: row.get(2)?,
        input,
        input_hash: row.get(5)?,
        target_language: row.get(6)?,
        source_language: row.get(7)?,
        tier: row.get::<_, String>(8)?.parse().map_err(|e| conversion_error(8, e))?,
        preserve_formatting: row.get(9)?,
        chunk_options,
        result: row.get(11)?,
        failure_reason: row.get(12)?,
        attempts: row.get(13)?,
        max_attempts: row.get(14)?,
        worker_id: row.get(15)?,
        available_at: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
        started_at: row.get(19)?,
        finished_at: row.get(20)?,
    })
}
