/*!
 * Persistent translation job queue.
 *
 * Jobs move queued → active → completed | failed. A failed attempt goes
 * back to the queue with an exponential delay until the job runs out of
 * attempts; permanent errors fail the job straight away. Each attempt
 * re-runs the whole pipeline.
 */

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_config::{Config, QueueConfig, TierTable};
use crate::chunking::{ChunkOverrides, Tier};
use crate::database::models::timestamp;
use crate::database::{
    DatabaseConnection, FailureOutcome, JobInput, JobRecord, JobStats, JobStatus, ReclaimSummary, Repository,
};
use crate::errors::QueueError;
use crate::language_utils;
use crate::translation::{DocumentTranslation, TranslationRequest};

pub mod extraction;
pub mod worker;

pub use extraction::{ExtractedText, PlainTextExtractor, TextExtractor};
pub use worker::{JobOutcome, Worker, WorkerPool};

/// Delay before retry number `attempt` (1-based): `base · 2^(attempt-1)`
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

fn timestamp_after(delay: Duration) -> String {
    let delta = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
    timestamp(Utc::now().checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC))
}

/// A document to translate and how
#[derive(Debug, Clone, PartialEq)]
pub struct JobSubmission {
    pub input: JobInput,
    pub target_language: String,
    pub tier: Tier,
    pub source_language: Option<String>,
    pub preserve_formatting: bool,
    pub chunk_options: Option<ChunkOverrides>,
}

impl JobSubmission {
    pub fn text(text: impl Into<String>, target_language: impl Into<String>, tier: Tier) -> Self {
        Self::new(JobInput::Text(text.into()), target_language, tier)
    }

    pub fn file(path: impl Into<PathBuf>, target_language: impl Into<String>, tier: Tier) -> Self {
        Self::new(JobInput::File(path.into()), target_language, tier)
    }

    fn new(input: JobInput, target_language: impl Into<String>, tier: Tier) -> Self {
        Self {
            input,
            target_language: target_language.into(),
            tier,
            source_language: None,
            preserve_formatting: true,
            chunk_options: None,
        }
    }

    pub fn with_source_language(mut self, source_language: impl Into<String>) -> Self {
        self.source_language = Some(source_language.into());
        self
    }

    pub fn with_chunk_options(mut self, overrides: ChunkOverrides) -> Self {
        self.chunk_options = (!overrides.is_empty()).then_some(overrides);
        self
    }

    pub fn with_preserve_formatting(mut self, preserve_formatting: bool) -> Self {
        self.preserve_formatting = preserve_formatting;
        self
    }
}

/// What a status query reports about a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub tier: Tier,
    pub target_language: String,
    /// Present only once the job has completed
    pub result: Option<DocumentTranslation>,
    /// Last failure, kept while a retry is pending
    pub failure_reason: Option<String>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: String,
    pub updated_at: String,
    pub finished_at: Option<String>,
}

impl JobStatusView {
    fn from_record(record: JobRecord) -> Result<Self, QueueError> {
        let result = match (record.status, record.result.as_deref()) {
            (JobStatus::Completed, Some(json)) => Some(
                serde_json::from_str(json)
                    .with_context(|| format!("Stored result of job {} is not readable", record.id))?,
            ),
            _ => None,
        };

        Ok(Self {
            id: record.id,
            status: record.status,
            progress: record.progress,
            tier: record.tier,
            target_language: record.target_language,
            result,
            failure_reason: record.failure_reason,
            attempts: record.attempts,
            max_attempts: record.max_attempts,
            created_at: record.created_at,
            updated_at: record.updated_at,
            finished_at: record.finished_at,
        })
    }
}

/// Translation request a claimed job runs with
pub fn translation_request(job: &JobRecord) -> TranslationRequest {
    TranslationRequest {
        target_language: job.target_language.clone(),
        tier: job.tier,
        source_language: job.source_language.clone(),
        preserve_formatting: job.preserve_formatting,
        chunk_options: job.chunk_options.clone(),
    }
}

/// Job queue over the SQLite store
#[derive(Debug, Clone)]
pub struct JobQueue {
    repo: Repository,
    tiers: TierTable,
    settings: QueueConfig,
}

impl JobQueue {
    pub fn new(repo: Repository, tiers: TierTable, settings: QueueConfig) -> Self {
        Self { repo, tiers, settings }
    }

    /// Open the configured database, or `database` when given
    pub fn open(config: &Config, database: Option<&Path>) -> anyhow::Result<Self> {
        let path = match database {
            Some(path) => path.to_path_buf(),
            None => match &config.queue.database_path {
                Some(path) => PathBuf::from(path),
                None => DatabaseConnection::default_database_path()?,
            },
        };
        let repo = Repository::new(DatabaseConnection::new(&path)?);
        Ok(Self::new(repo, config.chunking.tiers.clone(), config.queue.clone()))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn settings(&self) -> &QueueConfig {
        &self.settings
    }

    /// Validate and enqueue a job, returning its id.
    ///
    /// Invalid chunk options or languages are rejected here and never
    /// create a job.
    pub async fn submit(&self, submission: JobSubmission) -> Result<String, QueueError> {
        let options = self.tiers.get(submission.tier).chunk_options();
        let options = match &submission.chunk_options {
            Some(overrides) => options.apply(overrides),
            None => options,
        };
        options.validate()?;

        let target_language = language_utils::normalize_to_part1_or_part2t(&submission.target_language)
            .map_err(|e| QueueError::Configuration(e.to_string()))?;
        let source_language = submission
            .source_language
            .as_deref()
            .map(language_utils::normalize_to_part1_or_part2t)
            .transpose()
            .map_err(|e| QueueError::Configuration(e.to_string()))?;

        let input_hash = match &submission.input {
            JobInput::Text(text) => Repository::hash_text(text),
            JobInput::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| QueueError::Configuration(format!("Cannot read {}: {}", path.display(), e)))?;
                Repository::hash_bytes(&bytes)
            }
        };

        let mut job = JobRecord::new(
            submission.input,
            input_hash,
            target_language,
            submission.tier,
            self.settings.max_attempts,
        );
        job.source_language = source_language;
        job.preserve_formatting = submission.preserve_formatting;
        job.chunk_options = submission.chunk_options;

        self.repo.insert_job(&job).await?;
        info!(
            "Queued job {} ({} tier, target '{}')",
            job.id, job.tier, job.target_language
        );

        Ok(job.id)
    }

    pub async fn get_status(&self, id: &str) -> Result<Option<JobStatusView>, QueueError> {
        match self.repo.get_job(id).await? {
            Some(record) => Ok(Some(JobStatusView::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Most recent jobs, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<JobStatusView>, QueueError> {
        self.repo
            .list_jobs(None, limit)
            .await?
            .into_iter()
            .map(JobStatusView::from_record)
            .collect()
    }

    pub async fn claim_next(&self, worker_id: &str) -> Result<Option<JobRecord>, QueueError> {
        Ok(self.repo.claim_next(worker_id).await?)
    }

    /// Raise progress; false when the job is no longer this worker's
    pub async fn update_progress(&self, id: &str, worker_id: &str, progress: u8) -> Result<bool, QueueError> {
        Ok(self.repo.update_progress(id, worker_id, progress).await?)
    }

    pub async fn complete(
        &self,
        id: &str,
        worker_id: &str,
        translation: &DocumentTranslation,
    ) -> Result<(), QueueError> {
        let result = serde_json::to_string(translation)
            .map_err(|e| QueueError::Storage(format!("Cannot serialize result of job {}: {}", id, e)))?;

        if self.repo.complete(id, worker_id, result).await? {
            Ok(())
        } else {
            Err(QueueError::NotFound(format!("{} (not active for {})", id, worker_id)))
        }
    }

    /// Record a failed attempt.
    ///
    /// Retryable failures with attempts left are requeued after
    /// `backoff_delay`; everything else fails the job.
    pub async fn fail(
        &self,
        id: &str,
        worker_id: &str,
        reason: &str,
        retryable: bool,
    ) -> Result<FailureOutcome, QueueError> {
        let job = self
            .repo
            .get_job(id)
            .await?
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        let (changed, outcome) = if retryable && job.attempts < job.max_attempts {
            let delay = backoff_delay(self.settings.backoff_base_ms, job.attempts);
            let available_at = timestamp_after(delay);
            warn!(
                "Job {} attempt {}/{} failed, retrying in {}ms: {}",
                id,
                job.attempts,
                job.max_attempts,
                delay.as_millis(),
                reason
            );
            let changed = self.repo.requeue(id, worker_id, reason, available_at.clone()).await?;
            (
                changed,
                FailureOutcome::Requeued {
                    attempt: job.attempts,
                    available_at,
                },
            )
        } else {
            let changed = self.repo.mark_failed(id, worker_id, reason).await?;
            (changed, FailureOutcome::Failed)
        };

        if changed {
            Ok(outcome)
        } else {
            Err(QueueError::NotFound(format!("{} (not active for {})", id, worker_id)))
        }
    }

    /// Release jobs whose worker stopped reporting within the visibility timeout
    pub async fn reclaim_stale(&self) -> Result<ReclaimSummary, QueueError> {
        let timeout = chrono::Duration::seconds(self.settings.visibility_timeout_secs as i64);
        let cutoff = timestamp(Utc::now() - timeout);
        let summary = self.repo.reclaim_stale(cutoff).await?;

        if summary.requeued > 0 || summary.failed > 0 {
            warn!(
                "Reclaimed abandoned jobs: {} requeued, {} failed",
                summary.requeued, summary.failed
            );
        }
        Ok(summary)
    }

    /// Requeue a failed job with a fresh attempt budget
    pub async fn retry(&self, id: &str) -> Result<(), QueueError> {
        if self.repo.retry(id).await? {
            info!("Job {} requeued for retry", id);
            return Ok(());
        }

        match self.repo.get_job(id).await? {
            Some(job) => Err(QueueError::Configuration(format!(
                "Job {} is {} and cannot be retried",
                id, job.status
            ))),
            None => Err(QueueError::NotFound(id.to_string())),
        }
    }

    pub async fn clean_failed(&self) -> Result<usize, QueueError> {
        Ok(self.repo.clean_failed().await?)
    }

    pub async fn stats(&self) -> Result<JobStats, QueueError> {
        Ok(self.repo.stats().await?)
    }
}
