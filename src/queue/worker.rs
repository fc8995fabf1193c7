/*!
 * Queue workers.
 *
 * A worker owns at most one claimed job at a time and runs it end to end:
 * extract, chunk and translate, persist. Progress moves 0 at claim, 10
 * after chunking, 10..90 across translation batches and 100 on completion.
 */

use futures::future::join_all;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::extraction::TextExtractor;
use super::{translation_request, JobQueue};
use crate::app_config::QueueConfig;
use crate::database::{FailureOutcome, JobRecord};
use crate::errors::{AppError, ExtractionError, QueueError};
use crate::translation::{DocumentTranslation, TranslationOrchestrator};

/// Progress right after chunking
const PROGRESS_CHUNKED: u8 = 10;

/// Share of the progress range spent translating
const PROGRESS_TRANSLATION_SPAN: usize = 80;

/// Job progress for `done` of `total` chunks translated
pub fn translation_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_CHUNKED + PROGRESS_TRANSLATION_SPAN as u8;
    }
    let done = done.min(total);
    PROGRESS_CHUNKED + (PROGRESS_TRANSLATION_SPAN * done / total) as u8
}

/// How one claimed job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { job_id: String },
    Requeued { job_id: String, available_at: String },
    Failed { job_id: String, reason: String },
    /// The job was reclaimed from this worker before it finished
    Lost { job_id: String },
}

impl JobOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Completed { job_id }
            | JobOutcome::Requeued { job_id, .. }
            | JobOutcome::Failed { job_id, .. }
            | JobOutcome::Lost { job_id } => job_id,
        }
    }
}

/// Single job consumer
pub struct Worker {
    id: String,
    queue: Arc<JobQueue>,
    orchestrator: Arc<TranslationOrchestrator>,
    extractor: Arc<dyn TextExtractor>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<JobQueue>,
        orchestrator: Arc<TranslationOrchestrator>,
        extractor: Arc<dyn TextExtractor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            orchestrator,
            extractor,
            poll_interval,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Claim and run one job; `None` when nothing is claimable
    pub async fn run_once(&self) -> Result<Option<JobOutcome>, QueueError> {
        let Some(job) = self.queue.claim_next(&self.id).await? else {
            return Ok(None);
        };

        info!(
            "Worker {} claimed job {} (attempt {}/{})",
            self.id, job.id, job.attempts, job.max_attempts
        );

        let outcome = match self.process(&job).await {
            Ok(translation) => match self.queue.complete(&job.id, &self.id, &translation).await {
                Ok(()) => {
                    info!(
                        "Job {} completed: {} chunks in {}ms",
                        job.id, translation.metadata.total_chunks, translation.metadata.processing_time_ms
                    );
                    JobOutcome::Completed { job_id: job.id }
                }
                Err(QueueError::NotFound(_)) => {
                    warn!("Job {} was reclaimed before worker {} could store it", job.id, self.id);
                    JobOutcome::Lost { job_id: job.id }
                }
                Err(e) => return Err(e),
            },
            Err(failure) => {
                let reason = failure.to_string();
                error!("Job {} failed on attempt {}: {}", job.id, job.attempts, reason);

                match self.queue.fail(&job.id, &self.id, &reason, failure.is_retryable()).await {
                    Ok(FailureOutcome::Requeued { available_at, .. }) => JobOutcome::Requeued {
                        job_id: job.id,
                        available_at,
                    },
                    Ok(FailureOutcome::Failed) => JobOutcome::Failed { job_id: job.id, reason },
                    Err(QueueError::NotFound(_)) => JobOutcome::Lost { job_id: job.id },
                    Err(e) => return Err(e),
                }
            }
        };

        Ok(Some(outcome))
    }

    async fn process(&self, job: &JobRecord) -> Result<DocumentTranslation, AppError> {
        let extracted = self.extractor.extract(&job.input).await?;
        if extracted.text.trim().is_empty() {
            return Err(ExtractionError::Empty.into());
        }
        debug!(
            "Job {}: {} bytes over {} page(s)",
            job.id,
            extracted.text.len(),
            extracted.page_count
        );

        let request = translation_request(job);
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();

        let translate = self.orchestrator.translate_document_with_progress(
            &extracted.text,
            &request,
            move |done, total| {
                let _ = progress_tx.send(translation_progress(done, total));
            },
        );

        // Drains until the callback (and its sender) is dropped with the translation
        let report = async {
            while let Some(progress) = progress_rx.recv().await {
                match self.queue.update_progress(&job.id, &self.id, progress).await {
                    Ok(true) => {}
                    Ok(false) => debug!("Job {} no longer active for worker {}", job.id, self.id),
                    Err(e) => warn!("Failed to record progress for job {}: {}", job.id, e),
                }
            }
        };

        let (translation, ()) = tokio::join!(translate, report);
        Ok(translation?)
    }

    /// Poll for jobs until `shutdown` turns true or its sender goes away
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Worker {} started", self.id);

        while !*shutdown.borrow() {
            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!("Worker {} could not reach the queue: {}", self.id, e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Worker {} stopped", self.id);
    }
}

/// N workers plus a periodic sweep for abandoned jobs
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    orchestrator: Arc<TranslationOrchestrator>,
    extractor: Arc<dyn TextExtractor>,
    workers: usize,
    poll_interval: Duration,
    reclaim_interval: Duration,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<JobQueue>,
        orchestrator: Arc<TranslationOrchestrator>,
        extractor: Arc<dyn TextExtractor>,
        settings: &QueueConfig,
    ) -> Self {
        // Sweep a few times per timeout so abandoned jobs come back promptly
        let reclaim_secs = (settings.visibility_timeout_secs / 4).max(1);
        Self {
            queue,
            orchestrator,
            extractor,
            workers: settings.workers.max(1),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            reclaim_interval: Duration::from_secs(reclaim_secs),
        }
    }

    fn spawn_workers(&self) -> Vec<Worker> {
        let pool_id = uuid::Uuid::new_v4().simple().to_string();
        (0..self.workers)
            .map(|index| {
                Worker::new(
                    format!("worker-{}-{}", &pool_id[..8], index + 1),
                    self.queue.clone(),
                    self.orchestrator.clone(),
                    self.extractor.clone(),
                    self.poll_interval,
                )
            })
            .collect()
    }

    /// Run until `shutdown` turns true
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        let workers = self.spawn_workers();
        info!("Starting {} worker(s)", workers.len());

        let sweep = {
            let mut shutdown = shutdown.clone();
            async move {
                while !*shutdown.borrow() {
                    if let Err(e) = self.queue.reclaim_stale().await {
                        error!("Reclaim sweep failed: {}", e);
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.reclaim_interval) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        };

        let runs = join_all(workers.iter().map(|worker| worker.run(shutdown.clone())));
        tokio::join!(runs, sweep);

        info!("All workers stopped");
    }

    /// Process jobs until the queue holds nothing queued or active.
    ///
    /// Waits out retry delays. Returns every outcome in completion order.
    pub async fn run_until_idle(&self) -> Result<Vec<JobOutcome>, QueueError> {
        let workers = self.spawn_workers();
        let mut outcomes = Vec::new();

        loop {
            self.queue.reclaim_stale().await?;

            let rounds = join_all(workers.iter().map(|worker| async move {
                let mut handled = Vec::new();
                while let Some(outcome) = worker.run_once().await? {
                    handled.push(outcome);
                }
                Ok::<_, QueueError>(handled)
            }))
            .await;

            for round in rounds {
                outcomes.extend(round?);
            }

            let stats = self.queue.stats().await?;
            if stats.queued == 0 && stats.active == 0 {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Ok(outcomes)
    }

    /// Process jobs until `job_id` is completed or failed.
    ///
    /// Older queued jobs may be handled on the way. Nothing new is claimed
    /// once the job is finished, and jobs held by other processes are not
    /// waited on.
    pub async fn run_until(&self, job_id: &str) -> Result<Vec<JobOutcome>, QueueError> {
        let workers = self.spawn_workers();
        let mut outcomes = Vec::new();

        loop {
            self.queue.reclaim_stale().await?;

            let rounds = join_all(workers.iter().map(|worker| async move {
                let mut handled = Vec::new();
                while !self.is_finished(job_id).await? {
                    match worker.run_once().await? {
                        Some(outcome) => handled.push(outcome),
                        None => break,
                    }
                }
                Ok::<_, QueueError>(handled)
            }))
            .await;

            for round in rounds {
                outcomes.extend(round?);
            }

            if self.is_finished(job_id).await? {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Ok(outcomes)
    }

    async fn is_finished(&self, job_id: &str) -> Result<bool, QueueError> {
        match self.queue.get_status(job_id).await? {
            Some(view) => Ok(view.status.is_terminal()),
            None => Err(QueueError::NotFound(job_id.to_string())),
        }
    }
}
