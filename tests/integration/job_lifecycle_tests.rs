/*!
 * Submit, claim, retry and complete jobs through the worker pool
 */

use std::time::Duration;

use tokio::sync::watch;

use doctran::chunking::{ChunkOverrides, Tier};
use doctran::database::JobStatus;
use doctran::errors::QueueError;
use doctran::providers::mock::MockProvider;
use doctran::queue::{JobOutcome, JobQueue, JobSubmission};

use crate::common::{create_temp_dir, create_test_file, init_logging, memory_queue, mock_pool, paragraphs, test_config};

#[tokio::test]
async fn test_submitText_runUntilIdle_shouldCompleteWithResult() {
    init_logging();
    let config = test_config();
    let queue = memory_queue(&config);
    let provider = MockProvider::working();

    let text = paragraphs(3, 2);
    let id = queue
        .submit(JobSubmission::text(text.clone(), "fra", Tier::Standard))
        .await
        .unwrap();
    assert_eq!(queue.get_status(&id).await.unwrap().unwrap().status, JobStatus::Queued);

    let outcomes = mock_pool(&config, queue.clone(), &provider).run_until_idle().await.unwrap();
    assert_eq!(outcomes, vec![JobOutcome::Completed { job_id: id.clone() }]);

    let status = queue.get_status(&id).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.progress, 100);
    assert_eq!(status.attempts, 1);
    assert_eq!(status.target_language, "fr");
    assert!(status.finished_at.is_some());
    assert!(status.failure_reason.is_none());

    let result = status.result.expect("completed jobs carry their translation");
    assert!(result.translated_text.starts_with("[TRANSLATED] "));
    assert_eq!(result.metadata.tier, Tier::Standard);
}

#[tokio::test]
async fn test_runUntil_jobHeldElsewhere_shouldFinishOwnJobWithoutWaiting() {
    let config = test_config();
    let queue = memory_queue(&config);

    let held = queue
        .submit(JobSubmission::text("Held by another process.", "fr", Tier::Basic))
        .await
        .unwrap();
    assert_eq!(queue.claim_next("other-process").await.unwrap().unwrap().id, held);

    let own = queue
        .submit(JobSubmission::text("Translate me now.", "fr", Tier::Basic))
        .await
        .unwrap();

    let outcomes = tokio::time::timeout(
        Duration::from_secs(5),
        mock_pool(&config, queue.clone(), &MockProvider::working()).run_until(&own),
    )
    .await
    .expect("must not wait on the held job")
    .unwrap();

    assert_eq!(outcomes, vec![JobOutcome::Completed { job_id: own.clone() }]);
    assert_eq!(queue.get_status(&own).await.unwrap().unwrap().status, JobStatus::Completed);
    assert_eq!(queue.get_status(&held).await.unwrap().unwrap().status, JobStatus::Active);
}

#[tokio::test]
async fn test_runUntil_finishedJob_shouldLeaveLaterJobsQueued() {
    let config = test_config();
    let queue = memory_queue(&config);
    let provider = MockProvider::working();

    let first = queue
        .submit(JobSubmission::text("First document.", "es", Tier::Basic))
        .await
        .unwrap();
    mock_pool(&config, queue.clone(), &provider).run_until(&first).await.unwrap();

    let later = queue
        .submit(JobSubmission::text("Submitted afterwards.", "es", Tier::Basic))
        .await
        .unwrap();
    let outcomes = mock_pool(&config, queue.clone(), &provider).run_until(&first).await.unwrap();

    assert!(outcomes.is_empty());
    assert_eq!(queue.get_status(&later).await.unwrap().unwrap().status, JobStatus::Queued);
}

#[tokio::test]
async fn test_runUntil_unknownJob_shouldBeNotFound() {
    let config = test_config();
    let queue = memory_queue(&config);

    let result = mock_pool(&config, queue, &MockProvider::working()).run_until("missing").await;
    assert!(matches!(result, Err(QueueError::NotFound(_))));
}

#[tokio::test]
async fn test_transientFailures_shouldRetryWithBackoffUntilSuccess() {
    let config = test_config();
    let queue = memory_queue(&config);
    let provider = MockProvider::fail_first(2);

    let id = queue
        .submit(JobSubmission::text("Short text to translate.", "de", Tier::Basic))
        .await
        .unwrap();

    let outcomes = mock_pool(&config, queue.clone(), &provider).run_until_idle().await.unwrap();

    let requeued = outcomes
        .iter()
        .filter(|o| matches!(o, JobOutcome::Requeued { .. }))
        .count();
    assert_eq!(requeued, 2);
    assert_eq!(outcomes.last(), Some(&JobOutcome::Completed { job_id: id.clone() }));

    let status = queue.get_status(&id).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.attempts, 3);
    assert_eq!(provider.request_count(), 3);
}

#[tokio::test]
async fn test_persistentFailure_shouldFailAfterMaxAttempts() {
    let config = test_config();
    let queue = memory_queue(&config);

    let id = queue
        .submit(JobSubmission::text("This will never translate.", "es", Tier::Basic))
        .await
        .unwrap();

    let outcomes = mock_pool(&config, queue.clone(), &MockProvider::failing())
        .run_until_idle()
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes.last(), Some(JobOutcome::Failed { .. })));

    let status = queue.get_status(&id).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert_eq!(status.attempts, 3);
    assert!(status.result.is_none());
    let reason = status.failure_reason.unwrap();
    assert!(reason.contains("chunk 0"), "unexpected reason: {}", reason);
}

#[tokio::test]
async fn test_unsupportedFile_shouldFailWithoutRetry() {
    let config = test_config();
    let queue = memory_queue(&config);
    let dir = create_temp_dir().unwrap();
    let pdf = create_test_file(dir.path(), "scan.pdf", "%PDF-1.4 binary-ish").unwrap();

    let id = queue.submit(JobSubmission::file(&pdf, "fr", Tier::Basic)).await.unwrap();
    mock_pool(&config, queue.clone(), &MockProvider::working())
        .run_until_idle()
        .await
        .unwrap();

    let status = queue.get_status(&id).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert_eq!(status.attempts, 1);
    assert!(status.failure_reason.unwrap().contains("Unsupported"));
}

#[tokio::test]
async fn test_blankText_shouldFailWithoutRetry() {
    let config = test_config();
    let queue = memory_queue(&config);
    let provider = MockProvider::working();

    let id = queue.submit(JobSubmission::text(" \n\t ", "fr", Tier::Basic)).await.unwrap();
    mock_pool(&config, queue.clone(), &provider).run_until_idle().await.unwrap();

    let status = queue.get_status(&id).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert_eq!(status.attempts, 1);
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_markdownFile_shouldTranslateFileContents() {
    let config = test_config();
    let queue = memory_queue(&config);
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "notes.md", "# Notes\n\nRemember the milk.").unwrap();

    let id = queue.submit(JobSubmission::file(&path, "it", Tier::Standard)).await.unwrap();
    mock_pool(&config, queue.clone(), &MockProvider::working())
        .run_until_idle()
        .await
        .unwrap();

    let result = queue.get_status(&id).await.unwrap().unwrap().result.unwrap();
    assert!(result.translated_text.contains("Remember the milk."));
}

#[tokio::test]
async fn test_submit_invalidConfiguration_shouldNotCreateJob() {
    let config = test_config();
    let queue = memory_queue(&config);

    let bad_overlap = JobSubmission::text("text", "fr", Tier::Premium).with_chunk_options(ChunkOverrides {
        overlap: Some(5000),
        ..Default::default()
    });
    assert!(matches!(queue.submit(bad_overlap).await, Err(QueueError::Configuration(_))));

    let bad_language = JobSubmission::text("text", "elvish", Tier::Basic);
    assert!(matches!(queue.submit(bad_language).await, Err(QueueError::Configuration(_))));

    let bad_source = JobSubmission::text("text", "fr", Tier::Basic).with_source_language("zz");
    assert!(matches!(queue.submit(bad_source).await, Err(QueueError::Configuration(_))));

    let missing_file = JobSubmission::file("/definitely/not/here.txt", "fr", Tier::Basic);
    assert!(matches!(queue.submit(missing_file).await, Err(QueueError::Configuration(_))));

    assert_eq!(queue.stats().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_reclaimStale_abandonedJob_shouldBeRequeuedAndFinished() {
    let mut config = test_config();
    config.queue.visibility_timeout_secs = 0;
    let queue = memory_queue(&config);

    let id = queue
        .submit(JobSubmission::text("Abandoned halfway.", "fr", Tier::Basic))
        .await
        .unwrap();
    let claimed = queue.claim_next("ghost-worker").await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.attempts, 1);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let summary = queue.reclaim_stale().await.unwrap();
    assert_eq!(summary.requeued, 1);
    assert_eq!(summary.failed, 0);

    // The original worker no longer owns the job
    assert!(!queue.update_progress(&id, "ghost-worker", 50).await.unwrap());
    assert!(matches!(
        queue.fail(&id, "ghost-worker", "late failure", true).await,
        Err(QueueError::NotFound(_))
    ));

    mock_pool(&config, queue.clone(), &MockProvider::working())
        .run_until_idle()
        .await
        .unwrap();

    let status = queue.get_status(&id).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.attempts, 2);
}

#[tokio::test]
async fn test_reclaimStale_lastAttemptAbandoned_shouldFailJob() {
    let mut config = test_config();
    config.queue.visibility_timeout_secs = 0;
    config.queue.max_attempts = 1;
    let queue = memory_queue(&config);

    let id = queue
        .submit(JobSubmission::text("Only one chance.", "fr", Tier::Basic))
        .await
        .unwrap();
    queue.claim_next("ghost-worker").await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let summary = queue.reclaim_stale().await.unwrap();
    assert_eq!(summary.failed, 1);

    let status = queue.get_status(&id).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert!(status.failure_reason.unwrap().contains("Abandoned"));
}

#[tokio::test]
async fn test_retryAndClean_shouldManageFailedJobs() {
    let config = test_config();
    let queue = memory_queue(&config);

    let failed = queue
        .submit(JobSubmission::text("Doomed.", "fr", Tier::Basic))
        .await
        .unwrap();
    mock_pool(&config, queue.clone(), &MockProvider::failing())
        .run_until_idle()
        .await
        .unwrap();

    queue.retry(&failed).await.unwrap();
    let status = queue.get_status(&failed).await.unwrap().unwrap();
    assert_eq!(status.status, JobStatus::Queued);
    assert_eq!(status.attempts, 0);
    assert!(status.failure_reason.is_none());

    mock_pool(&config, queue.clone(), &MockProvider::working())
        .run_until_idle()
        .await
        .unwrap();
    assert_eq!(
        queue.get_status(&failed).await.unwrap().unwrap().status,
        JobStatus::Completed
    );

    // Completed jobs are not retryable, unknown ids are not found
    assert!(matches!(queue.retry(&failed).await, Err(QueueError::Configuration(_))));
    assert!(matches!(queue.retry("no-such-job").await, Err(QueueError::NotFound(_))));

    let doomed = queue
        .submit(JobSubmission::text("Doomed again.", "fr", Tier::Basic))
        .await
        .unwrap();
    mock_pool(&config, queue.clone(), &MockProvider::failing())
        .run_until_idle()
        .await
        .unwrap();

    assert_eq!(queue.clean_failed().await.unwrap(), 1);
    assert!(queue.get_status(&doomed).await.unwrap().is_none());
    let stats = queue.stats().await.unwrap();
    assert_eq!((stats.completed, stats.failed), (1, 0));
}

#[tokio::test]
async fn test_onDiskQueue_shouldSurviveReopen() {
    let config = test_config();
    let dir = create_temp_dir().unwrap();
    let db_path = dir.path().join("state").join("jobs.db");

    let id = {
        let queue = JobQueue::open(&config, Some(&db_path)).unwrap();
        queue
            .submit(JobSubmission::text("Persist me.", "nl", Tier::Basic))
            .await
            .unwrap()
    };
    assert!(db_path.exists());

    let queue = std::sync::Arc::new(JobQueue::open(&config, Some(&db_path)).unwrap());
    assert_eq!(queue.get_status(&id).await.unwrap().unwrap().status, JobStatus::Queued);

    mock_pool(&config, queue.clone(), &MockProvider::working())
        .run_until_idle()
        .await
        .unwrap();
    assert_eq!(queue.get_status(&id).await.unwrap().unwrap().status, JobStatus::Completed);
    assert_eq!(queue.recent(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_workerPoolRun_shouldProcessJobsUntilShutdown() {
    let config = test_config();
    let queue = memory_queue(&config);
    let pool = mock_pool(&config, queue.clone(), &MockProvider::random_delay(5));

    let mut ids = Vec::new();
    for n in 0..4 {
        let submission = JobSubmission::text(format!("Document number {}.", n), "pt", Tier::Basic);
        ids.push(queue.submit(submission).await.unwrap());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stop_when_done = async {
        loop {
            let stats = queue.stats().await.unwrap();
            if stats.completed == ids.len() as u64 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown_tx.send(true).unwrap();
    };

    tokio::time::timeout(Duration::from_secs(30), async {
        tokio::join!(pool.run(shutdown_rx), stop_when_done)
    })
    .await
    .expect("pool should drain the queue and stop");

    for id in &ids {
        assert_eq!(queue.get_status(id).await.unwrap().unwrap().status, JobStatus::Completed);
    }
}
