/*!
 * Job store records.
 */

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::chunking::{ChunkOverrides, Tier};

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker (possibly delayed by backoff)
    Queued,
    /// Claimed by a worker
    Active,
    /// Translated and stored
    Completed,
    /// Out of attempts, or failed permanently
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [JobStatus::Queued, JobStatus::Active, JobStatus::Completed, JobStatus::Failed];

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Active => write!(f, "active"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "active" => Ok(JobStatus::Active),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Where a job's document comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum JobInput {
    /// Document text stored inline
    Text(String),
    /// Path read by the extractor when the job runs
    File(PathBuf),
}

impl JobInput {
    /// Column value for `input_kind`
    pub fn kind(&self) -> &'static str {
        match self {
            JobInput::Text(_) => "text",
            JobInput::File(_) => "file",
        }
    }

    /// Column value for `input_ref`
    pub fn reference(&self) -> String {
        match self {
            JobInput::Text(text) => text.clone(),
            JobInput::File(path) => path.to_string_lossy().into_owned(),
        }
    }

    pub fn from_columns(kind: &str, reference: String) -> anyhow::Result<Self> {
        match kind {
            "text" => Ok(JobInput::Text(reference)),
            "file" => Ok(JobInput::File(PathBuf::from(reference))),
            other => Err(anyhow::anyhow!("Invalid job input kind: {}", other)),
        }
    }
}

/// Full row of the `jobs` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub input: JobInput,
    /// SHA-256 of the submitted input, hex encoded
    pub input_hash: String,
    pub target_language: String,
    pub source_language: Option<String>,
    pub tier: Tier,
    pub preserve_formatting: bool,
    pub chunk_options: Option<ChunkOverrides>,
    /// Serialized translation result, set on completion
    pub result: Option<String>,
    pub failure_reason: Option<String>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub worker_id: Option<String>,
    pub available_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl JobRecord {
    /// A queued job, available immediately
    pub fn new(
        input: JobInput,
        input_hash: String,
        target_language: String,
        tier: Tier,
        max_attempts: u32,
    ) -> Self {
        let now = now_timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            progress: 0,
            input,
            input_hash,
            target_language,
            source_language: None,
            tier,
            preserve_formatting: true,
            chunk_options: None,
            result: None,
            failure_reason: None,
            attempts: 0,
            max_attempts,
            worker_id: None,
            available_at: now.clone(),
            created_at: now.clone(),
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn attempts_left(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }
}

/// What `fail` did with a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back in the queue, not claimable before `available_at`
    Requeued { attempt: u32, available_at: String },
    /// Terminal failure
    Failed,
}

/// Job counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub queued: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    /// Queued jobs still waiting out a retry delay
    pub delayed: u64,
}

impl JobStats {
    pub fn total(&self) -> u64 {
        self.queued + self.active + self.completed + self.failed
    }
}

impl fmt::Display for JobStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queued: {} ({} delayed), Active: {}, Completed: {}, Failed: {}",
            self.queued, self.delayed, self.active, self.completed, self.failed
        )
    }
}

/// Store representation of an instant
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}
