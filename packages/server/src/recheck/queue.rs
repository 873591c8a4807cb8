use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use common::Backoff;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Job {id} has unknown state '{state}'")]
    UnknownState { id: String, state: String },

    #[error("Job {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Delayed => "delayed",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobState::Waiting),
            "delayed" => Ok(JobState::Delayed),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(other.to_string()),
        }
    }
}

/// Retry and retention policy of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub attempts: u32,
    pub backoff: Backoff,
    pub remove_on_complete: bool,
    pub remove_on_fail: bool,
}

impl Default for JobOptions {
    /// Three attempts, exponential backoff from 5 seconds, removed once finished.
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff::Exponential { delay_ms: 5000 },
            remove_on_complete: true,
            remove_on_fail: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub id: String,
    pub delay_ms: Option<i64>,
    pub priority: Option<i32>,
    pub options: JobOptions,
}

impl NewJob {
    /// Initial state and earliest run time of the job if added at `now`.
    pub fn schedule(&self, now: DateTime<Utc>) -> (JobState, DateTime<Utc>) {
        match self.delay_ms {
            Some(delay) if delay > 0 => (JobState::Delayed, add_millis(now, delay)),
            _ => (JobState::Waiting, now),
        }
    }
}

/// Snapshot of a queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: String,
    pub state: JobState,
    pub priority: Option<i32>,
    /// Delay requested when the job was added.
    pub delay_ms: Option<i64>,
    /// When the job was added.
    pub created_at: DateTime<Utc>,
    pub attempts_made: u32,
}

impl JobInfo {
    /// End of the delay window the job was added with.
    pub fn delay_end(&self) -> DateTime<Utc> {
        add_millis(self.created_at, self.delay_ms.unwrap_or(0))
    }
}

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Scheduled for another attempt.
    Retrying { run_at: DateTime<Utc> },
    /// Out of attempts.
    Exhausted,
}

/// Durable priority/delay queue keyed by job id.
///
/// Ids are unique: `add` never replaces an existing job.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn get_job(&self, id: &str) -> Result<Option<JobInfo>, QueueError>;

    /// Add a job. Returns `false` when a job with the same id already exists.
    async fn add(&self, job: NewJob) -> Result<bool, QueueError>;

    /// Make a delayed job runnable immediately.
    async fn promote(&self, id: &str) -> Result<(), QueueError>;

    async fn remove(&self, id: &str) -> Result<(), QueueError>;

    /// Take the next runnable job and mark it active.
    ///
    /// Runnable jobs are waiting ones and delayed ones whose window has
    /// passed, ordered by priority (ascending, unset last) then age.
    async fn claim_next(&self) -> Result<Option<JobInfo>, QueueError>;

    async fn complete(&self, id: &str) -> Result<(), QueueError>;

    async fn fail(&self, id: &str, error: &str) -> Result<FailOutcome, QueueError>;
}

/// `time + ms`, saturating at the largest representable time.
pub(crate) fn add_millis(time: DateTime<Utc>, ms: i64) -> DateTime<Utc> {
    time.checked_add_signed(TimeDelta::milliseconds(ms)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// State after an attempt failed `attempts_made` times in total.
pub(crate) fn after_failure(
    options: &JobOptions,
    attempts_made: u32,
    now: DateTime<Utc>,
) -> FailOutcome {
    if attempts_made >= options.attempts {
        return FailOutcome::Exhausted;
    }
    let delay = options.backoff.delay_for(attempts_made);
    let delay = TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
    FailOutcome::Retrying {
        run_at: now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}
