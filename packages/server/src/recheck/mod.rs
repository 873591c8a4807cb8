//! Scheduling of "re-verify this listing" jobs.

mod memory;
mod postgres;
mod queue;

pub use memory::MemoryJobQueue;
pub use postgres::DbJobQueue;
pub use queue::{FailOutcome, JobInfo, JobOptions, JobQueue, JobState, NewJob, QueueError};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use queue::add_millis;

/// Parameters of one enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecheckRequest {
    pub delay_ms: Option<i64>,
    pub priority: Option<i32>,
    pub replace: bool,
}

impl Default for RecheckRequest {
    fn default() -> Self {
        Self {
            delay_ms: None,
            priority: None,
            replace: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave the existing job alone.
    Keep,
    /// Make the existing delayed job runnable now.
    Promote,
    /// Remove whatever exists under the id, then add a new job.
    Replace,
}

/// Decide what to do with the job already queued under a listing id.
pub fn decide(existing: &JobInfo, request: &RecheckRequest, now: DateTime<Utc>) -> Decision {
    if request.replace
        && existing.state != JobState::Active
        && existing.priority != request.priority
    {
        return Decision::Replace;
    }

    if request.replace && existing.state == JobState::Delayed {
        let delay_end = existing.delay_end();
        return match request.delay_ms {
            None if delay_end > now => Decision::Promote,
            None => Decision::Replace,
            Some(delay) if delay_end > add_millis(now, delay) => Decision::Replace,
            Some(_) => Decision::Keep,
        };
    }

    if existing.state.is_terminal() {
        return Decision::Replace;
    }

    Decision::Keep
}

pub struct RecheckScheduler {
    queue: Arc<dyn JobQueue>,
    options: JobOptions,
}

impl RecheckScheduler {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self {
            queue,
            options: JobOptions::default(),
        }
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// Queue a recheck of `listing_id`.
    ///
    /// Returns whether a new job was added. At most one job exists per
    /// listing id.
    #[instrument(skip(self))]
    pub async fn enqueue(
        &self,
        listing_id: &str,
        request: RecheckRequest,
    ) -> Result<bool, QueueError> {
        if let Some(existing) = self.queue.get_job(listing_id).await? {
            match decide(&existing, &request, Utc::now()) {
                Decision::Keep => {
                    debug!(state = %existing.state, "Job already queued");
                    return Ok(false);
                }
                Decision::Promote => {
                    self.queue.promote(listing_id).await?;
                    debug!("Promoted delayed job");
                    return Ok(false);
                }
                Decision::Replace => {
                    self.queue.remove(listing_id).await?;
                    debug!(state = %existing.state, "Removed existing job");
                }
            }
        }

        let added = self
            .queue
            .add(NewJob {
                id: listing_id.to_string(),
                delay_ms: request.delay_ms,
                priority: request.priority,
                options: self.options,
            })
            .await?;

        if added {
            debug!("Added job");
        }
        Ok(added)
    }
}
