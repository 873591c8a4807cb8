use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::queue::{
    FailOutcome, JobInfo, JobOptions, JobQueue, JobState, NewJob, QueueError, after_failure,
};

#[derive(Debug, Clone)]
struct Entry {
    info: JobInfo,
    options: JobOptions,
    run_at: DateTime<Utc>,
    last_error: Option<String>,
}

/// Job queue held in process memory.
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<HashMap<String, Entry>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a job's state, e.g. to stage a scenario.
    pub async fn set_state(&self, id: &str, state: JobState) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        entry.info.state = state;
        Ok(())
    }

    /// Move a job's creation time, keeping its delay window length.
    pub async fn backdate(&self, id: &str, created_at: DateTime<Utc>) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        entry.info.created_at = created_at;
        entry.run_at = entry.info.delay_end();
        Ok(())
    }

    pub async fn last_error(&self, id: &str) -> Option<String> {
        self.jobs
            .lock()
            .await
            .get(id)
            .and_then(|e| e.last_error.clone())
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn get_job(&self, id: &str) -> Result<Option<JobInfo>, QueueError> {
        Ok(self.jobs.lock().await.get(id).map(|e| e.info.clone()))
    }

    async fn add(&self, job: NewJob) -> Result<bool, QueueError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Ok(false);
        }

        let now = Utc::now();
        let (state, run_at) = job.schedule(now);
        jobs.insert(
            job.id.clone(),
            Entry {
                info: JobInfo {
                    id: job.id,
                    state,
                    priority: job.priority,
                    delay_ms: job.delay_ms,
                    created_at: now,
                    attempts_made: 0,
                },
                options: job.options,
                run_at,
                last_error: None,
            },
        );
        Ok(true)
    }

    async fn promote(&self, id: &str) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if entry.info.state == JobState::Delayed {
            entry.info.state = JobState::Waiting;
            entry.run_at = Utc::now();
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), QueueError> {
        self.jobs.lock().await.remove(id);
        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<JobInfo>, QueueError> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().await;

        let next = jobs
            .values()
            .filter(|e| match e.info.state {
                JobState::Waiting => true,
                JobState::Delayed => e.run_at <= now,
                _ => false,
            })
            // Prioritized jobs run before unprioritized ones, matching NULLS LAST.
            .min_by_key(|e| {
                let priority = e.info.priority.map_or((1, 0), |p| (0, p));
                (priority, e.run_at, e.info.created_at)
            })
            .map(|e| e.info.id.clone());

        Ok(next.and_then(|id| {
            jobs.get_mut(&id).map(|entry| {
                entry.info.state = JobState::Active;
                entry.info.clone()
            })
        }))
    }

    async fn complete(&self, id: &str) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if entry.options.remove_on_complete {
            jobs.remove(id);
        } else {
            entry.info.state = JobState::Completed;
        }
        Ok(())
    }

    async fn fail(&self, id: &str, error: &str) -> Result<FailOutcome, QueueError> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        entry.info.attempts_made += 1;
        entry.last_error = Some(error.to_string());
        let outcome = after_failure(&entry.options, entry.info.attempts_made, Utc::now());

        match outcome {
            FailOutcome::Retrying { run_at } => {
                entry.info.state = JobState::Delayed;
                entry.run_at = run_at;
            }
            FailOutcome::Exhausted if entry.options.remove_on_fail => {
                jobs.remove(id);
            }
            FailOutcome::Exhausted => entry.info.state = JobState::Failed,
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, priority: Option<i32>, delay_ms: Option<i64>) -> NewJob {
        NewJob {
            id: id.to_string(),
            delay_ms,
            priority,
            options: JobOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_add_keeps_ids_unique() {
        let queue = MemoryJobQueue::new();
        assert!(queue.add(job("a", None, None)).await.unwrap());
        assert!(!queue.add(job("a", Some(1), None)).await.unwrap());
        assert_eq!(queue.get_job("a").await.unwrap().unwrap().priority, None);
    }

    #[tokio::test]
    async fn test_claim_order_and_delay() {
        let queue = MemoryJobQueue::new();
        queue.add(job("low", Some(5), None)).await.unwrap();
        queue.add(job("later", None, Some(60_000))).await.unwrap();
        queue.add(job("high", Some(1), None)).await.unwrap();
        queue.add(job("unset", None, None)).await.unwrap();

        let mut claimed = Vec::new();
        while let Some(info) = queue.claim_next().await.unwrap() {
            assert_eq!(info.state, JobState::Active);
            claimed.push(info.id);
        }
        assert_eq!(claimed, vec!["high", "low", "unset"]);

        queue.promote("later").await.unwrap();
        assert_eq!(queue.claim_next().await.unwrap().unwrap().id, "later");
    }

    #[tokio::test]
    async fn test_older_unprioritized_job_waits_for_prioritized() {
        let queue = MemoryJobQueue::new();
        queue.add(job("unprioritized", None, None)).await.unwrap();
        queue.add(job("urgent", Some(1), None)).await.unwrap();

        assert_eq!(queue.claim_next().await.unwrap().unwrap().id, "urgent");
        assert_eq!(queue.claim_next().await.unwrap().unwrap().id, "unprioritized");
    }

    #[tokio::test]
    async fn test_fail_retries_then_removes() {
        let queue = MemoryJobQueue::new();
        queue.add(job("a", None, None)).await.unwrap();

        for _ in 0..2 {
            queue.claim_next().await.unwrap();
            let outcome = queue.fail("a", "boom").await.unwrap();
            assert!(matches!(outcome, FailOutcome::Retrying { .. }));
            let info = queue.get_job("a").await.unwrap().unwrap();
            assert_eq!(info.state, JobState::Delayed);
        }
        assert_eq!(queue.last_error("a").await.as_deref(), Some("boom"));

        assert_eq!(queue.fail("a", "boom").await.unwrap(), FailOutcome::Exhausted);
        assert!(queue.get_job("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_removes_job() {
        let queue = MemoryJobQueue::new();
        queue.add(job("a", None, None)).await.unwrap();
        queue.claim_next().await.unwrap();
        queue.complete("a").await.unwrap();
        assert!(queue.is_empty().await);
    }
}
