use async_trait::async_trait;
use chrono::Utc;
use common::Backoff;
use sea_orm::sea_query::{Expr, LockBehavior, LockType, NullOrdering};
use sea_orm::*;
use tracing::warn;

use super::queue::{
    FailOutcome, JobInfo, JobOptions, JobQueue, JobState, NewJob, QueueError, after_failure,
};
use crate::entity::recheck_job;

fn job_info(model: &recheck_job::Model) -> Result<JobInfo, QueueError> {
    let state = model
        .state
        .parse()
        .map_err(|state| QueueError::UnknownState {
            id: model.id.clone(),
            state,
        })?;
    Ok(JobInfo {
        id: model.id.clone(),
        state,
        priority: model.priority,
        delay_ms: model.delay_ms,
        created_at: model.created_at,
        attempts_made: Ord::max(model.attempts_made, 0) as u32,
    })
}

fn job_options(model: &recheck_job::Model) -> JobOptions {
    let defaults = JobOptions::default();
    let backoff = serde_json::from_value::<Backoff>(model.backoff.clone()).unwrap_or_else(|e| {
        warn!(job_id = %model.id, error = %e, "Invalid backoff, using default");
        defaults.backoff
    });
    JobOptions {
        attempts: Ord::max(model.max_attempts, 0) as u32,
        backoff,
        remove_on_complete: model.remove_on_complete,
        remove_on_fail: model.remove_on_fail,
    }
}

/// Job queue backed by the `recheck_job` table.
pub struct DbJobQueue {
    db: DatabaseConnection,
}

impl DbJobQueue {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_locked<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> Result<recheck_job::Model, QueueError> {
        recheck_job::Entity::find_by_id(id.to_string())
            .lock(LockType::Update)
            .one(conn)
            .await?
            .ok_or_else(|| QueueError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl JobQueue for DbJobQueue {
    async fn get_job(&self, id: &str) -> Result<Option<JobInfo>, QueueError> {
        recheck_job::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .as_ref()
            .map(job_info)
            .transpose()
    }

    async fn add(&self, job: NewJob) -> Result<bool, QueueError> {
        let now = Utc::now();
        let (state, run_at) = job.schedule(now);
        let backoff =
            serde_json::to_value(job.options.backoff).unwrap_or_else(|_| serde_json::json!({}));

        let model = recheck_job::ActiveModel {
            id: Set(job.id),
            priority: Set(job.priority),
            delay_ms: Set(job.delay_ms),
            state: Set(state.as_str().to_string()),
            attempts_made: Set(0),
            max_attempts: Set(Ord::min(job.options.attempts, i32::MAX as u32) as i32),
            backoff: Set(backoff),
            remove_on_complete: Set(job.options.remove_on_complete),
            remove_on_fail: Set(job.options.remove_on_fail),
            run_at: Set(run_at),
            created_at: Set(now),
            last_error: Set(None),
        };

        let result = recheck_job::Entity::insert(model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(recheck_job::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(0) | Err(DbErr::RecordNotInserted) => Ok(false),
            Ok(_) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    async fn promote(&self, id: &str) -> Result<(), QueueError> {
        recheck_job::Entity::update_many()
            .col_expr(
                recheck_job::Column::State,
                Expr::value(JobState::Waiting.as_str()),
            )
            .col_expr(recheck_job::Column::RunAt, Expr::value(Utc::now()))
            .filter(recheck_job::Column::Id.eq(id))
            .filter(recheck_job::Column::State.eq(JobState::Delayed.as_str()))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), QueueError> {
        recheck_job::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<JobInfo>, QueueError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let runnable = Condition::any()
            .add(recheck_job::Column::State.eq(JobState::Waiting.as_str()))
            .add(
                Condition::all()
                    .add(recheck_job::Column::State.eq(JobState::Delayed.as_str()))
                    .add(recheck_job::Column::RunAt.lte(now)),
            );

        let next = recheck_job::Entity::find()
            .filter(runnable)
            .order_by_with_nulls(recheck_job::Column::Priority, Order::Asc, NullOrdering::Last)
            .order_by_asc(recheck_job::Column::RunAt)
            .order_by_asc(recheck_job::Column::CreatedAt)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await?;

        let Some(model) = next else {
            txn.commit().await?;
            return Ok(None);
        };

        let mut active: recheck_job::ActiveModel = model.into();
        active.state = Set(JobState::Active.as_str().to_string());
        let claimed = active.update(&txn).await?;
        txn.commit().await?;

        job_info(&claimed).map(Some)
    }

    async fn complete(&self, id: &str) -> Result<(), QueueError> {
        let txn = self.db.begin().await?;
        let model = Self::find_locked(&txn, id).await?;

        if model.remove_on_complete {
            recheck_job::Entity::delete_by_id(model.id).exec(&txn).await?;
        } else {
            let mut active: recheck_job::ActiveModel = model.into();
            active.state = Set(JobState::Completed.as_str().to_string());
            active.update(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn fail(&self, id: &str, error: &str) -> Result<FailOutcome, QueueError> {
        let txn = self.db.begin().await?;
        let model = Self::find_locked(&txn, id).await?;

        let options = job_options(&model);
        let attempts_made = model.attempts_made.saturating_add(1);
        let outcome = after_failure(&options, Ord::max(attempts_made, 0) as u32, Utc::now());

        match outcome {
            FailOutcome::Exhausted if options.remove_on_fail => {
                recheck_job::Entity::delete_by_id(model.id).exec(&txn).await?;
            }
            _ => {
                let mut active: recheck_job::ActiveModel = model.into();
                active.attempts_made = Set(attempts_made);
                active.last_error = Set(Some(error.to_string()));
                match outcome {
                    FailOutcome::Retrying { run_at } => {
                        active.state = Set(JobState::Delayed.as_str().to_string());
                        active.run_at = Set(run_at);
                    }
                    FailOutcome::Exhausted => {
                        active.state = Set(JobState::Failed.as_str().to_string());
                    }
                }
                active.update(&txn).await?;
            }
        }

        txn.commit().await?;
        Ok(outcome)
    }
}
