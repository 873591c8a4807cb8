use std::collections::HashSet;
use std::sync::Arc;

use server::recheck::{
    DbJobQueue, FailOutcome, JobOptions, JobQueue, JobState, NewJob, RecheckRequest,
    RecheckScheduler,
};

use crate::common::test_db;

fn job(id: &str, priority: Option<i32>, delay_ms: Option<i64>) -> NewJob {
    NewJob {
        id: id.to_string(),
        delay_ms,
        priority,
        options: JobOptions::default(),
    }
}

#[tokio::test]
async fn add_is_unique_per_id() {
    let Some(db) = test_db().await else { return };
    let queue = DbJobQueue::new(db);

    assert!(queue.add(job("440_1", None, None)).await.unwrap());
    assert!(!queue.add(job("440_1", Some(1), None)).await.unwrap());

    let info = queue.get_job("440_1").await.unwrap().unwrap();
    assert_eq!(info.state, JobState::Waiting);
    assert_eq!(info.priority, None);
}

#[tokio::test]
async fn claim_orders_by_priority_and_skips_pending_delays() {
    let Some(db) = test_db().await else { return };
    let queue = DbJobQueue::new(db);

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
async fn concurrent_claims_take_distinct_jobs() {
    let Some(db) = test_db().await else { return };
    let queue = Arc::new(DbJobQueue::new(db));

    for i in 0..8 {
        queue.add(job(&format!("440_{i}"), None, None)).await.unwrap();
    }

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let queue = Arc::clone(&queue);
        tasks.push(tokio::spawn(async move { queue.claim_next().await.unwrap() }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        if let Some(info) = task.await.unwrap() {
            assert!(ids.insert(info.id), "job claimed twice");
        }
    }
    while let Some(info) = queue.claim_next().await.unwrap() {
        assert!(ids.insert(info.id), "job claimed twice");
    }
    assert_eq!(ids.len(), 8);
}

#[tokio::test]
async fn failures_back_off_then_remove() {
    let Some(db) = test_db().await else { return };
    let queue = DbJobQueue::new(db);
    queue.add(job("440_1", None, None)).await.unwrap();

    queue.claim_next().await.unwrap().unwrap();
    let FailOutcome::Retrying { .. } = queue.fail("440_1", "timeout").await.unwrap() else {
        panic!("first failure must retry");
    };
    let info = queue.get_job("440_1").await.unwrap().unwrap();
    assert_eq!(info.state, JobState::Delayed);
    assert_eq!(info.attempts_made, 1);
    // Backoff window has not passed yet.
    assert!(queue.claim_next().await.unwrap().is_none());

    queue.fail("440_1", "timeout").await.unwrap();
    assert_eq!(
        queue.fail("440_1", "timeout").await.unwrap(),
        FailOutcome::Exhausted
    );
    assert!(queue.get_job("440_1").await.unwrap().is_none());
}

#[tokio::test]
async fn complete_removes_job() {
    let Some(db) = test_db().await else { return };
    let queue = DbJobQueue::new(db);
    queue.add(job("440_1", None, None)).await.unwrap();
    queue.claim_next().await.unwrap().unwrap();
    queue.complete("440_1").await.unwrap();
    assert!(queue.get_job("440_1").await.unwrap().is_none());
}

#[tokio::test]
async fn scheduler_over_postgres() {
    let Some(db) = test_db().await else { return };
    let queue = Arc::new(DbJobQueue::new(db));
    let scheduler = RecheckScheduler::new(queue.clone());

    assert!(scheduler.enqueue("440_1", RecheckRequest::default()).await.unwrap());
    queue.claim_next().await.unwrap().unwrap();
    assert!(!scheduler.enqueue("440_1", RecheckRequest::default()).await.unwrap());

    let delayed = RecheckRequest {
        delay_ms: Some(60_000),
        ..Default::default()
    };
    assert!(scheduler.enqueue("440_2", delayed).await.unwrap());
    assert!(!scheduler.enqueue("440_2", RecheckRequest::default()).await.unwrap());
    assert_eq!(
        queue.get_job("440_2").await.unwrap().unwrap().state,
        JobState::Waiting
    );

    let reprioritized = RecheckRequest {
        priority: Some(1),
        ..Default::default()
    };
    assert!(scheduler.enqueue("440_2", reprioritized).await.unwrap());
    assert_eq!(
        queue.get_job("440_2").await.unwrap().unwrap().priority,
        Some(1)
    );
}
