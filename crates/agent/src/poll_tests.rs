// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::testutil::{ExecBehavior, FakeExecutor, SINGLE_JOB_PAYLOAD};
use fr_client::{FakeClient, FetchTaskResponse};
use fr_core::{FakeClock, Registration, RunResult};

struct Fixture {
    client: Arc<FakeClient>,
    poller: Arc<Poller<FakeExecutor, FakeClient, FakeClock>>,
    runner: Arc<Runner<FakeExecutor, FakeClient, FakeClock>>,
}

fn fixture(behavior: ExecBehavior, capacity: usize) -> Fixture {
    let client = Arc::new(FakeClient::new());
    let clock = FakeClock::new();
    let executor = Arc::new(FakeExecutor::new(behavior, clock.clone()));
    let mut cfg = Config::load(None).unwrap();
    cfg.runner.capacity = capacity;
    cfg.runner.fetch_interval = Some(Duration::from_millis(1));
    cfg.runner.fetch_timeout = Some(Duration::from_secs(1));
    let reg = Registration {
        name: "builder-1".to_string(),
        address: "https://forge.example.com".to_string(),
        ..Default::default()
    };
    let runner = Arc::new(Runner::new(&cfg, &reg, client.clone(), executor, clock));
    let poller = Arc::new(Poller::new(&cfg, client.clone(), runner.clone()));
    Fixture { client, poller, runner }
}

fn task_response(id: i64, version: i64) -> FetchTaskResponse {
    FetchTaskResponse {
        tasks_version: version,
        task: Some(Task {
            id,
            workflow_payload: SINGLE_JOB_PAYLOAD.to_string(),
            ..Default::default()
        }),
    }
}

async fn wait_for(mut probe: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if probe() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn empty_response_raises_the_tasks_version() {
    let f = fixture(ExecBehavior::Succeed, 1);
    f.client.push_fetch(FetchTaskResponse { tasks_version: 5, task: None });

    assert!(f.poller.fetch_task().await.is_none());
    assert_eq!(f.poller.tasks_version.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn a_claimed_task_forces_the_next_fetch_to_query() {
    let f = fixture(ExecBehavior::Succeed, 1);
    f.client.push_fetch(task_response(1, 7));

    let task = f.poller.fetch_task().await.unwrap();
    assert_eq!(task.id, 1);
    // version drops to zero so the next poll queries authoritatively
    assert_eq!(f.poller.tasks_version.load(Ordering::SeqCst), 0);
    assert_eq!(f.client.fetch_requests.lock()[0].tasks_version, 0);
}

#[tokio::test]
async fn empty_fetch_means_no_task() {
    let f = fixture(ExecBehavior::Succeed, 1);
    f.client.push_fetch(FetchTaskResponse::default());
    assert!(f.poller.fetch_task().await.is_none());
}

#[tokio::test]
async fn worker_dispatches_a_fetched_task() {
    let f = fixture(ExecBehavior::Succeed, 1);
    f.client.push_fetch(task_response(1, 3));

    let run = tokio::spawn(f.poller.clone().run());
    wait_for(|| {
        f.client.task_requests.lock().iter().any(|r| r.state.result == RunResult::Success)
    })
    .await;

    f.poller.shutdown(Duration::from_secs(5)).await.unwrap();
    run.await.unwrap();
}

#[tokio::test]
async fn clean_shutdown_drains_idle_workers() {
    let f = fixture(ExecBehavior::Succeed, 2);
    let run = tokio::spawn(f.poller.clone().run());

    // give the workers a moment to reach the limiter
    tokio::time::sleep(Duration::from_millis(20)).await;
    f.poller.shutdown(Duration::from_secs(5)).await.unwrap();
    run.await.unwrap();
    assert!(f.poller.done.is_cancelled());
}

#[tokio::test]
async fn expired_grace_cancels_jobs_but_still_reports() {
    let f = fixture(ExecBehavior::HangUntilCancelled, 2);
    f.client.push_fetch(task_response(1, 1));
    f.client.push_fetch(task_response(2, 2));

    let run = tokio::spawn(f.poller.clone().run());
    wait_for(|| f.runner.running_count() == 2).await;

    let err = f.poller.shutdown(Duration::from_millis(1)).await.unwrap_err();
    assert!(matches!(err, ShutdownError::GraceExpired));
    run.await.unwrap();

    // both tasks were forced down and still published a final flush
    let states = f.client.task_requests.lock();
    let terminal: Vec<_> =
        states.iter().filter(|r| r.state.result == RunResult::Failure).collect();
    assert_eq!(terminal.iter().map(|r| r.state.id).collect::<std::collections::HashSet<_>>().len(), 2);

    let logs = f.client.log_requests.lock();
    assert_eq!(logs.iter().filter(|r| r.no_more).count(), 2);
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let f = fixture(ExecBehavior::Succeed, 1);
    let run = tokio::spawn(f.poller.clone().run());

    tokio::time::sleep(Duration::from_millis(10)).await;
    f.poller.shutdown(Duration::from_secs(1)).await.unwrap();
    f.poller.shutdown(Duration::from_secs(1)).await.unwrap();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rate_limiter_spaces_tokens_by_the_interval() {
    let limiter = RateLimiter::new(Duration::from_secs(2));
    let cancel = CancellationToken::new();

    let start = Instant::now();
    limiter.wait(&cancel).await.unwrap();
    let first = start.elapsed();
    limiter.wait(&cancel).await.unwrap();
    let second = start.elapsed();

    assert!(first < Duration::from_millis(100));
    assert!(second >= Duration::from_secs(2));
}

#[tokio::test]
async fn rate_limiter_wait_is_cancellable() {
    let limiter = RateLimiter::new(Duration::from_secs(3600));
    let cancel = CancellationToken::new();

    // burn the immediate token
    limiter.wait(&cancel).await.unwrap();

    cancel.cancel();
    assert!(limiter.wait(&cancel).await.is_err());
}
