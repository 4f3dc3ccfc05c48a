// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::testutil::{ExecBehavior, FakeExecutor, SINGLE_JOB_PAYLOAD};
use fr_client::FakeClient;
use fr_core::{FakeClock, RunResult};

struct Fixture {
    client: Arc<FakeClient>,
    runner: Arc<Runner<FakeExecutor, FakeClient, FakeClock>>,
    executor: Arc<FakeExecutor>,
    jobs: CancellationToken,
}

fn fixture(behavior: ExecBehavior) -> Fixture {
    let client = Arc::new(FakeClient::new());
    let clock = FakeClock::new();
    let executor = Arc::new(FakeExecutor::new(behavior, clock.clone()));
    let cfg = Config::load(None).unwrap();
    let reg = Registration {
        id: 1,
        uuid: "uuid-1".to_string(),
        name: "builder-1".to_string(),
        token: "reg-token".to_string(),
        address: "https://forge.example.com".to_string(),
        labels: vec!["ubuntu-latest:docker://node:18".to_string()],
    };
    let runner =
        Arc::new(Runner::new(&cfg, &reg, client.clone(), executor.clone(), clock.clone()));
    Fixture { client, runner, executor, jobs: CancellationToken::new() }
}

fn simple_task(id: i64) -> Task {
    Task { id, workflow_payload: SINGLE_JOB_PAYLOAD.to_string(), ..Default::default() }
}

#[tokio::test]
async fn successful_task_reports_success() {
    let f = fixture(ExecBehavior::Succeed);
    f.runner.run(&f.jobs, simple_task(1)).await.unwrap();

    let states = f.client.task_requests.lock();
    let last = &states.last().unwrap().state;
    assert_eq!(last.result, RunResult::Success);
    assert_eq!(last.steps.len(), 2);
    assert!(last.steps.iter().all(|s| s.result == RunResult::Success));

    let logs = f.client.log_requests.lock();
    assert!(logs.iter().any(|r| r.no_more));
    let all_rows: Vec<&str> = logs
        .iter()
        .flat_map(|r| r.rows.iter().map(|row| row.content.as_str()))
        .collect();
    assert!(all_rows.iter().any(|c| c.contains("received task 1")));
    assert!(all_rows.iter().any(|c| c.contains("workflow prepared")));
}

#[tokio::test]
async fn duplicate_task_is_rejected() {
    let f = fixture(ExecBehavior::Succeed);
    f.runner.running.lock().insert(7);

    let err = f.runner.run(&f.jobs, simple_task(7)).await.unwrap_err();
    assert!(matches!(err, RunnerError::TaskAlreadyRunning(7)));
}

#[tokio::test]
async fn task_id_is_released_after_the_run() {
    let f = fixture(ExecBehavior::Succeed);
    f.runner.run(&f.jobs, simple_task(3)).await.unwrap();
    assert_eq!(f.runner.running_count(), 0);
    // and the same id can run again
    f.runner.run(&f.jobs, simple_task(3)).await.unwrap();
}

#[tokio::test]
async fn multi_job_workflow_fails_before_the_executor_starts() {
    let f = fixture(ExecBehavior::Succeed);
    let task = Task {
        id: 5,
        workflow_payload: "jobs:\n  a:\n    steps: []\n  b:\n    steps: []\n".to_string(),
        ..Default::default()
    };
    f.runner.run(&f.jobs, task).await.unwrap();

    assert!(f.executor.contexts.lock().is_empty());

    let states = f.client.task_requests.lock();
    assert_eq!(states.last().unwrap().state.result, RunResult::Failure);

    let logs = f.client.log_requests.lock();
    assert!(logs
        .iter()
        .flat_map(|r| r.rows.iter())
        .any(|r| r.content.contains("multiple jobs found")));
}

#[tokio::test]
async fn executor_panic_flows_through_the_close_path() {
    let f = fixture(ExecBehavior::Panic);
    f.runner.run(&f.jobs, simple_task(9)).await.unwrap();

    let states = f.client.task_requests.lock();
    assert_eq!(states.last().unwrap().state.result, RunResult::Failure);

    let logs = f.client.log_requests.lock();
    assert!(logs.iter().flat_map(|r| r.rows.iter()).any(|r| r.content.contains("panic")));
}

#[tokio::test]
async fn failed_job_appends_the_error_as_last_words() {
    let f = fixture(ExecBehavior::FailJob);
    f.runner.run(&f.jobs, simple_task(2)).await.unwrap();

    // the executor reported failure itself, so the state is terminal
    // and the error only shows up as the closing row
    let states = f.client.task_requests.lock();
    assert_eq!(states.last().unwrap().state.result, RunResult::Failure);

    let logs = f.client.log_requests.lock();
    assert!(logs
        .iter()
        .flat_map(|r| r.rows.iter())
        .any(|r| r.content.contains("job build failed")));
}

#[tokio::test]
async fn cancelling_the_jobs_scope_unwinds_the_task() {
    let f = fixture(ExecBehavior::HangUntilCancelled);
    let runner = f.runner.clone();
    let jobs = f.jobs.clone();
    let run = tokio::spawn(async move { runner.run(&jobs, simple_task(4)).await });

    // wait for the task to go live, then force it down
    for _ in 0..200 {
        if f.runner.running_count() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    f.jobs.cancel();
    run.await.unwrap().unwrap();

    let states = f.client.task_requests.lock();
    let last = &states.last().unwrap().state;
    assert_eq!(last.result, RunResult::Failure);
    assert!(last.steps.iter().all(|s| s.result == RunResult::Cancelled));
}

#[tokio::test]
async fn token_promotion_prefers_the_forge_secret() {
    let f = fixture(ExecBehavior::Succeed);
    let mut task = simple_task(6);
    task.context.insert("token", serde_json::json!("ctx-token"));
    task.secrets.insert("FORGE_TOKEN".to_string(), "secret-token".to_string());
    f.runner.run(&f.jobs, task).await.unwrap();

    let contexts = f.executor.contexts.lock();
    let ctx = contexts.last().unwrap();
    assert_eq!(ctx.forge.token, "secret-token");
    // no distinct runtime token: the task token doubles as the api token
    assert_eq!(ctx.env["ACTIONS_RUNTIME_TOKEN"], "secret-token");
}

#[tokio::test]
async fn distinct_runtime_token_is_exposed_to_the_executor() {
    let f = fixture(ExecBehavior::Succeed);
    let mut task = simple_task(8);
    task.context.insert("token", serde_json::json!("ctx-token"));
    task.context.insert("runtime_token", serde_json::json!("rt-token"));
    f.runner.run(&f.jobs, task).await.unwrap();

    let contexts = f.executor.contexts.lock();
    let ctx = contexts.last().unwrap();
    assert_eq!(ctx.forge.token, "ctx-token");
    assert_eq!(ctx.env["ACTIONS_RUNTIME_TOKEN"], "rt-token");
}

#[tokio::test]
async fn executor_context_carries_runner_environment() {
    let f = fixture(ExecBehavior::Succeed);
    let mut task = simple_task(10);
    task.context.insert("repository", serde_json::json!("org/repo"));
    f.runner.run(&f.jobs, task).await.unwrap();

    let contexts = f.executor.contexts.lock();
    let ctx = contexts.last().unwrap();
    assert_eq!(ctx.workdir, std::path::Path::new("/workspace/org/repo"));
    assert_eq!(ctx.platform_image, "node:18");
    assert_eq!(ctx.container_name_prefix, "FORGE-ACTIONS-TASK-10");
    assert_eq!(ctx.env["FORGE_ACTIONS"], "true");
    assert!(ctx.env["ACTIONS_RUNTIME_URL"].ends_with("/api/actions_pipeline/"));
}

#[tokio::test]
async fn declared_outputs_reach_the_coordinator() {
    let f = fixture(ExecBehavior::Succeed);
    let payload = "
jobs:
  build:
    runs-on: ubuntu-latest
    outputs:
      version: \"1.2.3\"
    steps:
      - run: echo one
";
    let task = Task { id: 11, workflow_payload: payload.to_string(), ..Default::default() };
    f.runner.run(&f.jobs, task).await.unwrap();

    let states = f.client.task_requests.lock();
    assert!(states.iter().any(|r| r.outputs.get("version").map(String::as_str) == Some("1.2.3")));
}
