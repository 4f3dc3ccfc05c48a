// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task orchestration: claim the task, wire the executor's log
//! stream to a reporter, execute, and always close with the outcome.

use crate::executor::{ExecuteError, ExecutionContext, ForgeContext, LogHook, WorkflowExecutor};
use crate::report::{Reporter, ReporterOptions};
use crate::workflow::{generate_workflow, WorkflowError};
use fr_client::{Client, ClientError, DeclareRequest, DeclareResponse};
use fr_core::{Clock, Config, Labels, Registration, Task};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("task {0} is already running")]
    TaskAlreadyRunning(i64),
}

/// Per-task failures surfaced to the coordinator as close last-words;
/// the dispatch loop never sees them.
#[derive(Debug, Error)]
enum TaskError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    #[error("encode event payload: {0}")]
    EventPayload(#[from] serde_json::Error),
    #[error("{0}")]
    Panic(String),
}

/// Removes the task id from the live set however the run ends.
struct RunningGuard<'a> {
    running: &'a Mutex<HashSet<i64>>,
    id: i64,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.lock().remove(&self.id);
    }
}

/// Executes exactly one task end-to-end with bounded lifetime and
/// guaranteed final reporting.
pub struct Runner<E, C, K>
where
    E: WorkflowExecutor,
    C: Client,
    K: Clock,
{
    name: String,
    cfg: Config,
    client: Arc<C>,
    executor: Arc<E>,
    clock: K,
    labels: Labels,
    envs: HashMap<String, String>,
    running: Mutex<HashSet<i64>>,
}

impl<E, C, K> Runner<E, C, K>
where
    E: WorkflowExecutor,
    C: Client,
    K: Clock,
{
    pub fn new(
        cfg: &Config,
        reg: &Registration,
        client: Arc<C>,
        executor: Arc<E>,
        clock: K,
    ) -> Self {
        let labels = Labels::parse_lenient(&reg.labels);

        let mut envs = cfg.runner.envs.clone();
        if cfg.cache.enabled {
            if !cfg.cache.external_server.is_empty() {
                envs.insert("ACTIONS_CACHE_URL".to_string(), cfg.cache.external_server.clone());
            } else if !cfg.cache.host.is_empty() && cfg.cache.port != 0 {
                envs.insert(
                    "ACTIONS_CACHE_URL".to_string(),
                    format!("http://{}:{}/", cfg.cache.host, cfg.cache.port),
                );
            } else {
                tracing::debug!("cache sidecar address not configured, cache disabled for jobs");
            }
        }

        let address = client.address().trim_end_matches('/').to_string();
        envs.insert("ACTIONS_RUNTIME_URL".to_string(), format!("{}/api/actions_pipeline/", address));
        envs.insert("ACTIONS_RESULTS_URL".to_string(), address);
        envs.insert("FORGE_ACTIONS".to_string(), "true".to_string());
        envs.insert("FORGE_ACTIONS_RUNNER_VERSION".to_string(), fr_core::version().to_string());

        Self {
            name: reg.name.clone(),
            cfg: cfg.clone(),
            client,
            executor,
            clock,
            labels,
            envs,
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Declare this runner's version and labels to the coordinator.
    pub async fn declare(&self, labels: Vec<String>) -> Result<DeclareResponse, ClientError> {
        self.client
            .declare(DeclareRequest { version: fr_core::version().to_string(), labels })
            .await
    }

    /// Run one task to completion, including its final report flush.
    ///
    /// Returns once the task has been fully reported, success or
    /// failure; the execution outcome is observed via the coordinator.
    /// Rejects a task id that is already live.
    pub async fn run(&self, jobs: &CancellationToken, task: Task) -> Result<(), RunnerError> {
        let task_id = task.id;
        if !self.running.lock().insert(task_id) {
            return Err(RunnerError::TaskAlreadyRunning(task_id));
        }
        let _guard = RunningGuard { running: &self.running, id: task_id };

        let token = jobs.child_token();
        let timeout = self.cfg.task_timeout();
        let deadline = Instant::now() + timeout;
        {
            // deadline watchdog: cancels the task scope, which unwinds
            // the executor and bounds the close retry loop
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => token.cancel(),
                    _ = token.cancelled() => {}
                }
            });
        }

        let reporter = Arc::new(Reporter::new(
            self.client.clone(),
            self.clock.clone(),
            &task,
            token.clone(),
            ReporterOptions {
                task_timeout: timeout,
                close_timeout: self.cfg.runner.report_close_timeout,
            },
        ));
        reporter.run_daemon();

        let run_err = self.execute_task(&task, deadline, &reporter, &token).await.err();
        let last_words = run_err.as_ref().map(ToString::to_string).unwrap_or_default();
        if let Err(e) = reporter.close(&last_words).await {
            tracing::error!(task = task_id, error = %e, "failed to close reporter");
        }
        token.cancel();

        Ok(())
    }

    async fn execute_task(
        &self,
        task: &Task,
        deadline: Instant,
        reporter: &Arc<Reporter<C, K>>,
        token: &CancellationToken,
    ) -> Result<(), TaskError> {
        reporter.log_line(format!(
            "{}(version:{}) received task {} of job {}, triggered by event: {}",
            self.name,
            fr_core::version(),
            task.id,
            task.context.str_field("job"),
            task.context.str_field("event_name"),
        ));

        let (workflow, job_id) = generate_workflow(task)?;
        let Some(job) = workflow.jobs.get(&job_id).cloned() else {
            return Err(ExecuteError::UnknownJob(job_id).into());
        };
        reporter.reset_steps(job.steps.len());

        tracing::info!(
            task = task.id,
            repository = task.context.str_field("repository"),
            actions_url = task.context.str_field("default_actions_url"),
            coordinator = self.client.address(),
            "task repository resolved"
        );

        let ctx = &task.context;
        let mut forge = ForgeContext {
            event: ctx.value("event").cloned().unwrap_or(serde_json::Value::Null),
            event_name: ctx.str_field("event_name").to_string(),
            run_id: ctx.str_field("run_id").to_string(),
            run_number: ctx.str_field("run_number").to_string(),
            actor: ctx.str_field("actor").to_string(),
            repository: ctx.str_field("repository").to_string(),
            repository_owner: ctx.str_field("repository_owner").to_string(),
            sha: ctx.str_field("sha").to_string(),
            git_ref: ctx.str_field("ref").to_string(),
            ref_name: ctx.str_field("ref_name").to_string(),
            ref_type: ctx.str_field("ref_type").to_string(),
            head_ref: ctx.str_field("head_ref").to_string(),
            base_ref: ctx.str_field("base_ref").to_string(),
            token: ctx.str_field("token").to_string(),
            retention_days: ctx.str_field("retention_days").to_string(),
        };
        if let Some(t) = task.secrets.get("FORGE_TOKEN").filter(|t| !t.is_empty()) {
            forge.token = t.clone();
        } else if let Some(t) = task.secrets.get("GITHUB_TOKEN").filter(|t| !t.is_empty()) {
            forge.token = t.clone();
        }

        // older coordinators do not send a dedicated runtime token; the
        // task token doubles as the actions api token there
        let mut runtime_token = ctx.str_field("runtime_token").to_string();
        if runtime_token.is_empty() {
            runtime_token = forge.token.clone();
        }
        let mut env = self.envs.clone();
        env.insert("ACTIONS_RUNTIME_TOKEN".to_string(), runtime_token);

        let event_json = serde_json::to_string(&forge.event)?;

        let workdir = PathBuf::from(format!(
            "/{}/{}",
            self.cfg.container.workdir_parent.trim_start_matches('/'),
            forge.repository
        ));

        let exec_ctx = ExecutionContext {
            workdir,
            action_cache_dir: PathBuf::from(&self.cfg.host.workdir_parent),
            env,
            secrets: task.secrets.clone(),
            vars: task.vars.clone(),
            event_json,
            coordinator_url: self.client.address().trim_end_matches('/').to_string(),
            default_actions_url: ctx.str_field("default_actions_url").to_string(),
            platform_image: self.labels.pick_platform(&job.runs_on()),
            container_name_prefix: format!("FORGE-ACTIONS-TASK-{}", task.id),
            network: self.cfg.container.network.clone(),
            container_options: self.cfg.container.options.clone(),
            privileged: self.cfg.container.privileged,
            valid_volumes: self.cfg.container.valid_volumes.clone(),
            docker_host: self.cfg.container.docker_host.clone(),
            force_pull: self.cfg.container.force_pull,
            force_rebuild: self.cfg.container.force_rebuild,
            max_lifetime: deadline.saturating_duration_since(Instant::now()),
            insecure: self.cfg.runner.insecure,
            debug_logging: tracing::enabled!(tracing::Level::DEBUG),
            forge,
        };

        reporter.log_line("workflow prepared");

        // the executor runs on its own task so a panic inside it is
        // contained and flows through the normal close path
        let handle = {
            let executor = self.executor.clone();
            let workflow = workflow.clone();
            let job_id = job_id.clone();
            let hook: Arc<dyn LogHook> = reporter.clone();
            let token = token.clone();
            tokio::spawn(
                async move { executor.execute(exec_ctx, workflow, job_id, hook, token).await },
            )
        };
        let exec_result = match handle.await {
            Ok(result) => result,
            Err(e) => return Err(TaskError::Panic(panic_message(e))),
        };

        reporter.set_outputs(&job.outputs);
        exec_result?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn running_count(&self) -> usize {
        self.running.lock().len()
    }
}

fn panic_message(e: tokio::task::JoinError) -> String {
    if !e.is_panic() {
        return format!("executor aborted: {}", e);
    }
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic: unknown payload".to_string()
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
