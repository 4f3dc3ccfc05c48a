// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-mode workflow executor.
//!
//! Runs each `run:` step as a shell command on the host, streaming its
//! output through the log hook the same way the containerized executor
//! does. Action (`uses:`) steps are skipped; container isolation is the
//! containerized executor's job.

use crate::executor::{
    ExecuteError, ExecutionContext, LogEntry, LogHook, Stage, WorkflowExecutor,
};
use crate::workflow::{Step, Workflow};
use async_trait::async_trait;
use fr_core::{Clock, RunResult, SystemClock};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Executes job steps directly on the host.
pub struct LocalExecutor<K: Clock = SystemClock> {
    clock: K,
}

impl LocalExecutor<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl Default for LocalExecutor<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clock> LocalExecutor<K> {
    pub fn with_clock(clock: K) -> Self {
        Self { clock }
    }

    fn entry(&self, message: impl Into<String>) -> LogEntry {
        LogEntry::new(self.clock.now(), message)
    }

    async fn run_step(
        &self,
        ctx: &ExecutionContext,
        step: &Step,
        index: usize,
        script: &str,
        hook: &Arc<dyn LogHook>,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> RunResult {
        let shell = step.shell.as_deref().unwrap_or("sh");

        let mut command = tokio::process::Command::new(shell);
        command
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &ctx.env {
            command.env(k, v);
        }
        for (k, v) in &step.env {
            command.env(k, v);
        }
        if let Some(dir) = &step.working_directory {
            command.current_dir(ctx.workdir.join(dir));
        } else {
            command.current_dir(&ctx.workdir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                hook.fire(
                    self.entry(format!("failed to start step: {}", e))
                        .stage(Stage::Main)
                        .step_number(index)
                        .raw_output(true),
                );
                return RunResult::Failure;
            }
        };

        // pump output on separate tasks so a full pipe never stalls the child
        let out_pump = spawn_pump(self.clock.clone(), hook.clone(), index, child.stdout.take());
        let err_pump = spawn_pump(self.clock.clone(), hook.clone(), index, child.stderr.take());

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Waited::Cancelled
            }
            _ = tokio::time::sleep_until(deadline) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Waited::DeadlineExceeded
            }
        };
        let _ = out_pump.await;
        let _ = err_pump.await;

        match waited {
            Waited::Cancelled => RunResult::Cancelled,
            Waited::DeadlineExceeded => {
                hook.fire(
                    self.entry("step aborted: job lifetime exceeded")
                        .stage(Stage::Main)
                        .step_number(index)
                        .raw_output(true),
                );
                RunResult::Failure
            }
            Waited::Exited(Ok(status)) if status.success() => RunResult::Success,
            Waited::Exited(Ok(status)) => {
                hook.fire(
                    self.entry(format!("step exited with {}", status))
                        .stage(Stage::Main)
                        .step_number(index)
                        .raw_output(true),
                );
                RunResult::Failure
            }
            Waited::Exited(Err(e)) => {
                hook.fire(
                    self.entry(format!("failed to wait for step: {}", e))
                        .stage(Stage::Main)
                        .step_number(index)
                        .raw_output(true),
                );
                RunResult::Failure
            }
        }
    }
}

enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled,
    DeadlineExceeded,
}

/// Forward each output line as a raw step row on its own task. Bytes
/// that are not valid UTF-8 come through with `?` placeholders.
fn spawn_pump<K, R>(
    clock: K,
    hook: Arc<dyn LogHook>,
    index: usize,
    source: Option<R>,
) -> tokio::task::JoinHandle<()>
where
    K: Clock,
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(source) = source else { return };
        let mut lines = BufReader::new(source).split(b'\n');
        while let Ok(Some(line)) = lines.next_segment().await {
            let text = String::from_utf8_lossy(&line).replace('\u{FFFD}', "?");
            hook.fire(
                LogEntry::new(clock.now(), text)
                    .stage(Stage::Main)
                    .step_number(index)
                    .raw_output(true),
            );
        }
    })
}

#[async_trait]
impl<K: Clock> WorkflowExecutor for LocalExecutor<K> {
    async fn execute(
        &self,
        ctx: ExecutionContext,
        workflow: Workflow,
        job_id: String,
        hook: Arc<dyn LogHook>,
        cancel: CancellationToken,
    ) -> Result<(), ExecuteError> {
        let Some(job) = workflow.jobs.get(&job_id) else {
            return Err(ExecuteError::UnknownJob(job_id));
        };

        hook.fire(self.entry(format!("Preparing job {}", job_id)).stage(Stage::Setup));
        tokio::fs::create_dir_all(&ctx.workdir).await?;

        let deadline = Instant::now() + ctx.max_lifetime;
        let mut job_result = RunResult::Success;

        for (index, step) in job.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                job_result = RunResult::Cancelled;
                break;
            }

            if job_result != RunResult::Success {
                hook.fire(
                    self.entry(format!("{}: skipped", step.display_name()))
                        .stage(Stage::Main)
                        .step_number(index)
                        .step_result(RunResult::Skipped),
                );
                continue;
            }

            if ctx.debug_logging {
                tracing::debug!(job = %job_id, step = index, "starting step");
            }
            hook.fire(
                self.entry(step.display_name()).stage(Stage::Main).step_number(index),
            );

            let result = match (&step.run, &step.uses) {
                (Some(script), _) => {
                    self.run_step(&ctx, step, index, script, &hook, &cancel, deadline).await
                }
                (None, Some(uses)) => {
                    hook.fire(
                        self.entry(format!("action {} is not supported on the host, skipping", uses))
                            .stage(Stage::Main)
                            .step_number(index)
                            .raw_output(true),
                    );
                    RunResult::Skipped
                }
                (None, None) => RunResult::Skipped,
            };

            hook.fire(
                self.entry(format!("{}: {}", step.display_name(), result))
                    .stage(Stage::Main)
                    .step_number(index)
                    .step_result(result),
            );

            if result == RunResult::Failure && !step.continue_on_error {
                job_result = RunResult::Failure;
            }
            if result == RunResult::Cancelled {
                job_result = RunResult::Cancelled;
            }
        }

        match job_result {
            RunResult::Cancelled => Err(ExecuteError::Cancelled),
            RunResult::Failure => {
                hook.fire(
                    self.entry(format!("Job {} failed", job_id))
                        .stage(Stage::Teardown)
                        .job_result(RunResult::Failure),
                );
                Err(ExecuteError::JobFailed(job_id))
            }
            _ => {
                hook.fire(
                    self.entry(format!("Job {} complete", job_id))
                        .stage(Stage::Teardown)
                        .job_result(RunResult::Success),
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
