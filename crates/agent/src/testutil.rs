// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test doubles for the agent crate.

use crate::executor::{
    ExecuteError, ExecutionContext, LogEntry, LogHook, Stage, WorkflowExecutor,
};
use crate::workflow::Workflow;
use async_trait::async_trait;
use fr_core::{Clock, FakeClock, RunResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const SINGLE_JOB_PAYLOAD: &str = "
name: test
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: echo one
      - run: echo two
";

/// What the scripted executor should do with a job.
#[derive(Clone, Copy)]
pub enum ExecBehavior {
    /// Emit output and results for every step, then a successful job result.
    Succeed,
    /// Emit a failed job result and return the job-failed error.
    FailJob,
    /// Panic mid-execution.
    Panic,
    /// Block until the cancellation token fires.
    HangUntilCancelled,
}

/// Scripted workflow executor recording what it was invoked with.
pub struct FakeExecutor {
    pub behavior: ExecBehavior,
    pub clock: FakeClock,
    pub contexts: Mutex<Vec<ExecutionContext>>,
}

impl FakeExecutor {
    pub fn new(behavior: ExecBehavior, clock: FakeClock) -> Self {
        Self { behavior, clock, contexts: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl WorkflowExecutor for FakeExecutor {
    async fn execute(
        &self,
        ctx: ExecutionContext,
        workflow: Workflow,
        job_id: String,
        hook: Arc<dyn LogHook>,
        cancel: CancellationToken,
    ) -> Result<(), ExecuteError> {
        self.contexts.lock().push(ctx);

        match self.behavior {
            ExecBehavior::Succeed => {
                let steps = workflow.jobs.get(&job_id).map(|j| j.steps.len()).unwrap_or_default();
                for i in 0..steps {
                    hook.fire(
                        LogEntry::new(self.clock.now(), format!("output of step {}", i))
                            .stage(Stage::Main)
                            .step_number(i)
                            .raw_output(true),
                    );
                    hook.fire(
                        LogEntry::new(self.clock.now(), "step done")
                            .stage(Stage::Main)
                            .step_number(i)
                            .step_result(RunResult::Success),
                    );
                }
                hook.fire(
                    LogEntry::new(self.clock.now(), format!("job {} complete", job_id))
                        .stage(Stage::Teardown)
                        .job_result(RunResult::Success),
                );
                Ok(())
            }
            ExecBehavior::FailJob => {
                hook.fire(
                    LogEntry::new(self.clock.now(), format!("job {} failed", job_id))
                        .stage(Stage::Teardown)
                        .job_result(RunResult::Failure),
                );
                Err(ExecuteError::JobFailed(job_id))
            }
            ExecBehavior::Panic => panic!("executor exploded"),
            ExecBehavior::HangUntilCancelled => {
                cancel.cancelled().await;
                Err(ExecuteError::Cancelled)
            }
        }
    }
}
