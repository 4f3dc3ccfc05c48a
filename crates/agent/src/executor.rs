// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workflow-executor seam.
//!
//! The agent core never touches containers itself; it hands a prepared
//! workflow to a [`WorkflowExecutor`] and observes progress through the
//! structured [`LogEntry`] stream delivered to a [`LogHook`].

use crate::workflow::Workflow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fr_core::RunResult;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from workflow execution.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("unknown job: {0}")]
    UnknownJob(String),
    #[error("job {0} failed")]
    JobFailed(String),
    #[error("job cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which phase of the job an entry belongs to. Only `Main` entries are
/// attributed to steps; setup and teardown chatter goes to the general
/// transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Setup,
    Main,
    Teardown,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Setup => "setup",
            Self::Main => "main",
            Self::Teardown => "teardown",
        })
    }
}

/// One structured log entry emitted by an executor.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub message: String,
    pub stage: Stage,
    /// Index of the step this entry belongs to (`Main` stage only).
    pub step_number: Option<usize>,
    /// True for lines captured from the step's own output.
    pub raw_output: bool,
    /// Terminal result of the step, carried by its last entry.
    pub step_result: Option<RunResult>,
    /// Terminal result of the whole job, carried by a non-`Main` entry.
    pub job_result: Option<RunResult>,
}

impl LogEntry {
    pub fn new(time: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            time,
            message: message.into(),
            stage: Stage::Setup,
            step_number: None,
            raw_output: false,
            step_result: None,
            job_result: None,
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn raw_output(mut self, raw_output: bool) -> Self {
        self.raw_output = raw_output;
        self
    }

    pub fn step_number(mut self, step_number: usize) -> Self {
        self.step_number = Some(step_number);
        self
    }

    pub fn step_result(mut self, step_result: RunResult) -> Self {
        self.step_result = Some(step_result);
        self
    }

    pub fn job_result(mut self, job_result: RunResult) -> Self {
        self.job_result = Some(job_result);
        self
    }
}

/// Receives the executor's structured log stream. Implemented by the
/// reporter; must be cheap and non-blocking.
pub trait LogHook: Send + Sync {
    fn fire(&self, entry: LogEntry);
}

/// Forge metadata preset handed to the executor, resolved from the task
/// context.
#[derive(Debug, Clone, Default)]
pub struct ForgeContext {
    pub event: serde_json::Value,
    pub event_name: String,
    pub run_id: String,
    pub run_number: String,
    pub actor: String,
    pub repository: String,
    pub repository_owner: String,
    pub sha: String,
    pub git_ref: String,
    pub ref_name: String,
    pub ref_type: String,
    pub head_ref: String,
    pub base_ref: String,
    pub token: String,
    pub retention_days: String,
}

/// Everything an executor needs to run one job.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Working directory of the job, `/{workdir_parent}/{owner}/{repo}`.
    pub workdir: PathBuf,
    /// Host-side cache for checked-out actions.
    pub action_cache_dir: PathBuf,
    pub env: HashMap<String, String>,
    pub secrets: HashMap<String, String>,
    pub vars: HashMap<String, String>,
    pub forge: ForgeContext,
    /// The event payload, serialized once.
    pub event_json: String,
    /// Coordinator base address, for api usage inside jobs.
    pub coordinator_url: String,
    pub default_actions_url: String,
    /// Container image resolved from the task's `runs-on` labels.
    pub platform_image: String,
    pub container_name_prefix: String,
    pub network: String,
    pub container_options: String,
    pub privileged: bool,
    pub valid_volumes: Vec<String>,
    pub docker_host: String,
    pub force_pull: bool,
    pub force_rebuild: bool,
    /// Remaining task lifetime at executor start.
    pub max_lifetime: Duration,
    pub insecure: bool,
    /// Forward executor internals to the process log (debug level only).
    pub debug_logging: bool,
}

/// Plans and executes one job of a workflow, reporting progress through
/// the hook and unwinding promptly when the token fires.
#[async_trait]
pub trait WorkflowExecutor: Send + Sync + 'static {
    async fn execute(
        &self,
        ctx: ExecutionContext,
        workflow: Workflow,
        job_id: String,
        hook: Arc<dyn LogHook>,
        cancel: CancellationToken,
    ) -> Result<(), ExecuteError>;
}
