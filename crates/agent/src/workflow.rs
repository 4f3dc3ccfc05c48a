// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow synthesis: turn a task's payload into the single-job
//! document the executor plans from.
//!
//! The coordinator dispatches one job at a time, but the job may
//! reference its upstream jobs (`needs.<job>.outputs.*`, cross-job
//! results). Those upstream jobs are synthesized here as stubs carrying
//! the outputs and results the task brought along.

use fr_core::Task;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("parse workflow: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("multiple jobs found: {}", .0.join(", "))]
    MultipleJobs(Vec<String>),
}

/// A string or a list of strings; YAML allows both for `needs` and
/// `runs-on`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    One(String),
    Many(Vec<String>),
}

impl StringList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

/// A parsed workflow document. Only the fields the agent inspects are
/// modeled; the executor receives the same structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "on", skip_serializing_if = "Option::is_none")]
    pub on: Option<serde_yaml::Value>,
    #[serde(default)]
    pub jobs: BTreeMap<String, Job>,
}

/// One job of a workflow. Stub jobs synthesized from the needs map only
/// carry `outputs` and `result`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs: Option<StringList>,
    #[serde(default, rename = "runs-on", skip_serializing_if = "Option::is_none")]
    pub runs_on: Option<StringList>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
    /// Completion result of a stub upstream job, lowercased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Job {
    /// Declared upstream job names, in document order.
    pub fn needs(&self) -> Vec<String> {
        self.needs.as_ref().map(|n| n.to_vec()).unwrap_or_default()
    }

    /// Platforms this job asks for.
    pub fn runs_on(&self) -> Vec<String> {
        self.runs_on.as_ref().map(|r| r.to_vec()).unwrap_or_default()
    }
}

/// One step of a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default, rename = "working-directory", skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default, rename = "continue-on-error")]
    pub continue_on_error: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Step {
    /// Name shown in logs: explicit name, else the command or action.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(run) = &self.run {
            return format!("Run {}", run.lines().next().unwrap_or_default());
        }
        if let Some(uses) = &self.uses {
            return uses.clone();
        }
        String::new()
    }
}

/// Parse a task's workflow payload and synthesize its upstream stubs.
///
/// The payload must declare exactly one job. Each entry of the task's
/// needs map becomes a stub job carrying the upstream outputs and its
/// lowercased result, and the main job's `needs` list is rewritten to
/// the stub names in lexicographic order so planning is deterministic.
///
/// Returns the workflow and the id of the job to run.
pub fn generate_workflow(task: &Task) -> Result<(Workflow, String), WorkflowError> {
    let mut workflow: Workflow = serde_yaml::from_str(&task.workflow_payload)?;

    let job_ids: Vec<String> = workflow.jobs.keys().cloned().collect();
    if job_ids.len() != 1 {
        return Err(WorkflowError::MultipleJobs(job_ids));
    }
    let job_id = job_ids.into_iter().next().unwrap_or_default();

    let mut need_ids: Vec<String> = task.needs.keys().cloned().collect();
    need_ids.sort();

    for (id, need) in &task.needs {
        let stub = Job {
            outputs: need.outputs.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            result: Some(need.result.to_string()),
            ..Default::default()
        };
        workflow.jobs.insert(id.clone(), stub);
    }

    if let Some(job) = workflow.jobs.get_mut(&job_id) {
        job.needs = Some(StringList::Many(need_ids));
    }

    Ok((workflow, job_id))
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
