// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A dispatched unit of CI work, as received from the coordinator.

use crate::result::RunResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One dispatchable unit of CI work: exactly one job's worth of steps.
///
/// Immutable once received; everything the executor and reporter need is
/// carried here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    /// Workflow document (YAML) describing the single job to run.
    #[serde(default)]
    pub workflow_payload: String,
    /// Upstream jobs this task's job depends on, keyed by job name.
    #[serde(default)]
    pub needs: HashMap<String, TaskNeed>,
    /// Secret values, masked in all emitted logs.
    #[serde(default)]
    pub secrets: HashMap<String, String>,
    /// Variable bindings exposed to the workflow.
    #[serde(default)]
    pub vars: HashMap<String, String>,
    /// Forge metadata: actor, repository, refs, tokens, event payload.
    #[serde(default)]
    pub context: TaskContext,
}

/// Declared outputs and completion result of an upstream job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskNeed {
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    #[serde(default)]
    pub result: RunResult,
}

/// Free-form forge metadata attached to a task.
///
/// The coordinator sends a JSON object; values are looked up by key with
/// missing or non-string entries reading as empty, which keeps call
/// sites free of unwrapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskContext(pub serde_json::Map<String, serde_json::Value>);

impl TaskContext {
    /// Look up a string field; absent or non-string values read as "".
    pub fn str_field(&self, key: &str) -> &str {
        self.0.get(key).and_then(|v| v.as_str()).unwrap_or_default()
    }

    /// Look up a raw JSON value.
    pub fn value(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
