// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task and step state reported back to the coordinator.

use crate::result::RunResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate state of one task, snapshotted to the coordinator on every
/// state flush.
///
/// `started_at` is the timestamp of the first log entry seen. `stopped_at`
/// and a terminal `result` are set exactly once; after that the only
/// permitted mutation is the single closing log row appended by the
/// reporter's close path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskState {
    pub id: i64,
    #[serde(default)]
    pub result: RunResult,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<StepState>,
}

/// State of one step within a task.
///
/// `log_index` is the absolute row offset at which this step's output
/// begins; `log_length` counts the rows belonging to it. Both are fixed
/// the first time the step produces output or terminates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepState {
    pub id: i64,
    #[serde(default)]
    pub result: RunResult,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub log_index: i64,
    #[serde(default)]
    pub log_length: i64,
}

/// A single timestamped line in a task's transcript.
///
/// Rows are addressed by 0-based absolute index; the coordinator's
/// acknowledged index never regresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub time: DateTime<Utc>,
    pub content: String,
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
