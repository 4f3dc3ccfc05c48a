// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request and response bodies of the coordinator protocol.

use fr_core::{LogRow, Task, TaskState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingRequest {
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingResponse {
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub token: String,
    pub version: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub runner: RunnerInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclareRequest {
    pub version: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclareResponse {
    pub runner: RunnerInfo,
}

/// Runner identity as the coordinator sees it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerInfo {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchTaskRequest {
    /// Last tasks-version this runner observed; lets the coordinator
    /// short-circuit the poll when nothing changed. Zero forces a full
    /// query.
    pub tasks_version: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchTaskResponse {
    #[serde(default)]
    pub tasks_version: i64,
    #[serde(default)]
    pub task: Option<Task>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLogRequest {
    pub task_id: i64,
    /// Absolute index of the first row in this batch.
    pub index: i64,
    pub rows: Vec<LogRow>,
    /// True on the final flush; the coordinator must take every row.
    pub no_more: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLogResponse {
    /// Cumulative count of rows the coordinator has accepted.
    pub ack_index: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub state: TaskState,
    #[serde(default)]
    pub outputs: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskResponse {
    /// Coordinator's view of the task; a `cancelled` result here is a
    /// directive to stop the task.
    #[serde(default)]
    pub state: Option<TaskState>,
    /// Output keys the coordinator has durably stored.
    #[serde(default)]
    pub sent_outputs: Vec<String>,
}
