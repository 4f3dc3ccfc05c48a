// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-memory client for tests.

use crate::api::*;
use crate::client::{Client, ClientError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A coordinator double.
///
/// Responses can be scripted per method; unscripted calls get a
/// well-behaved default (logs fully acknowledged, outputs fully taken,
/// no pending task). Every request is recorded for assertions.
#[derive(Default)]
pub struct FakeClient {
    fetches: Mutex<VecDeque<FetchTaskResponse>>,
    log_acks: Mutex<VecDeque<i64>>,
    task_responses: Mutex<VecDeque<UpdateTaskResponse>>,
    log_failures: AtomicUsize,
    task_failures: AtomicUsize,

    pub fetch_requests: Mutex<Vec<FetchTaskRequest>>,
    pub log_requests: Mutex<Vec<UpdateLogRequest>>,
    pub task_requests: Mutex<Vec<UpdateTaskRequest>>,
    pub declare_requests: Mutex<Vec<DeclareRequest>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fetch response carrying a task.
    pub fn push_fetch(&self, resp: FetchTaskResponse) {
        self.fetches.lock().push_back(resp);
    }

    /// Override the ack index of the next log flush.
    pub fn queue_log_ack(&self, ack: i64) {
        self.log_acks.lock().push_back(ack);
    }

    /// Queue a scripted state-flush response.
    pub fn queue_task_response(&self, resp: UpdateTaskResponse) {
        self.task_responses.lock().push_back(resp);
    }

    /// Fail the next `n` log flushes with a transport-style error.
    pub fn fail_next_logs(&self, n: usize) {
        self.log_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` state flushes with a transport-style error.
    pub fn fail_next_tasks(&self, n: usize) {
        self.task_failures.store(n, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn unreachable_error() -> ClientError {
        ClientError::Status { status: 502, message: "coordinator unreachable".to_string() }
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn ping(&self, req: PingRequest) -> Result<PingResponse, ClientError> {
        Ok(PingResponse { data: req.data })
    }

    async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, ClientError> {
        Ok(RegisterResponse {
            runner: RunnerInfo {
                id: 1,
                uuid: "fake-uuid".to_string(),
                name: req.name,
                token: req.token,
                version: req.version,
                labels: req.labels,
            },
        })
    }

    async fn declare(&self, req: DeclareRequest) -> Result<DeclareResponse, ClientError> {
        self.declare_requests.lock().push(req.clone());
        Ok(DeclareResponse {
            runner: RunnerInfo { version: req.version, labels: req.labels, ..Default::default() },
        })
    }

    async fn fetch_task(&self, req: FetchTaskRequest) -> Result<FetchTaskResponse, ClientError> {
        self.fetch_requests.lock().push(req);
        Ok(self.fetches.lock().pop_front().unwrap_or_default())
    }

    async fn update_log(&self, req: UpdateLogRequest) -> Result<UpdateLogResponse, ClientError> {
        if Self::take_failure(&self.log_failures) {
            return Err(Self::unreachable_error());
        }
        let default_ack = req.index + req.rows.len() as i64;
        self.log_requests.lock().push(req);
        let ack_index = self.log_acks.lock().pop_front().unwrap_or(default_ack);
        Ok(UpdateLogResponse { ack_index })
    }

    async fn update_task(&self, req: UpdateTaskRequest) -> Result<UpdateTaskResponse, ClientError> {
        if Self::take_failure(&self.task_failures) {
            return Err(Self::unreachable_error());
        }
        let default_sent: Vec<String> = req.outputs.keys().cloned().collect();
        self.task_requests.lock().push(req);
        let resp = self
            .task_responses
            .lock()
            .pop_front()
            .unwrap_or(UpdateTaskResponse { state: None, sent_outputs: default_sent });
        Ok(resp)
    }

    fn address(&self) -> &str {
        "http://fake.invalid"
    }

    fn insecure(&self) -> bool {
        false
    }
}
