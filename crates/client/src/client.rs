// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The coordinator client seam.

use crate::api::*;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from coordinator RPCs.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("coordinator returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("coordinator does not implement {method}, upgrade the coordinator")]
    Unimplemented { method: String },
    #[error("decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ClientError {
    /// True when the coordinator predates the called method.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented { .. })
    }
}

/// A client manages communication with the coordinator.
///
/// All methods are one request, one response; retry policy lives with
/// the callers (the poll loop retries on its next tick, the reporter
/// wraps its final flush in a retry loop).
#[async_trait]
pub trait Client: Send + Sync + 'static {
    async fn ping(&self, req: PingRequest) -> Result<PingResponse, ClientError>;
    async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, ClientError>;
    async fn declare(&self, req: DeclareRequest) -> Result<DeclareResponse, ClientError>;
    async fn fetch_task(&self, req: FetchTaskRequest) -> Result<FetchTaskResponse, ClientError>;
    async fn update_log(&self, req: UpdateLogRequest) -> Result<UpdateLogResponse, ClientError>;
    async fn update_task(&self, req: UpdateTaskRequest) -> Result<UpdateTaskResponse, ClientError>;

    /// Coordinator base address.
    fn address(&self) -> &str;
    /// Whether TLS verification is disabled.
    fn insecure(&self) -> bool;
}
