// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP implementation of the coordinator client.

use crate::api::*;
use crate::client::{Client, ClientError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const UUID_HEADER: &str = "x-runner-uuid";
pub const TOKEN_HEADER: &str = "x-runner-token";
/// Legacy header kept for older coordinators.
pub const VERSION_HEADER: &str = "x-runner-version";

const RUNNER_SERVICE: &str = "runner.v1.RunnerService";
const PING_SERVICE: &str = "ping.v1.PingService";

/// HTTP client for the coordinator API.
pub struct HttpClient {
    http: reqwest::Client,
    endpoint: String,
    base_url: String,
    insecure: bool,
    uuid: String,
    token: String,
    version: String,
}

impl HttpClient {
    /// Build a client for `endpoint`. Identity headers are attached to
    /// every request when their values are non-empty.
    pub fn new(
        endpoint: &str,
        insecure: bool,
        uuid: impl Into<String>,
        token: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let mut builder = reqwest::Client::builder();
        if insecure && endpoint.starts_with("https://") {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().unwrap_or_default();
        let base_url = format!("{}/api/actions", endpoint);
        Self {
            http,
            endpoint,
            base_url,
            insecure,
            uuid: uuid.into(),
            token: token.into(),
            version: version.into(),
        }
    }

    async fn call<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        service: &str,
        method: &str,
        req: &Req,
    ) -> Result<Resp, ClientError> {
        let url = format!("{}/{}/{}", self.base_url, service, method);
        let mut builder = self.http.post(&url).json(req);
        if !self.uuid.is_empty() {
            builder = builder.header(UUID_HEADER, &self.uuid);
        }
        if !self.token.is_empty() {
            builder = builder.header(TOKEN_HEADER, &self.token);
        }
        if !self.version.is_empty() {
            builder = builder.header(VERSION_HEADER, &self.version);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NOT_IMPLEMENTED {
            return Err(ClientError::Unimplemented { method: method.to_string() });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status { status: status.as_u16(), message });
        }

        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(ClientError::Decode)
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn ping(&self, req: PingRequest) -> Result<PingResponse, ClientError> {
        self.call(PING_SERVICE, "Ping", &req).await
    }

    async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, ClientError> {
        self.call(RUNNER_SERVICE, "Register", &req).await
    }

    async fn declare(&self, req: DeclareRequest) -> Result<DeclareResponse, ClientError> {
        self.call(RUNNER_SERVICE, "Declare", &req).await
    }

    async fn fetch_task(&self, req: FetchTaskRequest) -> Result<FetchTaskResponse, ClientError> {
        self.call(RUNNER_SERVICE, "FetchTask", &req).await
    }

    async fn update_log(&self, req: UpdateLogRequest) -> Result<UpdateLogResponse, ClientError> {
        self.call(RUNNER_SERVICE, "UpdateLog", &req).await
    }

    async fn update_task(&self, req: UpdateTaskRequest) -> Result<UpdateTaskResponse, ClientError> {
        self.call(RUNNER_SERVICE, "UpdateTask", &req).await
    }

    fn address(&self) -> &str {
        &self.endpoint
    }

    fn insecure(&self) -> bool {
        self.insecure
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
