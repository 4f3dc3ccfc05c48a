// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fr-client: Coordinator RPC client.
//!
//! Wire format: JSON request/response bodies POSTed to
//! `{address}/api/actions/<service>/<method>`, with runner identity
//! carried in headers.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod api;
mod client;
mod http;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use api::{
    DeclareRequest, DeclareResponse, FetchTaskRequest, FetchTaskResponse, PingRequest,
    PingResponse, RegisterRequest, RegisterResponse, RunnerInfo, UpdateLogRequest,
    UpdateLogResponse, UpdateTaskRequest, UpdateTaskResponse,
};
pub use client::{Client, ClientError};
pub use http::{HttpClient, TOKEN_HEADER, UUID_HEADER, VERSION_HEADER};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeClient;
