// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fr-core: Core domain model for the forge-runner CI agent

pub mod clock;
pub mod config;
pub mod labels;
pub mod registration;
pub mod result;
pub mod state;
pub mod task;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, ConfigError};
pub use labels::{Label, LabelError, Labels, Scheme};
pub use registration::Registration;
pub use result::RunResult;
pub use state::{LogRow, StepState, TaskState};
pub use task::{Task, TaskContext, TaskNeed};

/// Runner version, baked in at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
