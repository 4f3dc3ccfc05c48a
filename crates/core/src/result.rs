// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal outcome of a task or a step.

use serde::{Deserialize, Serialize};

/// Outcome of a step or a task.
///
/// `Unspecified` is the initial value and is never reported to the
/// coordinator as a final result; the reporter forces a terminal value
/// before the last flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    #[default]
    Unspecified,
    Success,
    Failure,
    Cancelled,
    Skipped,
}

impl std::fmt::Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unspecified => "unspecified",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        })
    }
}

impl RunResult {
    /// Parse the lowercase wire form. Only terminal results parse;
    /// anything else (including "unspecified") returns `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "cancelled" => Some(Self::Cancelled),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// True once a terminal result has been assigned.
    pub fn is_terminal(self) -> bool {
        self != Self::Unspecified
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
